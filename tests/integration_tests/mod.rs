//! Integration tests module
//!
//! End-to-end tests for the offerhound crawler, driven through the snapshot
//! rendering backend:
//! - Listing pagination, resume and deduplication
//! - Detail extraction and catalog write-back
//! - SQLite catalog, state and cookie files, image downloads
//! - Error handling and recovery scenarios

pub mod catalog_test;
pub mod detail_test;
pub mod error_scenarios;
pub mod fixtures;
pub mod listing_test;
