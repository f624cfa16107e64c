//! offerhound - resumable product-catalog crawler
//!
//! Paginates a JavaScript-rendered marketplace search listing, normalizes
//! each result card, deduplicates it against the catalog by offer id and
//! fetches per-item detail pages on demand.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Pagination state machine, orchestration and pacing
//! - [`parser`] - Listing card and detail page extraction
//! - [`render`] - Rendering capability (snapshot replay, headless Chromium)
//! - [`models`] - Core data structures and types
//! - [`storage`] - Catalog, crawl state, cookie and image persistence
//! - [`utils`] - Common utilities, retry and domain errors
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use offerhound::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let site = SnapshotSite::from_dir(std::path::Path::new("snapshots")).await?;
//!     let orchestrator = Orchestrator::from_config(config, Arc::new(SnapshotRenderer::new(site)))?;
//!     let report = orchestrator.run_listing_crawl("laptop").await?;
//!     println!("inserted {}", report.inserted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod parser;
pub mod render;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{CatalogService, Orchestrator};
    pub use crate::error::{CrawlErrorTrait, Error, ErrorCategory, Result};
    pub use crate::models::{CatalogProduct, CrawlReport, CrawlState, ProductDetail, ProductSummary};
    pub use crate::render::{Renderer, SnapshotRenderer, SnapshotSite};
    pub use crate::storage::{CookieJar, JsonStateFile, ProductCatalog, SqliteCatalog};
}

// Direct re-exports for convenience
pub use models::{CatalogProduct, CrawlReport, CrawlState, ProductDetail, ProductSummary};
