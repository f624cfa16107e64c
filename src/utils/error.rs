//! Error types for the offerhound crawler
//!
//! This module defines the domain error types used throughout the pipeline.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by a rendering backend (browser or snapshot replay)
#[derive(Error, Debug)]
pub enum RenderError {
    /// Navigation did not complete
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Navigation or selector wait exceeded its deadline
    #[error("Timed out after {}ms waiting for {target}", .timeout.as_millis())]
    Timeout { target: String, timeout: Duration },

    /// Element handle no longer attached to the current document
    #[error("Element is detached from the document")]
    Detached,

    /// No page has been loaded yet
    #[error("No document loaded")]
    NoDocument,

    /// Selector could not be parsed by the backend
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Cookie rejected by the session
    #[error("Cookie '{name}' rejected: {reason}")]
    CookieRejected { name: String, reason: String },

    /// Session could not be created or is gone
    #[error("Rendering session unavailable: {0}")]
    Session(String),

    /// Backend-specific failure
    #[error("Rendering backend error: {0}")]
    Backend(String),
}

impl RenderError {
    /// Transient failures are worth another attempt at the page-load boundary
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Navigation { .. } | Self::Timeout { .. } | Self::Backend(_)
        )
    }
}

/// Errors raised by the catalog, state and cookie stores
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Document (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Lock poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Errors raised while downloading or persisting images
#[derive(Error, Debug)]
pub enum AssetError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status
    #[error("Server returned status {0}")]
    Status(u16),

    /// URL could not be parsed
    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),

    /// File I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crawl-level errors surfaced to the orchestrator and its caller
#[derive(Error, Debug)]
pub enum CrawlerError {
    /// Rendering session could not be created
    #[error("Failed to open rendering session: {0}")]
    SessionCreation(#[source] RenderError),

    /// Navigation retries exhausted
    #[error("Navigation to {url} failed after {attempts} attempts: {source}")]
    NavigationExhausted {
        url: String,
        attempts: u32,
        #[source]
        source: RenderError,
    },

    /// Listing container never appeared
    #[error("Listing page {page} did not load after {attempts} attempts: {source}")]
    PageLoadExhausted {
        page: u32,
        attempts: u32,
        #[source]
        source: RenderError,
    },

    /// Identity check against the catalog could not be performed
    #[error("Dedup check failed for offer {offer_id}: {source}")]
    DedupCheckFailed {
        offer_id: String,
        #[source]
        source: StoreError,
    },

    /// Insert after a successful identity check failed
    #[error("Insert failed for offer {offer_id}: {source}")]
    InsertFailed {
        offer_id: String,
        #[source]
        source: StoreError,
    },

    /// Crawl state could not be persisted or read
    #[error("Crawl state persistence failed: {0}")]
    State(#[source] StoreError),

    /// Detail write-back failed
    #[error("Detail upsert failed for offer {offer_id}: {source}")]
    DetailUpsertFailed {
        offer_id: String,
        #[source]
        source: StoreError,
    },

    /// Rendering failure outside a retried boundary
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Catalog failure outside the dedup gate
    #[error("Catalog error: {0}")]
    Catalog(#[from] StoreError),
}

impl CrawlerError {
    /// Data-integrity hazards must never be swallowed
    pub fn is_integrity_hazard(&self) -> bool {
        matches!(self, Self::DedupCheckFailed { .. } | Self::State(_))
    }
}
