//! Unified error handling for the offerhound crate
//!
//! This module provides a unified error type that consolidates the domain
//! errors into a single `Error` enum, while keeping the domain errors usable
//! on their own.
//!
//! # Architecture
//!
//! - [`CrawlErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use offerhound::error::{CrawlErrorTrait, Error};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Retrying: {err}");
//!     } else {
//!         eprintln!("Fatal error: {err}");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::utils::error::{AssetError, CrawlerError, RenderError, StoreError};

/// Common trait for all offerhound error types
pub trait CrawlErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transient navigation failures (timeouts, network hiccups)
    Navigation,
    /// Missing elements or malformed attributes
    Extraction,
    /// Catalog, state and file persistence
    Storage,
    /// Dedup check could not be performed; must propagate
    DataIntegrity,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::Extraction => "extraction",
            Self::Storage => "storage",
            Self::DataIntegrity => "data_integrity",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the offerhound crate
#[derive(Error, Debug)]
pub enum Error {
    /// Crawl-level errors
    #[error("Crawler error: {0}")]
    Crawler(#[from] CrawlerError),

    /// Rendering backend errors
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Image download errors
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Requested catalog entry does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl CrawlErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Crawler(e) => match e {
                CrawlerError::NavigationExhausted { .. }
                | CrawlerError::PageLoadExhausted { .. } => true,
                CrawlerError::Render(r) => r.is_transient(),
                _ => false,
            },
            Self::Render(e) => e.is_transient(),
            Self::Store(StoreError::Unavailable(_)) => true,
            Self::Store(_) => false,
            Self::Asset(_) => true,
            Self::Io(_) => true, // I/O errors are often transient
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::NotFound(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Crawler(e) if e.is_integrity_hazard() => ErrorCategory::DataIntegrity,
            Self::Crawler(CrawlerError::InsertFailed { .. })
            | Self::Crawler(CrawlerError::DetailUpsertFailed { .. })
            | Self::Crawler(CrawlerError::Catalog(_)) => ErrorCategory::Storage,
            Self::Crawler(_) | Self::Render(_) => ErrorCategory::Navigation,
            Self::Store(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Asset(_) => ErrorCategory::Navigation,
            Self::Json(_) => ErrorCategory::Extraction,
            Self::Config(_) => ErrorCategory::Config,
            Self::NotFound(_) | Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: format!("{err:#}"),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
