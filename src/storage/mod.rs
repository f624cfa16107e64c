//! Persistence: product catalog, crawl state, session cookies and images

pub mod catalog;
pub mod checkpoint;
pub mod cookies;
pub mod dedup;
pub mod images;
pub mod memory;
pub mod sqlite;

pub use catalog::{
    CatalogStore, Document, Filter, FindOptions, ProductCatalog, SearchPage, UpdateOutcome,
};
pub use checkpoint::{CrawlStateStore, JsonStateFile, MemoryStateStore};
pub use cookies::CookieJar;
pub use dedup::{Admission, DedupGate};
pub use images::{HttpImageStore, ImageKind, ImageSaver};
pub use memory::MemoryCatalog;
pub use sqlite::SqliteCatalog;
