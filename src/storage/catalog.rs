//! Catalog store port and the typed product catalog on top of it
//!
//! The store is a schema-less keyed document collection. Typed entities
//! ([`ProductSummary`], [`ProductDetail`], [`CatalogProduct`]) only exist at the
//! [`ProductCatalog`] boundary.
//!
//! # Architecture
//!
//! ```text
//! ProductCatalog (typed) ──▶ dyn CatalogStore ──▶ MemoryCatalog | SqliteCatalog
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{CatalogProduct, ProductDetail, ProductSummary};
use crate::utils::error::StoreError;

/// A stored document
pub type Document = serde_json::Map<String, Value>;

/// Resolve a dotted path (`details.url`) inside a document
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Set a dotted path, creating intermediate objects as needed
pub fn set_path(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Document::new()));
            if !slot.is_object() {
                *slot = Value::Object(Document::new());
            }
            if let Value::Object(child) = slot {
                set_path(child, rest, value);
            }
        }
    }
}

/// Serialize a typed value into a document
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    Ok(serde_json::from_value(serde_json::to_value(value)?)?)
}

/// Query predicate over documents
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every document
    All,
    /// Field equals value
    Eq(String, Value),
    /// String field contains needle, ignoring case
    ContainsIgnoreCase(String, String),
    /// Field absent or null
    Missing(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(path.into(), value.into())
    }

    pub fn contains_ignore_case(path: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::ContainsIgnoreCase(path.into(), needle.into())
    }

    pub fn missing(path: impl Into<String>) -> Self {
        Self::Missing(path.into())
    }

    /// Evaluate against a document
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::All => true,
            Self::Eq(path, value) => lookup(doc, path) == Some(value),
            Self::ContainsIgnoreCase(path, needle) => lookup(doc, path)
                .and_then(Value::as_str)
                .map(|s| s.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
            Self::Missing(path) => lookup(doc, path).map_or(true, Value::is_null),
            Self::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(doc)),
        }
    }

    /// Equality constraints an upsert seeds a new document with
    pub fn seed_fields(&self) -> Vec<(String, Value)> {
        match self {
            Self::Eq(path, value) => vec![(path.clone(), value.clone())],
            Self::And(filters) => filters.iter().flat_map(Filter::seed_fields).collect(),
            _ => Vec::new(),
        }
    }
}

/// Paging and ordering for [`CatalogStore::find`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub skip: usize,
    pub limit: Option<usize>,
    /// Most recently inserted first
    pub newest_first: bool,
}

/// What an `update_one` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// An existing document was updated
    Matched,
    /// Nothing matched; a new document was inserted
    Upserted,
    /// Nothing matched and upsert was off
    NoMatch,
}

/// Build the document an upsert inserts when nothing matches
pub fn upsert_document(filter: &Filter, set: &Document) -> Document {
    let mut doc = Document::new();
    for (path, value) in filter.seed_fields() {
        set_path(&mut doc, &path, value);
    }
    for (path, value) in set {
        set_path(&mut doc, path, value.clone());
    }
    doc
}

/// Keyed document collection
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StoreError>;

    async fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError>;

    async fn insert_one(&self, doc: Document) -> Result<(), StoreError>;

    /// Set the (dotted) fields in `set` on the first match; other fields are untouched
    async fn update_one(
        &self,
        filter: &Filter,
        set: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError>;
}

// ============================================================================
// Typed catalog
// ============================================================================

/// Largest page size served by [`ProductCatalog::search`]
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub results: Vec<CatalogProduct>,
}

/// Typed product operations over a [`CatalogStore`]
#[derive(Clone)]
pub struct ProductCatalog {
    store: Arc<dyn CatalogStore>,
}

impl ProductCatalog {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    fn by_offer_id(offer_id: &str) -> Filter {
        Filter::eq("offer_id", offer_id)
    }

    fn search_filter(term: &str) -> Filter {
        let term = term.trim();
        if term.is_empty() {
            return Filter::All;
        }
        Filter::Or(vec![
            Filter::contains_ignore_case("title", term),
            Filter::contains_ignore_case("search_term", term),
        ])
    }

    /// Whether a product with exactly this offer id is stored
    pub async fn exists(&self, offer_id: &str) -> Result<bool, StoreError> {
        Ok(self.store.count(&Self::by_offer_id(offer_id)).await? > 0)
    }

    pub async fn insert_summary(&self, summary: &ProductSummary) -> Result<(), StoreError> {
        self.store.insert_one(to_document(summary)?).await
    }

    pub async fn find_by_offer_id(&self, offer_id: &str) -> Result<Option<CatalogProduct>, StoreError> {
        match self.store.find_one(&Self::by_offer_id(offer_id)).await? {
            Some(doc) => Ok(Some(serde_json::from_value(Value::Object(doc))?)),
            None => Ok(None),
        }
    }

    /// Number of products matching `term` (title or originating query)
    pub async fn count_matching(&self, term: &str) -> Result<u64, StoreError> {
        self.store.count(&Self::search_filter(term)).await
    }

    /// Case-insensitive title/search-term lookup, newest first
    pub async fn search(&self, term: &str, page: u32, limit: u32) -> Result<SearchPage, StoreError> {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let filter = Self::search_filter(term);

        let total = self.store.count(&filter).await?;
        let options = FindOptions {
            skip: usize::try_from(u64::from(page - 1) * u64::from(limit)).unwrap_or(usize::MAX),
            limit: Some(limit as usize),
            newest_first: true,
        };

        let results = self
            .store
            .find(&filter, &options)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(Value::Object(doc)))
            .collect::<Result<Vec<CatalogProduct>, _>>()?;

        Ok(SearchPage {
            page,
            limit,
            total,
            total_pages: total.div_ceil(u64::from(limit)),
            results,
        })
    }

    /// Upsert the `details` field only; summary fields are never touched
    pub async fn attach_details(
        &self,
        offer_id: &str,
        detail: &ProductDetail,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut set = Document::new();
        set.insert("details".to_string(), serde_json::to_value(detail)?);
        self.store
            .update_one(&Self::by_offer_id(offer_id), set, true)
            .await
    }
}
