//! In-memory catalog store
//!
//! Used by tests and the offline CLI mode. Failure switches let callers
//! simulate an unreachable store or rejected writes.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use super::catalog::{set_path, upsert_document, CatalogStore, Document, Filter, FindOptions, UpdateOutcome};
use crate::utils::error::StoreError;

/// `Vec`-backed document collection in insertion order
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    docs: RwLock<Vec<Document>>,
    unavailable: AtomicBool,
    fail_inserts: AtomicBool,
    inserts: AtomicU32,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `StoreError::Unavailable` while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Reads succeed but `insert_one` fails while set
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Successful `insert_one` calls so far
    pub fn insert_count(&self) -> u32 {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every stored document
    pub fn snapshot(&self) -> Vec<Document> {
        self.docs.read().map(|docs| docs.clone()).unwrap_or_default()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory catalog offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StoreError> {
        self.check_available()?;
        let docs = self.docs.read().map_err(|_| StoreError::Poisoned)?;
        Ok(docs.iter().find(|d| filter.matches(d)).cloned())
    }

    async fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>, StoreError> {
        self.check_available()?;
        let docs = self.docs.read().map_err(|_| StoreError::Poisoned)?;

        let matching: Box<dyn Iterator<Item = &Document>> = if options.newest_first {
            Box::new(docs.iter().rev().filter(|d| filter.matches(d)))
        } else {
            Box::new(docs.iter().filter(|d| filter.matches(d)))
        };

        Ok(matching
            .skip(options.skip)
            .take(options.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.check_available()?;
        let docs = self.docs.read().map_err(|_| StoreError::Poisoned)?;
        Ok(docs.iter().filter(|d| filter.matches(d)).count() as u64)
    }

    async fn insert_one(&self, doc: Document) -> Result<(), StoreError> {
        self.check_available()?;
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("insert rejected".to_string()));
        }
        self.docs.write().map_err(|_| StoreError::Poisoned)?.push(doc);
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_one(
        &self,
        filter: &Filter,
        set: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        self.check_available()?;
        let mut docs = self.docs.write().map_err(|_| StoreError::Poisoned)?;

        if let Some(doc) = docs.iter_mut().find(|d| filter.matches(d)) {
            for (path, value) in set {
                set_path(doc, &path, value);
            }
            return Ok(UpdateOutcome::Matched);
        }

        if !upsert {
            return Ok(UpdateOutcome::NoMatch);
        }
        docs.push(upsert_document(filter, &set));
        Ok(UpdateOutcome::Upserted)
    }
}
