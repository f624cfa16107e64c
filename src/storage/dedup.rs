//! Identity-based deduplication in front of the catalog
//!
//! A summary is inserted only when no stored product carries the same
//! `offer_id`. The check and the insert are two separate store calls; the
//! pipeline runs a single crawler at a time, so no race window is guarded.

use crate::models::ProductSummary;
use crate::utils::error::CrawlerError;

use super::catalog::ProductCatalog;

/// What the gate did with one summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Inserted,
    /// A product with this offer id already exists
    Duplicate,
    /// The card carried no resolvable offer id
    MissingOfferId,
}

/// Check-then-insert gate keyed by `offer_id`
#[derive(Clone)]
pub struct DedupGate {
    catalog: ProductCatalog,
}

impl DedupGate {
    pub fn new(catalog: ProductCatalog) -> Self {
        Self { catalog }
    }

    /// Insert `summary` unless its offer id is already stored.
    ///
    /// # Errors
    ///
    /// - `CrawlerError::DedupCheckFailed` when the existence check cannot run
    /// - `CrawlerError::InsertFailed` when the insert itself fails
    pub async fn admit(&self, summary: &ProductSummary) -> Result<Admission, CrawlerError> {
        let Some(offer_id) = summary.offer_id.as_deref().filter(|id| !id.is_empty()) else {
            return Ok(Admission::MissingOfferId);
        };

        let exists = self
            .catalog
            .exists(offer_id)
            .await
            .map_err(|source| CrawlerError::DedupCheckFailed {
                offer_id: offer_id.to_string(),
                source,
            })?;

        if exists {
            tracing::debug!(offer_id, "Duplicate offer, skipping");
            return Ok(Admission::Duplicate);
        }

        self.catalog
            .insert_summary(summary)
            .await
            .map_err(|source| CrawlerError::InsertFailed {
                offer_id: offer_id.to_string(),
                source,
            })?;

        tracing::debug!(offer_id, title = ?summary.title, "Offer inserted");
        Ok(Admission::Inserted)
    }
}
