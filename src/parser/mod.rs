//! Extraction of structured records from rendered pages
//!
//! - [`card`] - listing card to [`crate::models::ProductSummary`]
//! - [`detail`] - detail page to [`crate::models::ProductDetail`]
//! - [`selectors`] - CSS selectors of the source site
//! - [`outcome`] - per-section extraction outcomes

pub mod card;
pub mod detail;
pub mod outcome;
pub mod selectors;

pub use card::{normalize_card, offer_id_from_href};
pub use detail::{DetailExtractor, DetailReport, DetailSection};
pub use outcome::{Extraction, SectionStatus};
pub use selectors::{DetailSelectors, ListingSelectors, PagerSelectors};
