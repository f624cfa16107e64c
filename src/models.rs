// Core data structures for the offerhound crawler

use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Listing records
// ============================================================================

/// Price block of a listing card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Price {
    pub currency: Option<String>,
    pub amount: Option<String>,
    pub unit: Option<String>,
    pub overseas: Option<String>,
}

impl Price {
    /// True when no sub-element of the price block was present
    pub fn is_empty(&self) -> bool {
        self.currency.is_none()
            && self.amount.is_none()
            && self.unit.is_none()
            && self.overseas.is_none()
    }
}

/// One search-result card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProductSummary {
    /// Source-assigned identity key; `None` when the link could not be resolved
    pub offer_id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub price: Price,
    pub rating: Option<String>,
    pub sold: Option<String>,
    pub promotion: Option<String>,
    pub moq: Option<String>,
    pub seller_icon: Option<String>,
    pub is_ad: bool,
    pub search_term: String,
    pub crawled_at: Option<DateTime<Utc>>,
}

/// A catalog entry: the summary fields plus lazily attached details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CatalogProduct {
    #[serde(flatten)]
    pub summary: ProductSummary,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ProductDetail>,
}

impl CatalogProduct {
    pub fn has_details(&self) -> bool {
        self.details.is_some()
    }
}

// ============================================================================
// Detail records
// ============================================================================

/// Review summary block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub rating: String,
    pub total_reviews: u64,
    pub positive_rate: String,
}

impl Default for ReviewSummary {
    fn default() -> Self {
        Self {
            rating: "0.0".to_string(),
            total_reviews: 0,
            positive_rate: "0%".to_string(),
        }
    }
}

/// One physical package variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PackingRow {
    pub color: String,
    pub size: Option<String>,
    pub weight_g: Option<f64>,
}

/// Description images and the pricing breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Description {
    pub images: Vec<String>,
    pub html: Option<String>,
    pub price_desc: OrderedMap<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTitle {
    pub title: String,
    pub rating: String,
    pub reviews: String,
    pub total_sales: String,
}

impl Default for ProductTitle {
    fn default() -> Self {
        Self {
            title: String::new(),
            rating: "0.0".to_string(),
            reviews: "0".to_string(),
            total_sales: "0".to_string(),
        }
    }
}

/// Per-size-unit price/stock row of the cart panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CartSku {
    pub size: String,
    pub price: String,
    pub stock: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Cart {
    pub price_range: String,
    pub min_order: String,
    pub services: Vec<String>,
    pub shipping_from: String,
    pub skus: Vec<CartSku>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TitleAndCart {
    #[serde(rename = "productTitle")]
    pub product_title: ProductTitle,
    pub cart: Cart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VariantSize {
    pub size_name: String,
    pub price: String,
    pub stock: String,
}

/// One color/style selector and the sizes it exposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Variant {
    pub color_name: String,
    pub image: String,
    pub active: bool,
    pub sizes: Vec<VariantSize>,
}

/// Breadcrumb-derived classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Categories {
    pub category: String,
    pub sub_category: String,
    pub item_name: String,
}

/// Deep detail record attached to a summary via `offer_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProductDetail {
    pub url: String,
    pub reviews: ReviewSummary,
    pub attributes: OrderedMap<String>,
    pub packing: Vec<PackingRow>,
    pub description: Description,
    pub title_and_cart: TitleAndCart,
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub categories: Categories,
}

// ============================================================================
// Crawl progress
// ============================================================================

/// Default page bound until the source reports its own
pub const DEFAULT_MAX_PAGES: u32 = 5;

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

fn default_current_page() -> u32 {
    1
}

/// Persisted pagination progress (`crawl_state.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlState {
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// 1-based; equals the page actually rendered
    #[serde(default = "default_current_page")]
    pub current_page: u32,

    #[serde(default)]
    pub current_url: String,

    #[serde(default)]
    pub last_url: String,

    /// Query the progress belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for CrawlState {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            current_page: 1,
            current_url: String::new(),
            last_url: String::new(),
            search_term: None,
            updated_at: None,
        }
    }
}

impl CrawlState {
    /// Fresh progress owned by `search_term`
    pub fn for_term(search_term: &str) -> Self {
        Self {
            search_term: Some(search_term.to_string()),
            ..Default::default()
        }
    }

    /// Whether a crawl of `search_term` can pick up from this state.
    /// State files written without an owning term are adopted by any term.
    pub fn is_resumable_for(&self, search_term: &str) -> bool {
        if self.current_url.is_empty() {
            return false;
        }
        match self.search_term.as_deref() {
            Some(term) => term == search_term,
            None => true,
        }
    }

    /// Whether the loop bound still admits the current page
    pub fn within_bound(&self) -> bool {
        self.current_page <= self.max_pages
    }

    /// Record a confirmed advance to `page` rendered at `url`
    pub fn record_advance(&mut self, page: u32, url: String) {
        self.last_url = std::mem::replace(&mut self.current_url, url);
        self.current_page = page;
        self.touch();
    }

    /// Reset progress after a completed crawl, remembering where it ended
    pub fn reset_after_completion(&mut self) {
        let last_url = std::mem::take(&mut self.current_url);
        let term = self.search_term.take();
        *self = Self {
            last_url,
            search_term: term,
            ..Default::default()
        };
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

/// Why the pagination loop stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Next-page control absent
    NoNextControl,
    /// Next-page control carries its disabled class
    NextDisabled,
    /// Click went through but the page indicator did not move to `expected`
    IndicatorMismatch { expected: u32, observed: Option<u32> },
    /// Clicking the control failed
    ClickFailed(String),
    /// `current_page` exceeded `max_pages`
    PageBoundReached,
}

impl TerminationReason {
    /// Whether the listing was walked to its end. A failed click or an
    /// unreadable page indicator leaves the last confirmed page resumable.
    pub fn completes_listing(&self) -> bool {
        !matches!(
            self,
            Self::ClickFailed(_) | Self::IndicatorMismatch { observed: None, .. }
        )
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoNextControl => write!(f, "no next-page control"),
            Self::NextDisabled => write!(f, "next-page control disabled"),
            Self::IndicatorMismatch { expected, observed } => match observed {
                Some(page) => write!(f, "page indicator shows {page}, expected {expected}"),
                None => write!(f, "page indicator unreadable, expected {expected}"),
            },
            Self::ClickFailed(reason) => write!(f, "next-page click failed: {reason}"),
            Self::PageBoundReached => write!(f, "page bound reached"),
        }
    }
}

/// Outcome of one listing crawl
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CrawlReport {
    pub search_term: String,
    pub pages_visited: u32,
    pub cards_seen: u32,
    pub inserted: u32,
    pub duplicates: u32,
    pub rejected: u32,
    pub failed: u32,
    pub termination: Option<TerminationReason>,
}

impl CrawlReport {
    pub fn new(search_term: &str) -> Self {
        Self {
            search_term: search_term.to_string(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Ordered mapping
// ============================================================================

/// Insertion-ordered string-keyed mapping; serializes as a JSON object.
/// Re-inserting a key overwrites its value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = OrderedMap::new();
        while let Some((k, v)) = access.next_entry::<String, V>()? {
            map.insert(k, v);
        }
        Ok(map)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}
