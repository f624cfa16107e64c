//! Listing card normalization
//!
//! Every field is read independently; an absent sub-element leaves its field
//! `None` and never aborts the card.

use chrono::Utc;
use url::Url;

use super::selectors::ListingSelectors;
use crate::models::{Price, ProductSummary};
use crate::render::{child_attribute, child_text, has_class_token, Element};

/// Base used to resolve relative card links
const LISTING_BASE: &str = "https://s.1688.com/";

/// Query parameter carrying the offer id on tracking links
const OFFER_QUERY_PARAM: &str = "a";

/// Derive the offer id from a card link.
///
/// `.../offer/<id>.html` yields `<id>`; otherwise the `a` query parameter is used.
pub fn offer_id_from_href(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    if let Some((_, tail)) = href.rsplit_once("offer/") {
        let id = tail.split(['.', '?', '#', '/']).next().unwrap_or_default();
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }

    let base = Url::parse(LISTING_BASE).ok()?;
    let url = base.join(href).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == OFFER_QUERY_PARAM)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Map one rendered card into a summary record
pub async fn normalize_card(card: &dyn Element, search_term: &str) -> ProductSummary {
    let s = ListingSelectors::new();

    let href = card.attribute("href").await.ok().flatten();
    let class_attr = card.attribute("class").await.ok().flatten();

    let overseas = child_text(card, s.overseas_price)
        .await
        .map(|t| t.replace('≈', "").trim().to_string());

    ProductSummary {
        offer_id: href.as_deref().and_then(offer_id_from_href),
        title: child_text(card, s.title).await,
        url: href,
        image: child_attribute(card, s.image, "src").await,
        price: Price {
            currency: child_text(card, s.price_currency).await,
            amount: child_text(card, s.price_amount).await,
            unit: child_text(card, s.price_unit).await,
            overseas,
        },
        rating: child_text(card, s.rating).await,
        sold: child_text(card, s.sold).await,
        promotion: child_text(card, s.promotion).await,
        moq: child_text(card, s.moq).await,
        seller_icon: child_attribute(card, s.seller_icon, "src").await,
        is_ad: has_class_token(class_attr.as_deref(), s.ad_class),
        search_term: search_term.to_string(),
        crawled_at: Some(Utc::now()),
    }
}
