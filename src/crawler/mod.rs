//! Crawl control: pagination, orchestration and pacing
//!
//! The listing crawl walks a paginated search result with a
//! [`pagination::PaginationController`]; the [`orchestrator::Orchestrator`]
//! wraps each run in a rendering session with restored cookies and resumable
//! state.

pub mod orchestrator;
pub mod pacing;
pub mod pagination;

use std::time::Duration;

use url::form_urlencoded::byte_serialize;

use crate::render::Page;
use crate::utils::error::CrawlerError;
use crate::utils::retry::{with_retry, RetryConfig};

pub use orchestrator::{CatalogService, Orchestrator};
pub use pagination::{PaginationController, PaginationSettings};

/// Placeholder replaced by the encoded search term
pub const KEYWORDS_PLACEHOLDER: &str = "{keywords}";

/// Listing URL for `term`, percent-encoded into `template`
pub fn search_url(template: &str, term: &str) -> String {
    let encoded: String = byte_serialize(term.trim().as_bytes()).collect();
    template.replace(KEYWORDS_PLACEHOLDER, &encoded)
}

/// Navigate `page` to `url`, retrying per `retry`.
///
/// # Errors
///
/// `CrawlerError::NavigationExhausted` once every attempt has failed.
pub async fn navigate(
    page: &dyn Page,
    url: &str,
    timeout: Duration,
    retry: &RetryConfig,
) -> Result<(), CrawlerError> {
    with_retry(retry, "navigate", || page.goto(url, timeout))
        .await
        .map_err(|(source, attempts)| CrawlerError::NavigationExhausted {
            url: url.to_string(),
            attempts,
            source,
        })?;

    tracing::info!(url, "Navigation complete");
    Ok(())
}
