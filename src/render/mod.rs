//! Rendering capability consumed by the crawl pipeline
//!
//! The pipeline only needs "render a page, query its DOM, click/navigate".
//! Those operations are expressed as four object-safe async traits so the
//! control logic can run against a real browser or an offline replay.
//!
//! # Architecture
//!
//! ```text
//! Renderer ──open_session──▶ Session ──new_page──▶ Page ──query──▶ Element
//!                              │                     │               │
//!                        add_cookies/cookies    goto/wait/url   click/attribute/text
//! ```
//!
//! Backends:
//! - [`snapshot::SnapshotRenderer`] - replays captured HTML documents (always built)
//! - `chromium::ChromiumRenderer` - headless Chromium via `chromiumoxide` (feature `chromium`)

#[cfg(feature = "chromium")]
pub mod chromium;
pub mod snapshot;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::utils::error::RenderError;

pub use snapshot::{SnapshotRenderer, SnapshotSite};

/// Owned handle to a page element
pub type ElementHandle = Box<dyn Element>;

/// Owned handle to a rendered page
pub type PageHandle = Box<dyn Page>;

/// Owned handle to a rendering session
pub type SessionHandle = Box<dyn Session>;

/// Options for opening a rendering session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub user_agent: String,
    pub ignore_tls_errors: bool,
    pub headless: bool,
}

/// SameSite policy of a cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// Normalized cookie record exchanged with a session
#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Seconds since the Unix epoch; `None` for session cookies
    pub expires: Option<f64>,
    pub same_site: Option<SameSite>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: "/".to_string(),
            secure: false,
            http_only: false,
            expires: None,
            same_site: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Factory for rendering sessions
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Acquire a new session; failure here is fatal for the crawl run
    async fn open_session(&self, options: &SessionOptions) -> Result<SessionHandle, RenderError>;
}

/// One browsing context: cookies plus the pages opened in it
#[async_trait]
pub trait Session: Send + Sync {
    async fn add_cookies(&self, cookies: &[Cookie]) -> Result<(), RenderError>;

    /// Current cookie jar of the session
    async fn cookies(&self) -> Result<Vec<Cookie>, RenderError>;

    async fn new_page(&self) -> Result<PageHandle, RenderError>;

    /// Release the session and every page it owns
    async fn close(&self) -> Result<(), RenderError>;
}

/// A rendered document with navigation state
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), RenderError>;

    /// Wait until `selector` matches at least one element
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), RenderError>;

    /// All elements matching `selector`, in document order
    async fn query(&self, selector: &str) -> Result<Vec<ElementHandle>, RenderError>;

    async fn url(&self) -> Result<String, RenderError>;

    /// Wait for in-flight navigation triggered by a click to settle
    async fn wait_for_idle(&self, timeout: Duration) -> Result<(), RenderError>;
}

/// A DOM element. Handles may go stale once the page re-renders.
#[async_trait]
pub trait Element: Send + Sync {
    async fn click(&self) -> Result<(), RenderError>;

    async fn attribute(&self, name: &str) -> Result<Option<String>, RenderError>;

    /// Rendered text, trimmed
    async fn text(&self) -> Result<String, RenderError>;

    /// Lower-case tag name
    async fn tag_name(&self) -> Result<String, RenderError>;

    /// Descendants matching `selector`, in document order
    async fn query(&self, selector: &str) -> Result<Vec<ElementHandle>, RenderError>;
}

// ============================================================================
// Query helpers
// ============================================================================

/// Text of the first descendant of `element` matching `selector`
pub async fn child_text(element: &dyn Element, selector: &str) -> Option<String> {
    let first = element.query(selector).await.ok()?.into_iter().next()?;
    first.text().await.ok()
}

/// Attribute of the first descendant of `element` matching `selector`
pub async fn child_attribute(element: &dyn Element, selector: &str, name: &str) -> Option<String> {
    let first = element.query(selector).await.ok()?.into_iter().next()?;
    first.attribute(name).await.ok().flatten()
}

/// Text of the `index`-th element on the page matching `selector`
pub async fn nth_text(page: &dyn Page, selector: &str, index: usize) -> Option<String> {
    let element = page.query(selector).await.ok()?.into_iter().nth(index)?;
    element.text().await.ok()
}

/// Texts of every element on the page matching `selector`
pub async fn all_texts(page: &dyn Page, selector: &str) -> Result<Vec<String>, RenderError> {
    let mut texts = Vec::new();
    for element in page.query(selector).await? {
        texts.push(element.text().await?);
    }
    Ok(texts)
}

/// Whether a whitespace-separated `class` attribute carries `token`
pub fn has_class_token(class_attr: Option<&str>, token: &str) -> bool {
    class_attr
        .map(|c| c.split_whitespace().any(|t| t == token))
        .unwrap_or(false)
}
