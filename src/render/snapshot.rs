//! Offline rendering backend replaying captured HTML documents
//!
//! A [`SnapshotSite`] maps URLs to HTML snapshots. Pages opened from a
//! [`SnapshotRenderer`] navigate between those snapshots, and clicks follow
//! a small attribute protocol embedded in the snapshot markup:
//!
//! - `data-goto="<url>"` navigates to another recorded URL
//! - `data-swap="<key>"` replaces the document in place (same URL), the way a
//!   client-side re-render does
//! - `data-click-error="<reason>"` makes the click itself fail
//! - `<a href>` navigates when the resolved target is recorded, else no-op
//!
//! Every document change bumps the page generation; element handles from an
//! older generation report [`RenderError::Detached`].
//!
//! `scraper::Html` is not `Send`, so documents are stored as source text and
//! parsed inside synchronous helpers that never cross an await point.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{
    Cookie, Element, ElementHandle, Page, PageHandle, Renderer, Session, SessionHandle,
    SessionOptions,
};
use crate::utils::error::RenderError;
use crate::utils::normalize_whitespace;

lazy_static! {
    static ref ANY_ELEMENT: Selector = Selector::parse("*").expect("Invalid CSS selector: *");
}

/// Name of the URL-to-file index inside a snapshot directory
pub const MANIFEST_FILE: &str = "manifest.json";

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RenderError> {
    mutex
        .lock()
        .map_err(|_| RenderError::Backend("snapshot state poisoned".to_string()))
}

fn parse_selector(selector: &str) -> Result<Selector, RenderError> {
    Selector::parse(selector)
        .map_err(|e| RenderError::InvalidSelector(format!("{selector}: {e:?}")))
}

/// Document-order indices (among all elements) of the matches of `selector`,
/// optionally scoped to the descendants of the element at `scope`
fn select_ordinals(
    html: &str,
    scope: Option<usize>,
    selector: &Selector,
) -> Result<Vec<usize>, RenderError> {
    let doc = Html::parse_document(html);
    let all: Vec<ElementRef<'_>> = doc.select(&ANY_ELEMENT).collect();

    let matched: Vec<ElementRef<'_>> = match scope {
        None => doc.select(selector).collect(),
        Some(ordinal) => all
            .get(ordinal)
            .ok_or(RenderError::Detached)?
            .select(selector)
            .collect(),
    };

    Ok(matched
        .iter()
        .filter_map(|m| all.iter().position(|e| e.id() == m.id()))
        .collect())
}

// ============================================================================
// Site
// ============================================================================

#[derive(Default)]
struct SiteInner {
    documents: HashMap<String, Arc<String>>,
    goto_failures: HashMap<String, u32>,
    wait_failures: HashMap<String, u32>,
    query_failures: HashMap<String, u32>,
    refuse_sessions: bool,
    sessions_opened: u32,
    sessions_closed: u32,
}

/// Shared set of recorded documents plus failure injection
#[derive(Clone, Default)]
pub struct SnapshotSite {
    inner: Arc<Mutex<SiteInner>>,
}

impl SnapshotSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `manifest.json` (`{"<url>": "<file>"}`) and the files it names
    pub async fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = tokio::fs::read_to_string(&manifest_path)
            .await
            .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
        let entries: HashMap<String, String> = serde_json::from_str(&manifest)
            .with_context(|| format!("Failed to parse {}", manifest_path.display()))?;

        let site = Self::new();
        for (url, file) in entries {
            let path = dir.join(&file);
            let html = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
            site.insert(url, html);
        }

        debug!(dir = %dir.display(), "Snapshot site loaded");
        Ok(site)
    }

    /// Record `html` as the document served at `url` (or swap key)
    pub fn insert(&self, url: impl Into<String>, html: impl Into<String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.documents.insert(url.into(), Arc::new(html.into()));
        }
    }

    /// Make the next `times` navigations to `url` time out
    pub fn fail_goto(&self, url: impl Into<String>, times: u32) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.goto_failures.insert(url.into(), times);
        }
    }

    /// Make the next `times` selector waits on `url` time out
    pub fn fail_wait(&self, url: impl Into<String>, times: u32) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.wait_failures.insert(url.into(), times);
        }
    }

    /// Make the next `times` page-level queries for `selector` fail
    pub fn fail_query(&self, selector: impl Into<String>, times: u32) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.query_failures.insert(selector.into(), times);
        }
    }

    /// Refuse every new session
    pub fn refuse_sessions(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.refuse_sessions = true;
        }
    }

    pub fn sessions_opened(&self) -> u32 {
        self.inner.lock().map(|i| i.sessions_opened).unwrap_or(0)
    }

    pub fn sessions_closed(&self) -> u32 {
        self.inner.lock().map(|i| i.sessions_closed).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.documents.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn document(&self, key: &str) -> Result<Option<Arc<String>>, RenderError> {
        Ok(lock(&self.inner)?.documents.get(key).cloned())
    }

    fn take_failure(counter: &mut HashMap<String, u32>, key: &str) -> bool {
        match counter.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn take_goto_failure(&self, url: &str) -> Result<bool, RenderError> {
        let mut inner = lock(&self.inner)?;
        Ok(Self::take_failure(&mut inner.goto_failures, url))
    }

    fn take_wait_failure(&self, url: &str) -> Result<bool, RenderError> {
        let mut inner = lock(&self.inner)?;
        Ok(Self::take_failure(&mut inner.wait_failures, url))
    }

    fn take_query_failure(&self, selector: &str) -> Result<bool, RenderError> {
        let mut inner = lock(&self.inner)?;
        Ok(Self::take_failure(&mut inner.query_failures, selector))
    }
}

// ============================================================================
// Renderer / Session
// ============================================================================

/// Rendering backend over a [`SnapshotSite`]
#[derive(Clone)]
pub struct SnapshotRenderer {
    site: SnapshotSite,
}

impl SnapshotRenderer {
    pub fn new(site: SnapshotSite) -> Self {
        Self { site }
    }

    pub fn site(&self) -> &SnapshotSite {
        &self.site
    }
}

#[async_trait]
impl Renderer for SnapshotRenderer {
    async fn open_session(&self, options: &SessionOptions) -> Result<SessionHandle, RenderError> {
        let mut inner = lock(&self.site.inner)?;
        if inner.refuse_sessions {
            return Err(RenderError::Session("snapshot site refuses sessions".to_string()));
        }
        inner.sessions_opened += 1;
        debug!(user_agent = %options.user_agent, "Snapshot session opened");

        Ok(Box::new(SnapshotSession {
            site: self.site.clone(),
            cookies: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }))
    }
}

struct SnapshotSession {
    site: SnapshotSite,
    cookies: Mutex<Vec<Cookie>>,
    closed: AtomicBool,
}

impl SnapshotSession {
    fn ensure_open(&self) -> Result<(), RenderError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RenderError::Session("session already closed".to_string()));
        }
        Ok(())
    }

    fn validate(cookie: &Cookie) -> Result<(), RenderError> {
        if cookie.name.is_empty() {
            return Err(RenderError::CookieRejected {
                name: cookie.name.clone(),
                reason: "empty name".to_string(),
            });
        }
        if cookie.domain.as_deref().map_or(true, str::is_empty) {
            return Err(RenderError::CookieRejected {
                name: cookie.name.clone(),
                reason: "cookie requires a domain".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Session for SnapshotSession {
    async fn add_cookies(&self, cookies: &[Cookie]) -> Result<(), RenderError> {
        self.ensure_open()?;
        // Batches are all-or-nothing
        for cookie in cookies {
            Self::validate(cookie)?;
        }

        let mut jar = lock(&self.cookies)?;
        for cookie in cookies {
            match jar.iter_mut().find(|c| {
                c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path
            }) {
                Some(existing) => *existing = cookie.clone(),
                None => jar.push(cookie.clone()),
            }
        }
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, RenderError> {
        Ok(lock(&self.cookies)?.clone())
    }

    async fn new_page(&self) -> Result<PageHandle, RenderError> {
        self.ensure_open()?;
        Ok(Box::new(SnapshotPage {
            site: self.site.clone(),
            state: Arc::new(Mutex::new(PageState::default())),
        }))
    }

    async fn close(&self) -> Result<(), RenderError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            lock(&self.site.inner)?.sessions_closed += 1;
        }
        Ok(())
    }
}

// ============================================================================
// Page
// ============================================================================

#[derive(Default)]
struct PageState {
    url: Option<String>,
    html: Option<Arc<String>>,
    generation: u64,
}

impl PageState {
    fn load(&mut self, url: Option<String>, html: Arc<String>) {
        if let Some(url) = url {
            self.url = Some(url);
        }
        self.html = Some(html);
        self.generation += 1;
    }

    fn current(&self) -> Result<(String, Arc<String>), RenderError> {
        match (&self.url, &self.html) {
            (Some(url), Some(html)) => Ok((url.clone(), Arc::clone(html))),
            _ => Err(RenderError::NoDocument),
        }
    }
}

struct SnapshotPage {
    site: SnapshotSite,
    state: Arc<Mutex<PageState>>,
}

impl SnapshotPage {
    fn elements(&self, scope: Option<usize>, selector: &str) -> Result<Vec<ElementHandle>, RenderError> {
        let selector = parse_selector(selector)?;
        let (html, generation) = {
            let state = lock(&self.state)?;
            let (_, html) = state.current()?;
            (html, state.generation)
        };

        let ordinals = select_ordinals(&html, scope, &selector)?;
        Ok(ordinals
            .into_iter()
            .map(|ordinal| {
                Box::new(SnapshotElement {
                    site: self.site.clone(),
                    page: Arc::clone(&self.state),
                    html: Arc::clone(&html),
                    generation,
                    ordinal,
                }) as ElementHandle
            })
            .collect())
    }
}

#[async_trait]
impl Page for SnapshotPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        if self.site.take_goto_failure(url)? {
            return Err(RenderError::Timeout {
                target: url.to_string(),
                timeout,
            });
        }

        let html = self
            .site
            .document(url)?
            .ok_or_else(|| RenderError::Navigation {
                url: url.to_string(),
                reason: "no snapshot recorded for url".to_string(),
            })?;

        lock(&self.state)?.load(Some(url.to_string()), html);
        debug!(url, "Snapshot page loaded");
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), RenderError> {
        let (url, html) = lock(&self.state)?.current()?;
        let timed_out = || RenderError::Timeout {
            target: selector.to_string(),
            timeout,
        };

        if self.site.take_wait_failure(&url)? {
            return Err(timed_out());
        }

        let compiled = parse_selector(selector)?;
        if select_ordinals(&html, None, &compiled)?.is_empty() {
            return Err(timed_out());
        }
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Vec<ElementHandle>, RenderError> {
        if self.site.take_query_failure(selector)? {
            return Err(RenderError::Backend(format!("query for '{selector}' failed")));
        }
        self.elements(None, selector)
    }

    async fn url(&self) -> Result<String, RenderError> {
        lock(&self.state)?.url.clone().ok_or(RenderError::NoDocument)
    }

    async fn wait_for_idle(&self, _timeout: Duration) -> Result<(), RenderError> {
        lock(&self.state)?.current().map(|_| ())
    }
}

// ============================================================================
// Element
// ============================================================================

struct SnapshotElement {
    site: SnapshotSite,
    page: Arc<Mutex<PageState>>,
    html: Arc<String>,
    generation: u64,
    ordinal: usize,
}

/// What a click on an element does
enum ClickAction {
    Goto(String),
    Swap(String),
    Follow(String),
    Fail(String),
    Nothing,
}

impl SnapshotElement {
    fn ensure_attached(&self) -> Result<(), RenderError> {
        if lock(&self.page)?.generation != self.generation {
            return Err(RenderError::Detached);
        }
        Ok(())
    }

    fn with_element<T>(&self, f: impl FnOnce(ElementRef<'_>) -> T) -> Result<T, RenderError> {
        self.ensure_attached()?;
        let doc = Html::parse_document(&self.html);
        let element = doc
            .select(&ANY_ELEMENT)
            .nth(self.ordinal)
            .ok_or(RenderError::Detached)?;
        Ok(f(element))
    }

    fn click_action(&self) -> Result<ClickAction, RenderError> {
        self.with_element(|el| {
            let attr = |name: &str| el.value().attr(name).map(str::to_string);
            if let Some(reason) = attr("data-click-error") {
                ClickAction::Fail(reason)
            } else if let Some(target) = attr("data-goto") {
                ClickAction::Goto(target)
            } else if let Some(key) = attr("data-swap") {
                ClickAction::Swap(key)
            } else if el.value().name() == "a" {
                attr("href").map_or(ClickAction::Nothing, ClickAction::Follow)
            } else {
                ClickAction::Nothing
            }
        })
    }

    fn navigate(&self, target: &str, keep_url: bool) -> Result<bool, RenderError> {
        let Some(html) = self.site.document(target)? else {
            return Ok(false);
        };
        let url = (!keep_url).then(|| target.to_string());
        lock(&self.page)?.load(url, html);
        Ok(true)
    }
}

#[async_trait]
impl Element for SnapshotElement {
    async fn click(&self) -> Result<(), RenderError> {
        match self.click_action()? {
            ClickAction::Fail(reason) => Err(RenderError::Backend(reason)),
            ClickAction::Goto(target) => {
                if !self.navigate(&target, false)? {
                    return Err(RenderError::Navigation {
                        url: target,
                        reason: "no snapshot recorded for url".to_string(),
                    });
                }
                Ok(())
            }
            ClickAction::Swap(key) => {
                self.navigate(&key, true)?;
                Ok(())
            }
            ClickAction::Follow(href) => {
                let base = lock(&self.page)?.url.clone();
                let resolved = base
                    .as_deref()
                    .and_then(|b| Url::parse(b).ok())
                    .and_then(|b| b.join(&href).ok())
                    .map(String::from)
                    .unwrap_or(href);
                self.navigate(&resolved, false)?;
                Ok(())
            }
            ClickAction::Nothing => {
                self.ensure_attached()?;
                Ok(())
            }
        }
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, RenderError> {
        self.with_element(|el| el.value().attr(name).map(str::to_string))
    }

    async fn text(&self) -> Result<String, RenderError> {
        self.with_element(|el| normalize_whitespace(&el.text().collect::<String>()))
    }

    async fn tag_name(&self) -> Result<String, RenderError> {
        self.with_element(|el| el.value().name().to_ascii_lowercase())
    }

    async fn query(&self, selector: &str) -> Result<Vec<ElementHandle>, RenderError> {
        self.ensure_attached()?;
        let page = SnapshotPage {
            site: self.site.clone(),
            state: Arc::clone(&self.page),
        };
        page.elements(Some(self.ordinal), selector)
    }
}
