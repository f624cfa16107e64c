//! Headless Chromium backend built on `chromiumoxide`
//!
//! Enabled with the `chromium` cargo feature. Each session launches its own
//! browser process; the CDP event handler runs on a spawned tokio task for the
//! lifetime of the session.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    Cookie as CdpCookie, CookieParam, CookieSameSite, TimeSinceEpoch,
};
use chromiumoxide::element::Element as CdpElement;
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{
    Cookie, Element, ElementHandle, Page, PageHandle, Renderer, SameSite, Session, SessionHandle,
    SessionOptions,
};
use crate::utils::error::RenderError;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn backend(err: impl std::fmt::Display) -> RenderError {
    RenderError::Backend(err.to_string())
}

/// Launches a local Chromium per session
#[derive(Debug, Default, Clone)]
pub struct ChromiumRenderer;

impl ChromiumRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn open_session(&self, options: &SessionOptions) -> Result<SessionHandle, RenderError> {
        let mut builder = BrowserConfig::builder().arg(format!("--user-agent={}", options.user_agent));
        if !options.headless {
            builder = builder.with_head();
        }
        if options.ignore_tls_errors {
            builder = builder.arg("--ignore-certificate-errors");
        }
        let config = builder.build().map_err(RenderError::Session)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Session(e.to_string()))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler stopped");
                    break;
                }
            }
        });

        Ok(Box::new(ChromiumSession {
            browser: Mutex::new(browser),
            events,
        }))
    }
}

struct ChromiumSession {
    browser: Mutex<Browser>,
    events: JoinHandle<()>,
}

fn to_param(cookie: &Cookie) -> Result<CookieParam, RenderError> {
    let mut builder = CookieParam::builder()
        .name(cookie.name.clone())
        .value(cookie.value.clone())
        .path(cookie.path.clone())
        .secure(cookie.secure)
        .http_only(cookie.http_only);
    if let Some(domain) = &cookie.domain {
        builder = builder.domain(domain.clone());
    }
    if let Some(expires) = cookie.expires {
        builder = builder.expires(TimeSinceEpoch::new(expires));
    }
    if let Some(same_site) = cookie.same_site {
        builder = builder.same_site(match same_site {
            SameSite::Strict => CookieSameSite::Strict,
            SameSite::Lax => CookieSameSite::Lax,
            SameSite::None => CookieSameSite::None,
        });
    }
    builder.build().map_err(|reason| RenderError::CookieRejected {
        name: cookie.name.clone(),
        reason,
    })
}

fn from_cdp(cookie: CdpCookie) -> Cookie {
    Cookie {
        name: cookie.name,
        value: cookie.value,
        domain: Some(cookie.domain),
        path: cookie.path,
        secure: cookie.secure,
        http_only: cookie.http_only,
        expires: (!cookie.session && cookie.expires > 0.0).then_some(cookie.expires),
        same_site: cookie.same_site.map(|s| match s {
            CookieSameSite::Strict => SameSite::Strict,
            CookieSameSite::Lax => SameSite::Lax,
            CookieSameSite::None => SameSite::None,
        }),
    }
}

#[async_trait]
impl Session for ChromiumSession {
    async fn add_cookies(&self, cookies: &[Cookie]) -> Result<(), RenderError> {
        let params = cookies.iter().map(to_param).collect::<Result<Vec<_>, _>>()?;
        self.browser
            .lock()
            .await
            .set_cookies(params)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, RenderError> {
        let cookies = self
            .browser
            .lock()
            .await
            .get_cookies()
            .await
            .map_err(backend)?;
        Ok(cookies.into_iter().map(from_cdp).collect())
    }

    async fn new_page(&self) -> Result<PageHandle, RenderError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(backend)?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(&self) -> Result<(), RenderError> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!(error = %e, "Browser did not close cleanly");
        }
        if let Err(e) = browser.wait().await {
            warn!(error = %e, "Browser process did not exit cleanly");
        }
        self.events.abort();
        Ok(())
    }
}

struct ChromiumPage {
    page: CdpPage,
}

#[async_trait]
impl Page for ChromiumPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(RenderError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(RenderError::Timeout {
                target: url.to_string(),
                timeout,
            }),
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), RenderError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(RenderError::Timeout {
                    target: selector.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn query(&self, selector: &str) -> Result<Vec<ElementHandle>, RenderError> {
        let elements = self.page.find_elements(selector).await.map_err(backend)?;
        Ok(elements
            .into_iter()
            .map(|element| Box::new(ChromiumElement { element }) as ElementHandle)
            .collect())
    }

    async fn url(&self) -> Result<String, RenderError> {
        self.page
            .url()
            .await
            .map_err(backend)?
            .ok_or(RenderError::NoDocument)
    }

    async fn wait_for_idle(&self, timeout: Duration) -> Result<(), RenderError> {
        match tokio::time::timeout(timeout, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(backend(e)),
            Err(_) => Err(RenderError::Timeout {
                target: "network idle".to_string(),
                timeout,
            }),
        }
    }
}

struct ChromiumElement {
    element: CdpElement,
}

#[async_trait]
impl Element for ChromiumElement {
    async fn click(&self) -> Result<(), RenderError> {
        self.element.scroll_into_view().await.map_err(backend)?;
        self.element.click().await.map_err(backend)?;
        Ok(())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, RenderError> {
        self.element.attribute(name).await.map_err(backend)
    }

    async fn text(&self) -> Result<String, RenderError> {
        let text = self.element.inner_text().await.map_err(backend)?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn tag_name(&self) -> Result<String, RenderError> {
        let returns = self
            .element
            .call_js_fn("function() { return this.tagName.toLowerCase(); }", false)
            .await
            .map_err(backend)?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default())
    }

    async fn query(&self, selector: &str) -> Result<Vec<ElementHandle>, RenderError> {
        let elements = self.element.find_elements(selector).await.map_err(backend)?;
        Ok(elements
            .into_iter()
            .map(|element| Box::new(ChromiumElement { element }) as ElementHandle)
            .collect())
    }
}
