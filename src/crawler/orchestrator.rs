//! Crawl orchestration
//!
//! One [`Orchestrator`] call is one crawl run: open a rendering session,
//! restore cookies, run either the pagination controller or the detail
//! extractor, then persist the session's cookies and release it. Cookies are
//! flushed and the session is closed whether or not the run succeeded.
//!
//! [`CatalogService`] answers catalog lookups and falls back to a synchronous
//! crawl on a cache miss.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};

use super::pacing;
use super::pagination::{PaginationController, PaginationSettings};
use super::{navigate, search_url};
use crate::config::Config;
use crate::models::{CatalogProduct, CrawlReport, CrawlState};
use crate::parser::detail::{DetailExtractor, DetailReport};
use crate::render::{Renderer, Session};
use crate::storage::catalog::{ProductCatalog, SearchPage};
use crate::storage::checkpoint::{CrawlStateStore, JsonStateFile};
use crate::storage::cookies::CookieJar;
use crate::storage::dedup::DedupGate;
use crate::storage::images::{HttpImageStore, ImageSaver};
use crate::storage::sqlite::SqliteCatalog;
use crate::utils::error::CrawlerError;

/// Runs listing and detail crawls against a rendering backend
pub struct Orchestrator {
    config: Config,
    renderer: Arc<dyn Renderer>,
    catalog: ProductCatalog,
    states: Arc<dyn CrawlStateStore>,
    cookies: CookieJar,
    images: Arc<dyn ImageSaver>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        renderer: Arc<dyn Renderer>,
        catalog: ProductCatalog,
        states: Arc<dyn CrawlStateStore>,
        cookies: CookieJar,
        images: Arc<dyn ImageSaver>,
    ) -> Self {
        Self {
            config,
            renderer,
            catalog,
            states,
            cookies,
            images,
        }
    }

    /// Wire the durable stores named in `config` around `renderer`
    pub fn from_config(config: Config, renderer: Arc<dyn Renderer>) -> anyhow::Result<Self> {
        config.validate().context("Invalid configuration")?;

        let storage = &config.storage;
        let store = SqliteCatalog::open(&storage.catalog_path, &storage.collection)
            .with_context(|| format!("Failed to open catalog {}", storage.catalog_path.display()))?;
        let images = HttpImageStore::new(
            &storage.image_dir,
            config.pacing.image_rate_per_sec,
            Duration::from_secs(config.pacing.image_timeout_secs),
            &config.crawler.user_agent,
        )
        .context("Failed to create image client")?;

        let states = Arc::new(JsonStateFile::new(&storage.state_file));
        let cookies = CookieJar::new(&storage.cookie_file);

        Ok(Self::new(
            config,
            renderer,
            ProductCatalog::new(Arc::new(store)),
            states,
            cookies,
            Arc::new(images),
        ))
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Crawl the search listing for `search_term`, resuming stored progress
    /// when it belongs to the same term.
    ///
    /// # Errors
    ///
    /// Fatal crawl failures: session creation, navigation or page-load
    /// exhaustion, dedup check failure, state persistence failure.
    pub async fn run_listing_crawl(&self, search_term: &str) -> Result<CrawlReport, CrawlerError> {
        info!(search_term, "Starting listing crawl");
        let session = self
            .renderer
            .open_session(&self.config.session_options())
            .await
            .map_err(CrawlerError::SessionCreation)?;

        let outcome = self.listing_in_session(session.as_ref(), search_term).await;
        self.finish_session(session.as_ref()).await;

        match &outcome {
            Ok(report) => info!(
                search_term,
                pages = report.pages_visited,
                inserted = report.inserted,
                duplicates = report.duplicates,
                rejected = report.rejected,
                failed = report.failed,
                "Listing crawl finished"
            ),
            Err(e) => error!(search_term, error = %e, "Listing crawl failed"),
        }

        pacing::pause(self.config.pacing.post_run_delay, "post-run delay").await;
        outcome
    }

    /// Scrape one detail page and attach it to the catalog entry `offer_id`.
    ///
    /// # Errors
    ///
    /// Session creation, navigation exhaustion, or a failed catalog upsert.
    pub async fn run_detail_crawl(
        &self,
        url: &str,
        offer_id: &str,
    ) -> Result<DetailReport, CrawlerError> {
        info!(url, offer_id, "Starting detail crawl");
        let session = self
            .renderer
            .open_session(&self.config.session_options())
            .await
            .map_err(CrawlerError::SessionCreation)?;

        let outcome = self.detail_in_session(session.as_ref(), url, offer_id).await;
        self.finish_session(session.as_ref()).await;

        match &outcome {
            Ok(report) => info!(
                offer_id,
                failed_sections = report.failed_sections(),
                "Detail crawl finished"
            ),
            Err(e) => error!(offer_id, error = %e, "Detail crawl failed"),
        }

        pacing::pause(self.config.pacing.post_run_delay, "post-run delay").await;
        outcome
    }

    async fn listing_in_session(
        &self,
        session: &dyn Session,
        search_term: &str,
    ) -> Result<CrawlReport, CrawlerError> {
        self.restore_cookies(session).await;
        let page = session.new_page().await?;

        let mut state = self.states.load().await.map_err(CrawlerError::State)?;
        if state.is_resumable_for(search_term) {
            info!(
                search_term,
                page = state.current_page,
                max_pages = state.max_pages,
                url = %state.current_url,
                "Resuming listing crawl"
            );
            state.search_term = Some(search_term.to_string());
        } else {
            state = CrawlState::for_term(search_term);
            state.max_pages = self.config.crawler.default_max_pages;
            state.current_url = search_url(&self.config.crawler.search_url_template, search_term);
        }

        navigate(
            page.as_ref(),
            &state.current_url,
            self.config.navigation_timeout(),
            &self.config.navigation_retry(),
        )
        .await?;

        let gate = DedupGate::new(self.catalog.clone());
        let controller = PaginationController::new(
            page.as_ref(),
            &gate,
            self.states.as_ref(),
            PaginationSettings::from_config(&self.config),
        );
        let report = controller.run(&mut state, search_term).await?;

        if report
            .termination
            .as_ref()
            .is_some_and(|reason| reason.completes_listing())
        {
            state.reset_after_completion();
            self.states.save(&state).await.map_err(CrawlerError::State)?;
        }

        Ok(report)
    }

    async fn detail_in_session(
        &self,
        session: &dyn Session,
        url: &str,
        offer_id: &str,
    ) -> Result<DetailReport, CrawlerError> {
        self.restore_cookies(session).await;
        let page = session.new_page().await?;

        navigate(
            page.as_ref(),
            url,
            self.config.navigation_timeout(),
            &self.config.navigation_retry(),
        )
        .await?;

        let extractor = DetailExtractor::new(
            Arc::clone(&self.images),
            self.config.selector_timeout(),
            Duration::from_millis(self.config.pacing.variant_settle_ms),
        );
        let report = extractor.extract(page.as_ref(), url).await;

        self.catalog
            .attach_details(offer_id, &report.detail)
            .await
            .map_err(|source| CrawlerError::DetailUpsertFailed {
                offer_id: offer_id.to_string(),
                source,
            })?;

        Ok(report)
    }

    /// Add stored cookies in bulk, falling back to one at a time
    async fn restore_cookies(&self, session: &dyn Session) {
        let cookies = match self.cookies.load() {
            Ok(cookies) => cookies,
            Err(e) => {
                warn!(path = %self.cookies.path().display(), error = %e, "Could not read cookie file");
                return;
            }
        };
        if cookies.is_empty() {
            return;
        }

        match session.add_cookies(&cookies).await {
            Ok(()) => info!(count = cookies.len(), "Cookies restored"),
            Err(e) => {
                warn!(error = %e, "Bulk cookie restore failed, adding one by one");
                let mut restored = 0;
                for cookie in &cookies {
                    match session.add_cookies(std::slice::from_ref(cookie)).await {
                        Ok(()) => restored += 1,
                        Err(e) => warn!(name = %cookie.name, error = %e, "Cookie skipped"),
                    }
                }
                info!(restored, total = cookies.len(), "Cookies restored individually");
            }
        }
    }

    /// Persist the session's cookie jar wholesale, then release the session
    async fn finish_session(&self, session: &dyn Session) {
        match session.cookies().await {
            Ok(cookies) => {
                if let Err(e) = self.cookies.save(&cookies) {
                    warn!(path = %self.cookies.path().display(), error = %e, "Could not save cookies");
                }
            }
            Err(e) => warn!(error = %e, "Could not read session cookies"),
        }

        if let Err(e) = session.close().await {
            warn!(error = %e, "Could not close rendering session");
        }
    }
}

/// Catalog lookups that crawl on a cache miss
pub struct CatalogService {
    orchestrator: Arc<Orchestrator>,
}

impl CatalogService {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Search the catalog; an empty result triggers a listing crawl for
    /// `term` and the query is re-run.
    pub async fn search(&self, term: &str, page: u32, limit: u32) -> Result<SearchPage, CrawlerError> {
        let catalog = self.orchestrator.catalog();
        let result = catalog.search(term, page, limit).await?;
        if result.total > 0 || term.trim().is_empty() {
            return Ok(result);
        }

        info!(term, "No local results, crawling listing");
        self.orchestrator.run_listing_crawl(term.trim()).await?;
        Ok(catalog.search(term, page, limit).await?)
    }

    /// Look up one product; a product without details triggers a detail
    /// crawl of its stored URL before answering.
    pub async fn product(&self, offer_id: &str) -> Result<Option<CatalogProduct>, CrawlerError> {
        let catalog = self.orchestrator.catalog();
        let Some(product) = catalog.find_by_offer_id(offer_id).await? else {
            return Ok(None);
        };
        if product.has_details() {
            return Ok(Some(product));
        }

        let Some(url) = product.summary.url.clone() else {
            warn!(offer_id, "Product has no detail URL, returning summary only");
            return Ok(Some(product));
        };

        info!(offer_id, "Details missing, crawling detail page");
        self.orchestrator.run_detail_crawl(&url, offer_id).await?;
        Ok(catalog.find_by_offer_id(offer_id).await?)
    }
}
