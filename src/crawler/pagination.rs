//! Listing pagination state machine
//!
//! ```text
//! LoadingPage ──▶ Extracting ──▶ Advancing ──▶ LoadingPage
//!      │                             │
//!      └──────────▶ Terminated ◀─────┘
//! ```
//!
//! Progress is written through the [`CrawlStateStore`] before every advance
//! attempt and again once the advance is confirmed by the page indicator, so
//! an interrupted run resumes at the last page it actually rendered.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::pacing;
use crate::config::{Config, DelayRange};
use crate::models::{CrawlReport, CrawlState, TerminationReason};
use crate::parser::card::normalize_card;
use crate::parser::selectors::{ListingSelectors, PagerSelectors};
use crate::render::{nth_text, Page};
use crate::storage::checkpoint::CrawlStateStore;
use crate::storage::dedup::{Admission, DedupGate};
use crate::utils::error::{CrawlerError, RenderError};
use crate::utils::parse_leading_int;
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Timing knobs of the controller
#[derive(Debug, Clone)]
pub struct PaginationSettings {
    /// Per-attempt wait for the listing container
    pub selector_timeout: Duration,
    /// Wait for a click-triggered navigation to settle
    pub navigation_timeout: Duration,
    pub load_retry: RetryConfig,
    pub page_delay: DelayRange,
}

impl PaginationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            selector_timeout: config.selector_timeout(),
            navigation_timeout: config.navigation_timeout(),
            load_retry: config.load_retry(),
            page_delay: config.pacing.page_delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    LoadingPage,
    Extracting,
    Advancing,
    Terminated(TerminationReason),
}

/// Walks a rendered search listing page by page
pub struct PaginationController<'a> {
    page: &'a dyn Page,
    gate: &'a DedupGate,
    states: &'a dyn CrawlStateStore,
    settings: PaginationSettings,
    listing: ListingSelectors,
    pager: PagerSelectors,
}

impl<'a> PaginationController<'a> {
    pub fn new(
        page: &'a dyn Page,
        gate: &'a DedupGate,
        states: &'a dyn CrawlStateStore,
        settings: PaginationSettings,
    ) -> Self {
        Self {
            page,
            gate,
            states,
            settings,
            listing: ListingSelectors::new(),
            pager: PagerSelectors::new(),
        }
    }

    /// Crawl from `state.current_page` until the listing ends.
    ///
    /// The page must already show `state.current_url`.
    ///
    /// # Errors
    ///
    /// - `CrawlerError::PageLoadExhausted` when the listing never renders
    /// - `CrawlerError::DedupCheckFailed` when the catalog cannot be checked
    /// - `CrawlerError::State` when progress cannot be persisted
    pub async fn run(
        &self,
        state: &mut CrawlState,
        search_term: &str,
    ) -> Result<CrawlReport, CrawlerError> {
        let mut report = CrawlReport::new(search_term);
        let mut phase = Phase::LoadingPage;

        loop {
            phase = match phase {
                Phase::LoadingPage => {
                    if !state.within_bound() {
                        Phase::Terminated(TerminationReason::PageBoundReached)
                    } else {
                        self.load_page(state).await?;
                        report.pages_visited += 1;
                        Phase::Extracting
                    }
                }
                Phase::Extracting => {
                    self.extract_page(state.current_page, search_term, &mut report)
                        .await?;
                    pacing::pause(self.settings.page_delay, "page delay").await;
                    Phase::Advancing
                }
                Phase::Advancing => match self.advance(state).await? {
                    Some(reason) => Phase::Terminated(reason),
                    None => Phase::LoadingPage,
                },
                Phase::Terminated(reason) => {
                    info!(
                        search_term,
                        page = state.current_page,
                        pages = report.pages_visited,
                        inserted = report.inserted,
                        duplicates = report.duplicates,
                        reason = %reason,
                        "Listing crawl terminated"
                    );
                    report.termination = Some(reason);
                    return Ok(report);
                }
            };
        }
    }

    /// Wait for the listing cards, then refresh the page bound and URL
    async fn load_page(&self, state: &mut CrawlState) -> Result<(), CrawlerError> {
        let card = self.listing.card;
        let timeout = self.settings.selector_timeout;

        with_retry_if(
            &self.settings.load_retry,
            "listing page load",
            || self.page.wait_for_selector(card, timeout),
            RenderError::is_transient,
        )
        .await
        .map_err(|(source, attempts)| CrawlerError::PageLoadExhausted {
            page: state.current_page,
            attempts,
            source,
        })?;

        if let Some(reported) = nth_text(self.page, self.pager.page_count, 0)
            .await
            .as_deref()
            .and_then(parse_leading_int)
            .filter(|n| *n > 0)
        {
            if reported != state.max_pages {
                debug!(from = state.max_pages, to = reported, "Page bound refreshed");
                state.max_pages = reported;
            }
        }

        if let Ok(url) = self.page.url().await {
            state.current_url = url;
        }

        info!(
            page = state.current_page,
            max_pages = state.max_pages,
            "Listing page loaded"
        );
        Ok(())
    }

    /// Normalize and admit every card on the page; one card never aborts another
    async fn extract_page(
        &self,
        page_number: u32,
        search_term: &str,
        report: &mut CrawlReport,
    ) -> Result<(), CrawlerError> {
        let cards = self.page.query(self.listing.card).await?;
        info!(page = page_number, cards = cards.len(), "Extracting cards");

        for (index, card) in cards.iter().enumerate() {
            let summary = normalize_card(card.as_ref(), search_term).await;
            report.cards_seen += 1;

            match self.gate.admit(&summary).await {
                Ok(Admission::Inserted) => report.inserted += 1,
                Ok(Admission::Duplicate) => report.duplicates += 1,
                Ok(Admission::MissingOfferId) => {
                    report.rejected += 1;
                    warn!(page = page_number, index, href = ?summary.url, "Card without offer id rejected");
                }
                Err(e) if e.is_integrity_hazard() => return Err(e),
                Err(e) => {
                    report.failed += 1;
                    warn!(page = page_number, index, error = %e, "Card skipped");
                }
            }
        }
        Ok(())
    }

    /// Try to move to the next page; `Some` means the listing has ended
    async fn advance(
        &self,
        state: &mut CrawlState,
    ) -> Result<Option<TerminationReason>, CrawlerError> {
        state.touch();
        self.states.save(state).await.map_err(CrawlerError::State)?;

        if state.current_page >= state.max_pages {
            return Ok(Some(TerminationReason::PageBoundReached));
        }

        let Some(next) = self.page.query(self.pager.next).await?.into_iter().next() else {
            return Ok(Some(TerminationReason::NoNextControl));
        };

        let class = next.attribute("class").await.ok().flatten().unwrap_or_default();
        if class.contains(self.pager.disabled_marker) {
            return Ok(Some(TerminationReason::NextDisabled));
        }

        let expected = state.current_page + 1;
        if let Err(e) = next.click().await {
            warn!(page = state.current_page, error = %e, "Next-page click failed");
            return Ok(Some(TerminationReason::ClickFailed(e.to_string())));
        }

        if let Err(e) = self.page.wait_for_idle(self.settings.navigation_timeout).await {
            warn!(page = expected, error = %e, "Navigation did not settle");
        }

        let observed = nth_text(self.page, self.pager.current, 0)
            .await
            .as_deref()
            .and_then(parse_leading_int);
        if observed != Some(expected) {
            return Ok(Some(TerminationReason::IndicatorMismatch { expected, observed }));
        }

        let url = self.page.url().await.unwrap_or_default();
        state.record_advance(expected, url);
        self.states.save(state).await.map_err(CrawlerError::State)?;
        debug!(page = expected, url = %state.current_url, "Advance confirmed");
        Ok(None)
    }
}
