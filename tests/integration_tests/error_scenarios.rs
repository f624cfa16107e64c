//! Error scenario integration tests
//!
//! Tests various failure modes and error handling:
//! 1. Session creation refused
//! 2. Navigation and page-load exhaustion
//! 3. Catalog outages
//! 4. Cookie persistence across failed runs

use offerhound::models::{CrawlState, TerminationReason};
use offerhound::render::{Cookie, SnapshotSite};
use offerhound::storage::checkpoint::MemoryStateStore;
use offerhound::utils::error::{CrawlerError, RenderError};

use super::fixtures::*;
use crate::common::{page_url, Harness, SEARCH_URL};

const COOKIE_FILE: &str = r#"[
    {"name": "cna", "value": "k3x9", "domain": ".1688.com", "path": "/",
     "secure": true, "httpOnly": false, "expirationDate": 1900000000.5, "sameSite": "no_restriction"},
    {"name": "orphan", "value": "1"}
]"#;

// ============================================================================
// Session Errors
// ============================================================================

#[tokio::test]
async fn test_refused_session_fails_run() {
    let site = three_page_site(10);
    site.refuse_sessions();
    let h = Harness::new(site);

    let err = h.orchestrator.run_listing_crawl("laptop").await.unwrap_err();

    assert!(matches!(err, CrawlerError::SessionCreation(_)));
    assert_eq!(h.site.sessions_opened(), 0);
    assert!(h.states.history().is_empty());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_refused_session_fails_detail_run() {
    let site = SnapshotSite::new();
    site.refuse_sessions();
    let h = Harness::new(site);

    let err = h
        .orchestrator
        .run_detail_crawl(DETAIL_URL, "847461182224")
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlerError::SessionCreation(_)));
}

// ============================================================================
// Navigation Errors
// ============================================================================

#[tokio::test]
async fn test_navigation_retries_then_gives_up() {
    let site = three_page_site(10);
    site.fail_goto(SEARCH_URL, 10);
    let h = Harness::new(site);

    let err = h.orchestrator.run_listing_crawl("laptop").await.unwrap_err();

    match err {
        CrawlerError::NavigationExhausted { url, attempts, source } => {
            assert_eq!(url, SEARCH_URL);
            assert_eq!(attempts, 3);
            assert!(matches!(source, RenderError::Timeout { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.site.sessions_closed(), 1);
}

#[tokio::test]
async fn test_navigation_recovers_after_transient_failures() {
    let site = three_page_site(10);
    site.fail_goto(SEARCH_URL, 2);
    let h = Harness::new(site);

    let report = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert_eq!(report.pages_visited, 3);
    assert_eq!(report.inserted, 6);
}

#[tokio::test]
async fn test_detail_navigation_failure() {
    let h = Harness::new(SnapshotSite::new());

    let err = h
        .orchestrator
        .run_detail_crawl(DETAIL_URL, "847461182224")
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlerError::NavigationExhausted { .. }));
    assert!(h.store.is_empty());
    assert_eq!(h.site.sessions_closed(), 1);
}

#[tokio::test]
async fn test_listing_that_never_renders_cards() {
    let site = SnapshotSite::new();
    site.insert(SEARCH_URL, "<html><body><p>验证码</p></body></html>");
    let h = Harness::new(site);

    let err = h.orchestrator.run_listing_crawl("laptop").await.unwrap_err();

    assert!(matches!(
        err,
        CrawlerError::PageLoadExhausted {
            page: 1,
            attempts: 3,
            ..
        }
    ));
    assert!(h.states.history().is_empty());
}

#[tokio::test]
async fn test_slow_page_load_is_retried() {
    let site = three_page_site(10);
    site.fail_wait(page_url(2), 2);
    let h = Harness::new(site);

    let report = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert_eq!(report.pages_visited, 3);
    assert_eq!(report.termination, Some(TerminationReason::NextDisabled));
}

#[tokio::test]
async fn test_load_failure_mid_walk_keeps_progress() {
    let site = three_page_site(10);
    site.fail_wait(page_url(2), 10);
    let h = Harness::new(site);

    let err = h.orchestrator.run_listing_crawl("laptop").await.unwrap_err();

    assert!(matches!(err, CrawlerError::PageLoadExhausted { page: 2, .. }));
    let state = h.states.current().unwrap();
    assert_eq!(state.current_page, 2);
    assert_eq!(state.current_url, page_url(2));
    assert_eq!(h.store.len(), 2);

    // Next run resumes on page 2 once the page renders again
    let resumed = Harness::with_states(three_page_site(10), MemoryStateStore::with_state(state));
    let report = resumed.orchestrator.run_listing_crawl("laptop").await.unwrap();
    assert_eq!(report.pages_visited, 2);
}

#[tokio::test]
async fn test_pager_query_failure_keeps_progress() {
    let site = three_page_site(10);
    site.fail_query(".fui-arrow.fui-next", 1);
    let h = Harness::new(site);

    let err = h.orchestrator.run_listing_crawl("laptop").await.unwrap_err();

    assert!(matches!(err, CrawlerError::Render(RenderError::Backend(_))));
    let state = h.states.current().unwrap();
    assert_eq!(state.current_page, 1);
    assert_eq!(state.current_url, SEARCH_URL);
    assert_eq!(h.store.len(), 2);
    assert_eq!(h.site.sessions_closed(), 1);
}

// ============================================================================
// Catalog Errors
// ============================================================================

#[tokio::test]
async fn test_catalog_outage_aborts_listing() {
    let h = Harness::new(three_page_site(10));
    h.store.set_unavailable(true);

    let err = h.orchestrator.run_listing_crawl("laptop").await.unwrap_err();

    assert!(matches!(err, CrawlerError::DedupCheckFailed { .. }));
    assert!(err.is_integrity_hazard());
    assert!(h.states.history().is_empty());
    assert_eq!(h.site.sessions_closed(), 1);
}

#[tokio::test]
async fn test_insert_failures_do_not_stop_the_walk() {
    let h = Harness::new(three_page_site(10));
    h.store.set_fail_inserts(true);

    let report = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert_eq!(report.pages_visited, 3);
    assert_eq!(report.failed, 6);
    assert_eq!(report.inserted, 0);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_detail_upsert_failure() {
    let site = SnapshotSite::new();
    site.insert(DETAIL_URL, detail_html());
    let h = Harness::new(site);
    h.store.set_unavailable(true);

    let err = h
        .orchestrator
        .run_detail_crawl(DETAIL_URL, "847461182224")
        .await
        .unwrap_err();

    match err {
        CrawlerError::DetailUpsertFailed { offer_id, .. } => assert_eq!(offer_id, "847461182224"),
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Cookie Handling
// ============================================================================

#[tokio::test]
async fn test_cookies_restored_individually_and_saved() {
    let h = Harness::new(three_page_site(10));
    std::fs::write(h.dir.path().join("cookies.json"), COOKIE_FILE).unwrap();

    h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    // The domainless cookie is rejected by the session and dropped on save
    let saved = h.cookie_jar().load().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].name, "cna");
    assert_eq!(saved[0].value, "k3x9");
    assert_eq!(saved[0].expires, Some(1_900_000_000.0));
}

#[tokio::test]
async fn test_cookies_saved_after_failed_run() {
    let site = SnapshotSite::new();
    site.insert(SEARCH_URL, "<html><body></body></html>");
    let h = Harness::new(site);
    let jar = h.cookie_jar();
    jar.save(&[Cookie::new("cna", "k3x9").with_domain(".1688.com")])
        .unwrap();

    let err = h.orchestrator.run_listing_crawl("laptop").await.unwrap_err();
    assert!(matches!(err, CrawlerError::PageLoadExhausted { .. }));

    let saved = jar.load().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].domain.as_deref(), Some(".1688.com"));
    assert_eq!(h.site.sessions_closed(), 1);
}

#[tokio::test]
async fn test_malformed_cookie_file_is_ignored() {
    let h = Harness::new(three_page_site(10));
    std::fs::write(h.dir.path().join("cookies.json"), "{not json").unwrap();

    let report = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert_eq!(report.inserted, 6);
    assert!(h.cookie_jar().load().unwrap().is_empty());
}

#[tokio::test]
async fn test_stale_state_with_unknown_url_fails_navigation() {
    let seeded = CrawlState {
        max_pages: 10,
        current_page: 4,
        current_url: "https://s.1688.com/gone".to_string(),
        last_url: page_url(3),
        search_term: Some("laptop".to_string()),
        updated_at: None,
    };
    let h = Harness::with_states(three_page_site(10), MemoryStateStore::with_state(seeded));

    let err = h.orchestrator.run_listing_crawl("laptop").await.unwrap_err();

    assert!(matches!(err, CrawlerError::NavigationExhausted { .. }));
}
