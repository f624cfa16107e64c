//! Listing crawl integration tests
//!
//! Full runs through the orchestrator: pagination, resume, termination and
//! catalog deduplication.

use offerhound::models::{CrawlState, TerminationReason};
use offerhound::render::SnapshotSite;
use offerhound::storage::catalog::ProductCatalog;
use offerhound::storage::checkpoint::MemoryStateStore;

use super::fixtures::*;
use crate::common::{page_url, Harness, SEARCH_URL};

// ============================================================================
// Full walks
// ============================================================================

#[tokio::test]
async fn test_listing_crawl_walks_every_page() {
    let h = Harness::new(three_page_site(10));

    let report = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert_eq!(report.search_term, "laptop");
    assert_eq!(report.pages_visited, 3);
    assert_eq!(report.cards_seen, 6);
    assert_eq!(report.inserted, 6);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.termination, Some(TerminationReason::NextDisabled));
    assert_eq!(h.store.len(), 6);
    assert_eq!(h.site.sessions_opened(), 1);
    assert_eq!(h.site.sessions_closed(), 1);
}

#[tokio::test]
async fn test_cards_are_normalized_into_summaries() {
    let h = Harness::new(three_page_site(10));
    h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    let catalog = ProductCatalog::new(h.store.clone());
    let product = catalog.find_by_offer_id("1").await.unwrap().unwrap();
    let summary = &product.summary;
    assert_eq!(summary.title.as_deref(), Some("Laptop 1"));
    assert_eq!(
        summary.url.as_deref(),
        Some("https://detail.1688.com/offer/1.html")
    );
    assert_eq!(
        summary.image.as_deref(),
        Some("https://cbu01.alicdn.com/img/1.jpg")
    );
    assert_eq!(summary.price.currency.as_deref(), Some("¥"));
    assert_eq!(summary.price.amount.as_deref(), Some("2310"));
    assert_eq!(summary.price.overseas.as_deref(), Some("$320"));
    assert_eq!(summary.moq.as_deref(), Some("2台起批"));
    assert_eq!(summary.search_term, "laptop");
    assert!(!summary.is_ad);
    assert!(!product.has_details());

    let ad = catalog.find_by_offer_id("6").await.unwrap().unwrap();
    assert!(ad.summary.is_ad);
}

#[tokio::test]
async fn test_completed_crawl_resets_state() {
    let h = Harness::new(three_page_site(10));
    h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    let state = h.states.current().unwrap();
    assert_eq!(state.current_page, 1);
    assert!(state.current_url.is_empty());
    assert_eq!(state.last_url, page_url(3));
    assert_eq!(state.search_term.as_deref(), Some("laptop"));
}

#[tokio::test]
async fn test_reported_page_count_bounds_the_walk() {
    let h = Harness::new(three_page_site(2));

    let report = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.inserted, 4);
    assert_eq!(report.termination, Some(TerminationReason::PageBoundReached));
}

// ============================================================================
// Resume
// ============================================================================

#[tokio::test]
async fn test_resumes_from_stored_page() {
    let seeded = CrawlState {
        max_pages: 10,
        current_page: 2,
        current_url: page_url(2),
        last_url: page_url(1),
        search_term: Some("laptop".to_string()),
        updated_at: None,
    };
    let h = Harness::with_states(three_page_site(10), MemoryStateStore::with_state(seeded));

    let report = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.inserted, 4);
    let catalog = ProductCatalog::new(h.store.clone());
    assert!(!catalog.exists("1").await.unwrap());
    assert!(catalog.exists("3").await.unwrap());

    // First save happens on page 2, never on page 1
    let first = h.states.history().first().cloned().unwrap();
    assert_eq!(first.current_page, 2);
}

#[tokio::test]
async fn test_resumes_at_page_three_of_five() {
    let seeded = CrawlState {
        max_pages: 5,
        current_page: 3,
        current_url: page_url(3),
        last_url: page_url(2),
        search_term: Some("laptop".to_string()),
        updated_at: None,
    };
    let h = Harness::with_states(three_page_site(5), MemoryStateStore::with_state(seeded));

    let report = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert_eq!(report.pages_visited, 1);
    assert_eq!(report.cards_seen, 2);
    let catalog = ProductCatalog::new(h.store.clone());
    assert!(catalog.exists("5").await.unwrap());
    assert!(!catalog.exists("1").await.unwrap());
    assert!(!catalog.exists("3").await.unwrap());
}

#[tokio::test]
async fn test_state_of_another_term_is_discarded() {
    let seeded = CrawlState {
        max_pages: 10,
        current_page: 3,
        current_url: page_url(3),
        last_url: page_url(2),
        search_term: Some("phone".to_string()),
        updated_at: None,
    };
    let h = Harness::with_states(three_page_site(10), MemoryStateStore::with_state(seeded));

    let report = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert_eq!(report.pages_visited, 3);
    assert_eq!(report.inserted, 6);
    let first = h.states.history().first().cloned().unwrap();
    assert_eq!(first.current_page, 1);
    assert_eq!(first.current_url, SEARCH_URL);
    assert_eq!(first.search_term.as_deref(), Some("laptop"));
}

#[tokio::test]
async fn test_state_without_term_is_adopted() {
    let seeded = CrawlState {
        max_pages: 10,
        current_page: 3,
        current_url: page_url(3),
        last_url: page_url(2),
        search_term: None,
        updated_at: None,
    };
    let h = Harness::with_states(three_page_site(10), MemoryStateStore::with_state(seeded));

    let report = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert_eq!(report.pages_visited, 1);
    assert_eq!(report.inserted, 2);
    let first = h.states.history().first().cloned().unwrap();
    assert_eq!(first.search_term.as_deref(), Some("laptop"));
}

// ============================================================================
// Termination
// ============================================================================

#[tokio::test]
async fn test_indicator_mismatch_stops_the_walk() {
    let site = three_page_site(10);
    let stale = "https://s.1688.com/stale";
    site.insert(
        page_url(1),
        listing(1, 10, &next_to(stale), &[card("1")]),
    );
    site.insert(stale, listing(1, 10, &next_disabled(), &[card("1")]));
    let h = Harness::new(site);

    let report = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert_eq!(report.pages_visited, 1);
    assert_eq!(
        report.termination,
        Some(TerminationReason::IndicatorMismatch {
            expected: 2,
            observed: Some(1)
        })
    );
    assert!(h
        .states
        .history()
        .iter()
        .all(|state| state.current_page == 1));
}

#[tokio::test]
async fn test_unreadable_indicator_keeps_progress() {
    let site = three_page_site(10);
    let blank = "https://s.1688.com/unrendered";
    site.insert(
        page_url(2),
        listing(2, 10, &next_to(blank), &[card("3"), card("4")]),
    );
    site.insert(blank, "<html><body><div class=\"fui-paging\"></div></body></html>");
    let h = Harness::new(site);

    let report = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert_eq!(
        report.termination,
        Some(TerminationReason::IndicatorMismatch {
            expected: 3,
            observed: None
        })
    );
    let state = h.states.current().unwrap();
    assert_eq!(state.current_page, 2);
    assert_eq!(state.current_url, page_url(2));
    assert_eq!(state.last_url, page_url(1));

    // The next run picks up on page 2
    let resumed = Harness::with_states(three_page_site(10), MemoryStateStore::with_state(state));
    let report = resumed.orchestrator.run_listing_crawl("laptop").await.unwrap();
    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.termination, Some(TerminationReason::NextDisabled));
}

#[tokio::test]
async fn test_failed_click_keeps_progress() {
    let site = three_page_site(10);
    site.insert(
        page_url(2),
        listing(
            2,
            10,
            r#"<a class="fui-arrow fui-next" data-click-error="overlay intercepted click">下一页</a>"#,
            &[card("3")],
        ),
    );
    let h = Harness::new(site);

    let report = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert!(matches!(
        report.termination,
        Some(TerminationReason::ClickFailed(_))
    ));
    let state = h.states.current().unwrap();
    assert_eq!(state.current_page, 2);
    assert_eq!(state.current_url, page_url(2));
    assert_eq!(state.last_url, page_url(1));
}

#[tokio::test]
async fn test_missing_next_control_ends_listing() {
    let site = SnapshotSite::new();
    site.insert(page_url(1), listing(1, 10, "", &[card("1"), card("2")]));
    let h = Harness::new(site);

    let report = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert_eq!(report.termination, Some(TerminationReason::NoNextControl));
    assert_eq!(report.inserted, 2);
}

// ============================================================================
// Card admission
// ============================================================================

#[tokio::test]
async fn test_partial_and_anonymous_cards() {
    let site = SnapshotSite::new();
    site.insert(
        page_url(1),
        listing(
            1,
            1,
            &next_disabled(),
            &[bare_card("77"), anonymous_card(), card("78")],
        ),
    );
    let h = Harness::new(site);

    let report = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert_eq!(report.cards_seen, 3);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.rejected, 1);

    let catalog = ProductCatalog::new(h.store.clone());
    let bare = catalog.find_by_offer_id("77").await.unwrap().unwrap();
    assert!(bare.summary.title.is_none());
    assert!(bare.summary.price.is_empty());
    assert_eq!(bare.summary.search_term, "laptop");
}

#[tokio::test]
async fn test_repeated_crawl_inserts_nothing_new() {
    let h = Harness::new(three_page_site(10));

    let first = h.orchestrator.run_listing_crawl("laptop").await.unwrap();
    let second = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert_eq!(first.inserted, 6);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 6);
    assert_eq!(h.store.len(), 6);
    assert_eq!(h.store.insert_count(), 6);
    assert_eq!(h.site.sessions_closed(), 2);
}

#[tokio::test]
async fn test_duplicates_within_one_run() {
    let site = SnapshotSite::new();
    site.insert(
        page_url(1),
        listing(1, 2, &next_to(&page_url(2)), &[card("1"), card("2")]),
    );
    site.insert(
        page_url(2),
        listing(2, 2, &next_disabled(), &[card("2"), card("3")]),
    );
    let h = Harness::new(site);

    let report = h.orchestrator.run_listing_crawl("laptop").await.unwrap();

    assert_eq!(report.inserted, 3);
    assert_eq!(report.duplicates, 1);
    assert_eq!(h.store.len(), 3);
}
