//! Durable storage integration tests
//!
//! SQLite catalog, state and cookie files on disk, and the HTTP image store
//! against a mock server.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use offerhound::models::{CrawlState, ProductDetail, ProductSummary};
use offerhound::render::Cookie;
use offerhound::storage::catalog::{ProductCatalog, UpdateOutcome};
use offerhound::storage::checkpoint::{CrawlStateStore, JsonStateFile};
use offerhound::storage::cookies::CookieJar;
use offerhound::storage::images::{HttpImageStore, ImageKind, ImageSaver};
use offerhound::storage::memory::MemoryCatalog;
use offerhound::storage::sqlite::SqliteCatalog;
use offerhound::utils::error::AssetError;

fn summary(offer_id: &str, title: &str) -> ProductSummary {
    ProductSummary {
        offer_id: Some(offer_id.to_string()),
        title: Some(title.to_string()),
        url: Some(format!("https://detail.1688.com/offer/{offer_id}.html")),
        search_term: "laptop".to_string(),
        ..Default::default()
    }
}

fn sqlite_catalog(dir: &TempDir) -> ProductCatalog {
    let store = SqliteCatalog::open(dir.path().join("db").join("catalog.db"), "products").unwrap();
    ProductCatalog::new(Arc::new(store))
}

// ============================================================================
// SQLite catalog
// ============================================================================

#[tokio::test]
async fn test_sqlite_search_pages_newest_first() {
    let dir = TempDir::new().unwrap();
    let catalog = sqlite_catalog(&dir);
    for i in 1..=25 {
        catalog
            .insert_summary(&summary(&i.to_string(), &format!("Gaming Laptop {i}")))
            .await
            .unwrap();
    }

    let first = catalog.search("gaming", 1, 10).await.unwrap();
    assert_eq!(first.total, 25);
    assert_eq!(first.total_pages, 3);
    assert_eq!(first.results.len(), 10);
    assert_eq!(first.results[0].summary.offer_id.as_deref(), Some("25"));

    let last = catalog.search("gaming", 3, 10).await.unwrap();
    assert_eq!(last.results.len(), 5);
    assert_eq!(last.results[4].summary.offer_id.as_deref(), Some("1"));

    let beyond = catalog.search("gaming", 9, 10).await.unwrap();
    assert!(beyond.results.is_empty());
    assert_eq!(beyond.total, 25);
}

#[tokio::test]
async fn test_sqlite_search_clamps_limit() {
    let dir = TempDir::new().unwrap();
    let catalog = sqlite_catalog(&dir);
    catalog.insert_summary(&summary("1", "Laptop")).await.unwrap();
    catalog.insert_summary(&summary("2", "Laptop")).await.unwrap();

    let tiny = catalog.search("laptop", 0, 0).await.unwrap();
    assert_eq!(tiny.page, 1);
    assert_eq!(tiny.limit, 1);
    assert_eq!(tiny.results.len(), 1);

    let huge = catalog.search("laptop", 1, 5_000).await.unwrap();
    assert_eq!(huge.limit, 100);
    assert_eq!(huge.results.len(), 2);
}

#[tokio::test]
async fn test_search_far_beyond_last_page_is_empty() {
    let dir = TempDir::new().unwrap();
    let memory = ProductCatalog::new(Arc::new(MemoryCatalog::new()));
    for catalog in [sqlite_catalog(&dir), memory] {
        catalog.insert_summary(&summary("1", "Laptop")).await.unwrap();

        let page = catalog.search("laptop", 50_000_000, 100).await.unwrap();
        assert_eq!(page.page, 50_000_000);
        assert_eq!(page.total, 1);
        assert!(page.results.is_empty());

        let last = catalog.search("laptop", u32::MAX, 100).await.unwrap();
        assert!(last.results.is_empty());
    }
}

#[tokio::test]
async fn test_sqlite_search_matches_term_case_insensitively() {
    let dir = TempDir::new().unwrap();
    let catalog = sqlite_catalog(&dir);
    catalog.insert_summary(&summary("1", "ThinkPad X1")).await.unwrap();
    let mut other = summary("2", "Desk lamp");
    other.search_term = "lamp".to_string();
    catalog.insert_summary(&other).await.unwrap();

    assert_eq!(catalog.count_matching("THINKPAD").await.unwrap(), 1);
    assert_eq!(catalog.count_matching("Laptop").await.unwrap(), 1);
    assert_eq!(catalog.count_matching("").await.unwrap(), 2);
    assert_eq!(catalog.count_matching("tablet").await.unwrap(), 0);
}

#[tokio::test]
async fn test_sqlite_attach_details_preserves_summary() {
    let dir = TempDir::new().unwrap();
    let catalog = sqlite_catalog(&dir);
    catalog.insert_summary(&summary("7", "Laptop 7")).await.unwrap();

    let detail = ProductDetail {
        url: "https://detail.1688.com/offer/7.html".to_string(),
        ..Default::default()
    };
    let outcome = catalog.attach_details("7", &detail).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Matched);

    let stored = catalog.find_by_offer_id("7").await.unwrap().unwrap();
    assert_eq!(stored.summary.title.as_deref(), Some("Laptop 7"));
    assert_eq!(stored.details.unwrap().url, detail.url);

    let created = catalog.attach_details("8", &detail).await.unwrap();
    assert_eq!(created, UpdateOutcome::Upserted);
    assert!(catalog.exists("8").await.unwrap());
}

#[tokio::test]
async fn test_sqlite_catalog_survives_reopen() {
    let dir = TempDir::new().unwrap();
    sqlite_catalog(&dir)
        .insert_summary(&summary("1", "Laptop"))
        .await
        .unwrap();

    let reopened = sqlite_catalog(&dir);
    assert!(reopened.exists("1").await.unwrap());
    assert!(!reopened.exists("10").await.unwrap());
}

// ============================================================================
// State and cookie files
// ============================================================================

#[tokio::test]
async fn test_state_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = JsonStateFile::new(&dir.path().join("crawl_state.json"));

    assert_eq!(store.load().await.unwrap(), CrawlState::default());

    let mut state = CrawlState::for_term("laptop");
    state.max_pages = 12;
    state.record_advance(2, "https://s.1688.com/p2".to_string());
    store.save(&state).await.unwrap();

    let loaded = store.load().await.unwrap();
    assert_eq!(loaded.current_page, 2);
    assert_eq!(loaded.max_pages, 12);
    assert_eq!(loaded.current_url, "https://s.1688.com/p2");
    assert_eq!(loaded.search_term.as_deref(), Some("laptop"));

    store.reset().await.unwrap();
    let reset = store.load().await.unwrap();
    assert_eq!(reset.current_page, 1);
    assert!(reset.current_url.is_empty());
}

#[test]
fn test_cookie_jar_round_trip() {
    let dir = TempDir::new().unwrap();
    let jar = CookieJar::new(&dir.path().join("cookies.json"));
    assert!(jar.load().unwrap().is_empty());

    let mut cookie = Cookie::new("cna", "abc").with_domain(".1688.com");
    cookie.secure = true;
    cookie.expires = Some(1_900_000_000.0);
    jar.save(&[cookie.clone(), Cookie::new("_tb_token_", "x").with_domain(".1688.com")])
        .unwrap();

    let loaded = jar.load().unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0], cookie);
}

// ============================================================================
// Image store
// ============================================================================

#[tokio::test]
async fn test_image_store_writes_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/ibank/photo.jpg"))
        .and(header("user-agent", "offerhound-test"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = HttpImageStore::new(dir.path(), 10, Duration::from_secs(5), "offerhound-test").unwrap();

    let saved = store
        .save(&format!("{}/img/ibank/photo.jpg", server.uri()), ImageKind::Variant)
        .await
        .unwrap();

    let expected = dir.path().join("variant_images").join("photo.jpg");
    assert_eq!(saved, expected.to_string_lossy());
    assert_eq!(std::fs::read(expected).unwrap(), vec![0xFF, 0xD8, 0xFF]);
}

#[tokio::test]
async fn test_image_store_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = HttpImageStore::new(dir.path(), 10, Duration::from_secs(5), "offerhound-test").unwrap();

    let err = store
        .save(&format!("{}/missing.jpg", server.uri()), ImageKind::Description)
        .await
        .unwrap_err();
    assert!(matches!(err, AssetError::Status(404)));
    assert!(!dir.path().join("description_images").join("missing.jpg").exists());
}

#[tokio::test]
async fn test_image_store_rejects_bad_url() {
    let dir = TempDir::new().unwrap();
    let store = HttpImageStore::new(dir.path(), 10, Duration::from_secs(5), "offerhound-test").unwrap();

    let err = store.save("not a url", ImageKind::Description).await.unwrap_err();
    assert!(matches!(err, AssetError::InvalidUrl(_)));
}
