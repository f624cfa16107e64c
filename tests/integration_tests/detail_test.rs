//! Detail crawl and catalog-service integration tests

use std::sync::Arc;

use offerhound::crawler::CatalogService;
use offerhound::models::{Price, ProductSummary};
use offerhound::parser::{DetailSection, SectionStatus};
use offerhound::render::SnapshotSite;
use offerhound::storage::catalog::ProductCatalog;
use offerhound::storage::images::ImageKind;

use super::fixtures::*;
use crate::common::Harness;

fn summary(offer_id: &str, url: Option<&str>) -> ProductSummary {
    ProductSummary {
        offer_id: Some(offer_id.to_string()),
        title: Some("Laptop X 16G".to_string()),
        url: url.map(str::to_string),
        price: Price {
            currency: Some("¥".to_string()),
            amount: Some("2310".to_string()),
            ..Default::default()
        },
        search_term: "laptop".to_string(),
        ..Default::default()
    }
}

fn detail_site() -> SnapshotSite {
    let site = SnapshotSite::new();
    site.insert(DETAIL_URL, detail_html());
    site
}

// ============================================================================
// Detail crawl
// ============================================================================

#[tokio::test]
async fn test_detail_attaches_to_existing_summary() {
    let h = Harness::new(detail_site());
    let catalog = ProductCatalog::new(h.store.clone());
    catalog
        .insert_summary(&summary("847461182224", Some(DETAIL_URL)))
        .await
        .unwrap();

    let report = h
        .orchestrator
        .run_detail_crawl(DETAIL_URL, "847461182224")
        .await
        .unwrap();

    assert_eq!(report.detail.url, DETAIL_URL);
    assert_eq!(report.detail.categories.category, "数码电脑");
    assert_eq!(report.detail.categories.sub_category, "笔记本电脑");
    assert_eq!(report.detail.categories.item_name, "Laptop X");
    assert_eq!(report.detail.attributes.get("品牌").map(String::as_str), Some("联想"));
    assert_eq!(report.status(DetailSection::Reviews), Some(&SectionStatus::Empty));
    assert_eq!(report.status(DetailSection::Categories), Some(&SectionStatus::Ok));
    assert_eq!(report.failed_sections(), 0);

    let stored = catalog.find_by_offer_id("847461182224").await.unwrap().unwrap();
    assert!(stored.has_details());
    assert_eq!(stored.summary.title.as_deref(), Some("Laptop X 16G"));
    assert_eq!(stored.summary.price.amount.as_deref(), Some("2310"));
    assert_eq!(stored.summary.search_term, "laptop");
    assert_eq!(stored.summary.url.as_deref(), Some(DETAIL_URL));
    assert_eq!(h.store.len(), 1);

    assert_eq!(
        *h.images.saved.lock().unwrap(),
        vec![(
            "https://img.alicdn.com/d/one.jpg".to_string(),
            ImageKind::Description
        )]
    );
    let details = stored.details.unwrap();
    assert_eq!(
        details.description.images,
        vec!["assets/images/description_images/one.jpg".to_string()]
    );
}

#[tokio::test]
async fn test_detail_for_unknown_offer_creates_entry() {
    let h = Harness::new(detail_site());

    h.orchestrator
        .run_detail_crawl(DETAIL_URL, "999")
        .await
        .unwrap();

    let catalog = ProductCatalog::new(h.store.clone());
    let stored = catalog.find_by_offer_id("999").await.unwrap().unwrap();
    assert!(stored.has_details());
    assert!(stored.summary.title.is_none());
}

#[tokio::test]
async fn test_detail_recrawl_replaces_details_only() {
    let h = Harness::new(detail_site());
    let catalog = ProductCatalog::new(h.store.clone());
    catalog
        .insert_summary(&summary("847461182224", Some(DETAIL_URL)))
        .await
        .unwrap();

    h.orchestrator
        .run_detail_crawl(DETAIL_URL, "847461182224")
        .await
        .unwrap();
    h.orchestrator
        .run_detail_crawl(DETAIL_URL, "847461182224")
        .await
        .unwrap();

    assert_eq!(h.store.len(), 1);
    assert_eq!(h.site.sessions_opened(), 2);
    assert_eq!(h.site.sessions_closed(), 2);
}

// ============================================================================
// Catalog service
// ============================================================================

#[tokio::test]
async fn test_product_lookup_crawls_missing_details() {
    let h = Harness::new(detail_site());
    let catalog = ProductCatalog::new(h.store.clone());
    catalog
        .insert_summary(&summary("847461182224", Some(DETAIL_URL)))
        .await
        .unwrap();
    let service = CatalogService::new(Arc::clone(&h.orchestrator));

    let product = service.product("847461182224").await.unwrap().unwrap();
    assert!(product.has_details());
    assert_eq!(h.site.sessions_opened(), 1);

    // Second lookup is served from the catalog
    let again = service.product("847461182224").await.unwrap().unwrap();
    assert!(again.has_details());
    assert_eq!(h.site.sessions_opened(), 1);
}

#[tokio::test]
async fn test_product_without_url_is_returned_as_is() {
    let h = Harness::new(detail_site());
    let catalog = ProductCatalog::new(h.store.clone());
    catalog.insert_summary(&summary("42", None)).await.unwrap();
    let service = CatalogService::new(Arc::clone(&h.orchestrator));

    let product = service.product("42").await.unwrap().unwrap();
    assert!(!product.has_details());
    assert_eq!(h.site.sessions_opened(), 0);
}

#[tokio::test]
async fn test_unknown_product_is_none() {
    let h = Harness::new(detail_site());
    let service = CatalogService::new(Arc::clone(&h.orchestrator));

    assert!(service.product("404").await.unwrap().is_none());
    assert_eq!(h.site.sessions_opened(), 0);
}

#[tokio::test]
async fn test_search_crawls_when_catalog_is_empty() {
    let h = Harness::new(three_page_site(10));
    let service = CatalogService::new(Arc::clone(&h.orchestrator));

    let page = service.search("laptop", 1, 4).await.unwrap();

    assert_eq!(page.total, 6);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.results.len(), 4);
    assert_eq!(h.site.sessions_opened(), 1);

    let second = service.search("LAPTOP", 2, 4).await.unwrap();
    assert_eq!(second.results.len(), 2);
    assert_eq!(h.site.sessions_opened(), 1);
}

#[tokio::test]
async fn test_blank_search_lists_everything_without_crawling() {
    let h = Harness::new(three_page_site(10));
    let service = CatalogService::new(Arc::clone(&h.orchestrator));

    let page = service.search("  ", 1, 20).await.unwrap();

    assert_eq!(page.total, 0);
    assert!(page.results.is_empty());
    assert_eq!(h.site.sessions_opened(), 0);
}
