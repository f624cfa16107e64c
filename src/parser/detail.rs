//! Product detail page extraction
//!
//! Seven sub-extractions run against the same rendered page, one after the
//! other. Each returns an [`Extraction`]; a failed or empty section falls back
//! to its default value in the assembled [`ProductDetail`] and its status is
//! kept in the [`DetailReport`].
//!
//! Variants are the only section that interacts with the page: each color
//! control is clicked, the page is given a settle delay, and the size list is
//! re-read. Controls are re-queried on every iteration since a click may
//! replace the nodes behind earlier handles.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::outcome::{Extraction, SectionStatus};
use super::selectors::DetailSelectors;
use crate::models::{
    Cart, CartSku, Categories, Description, OrderedMap, PackingRow, ProductDetail, ProductTitle,
    ReviewSummary, TitleAndCart, Variant, VariantSize,
};
use crate::render::{
    all_texts, child_attribute, child_text, has_class_token, nth_text, Element, Page,
};
use crate::storage::images::{ImageKind, ImageSaver};
use crate::utils::error::RenderError;
use crate::utils::{normalize_whitespace, parse_leading_int, parse_leading_number};

/// Sections of a detail page, in extraction order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailSection {
    Reviews,
    Attributes,
    Packing,
    Description,
    TitleAndCart,
    Variants,
    Categories,
}

impl DetailSection {
    pub const ALL: [DetailSection; 7] = [
        Self::Reviews,
        Self::Attributes,
        Self::Packing,
        Self::Description,
        Self::TitleAndCart,
        Self::Variants,
        Self::Categories,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reviews => "reviews",
            Self::Attributes => "attributes",
            Self::Packing => "packing",
            Self::Description => "description",
            Self::TitleAndCart => "title_and_cart",
            Self::Variants => "variants",
            Self::Categories => "categories",
        }
    }
}

impl fmt::Display for DetailSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assembled detail plus the status of every section
#[derive(Debug, Clone, PartialEq)]
pub struct DetailReport {
    pub detail: ProductDetail,
    pub sections: Vec<(DetailSection, SectionStatus)>,
}

impl DetailReport {
    pub fn status(&self, section: DetailSection) -> Option<&SectionStatus> {
        self.sections
            .iter()
            .find(|(s, _)| *s == section)
            .map(|(_, status)| status)
    }

    pub fn failed_sections(&self) -> usize {
        self.sections
            .iter()
            .filter(|(_, status)| matches!(status, SectionStatus::Failed(_)))
            .count()
    }
}

/// Section body: `Ok(None)` when the section is absent from the page
type SectionResult<T> = Result<Option<T>, RenderError>;

fn outcome<T>(result: SectionResult<T>) -> Extraction<T> {
    match result {
        Ok(Some(value)) => Extraction::Ok(value),
        Ok(None) => Extraction::Empty,
        Err(e) => Extraction::failed(e),
    }
}

/// Extracts a [`ProductDetail`] from a rendered detail page
pub struct DetailExtractor {
    images: Arc<dyn ImageSaver>,
    selectors: DetailSelectors,
    selector_timeout: Duration,
    settle_delay: Duration,
}

impl DetailExtractor {
    pub fn new(images: Arc<dyn ImageSaver>, selector_timeout: Duration, settle_delay: Duration) -> Self {
        Self {
            images,
            selectors: DetailSelectors::new(),
            selector_timeout,
            settle_delay,
        }
    }

    /// Run every sub-extraction against `page`, which must already show `url`
    pub async fn extract(&self, page: &dyn Page, url: &str) -> DetailReport {
        let reviews = outcome(self.reviews(page).await);
        let attributes = outcome(self.attributes(page).await);
        let packing = outcome(self.packing(page).await);
        let description = outcome(self.description(page).await);
        let title_and_cart = outcome(self.title_and_cart(page).await);
        let variants = outcome(self.variants(page).await);
        let categories = outcome(self.categories(page).await);

        let sections = vec![
            (DetailSection::Reviews, reviews.status()),
            (DetailSection::Attributes, attributes.status()),
            (DetailSection::Packing, packing.status()),
            (DetailSection::Description, description.status()),
            (DetailSection::TitleAndCart, title_and_cart.status()),
            (DetailSection::Variants, variants.status()),
            (DetailSection::Categories, categories.status()),
        ];

        for (section, status) in &sections {
            match status {
                SectionStatus::Failed(reason) => {
                    warn!(url, section = %section, reason = %reason, "Detail section failed")
                }
                SectionStatus::Empty => debug!(url, section = %section, "Detail section absent"),
                SectionStatus::Ok => {}
            }
        }

        let detail = ProductDetail {
            url: url.to_string(),
            reviews: reviews.into_value(),
            attributes: attributes.into_value(),
            packing: packing.into_value(),
            description: description.into_value(),
            title_and_cart: title_and_cart.into_value(),
            variants: variants.into_value(),
            categories: categories.into_value(),
        };

        let report = DetailReport { detail, sections };
        info!(
            url,
            failed_sections = report.failed_sections(),
            variants = report.detail.variants.len(),
            "Detail extracted"
        );
        report
    }

    /// Whether `selector` shows up before the selector timeout
    async fn present(&self, page: &dyn Page, selector: &str) -> Result<bool, RenderError> {
        match page.wait_for_selector(selector, self.selector_timeout).await {
            Ok(()) => Ok(true),
            Err(RenderError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Local path of a persisted image, or the remote URL when saving fails
    async fn persist_image(&self, url: &str, kind: ImageKind) -> String {
        match self.images.save(url, kind).await {
            Ok(path) => path,
            Err(e) => {
                warn!(url, kind = kind.subdir(), error = %e, "Image download failed, keeping remote URL");
                url.to_string()
            }
        }
    }

    async fn reviews(&self, page: &dyn Page) -> SectionResult<ReviewSummary> {
        let s = &self.selectors;
        if !self.present(page, s.reviews_root).await? {
            return Ok(None);
        }

        let highlights = all_texts(page, s.review_highlights).await?;
        let (Some(rating), Some(positive_rate)) = (highlights.first(), highlights.get(1)) else {
            return Err(RenderError::Backend(format!(
                "expected rating and positive rate, found {} highlights",
                highlights.len()
            )));
        };

        let total_reviews = match page.query(s.review_count).await?.into_iter().next() {
            Some(el) => el
                .attribute("data-value")
                .await?
                .as_deref()
                .and_then(parse_leading_int)
                .map(u64::from)
                .unwrap_or(0),
            None => 0,
        };

        Ok(Some(ReviewSummary {
            rating: rating.clone(),
            total_reviews,
            positive_rate: positive_rate.clone(),
        }))
    }

    async fn attributes(&self, page: &dyn Page) -> SectionResult<OrderedMap<String>> {
        let s = &self.selectors;
        if !self.present(page, s.attributes_root).await? {
            return Ok(None);
        }

        if let Some(expand) = page.query(s.attributes_expand).await?.into_iter().next() {
            if let Err(e) = expand.click().await {
                debug!(error = %e, "Attribute panel did not expand");
            }
        }

        let mut attributes = OrderedMap::new();
        for row in page.query(s.attribute_row).await? {
            let labels = row.query(s.attribute_label).await?;
            let values = row.query(s.attribute_value).await?;
            // Positional pairing; extra labels or values are dropped
            for (label, value) in labels.iter().zip(values.iter()) {
                attributes.insert(label.text().await?, value.text().await?);
            }
        }

        Ok(Some(attributes))
    }

    async fn packing(&self, page: &dyn Page) -> SectionResult<Vec<PackingRow>> {
        let s = &self.selectors;
        if !self.present(page, s.packing_root).await? {
            return Ok(None);
        }

        let mut rows = Vec::new();
        for row in page.query(s.packing_row).await? {
            let cells = row.query(s.packing_cell).await?;
            let Some(color_cell) = cells.first() else {
                continue;
            };

            let size = match cells.get(1) {
                Some(cell) => Some(cell.text().await?),
                None => None,
            };
            let weight_g = match cells.get(2) {
                Some(cell) => parse_leading_number(&cell.text().await?),
                None => None,
            };

            rows.push(PackingRow {
                color: color_cell.text().await?,
                size,
                weight_g,
            });
        }

        Ok(Some(rows))
    }

    async fn description(&self, page: &dyn Page) -> SectionResult<Description> {
        let s = &self.selectors;
        if !self.present(page, s.description_ready).await? {
            return Ok(None);
        }

        let mut description = Description::default();

        for img in page.query(s.description_images).await? {
            let Some(src) = img.attribute("src").await?.filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            description
                .images
                .push(self.persist_image(&src, ImageKind::Description).await);
        }

        let mut current_title: Option<String> = None;
        for node in page.query(s.price_desc_nodes).await? {
            let text = node.text().await?;
            if text.is_empty() {
                continue;
            }
            match node.tag_name().await?.as_str() {
                "dt" => {
                    description.price_desc.insert(text.clone(), Vec::new());
                    current_title = Some(text);
                }
                "dl" => {
                    if let Some(lines) = current_title
                        .as_deref()
                        .and_then(|t| description.price_desc.get_mut(t))
                    {
                        lines.push(text);
                    }
                }
                _ => {}
            }
        }

        Ok(Some(description))
    }

    async fn title_and_cart(&self, page: &dyn Page) -> SectionResult<TitleAndCart> {
        let s = &self.selectors;
        if !self.present(page, s.title_root).await? {
            return Ok(None);
        }

        let defaults = ProductTitle::default();
        let product_title = ProductTitle {
            title: nth_text(page, s.title_heading, 0).await.unwrap_or(defaults.title),
            rating: nth_text(page, s.title_rating, 0).await.unwrap_or(defaults.rating),
            reviews: nth_text(page, s.title_reviews, 0).await.unwrap_or(defaults.reviews),
            total_sales: nth_text(page, s.title_sales, 1)
                .await
                .unwrap_or(defaults.total_sales),
        };

        let mut skus = Vec::new();
        for row in page.query(s.cart_sku_rows).await? {
            let price_stock = row.query(s.size_price_stock).await?;
            let mut cells = Vec::with_capacity(2);
            for el in price_stock.iter().take(2) {
                cells.push(normalize_whitespace(&el.text().await?));
            }
            let mut cells = cells.into_iter();
            skus.push(CartSku {
                size: child_text(row.as_ref(), s.size_label).await.unwrap_or_default(),
                price: cells.next().unwrap_or_default(),
                stock: cells.next().unwrap_or_default(),
            });
        }

        let cart = Cart {
            price_range: all_texts(page, s.cart_price_parts).await?.concat(),
            min_order: nth_text(page, s.cart_min_order, 0).await.unwrap_or_default(),
            services: all_texts(page, s.cart_services).await?,
            shipping_from: nth_text(page, s.cart_shipping_from, 0)
                .await
                .unwrap_or_default(),
            skus,
        };

        Ok(Some(TitleAndCart {
            product_title,
            cart,
        }))
    }

    async fn variants(&self, page: &dyn Page) -> SectionResult<Vec<Variant>> {
        let s = &self.selectors;
        let count = page.query(s.color_buttons).await?.len();
        if count == 0 {
            return Ok(None);
        }

        let mut variants = Vec::with_capacity(count);
        for index in 0..count {
            match self.variant(page, index).await {
                Ok(Some(variant)) => {
                    debug!(
                        index,
                        color = %variant.color_name,
                        sizes = variant.sizes.len(),
                        "Color variant read"
                    );
                    variants.push(variant);
                }
                Ok(None) => warn!(index, "Color control disappeared"),
                Err(e) => warn!(index, error = %e, "Color variant failed"),
            }
        }

        Ok(Some(variants))
    }

    /// Click the `index`-th color control, let the page settle, then read it
    async fn variant(&self, page: &dyn Page, index: usize) -> SectionResult<Variant> {
        let s = &self.selectors;

        let Some(button) = page.query(s.color_buttons).await?.into_iter().nth(index) else {
            return Ok(None);
        };
        button.click().await?;
        tokio::time::sleep(self.settle_delay).await;

        // The click may have re-rendered the selector strip
        let Some(button) = page.query(s.color_buttons).await?.into_iter().nth(index) else {
            return Ok(None);
        };

        let color_name = child_text(button.as_ref(), s.color_label)
            .await
            .unwrap_or_default();

        let image = match child_attribute(button.as_ref(), s.color_image, "src")
            .await
            .filter(|src| !src.trim().is_empty())
        {
            Some(src) => self.persist_image(&src, ImageKind::Variant).await,
            None => String::new(),
        };

        let class_attr = button.attribute("class").await.ok().flatten();
        let active = has_class_token(class_attr.as_deref(), "active");

        let mut sizes = Vec::new();
        for item in page.query(s.size_items).await? {
            sizes.push(self.variant_size(item.as_ref()).await);
        }

        Ok(Some(Variant {
            color_name,
            image,
            active,
            sizes,
        }))
    }

    async fn variant_size(&self, item: &dyn Element) -> VariantSize {
        let s = &self.selectors;
        let mut cells = Vec::with_capacity(2);
        if let Ok(price_stock) = item.query(s.size_price_stock).await {
            for el in price_stock.iter().take(2) {
                cells.push(el.text().await.map(|t| normalize_whitespace(&t)).unwrap_or_default());
            }
        }
        let mut cells = cells.into_iter();

        VariantSize {
            size_name: child_text(item, s.size_label).await.unwrap_or_default(),
            price: cells.next().unwrap_or_default(),
            stock: cells.next().unwrap_or_default(),
        }
    }

    async fn categories(&self, page: &dyn Page) -> SectionResult<Categories> {
        let s = &self.selectors;
        let item_name = nth_text(page, s.title_heading, 0).await;
        let crumbs: Vec<String> = all_texts(page, s.breadcrumb_links)
            .await?
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect();

        if item_name.is_none() && crumbs.is_empty() {
            return Ok(None);
        }

        Ok(Some(Categories {
            category: crumbs.get(1).cloned().unwrap_or_default(),
            sub_category: crumbs.get(2).cloned().unwrap_or_default(),
            item_name: item_name.unwrap_or_default(),
        }))
    }
}
