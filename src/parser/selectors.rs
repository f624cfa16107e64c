//! CSS selectors for the listing and detail page layouts
//!
//! Selectors are kept as strings because they are evaluated by whichever
//! rendering backend drives the page. The tests check that every one of them
//! parses as standard CSS.

/// Selectors for the search-results listing page
#[derive(Debug, Clone, Copy)]
pub struct ListingSelectors {
    /// One product card; the card itself is the link
    pub card: &'static str,
    pub title: &'static str,
    pub image: &'static str,
    pub price_currency: &'static str,
    pub price_amount: &'static str,
    pub price_unit: &'static str,
    pub overseas_price: &'static str,
    pub rating: &'static str,
    pub sold: &'static str,
    pub promotion: &'static str,
    pub moq: &'static str,
    pub seller_icon: &'static str,
    /// Class token marking a sponsored card
    pub ad_class: &'static str,
}

impl ListingSelectors {
    pub const fn new() -> Self {
        Self {
            card: "a.i18n-card-wrap",
            title: ".offer-title",
            image: "img.main-img",
            price_currency: ".price-wrap .symbol",
            price_amount: ".price-wrap .number",
            price_unit: ".price-wrap .unit",
            overseas_price: ".overseas-price",
            rating: ".star-level-text",
            sold: ".sale-amount-wrap",
            promotion: ".promotion-tags",
            moq: ".overseas-begin-quantity-wrap",
            seller_icon: ".overseas-seller-icon",
            ad_class: "cardui-adOffer",
        }
    }
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self::new()
    }
}

/// Selectors for the pager under the listing
#[derive(Debug, Clone, Copy)]
pub struct PagerSelectors {
    pub next: &'static str,
    pub current: &'static str,
    pub page_count: &'static str,
    /// Class fragment marking the next control as inactive
    pub disabled_marker: &'static str,
}

impl PagerSelectors {
    pub const fn new() -> Self {
        Self {
            next: ".fui-arrow.fui-next",
            current: ".fui-current",
            page_count: ".fui-paging-num",
            disabled_marker: "disabled",
        }
    }
}

impl Default for PagerSelectors {
    fn default() -> Self {
        Self::new()
    }
}

/// Selectors for the product detail page
#[derive(Debug, Clone, Copy)]
pub struct DetailSelectors {
    // Reviews
    pub reviews_root: &'static str,
    pub review_highlights: &'static str,
    pub review_count: &'static str,

    // Attributes
    pub attributes_root: &'static str,
    pub attributes_expand: &'static str,
    pub attribute_row: &'static str,
    pub attribute_label: &'static str,
    pub attribute_value: &'static str,

    // Packing
    pub packing_root: &'static str,
    pub packing_row: &'static str,
    pub packing_cell: &'static str,

    // Description
    pub description_ready: &'static str,
    pub description_images: &'static str,
    pub price_desc_nodes: &'static str,

    // Title and cart
    pub title_root: &'static str,
    pub title_heading: &'static str,
    pub title_rating: &'static str,
    pub title_reviews: &'static str,
    pub title_sales: &'static str,
    pub cart_price_parts: &'static str,
    pub cart_min_order: &'static str,
    pub cart_services: &'static str,
    pub cart_shipping_from: &'static str,
    pub cart_sku_rows: &'static str,

    // Variants
    pub color_buttons: &'static str,
    pub color_label: &'static str,
    pub color_image: &'static str,
    pub size_items: &'static str,
    pub size_label: &'static str,
    pub size_price_stock: &'static str,

    // Categories
    pub breadcrumb_links: &'static str,
}

impl DetailSelectors {
    pub const fn new() -> Self {
        Self {
            reviews_root: "#productEvaluation",
            review_highlights: "#productEvaluation .header-label-desc em.hl",
            review_count: "#productEvaluation .header-label-desc .brackets",

            attributes_root: "#productAttributes",
            attributes_expand: "#productAttributes .collapse-footer button",
            attribute_row: "#productAttributes .ant-descriptions-row",
            attribute_label: ".ant-descriptions-item-label",
            attribute_value: ".ant-descriptions-item-content .field-value",

            packing_root: "#productPackInfo",
            packing_row: "#productPackInfo tbody tr",
            packing_cell: "td",

            description_ready: ".price-indication",
            description_images: "#description img",
            price_desc_nodes: ".price-desc > dt, .price-desc > dl",

            title_root: "#productTitle",
            title_heading: "#productTitle h1",
            title_rating: "#productTitle .hl",
            title_reviews: "#productTitle .brackets",
            title_sales: "#productTitle .trade-info em.hl",
            cart_price_parts: "#cartScrollBar #mainPrice .price-info span",
            cart_min_order: "#cartScrollBar #mainPrice",
            cart_services: "#cartScrollBar #mainServices .service-item-link",
            cart_shipping_from: "#cartScrollBar #shippingServices .location",
            cart_sku_rows: "#cartScrollBar #skuSelection .expand-view-item",

            color_buttons: ".transverse-filter .sku-filter-button",
            color_label: ".label-name",
            color_image: "img",
            size_items: ".expand-view-list .expand-view-item",
            size_label: ".item-label",
            size_price_stock: ".item-price-stock",

            breadcrumb_links: ".breadcrumb a",
        }
    }
}

impl Default for DetailSelectors {
    fn default() -> Self {
        Self::new()
    }
}
