//! Test fixtures for integration tests
//!
//! Builders for listing and detail snapshots in the source's markup.

use offerhound::render::SnapshotSite;

use crate::common::page_url;

pub const DETAIL_URL: &str = "https://detail.1688.com/offer/847461182224.html";

/// Regular product card for offer `id`
pub fn card(id: &str) -> String {
    format!(
        r#"<a class="i18n-card-wrap" href="https://detail.1688.com/offer/{id}.html">
            <img class="main-img" src="https://cbu01.alicdn.com/img/{id}.jpg">
            <div class="offer-title">Laptop {id}</div>
            <div class="price-wrap"><span class="symbol">¥</span><span class="number">2310</span><span class="unit">/台</span></div>
            <div class="overseas-price">≈ $320</div>
            <span class="star-level-text">4.8</span>
            <div class="sale-amount-wrap">已售 1200+ 件</div>
            <div class="overseas-begin-quantity-wrap">2台起批</div>
        </a>"#
    )
}

/// Sponsored card for offer `id`
pub fn ad_card(id: &str) -> String {
    format!(
        r#"<a class="i18n-card-wrap cardui-adOffer" href="https://dj.1688.com/ci_bb?a={id}&e=xyz">
            <div class="offer-title">Sponsored {id}</div>
        </a>"#
    )
}

/// Card carrying only its link
pub fn bare_card(id: &str) -> String {
    format!(r#"<a class="i18n-card-wrap" href="https://detail.1688.com/offer/{id}.html"></a>"#)
}

/// Card whose link yields no offer id
pub fn anonymous_card() -> String {
    r#"<a class="i18n-card-wrap" href="https://s.1688.com/"><div class="offer-title">No id</div></a>"#
        .to_string()
}

/// Next-page control moving to `target`
pub fn next_to(target: &str) -> String {
    format!(r#"<a class="fui-arrow fui-next" data-goto="{target}">下一页</a>"#)
}

pub fn next_disabled() -> String {
    r#"<a class="fui-arrow fui-next fui-next-disabled">下一页</a>"#.to_string()
}

/// Listing document showing `indicator` as the current page out of `total`
pub fn listing(indicator: u32, total: u32, next: &str, cards: &[String]) -> String {
    format!(
        r#"<html><body>
            <div class="space-common-offerlist">{}</div>
            <div class="fui-paging">
                <span class="fui-current">{indicator}</span>{next}
                <span class="fui-paging-num">{total}</span>
            </div>
        </body></html>"#,
        cards.concat()
    )
}

/// Three listing pages for "laptop": offers 1-2, 3-4, then 5 plus an ad.
/// Page 3's next control is disabled; the source reports `total` pages.
pub fn three_page_site(total: u32) -> SnapshotSite {
    let site = SnapshotSite::new();
    site.insert(
        page_url(1),
        listing(1, total, &next_to(&page_url(2)), &[card("1"), card("2")]),
    );
    site.insert(
        page_url(2),
        listing(2, total, &next_to(&page_url(3)), &[card("3"), card("4")]),
    );
    site.insert(
        page_url(3),
        listing(3, total, &next_disabled(), &[card("5"), ad_card("6")]),
    );
    site
}

/// Detail page with title, breadcrumbs and one description image
pub fn detail_html() -> String {
    r#"<html><body>
        <div class="breadcrumb"><a>首页</a><a>数码电脑</a><a>笔记本电脑</a></div>
        <div id="productTitle">
            <h1>Laptop X</h1>
            <span class="hl">4.9</span><span class="brackets">(120)</span>
        </div>
        <div id="productAttributes">
            <div class="ant-descriptions-row">
                <span class="ant-descriptions-item-label">品牌</span>
                <span class="ant-descriptions-item-content"><span class="field-value">联想</span></span>
            </div>
        </div>
        <div class="price-indication">价格说明</div>
        <div id="description"><img src="https://img.alicdn.com/d/one.jpg"></div>
    </body></html>"#
        .to_string()
}
