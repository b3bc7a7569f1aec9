//! Shop page parser
//!
//! Shop pages are lighter than product pages: a header block with the shop
//! name/level/followers, a category rail with counts, a product grid and an
//! optional coupon strip. The grid is what JS-rendering exists for; on a
//! static shell it simply comes back empty.

use crate::error::{PipelineError, PipelineResult};
use crate::models::{
    CouponKind, DataSource, ShopCoupon, ShopProduct, ShopRecord,
};
use crate::scrapers::{lexicon, structure, urls};
use scraper::{Html, Selector};
use std::collections::{BTreeMap, HashSet};
use unicode_normalization::UnicodeNormalization;

const MAX_GRID_PRODUCTS: usize = 60;

pub struct ShopParser;

impl ShopParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, html: &str, url: &str, source: DataSource) -> PipelineResult<ShopRecord> {
        let doc = Html::parse_document(html);
        let page_text = full_text(&doc);

        let id = urls::extract_shop_slug(url).ok_or_else(|| {
            PipelineError::extraction(format!("no shop slug in {}", url))
        })?;

        let name = extract_shop_name(&doc).unwrap_or_else(|| id.clone());

        Ok(ShopRecord {
            url: url.to_string(),
            id,
            name,
            level: extract_shop_level(&page_text),
            follower_count: extract_follower_count(&page_text),
            product_count: extract_product_count(&page_text),
            categories: extract_categories(&doc),
            products: extract_grid_products(&doc),
            coupons: extract_coupons(&doc),
            source,
            page_structure: Some(structure::extract_page_structure(&doc)),
        })
    }
}

impl Default for ShopParser {
    fn default() -> Self {
        Self::new()
    }
}

fn full_text(doc: &Html) -> String {
    doc.root_element().text().collect::<Vec<_>>().join(" ")
}

fn clean_text(text: &str) -> String {
    text.nfc()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_shop_name(doc: &Html) -> Option<String> {
    for sel in ["h1.shop-name", ".shop_name", "h1", ".shop-title"] {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        if let Some(el) = doc.select(&selector).next() {
            let text = clean_text(&el.text().collect::<Vec<_>>().join(" "));
            if text.chars().count() > 1 {
                return Some(text);
            }
        }
    }
    // Title fallback, same shape as product pages.
    let selector = Selector::parse("title").ok()?;
    let title = clean_text(
        &doc.select(&selector)
            .next()?
            .text()
            .collect::<Vec<_>>()
            .join(" "),
    );
    let head = title
        .split(['|', '｜'])
        .next()
        .unwrap_or(&title)
        .replace("Qoo10", "");
    let head = head.trim();
    if head.chars().count() > 1 {
        Some(head.to_string())
    } else {
        None
    }
}

fn extract_shop_level(page_text: &str) -> Option<String> {
    if lexicon::POWER_SELLER.is_match(page_text) {
        Some("power".to_string())
    } else if lexicon::EXCELLENT_SELLER.is_match(page_text) {
        Some("excellent".to_string())
    } else {
        None
    }
}

fn extract_follower_count(page_text: &str) -> u32 {
    lexicon::FOLLOWER_COUNT
        .captures(page_text)
        .and_then(|caps| lexicon::parse_price(&caps[1]))
        .unwrap_or(0)
}

fn extract_product_count(page_text: &str) -> u32 {
    lexicon::SHOP_PRODUCT_COUNT
        .captures(page_text)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

/// Category rail entries like "スキンケア (24)".
fn extract_categories(doc: &Html) -> BTreeMap<String, u32> {
    lazy_static::lazy_static! {
        static ref NAME_WITH_COUNT: regex::Regex =
            regex::Regex::new(r"^(.*?)\s*\((\d+)\)\s*$").unwrap();
    }

    let mut categories = BTreeMap::new();
    for sel in [
        "a[href*=\"/category/\"]",
        "a[href*=\"category_no=\"]",
        "li[class*=\"category\"] a",
    ] {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        for el in doc.select(&selector) {
            let text = clean_text(&el.text().collect::<Vec<_>>().join(" "));
            if let Some(caps) = NAME_WITH_COUNT.captures(&text) {
                let name = lexicon::translate(caps[1].trim());
                if let Ok(count) = caps[2].parse::<u32>() {
                    if !name.is_empty() {
                        categories.entry(name).or_insert(count);
                    }
                }
            }
        }
    }
    categories
}

fn extract_grid_products(doc: &Html) -> Vec<ShopProduct> {
    let mut products = Vec::new();
    let mut seen_codes: HashSet<String> = HashSet::new();

    for sel in [
        "a[href*=\"goodscode=\"]",
        "a[href*=\"/g/\"]",
        "a[href*=\"/item/\"]",
    ] {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        for el in doc.select(&selector) {
            if products.len() >= MAX_GRID_PRODUCTS {
                return products;
            }
            let href = el.value().attr("href").unwrap_or_default();
            let code = urls::extract_product_code(href);
            if let Some(code) = &code {
                if !seen_codes.insert(code.clone()) {
                    continue;
                }
            }

            let text = clean_text(&el.text().collect::<Vec<_>>().join(" "));
            let price = lexicon::PRICE_YEN
                .captures(&text)
                .and_then(|caps| lexicon::parse_price(&caps[1]))
                .filter(|p| crate::scrapers::product::is_valid_price(*p));
            let name = lexicon::PRICE_YEN.replace_all(&text, "").trim().to_string();
            if name.is_empty() && code.is_none() {
                continue;
            }

            let image = Selector::parse("img").ok().and_then(|img_sel| {
                el.select(&img_sel).next().and_then(|img| {
                    img.value()
                        .attr("src")
                        .or_else(|| img.value().attr("data-src"))
                        .map(urls::absolutize)
                })
            });

            products.push(ShopProduct {
                url: code.as_deref().map(urls::canonical_product_url),
                code,
                name,
                price,
                image,
            });
        }
    }

    products
}

fn extract_coupons(doc: &Html) -> Vec<ShopCoupon> {
    let mut coupons = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for sel in ["div[class*=\"coupon\"]", "li[class*=\"coupon\"]", "span[class*=\"coupon\"]"] {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        for el in doc.select(&selector) {
            let text = clean_text(&el.text().collect::<Vec<_>>().join(" "));
            if text.is_empty() || !lexicon::COUPON_LABEL.is_match(&text) {
                continue;
            }
            if !seen.insert(text.clone()) {
                continue;
            }

            let discount = lexicon::COUPON_DISCOUNT
                .captures(&text)
                .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
                .and_then(|m| m.as_str().parse().ok());
            let kind = if lexicon::COUPON_FAVORITE.is_match(&text) {
                CouponKind::Favorite
            } else if lexicon::COUPON_PASSWORD.is_match(&text) {
                CouponKind::Password
            } else {
                CouponKind::Auto
            };

            coupons.push(ShopCoupon {
                title: lexicon::translate(&text),
                discount,
                kind,
            });
        }
    }

    coupons
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP_HTML: &str = r#"
    <html>
    <head><title>ビューティーラボ | Qoo10</title></head>
    <body>
        <h1 class="shop-name">ビューティーラボ</h1>
        <span>POWER セラー</span>
        <span>フォロワー 12,345</span>
        <span>全ての商品 (48)</span>
        <ul>
            <li class="category_item"><a href="/shop/beauty-lab?category_no=1">スキンケア (24)</a></li>
            <li class="category_item"><a href="/shop/beauty-lab?category_no=2">メイクアップ (24)</a></li>
        </ul>
        <div class="goods_grid">
            <a href="/g/111"><img src="/img/a.jpg">ビタミンCセラム 2,980円</a>
            <a href="/g/222"><img src="/img/b.jpg">クレンジングオイル 1,580円</a>
            <a href="/g/111">重複リンク 2,980円</a>
        </div>
        <div class="coupon_banner">ショップクーポン 最大500円 割引 お気に入り登録で獲得</div>
    </body>
    </html>
    "#;

    #[test]
    fn parses_shop_page() {
        let record = ShopParser::new()
            .parse(
                SHOP_HTML,
                "https://www.qoo10.jp/shop/beauty-lab",
                DataSource::JsRender,
            )
            .unwrap();

        assert_eq!(record.id, "beauty-lab");
        assert_eq!(record.name, "ビューティーラボ");
        assert_eq!(record.level.as_deref(), Some("power"));
        assert_eq!(record.follower_count, 12345);
        assert_eq!(record.product_count, 48);
        assert_eq!(record.categories.len(), 2);
        assert_eq!(record.categories["スキンケア"], 24);
        assert_eq!(record.products.len(), 2);
        assert_eq!(record.products[0].code.as_deref(), Some("111"));
        assert_eq!(record.products[0].price, Some(2980));
        assert_eq!(record.coupons.len(), 1);
        assert_eq!(record.coupons[0].discount, Some(500));
        assert_eq!(record.coupons[0].kind, CouponKind::Favorite);
    }

    #[test]
    fn missing_slug_is_an_extraction_error() {
        let err = ShopParser::new()
            .parse("<html></html>", "https://www.qoo10.jp/event/none", DataSource::HtmlFetch)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(_)));
    }
}
