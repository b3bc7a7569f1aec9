//! Product page parser
//!
//! HTML → normalized product record. Every field walks a rule ladder:
//! hard-coded default selectors first, then the store's learned selectors,
//! then a field-specific heuristic. Fields reported through the feedback
//! loop get their learned selectors promoted to the front of the ladder.
//!
//! Selector outcomes (success and failure) are recorded back to the store so
//! rankings converge on whatever the marketplace currently renders.

use crate::error::{PipelineError, PipelineResult};
use crate::models::{
    CouponInfo, CouponKind, DataSource, ImageInfo, PointsInfo, PriceInfo, ProductRecord,
    ReturnPolicy, ReviewInfo, SellerInfo, SellerLevel, ShippingInfo,
};
use crate::scrapers::{lexicon, structure, urls};
use crate::store::PerformanceStore;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

/// Price sanity window; anything outside is treated as noise.
pub const MIN_VALID_PRICE: u32 = 100;
pub const MAX_VALID_PRICE: u32 = 1_000_000;

const MAX_DEFAULT_RULES: usize = 5;
const LEARNED_RULE_LIMIT: usize = 5;
const MAX_DESCRIPTION_LEN: usize = 5_000;
const MAX_REVIEW_SAMPLES: usize = 10;

const NAME_SELECTORS: &[&str] = &[
    "h1.product-name",
    "h1[itemprop=\"name\"]",
    ".product_name",
    "h1",
    "#goods_name",
    ".goods_name",
    "[data-product-name]",
    ".goods_title",
    "title",
];

const GENERIC_TEXTS: &[&str] = &[
    "Qoo10", "ホーム", "Home", "トップ", "Top", "商品名", "商品詳細",
];

const CATEGORY_SELECTORS: &[&str] = &[
    "meta[property=\"product:category\"]",
    "nav.breadcrumb a",
    "ol.breadcrumb a",
    ".category",
    "nav[class*=\"breadcrumb\"] a",
    "a[href*=\"/category/\"]",
    "a[href*=\"/cat/\"]",
];

const SALE_PRICE_SELECTORS: &[&str] = &[
    ".price",
    ".product-price",
    "[itemprop=\"price\"]",
    ".sale_price",
    "#price",
    ".goods_price",
    "span.price",
    "[class*=\"price\"]",
    "[data-price]",
];

const THUMBNAIL_SELECTORS: &[&str] = &[
    "img.product-thumbnail",
    "img[itemprop=\"image\"]",
    ".product-image img",
    "img.main-image",
    "#goods_img img",
    ".goods_img img",
    ".thumbnail img",
    "img[class*=\"thumbnail\"]",
    "img[class*=\"main\"]",
];

const DETAIL_IMAGE_SELECTORS: &[&str] = &[
    ".product-detail img",
    ".detail-images img",
    ".product-images img",
    "#goods_detail img",
    ".goods_detail img",
    "div[class*=\"detail\"] img",
    "div[class*=\"description\"] img",
];

const EXCLUDED_IMAGE_TOKENS: &[&str] = &["icon", "logo", "banner", "button"];

const DESCRIPTION_SELECTORS: &[&str] = &[
    ".product-description",
    "[itemprop=\"description\"]",
    ".description",
    ".product-detail",
    "#goods_detail",
    ".goods_detail",
    "div[class*=\"detail\"]",
    "div[class*=\"description\"]",
    "[id*=\"description\"]",
];

const REVIEW_SAMPLE_SELECTORS: &[&str] = &[
    ".review-item",
    ".review-text",
    "[itemprop=\"reviewBody\"]",
    ".review_content",
    ".review-body",
    "div[class*=\"review\"]",
    "p[class*=\"review\"]",
];

/// Elements worth scanning when a regex needs the smallest enclosing block.
const TEXT_BLOCK_SELECTOR: &str = "div, span, li, td, dd, dt, p, strong, em";

pub struct ProductParser {
    store: Arc<PerformanceStore>,
}

impl ProductParser {
    pub fn new(store: Arc<PerformanceStore>) -> Self {
        Self { store }
    }

    pub fn parse(
        &self,
        html: &str,
        url: &str,
        source: DataSource,
    ) -> PipelineResult<ProductRecord> {
        let doc = Html::parse_document(html);
        let normalized_url = urls::normalize_product_url(url);
        let priority_fields: HashSet<String> = self
            .store
            .priority_fields(10)
            .unwrap_or_default()
            .into_iter()
            .collect();

        let page_structure = structure::extract_page_structure(&doc);
        let page_text = full_text(&doc);

        let code = urls::extract_product_code(&normalized_url)
            .or_else(|| code_from_page(&doc));
        let name = self.extract_name(&doc, priority_fields.contains("product_name"));

        if code.is_none() && name.is_none() {
            return Err(PipelineError::extraction(format!(
                "neither code nor name derivable from {}",
                normalized_url
            )));
        }

        let price = self.extract_price(&doc, &page_text);
        let images = extract_images(&doc);
        let description =
            self.extract_description(&doc, priority_fields.contains("description"));
        let reviews = extract_reviews(&doc, &page_text);

        Ok(ProductRecord {
            url: normalized_url,
            code: code.unwrap_or_default(),
            name: name.unwrap_or_default(),
            category: self.extract_category(&doc),
            brand: extract_brand(&doc),
            price,
            images,
            description,
            search_keywords: extract_search_keywords(&doc),
            reviews,
            seller: extract_seller(&doc, &page_text),
            shipping: extract_shipping(&doc),
            points: extract_points(&doc),
            coupon: extract_coupon(&doc),
            is_promoted: extract_promoted(&doc, &page_text),
            source,
            page_structure: Some(page_structure),
        })
    }

    // -----------------------------------------------------------------------
    // Rule ladder
    // -----------------------------------------------------------------------

    /// Try default rules, then learned rules, in priority order for fields
    /// under active error reports. Outcomes are recorded best-effort.
    fn rule_ladder<F>(
        &self,
        doc: &Html,
        selector_type: &str,
        defaults: &[&str],
        prioritized: bool,
        try_rule: F,
    ) -> Option<String>
    where
        F: Fn(&Html, &str) -> Option<String>,
    {
        if prioritized {
            if let Some(found) = self.try_learned(doc, selector_type, defaults, &try_rule) {
                return Some(found);
            }
            if let Some(found) = self.try_defaults(doc, selector_type, defaults, &try_rule) {
                return Some(found);
            }
        } else {
            if let Some(found) = self.try_defaults(doc, selector_type, defaults, &try_rule) {
                return Some(found);
            }
            if let Some(found) = self.try_learned(doc, selector_type, defaults, &try_rule) {
                return Some(found);
            }
        }
        None
    }

    fn try_defaults<F>(
        &self,
        doc: &Html,
        selector_type: &str,
        defaults: &[&str],
        try_rule: &F,
    ) -> Option<String>
    where
        F: Fn(&Html, &str) -> Option<String>,
    {
        for selector in defaults.iter().take(MAX_DEFAULT_RULES) {
            match try_rule(doc, selector) {
                Some(found) => {
                    self.record_selector(selector_type, selector, true, 1.0);
                    return Some(found);
                }
                None => {
                    self.record_selector(selector_type, selector, false, 0.0);
                }
            }
        }
        None
    }

    fn try_learned<F>(
        &self,
        doc: &Html,
        selector_type: &str,
        defaults: &[&str],
        try_rule: &F,
    ) -> Option<String>
    where
        F: Fn(&Html, &str) -> Option<String>,
    {
        let learned = match self.store.best_selectors(selector_type, LEARNED_RULE_LIMIT) {
            Ok(rows) => rows,
            Err(e) => {
                debug!("learned selector lookup failed: {}", e);
                return None;
            }
        };
        for stat in learned {
            if defaults.contains(&stat.selector.as_str()) {
                continue;
            }
            if let Some(found) = try_rule(doc, &stat.selector) {
                self.record_selector(selector_type, &stat.selector, true, 1.0);
                return Some(found);
            }
            self.record_selector(selector_type, &stat.selector, false, 0.0);
        }
        None
    }

    fn record_selector(&self, selector_type: &str, selector: &str, success: bool, quality: f64) {
        if let Err(e) = self
            .store
            .record_selector(selector_type, selector, success, quality)
        {
            debug!("selector outcome not recorded: {}", e);
        }
    }

    // -----------------------------------------------------------------------
    // Field extractors
    // -----------------------------------------------------------------------

    fn extract_name(&self, doc: &Html, prioritized: bool) -> Option<String> {
        let from_ladder = self.rule_ladder(doc, "product_name", NAME_SELECTORS, prioritized, |d, sel| {
            match sel {
                "title" => name_from_title(d),
                "[data-product-name]" => {
                    let parsed = Selector::parse(sel).ok()?;
                    let el = d.select(&parsed).next()?;
                    let name = el
                        .value()
                        .attr("data-product-name")
                        .map(str::to_string)
                        .or_else(|| Some(element_text(&el)))?;
                    meaningful_name(&name)
                }
                _ => {
                    let parsed = Selector::parse(sel).ok()?;
                    let el = d.select(&parsed).next()?;
                    meaningful_name(&element_text(&el))
                }
            }
        });

        from_ladder
            .or_else(|| heuristic_name(doc))
            .map(|n| clean_text(&n))
    }

    fn extract_category(&self, doc: &Html) -> Option<String> {
        let found = self.rule_ladder(doc, "category", CATEGORY_SELECTORS, false, |d, sel| {
            if sel.starts_with("meta") {
                let parsed = Selector::parse(sel).ok()?;
                let el = d.select(&parsed).next()?;
                return el.value().attr("content").map(str::to_string);
            }
            let parsed = Selector::parse(sel).ok()?;
            // The last breadcrumb link is usually the leaf category.
            let candidates: Vec<_> = d.select(&parsed).collect();
            for el in candidates.iter().rev() {
                let href = el.value().attr("href").unwrap_or_default();
                if let Some(slug) = category_from_href(href) {
                    return Some(slug);
                }
                let text = element_text(el);
                if text.chars().count() > 2 && !GENERIC_TEXTS.contains(&text.as_str()) {
                    return Some(lexicon::translate(&text));
                }
            }
            None
        });

        found.map(|c| clean_text(&c))
    }

    fn extract_price(&self, doc: &Html, page_text: &str) -> PriceInfo {
        let mut price = PriceInfo::default();

        // Labelled price wins over bare selector hits.
        if let Some(caps) = lexicon::PRICE_LABEL.captures(page_text) {
            price.sale = lexicon::parse_price(&caps[2]).filter(|p| is_valid_price(*p));
        }

        if price.sale.is_none() {
            price.sale = self
                .rule_ladder(doc, "sale_price", SALE_PRICE_SELECTORS, false, |d, sel| {
                    let parsed = Selector::parse(sel).ok()?;
                    let el = d.select(&parsed).next()?;
                    let text = el
                        .value()
                        .attr("content")
                        .or_else(|| el.value().attr("data-price"))
                        .map(str::to_string)
                        .unwrap_or_else(|| element_text(&el));
                    lexicon::parse_price(&text)
                        .filter(|p| is_valid_price(*p))
                        .map(|p| p.to_string())
                })
                .and_then(|s| s.parse().ok());
        }

        // Last resort: the largest plausible yen amount anywhere on the page.
        if price.sale.is_none() {
            price.sale = lexicon::PRICE_YEN
                .captures_iter(page_text)
                .chain(lexicon::PRICE_SYMBOL.captures_iter(page_text))
                .filter_map(|caps| lexicon::parse_price(&caps[1]))
                .filter(|p| is_valid_price(*p))
                .max();
        }

        price.original = extract_original_price(doc, page_text);
        // An original below the sale price is bad data, not a markup.
        if let (Some(sale), Some(original)) = (price.sale, price.original) {
            if original < sale {
                price.original = None;
            }
        }
        if let (Some(sale), Some(original)) = (price.sale, price.original) {
            if original > 0 {
                let discount = (original - sale) as f64 / original as f64 * 100.0;
                price.discount_rate = discount.round() as u8;
            }
        }

        price.coupon_discount = lexicon::COUPON_DISCOUNT
            .captures(page_text)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
            .and_then(|m| m.as_str().parse().ok())
            .or_else(|| {
                lexicon::COUPON_PAREN_DISCOUNT
                    .captures(page_text)
                    .and_then(|caps| caps[1].parse().ok())
            });

        price
    }

    fn extract_description(&self, doc: &Html, prioritized: bool) -> String {
        let found = self.rule_ladder(doc, "description", DESCRIPTION_SELECTORS, prioritized, |d, sel| {
            let parsed = Selector::parse(sel).ok()?;
            let el = d.select(&parsed).next()?;
            let text = element_text(&el);
            let stripped = strip_description_heading(&text);
            if stripped.chars().count() > 50 {
                Some(stripped)
            } else {
                None
            }
        });

        let description = found
            .or_else(|| meta_description(doc))
            .or_else(|| json_ld_description(doc))
            .or_else(|| heuristic_description(doc))
            .unwrap_or_default();

        let mut cleaned = clean_text(&description);
        if cleaned.chars().count() > MAX_DESCRIPTION_LEN {
            cleaned = cleaned.chars().take(MAX_DESCRIPTION_LEN).collect();
        }
        cleaned
    }
}

// ---------------------------------------------------------------------------
// Free helpers (no learning involved)
// ---------------------------------------------------------------------------

pub(crate) fn is_valid_price(price: u32) -> bool {
    (MIN_VALID_PRICE..=MAX_VALID_PRICE).contains(&price)
}

fn full_text(doc: &Html) -> String {
    doc.root_element().text().collect::<Vec<_>>().join(" ")
}

fn element_text(el: &scraper::ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// NFC-normalize and collapse runs of whitespace.
pub(crate) fn clean_text(text: &str) -> String {
    text.nfc()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Smallest element whose text matches the pattern; approximates finding the
/// matched text node's immediate parent.
fn smallest_matching_block(doc: &Html, pattern: &regex::Regex) -> Option<String> {
    let selector = Selector::parse(TEXT_BLOCK_SELECTOR).ok()?;
    doc.select(&selector)
        .map(|el| element_text(&el))
        .filter(|text| !text.is_empty() && pattern.is_match(text))
        .min_by_key(|text| text.len())
}

fn meaningful_name(text: &str) -> Option<String> {
    let cleaned = clean_text(text);
    if cleaned.chars().count() > 3 && !GENERIC_TEXTS.contains(&cleaned.as_str()) {
        Some(cleaned)
    } else {
        None
    }
}

fn name_from_title(doc: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let title = element_text(&doc.select(&selector).next()?);
    let head = title
        .split(['|', '｜'])
        .next()
        .unwrap_or(&title)
        .replace("[Qoo10]", "")
        .replace("Qoo10", "");
    meaningful_name(head.trim())
}

/// Longest plausible h1, then the page title with the marketplace suffix
/// stripped.
fn heuristic_name(doc: &Html) -> Option<String> {
    if let Ok(selector) = Selector::parse("h1") {
        if let Some(found) = doc
            .select(&selector)
            .map(|el| element_text(&el))
            .find(|text| text.chars().count() > 10 && !GENERIC_TEXTS.contains(&text.as_str()))
        {
            return Some(found);
        }
    }
    name_from_title(doc)
}

fn category_from_href(href: &str) -> Option<String> {
    lazy_static::lazy_static! {
        static ref CATEGORY_HREF: regex::Regex =
            regex::Regex::new(r"/(?:category|cat)/([^/?#]+)").unwrap();
    }
    CATEGORY_HREF
        .captures(href)
        .map(|caps| caps[1].to_string())
}

fn code_from_page(doc: &Html) -> Option<String> {
    if let Ok(selector) = Selector::parse("input[name=\"goodscode\"]") {
        if let Some(el) = doc.select(&selector).next() {
            if let Some(value) = el.value().attr("value") {
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    if let Ok(selector) = Selector::parse("meta[property=\"product:retailer_item_id\"]") {
        if let Some(el) = doc.select(&selector).next() {
            if let Some(content) = el.value().attr("content") {
                if !content.is_empty() {
                    return Some(content.to_string());
                }
            }
        }
    }
    // JSON-LD sku / productID
    if let Ok(selector) = Selector::parse("script[type=\"application/ld+json\"]") {
        for script in doc.select(&selector) {
            let raw = script.text().collect::<String>();
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
                for key in ["sku", "productID"] {
                    if let Some(code) = value.get(key) {
                        if let Some(s) = code.as_str() {
                            return Some(s.to_string());
                        }
                        if let Some(n) = code.as_u64() {
                            return Some(n.to_string());
                        }
                    }
                }
            }
        }
    }
    // Any product/item meta with a purely numeric value.
    if let Ok(selector) = Selector::parse("meta") {
        for el in doc.select(&selector) {
            let prop = el
                .value()
                .attr("property")
                .or_else(|| el.value().attr("name"))
                .unwrap_or_default()
                .to_lowercase();
            if prop.contains("product") || prop.contains("item") {
                if let Some(content) = el.value().attr("content") {
                    if !content.is_empty() && content.chars().all(|c| c.is_ascii_digit()) {
                        return Some(content.to_string());
                    }
                }
            }
        }
    }
    None
}

fn extract_brand(doc: &Html) -> Option<String> {
    if let Ok(selector) = Selector::parse("meta[property=\"product:brand\"]") {
        if let Some(el) = doc.select(&selector).next() {
            if let Some(content) = el.value().attr("content") {
                if !content.is_empty() {
                    return Some(clean_text(content));
                }
            }
        }
    }
    // "ブランド: XYZ" style label rows.
    if let Some(block) = smallest_matching_block(doc, &lexicon::BRAND_LABEL) {
        let value = block
            .rsplit([':', '：'])
            .next()
            .map(str::trim)
            .filter(|v| !v.is_empty() && !lexicon::BRAND_LABEL.is_match(v))?;
        return Some(lexicon::translate(&clean_text(value)));
    }
    None
}

fn extract_original_price(doc: &Html, page_text: &str) -> Option<u32> {
    if let Some(caps) = lexicon::STRIKETHROUGH_PRICE.captures(page_text) {
        if let Some(price) = lexicon::parse_price(&caps[1]).filter(|p| is_valid_price(*p)) {
            return Some(price);
        }
    }
    for sel in ["del", "s", "[class*=\"original\"]", ".regular_price"] {
        if let Ok(selector) = Selector::parse(sel) {
            for el in doc.select(&selector) {
                if let Some(price) =
                    lexicon::parse_price(&element_text(&el)).filter(|p| is_valid_price(*p))
                {
                    return Some(price);
                }
            }
        }
    }
    None
}

fn extract_images(doc: &Html) -> ImageInfo {
    let mut images = ImageInfo::default();
    let mut seen: HashSet<String> = HashSet::new();

    for sel in THUMBNAIL_SELECTORS {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        if let Some(el) = doc.select(&selector).next() {
            if let Some(src) = image_src(&el) {
                seen.insert(src.clone());
                images.thumbnail = Some(src);
                break;
            }
        }
    }

    for sel in DETAIL_IMAGE_SELECTORS {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        for el in doc.select(&selector) {
            let Some(src) = image_src(&el) else { continue };
            if !src.starts_with("http") || seen.contains(&src) {
                continue;
            }
            let lower = src.to_lowercase();
            if EXCLUDED_IMAGE_TOKENS.iter().any(|t| lower.contains(t)) {
                continue;
            }
            seen.insert(src.clone());
            images.detail.push(src);
        }
    }

    images
}

fn image_src(el: &scraper::ElementRef<'_>) -> Option<String> {
    let src = el
        .value()
        .attr("src")
        .or_else(|| el.value().attr("data-src"))
        .or_else(|| el.value().attr("data-original"))?;
    if src.is_empty() {
        return None;
    }
    Some(urls::absolutize(src))
}

fn strip_description_heading(text: &str) -> String {
    lazy_static::lazy_static! {
        static ref HEADING: regex::Regex =
            regex::Regex::new(r"(?i)^(商品説明|상품\s*설명|Description)[：:]?\s*").unwrap();
    }
    HEADING.replace(text, "").trim().to_string()
}

fn meta_description(doc: &Html) -> Option<String> {
    let selector = Selector::parse("meta[name=\"description\"]").ok()?;
    let el = doc.select(&selector).next()?;
    let content = el.value().attr("content")?;
    if content.chars().count() > 50 {
        Some(content.to_string())
    } else {
        None
    }
}

fn json_ld_description(doc: &Html) -> Option<String> {
    let selector = Selector::parse("script[type=\"application/ld+json\"]").ok()?;
    for script in doc.select(&selector) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
            continue;
        };
        let candidates = std::iter::once(&value).chain(
            value
                .get("@graph")
                .and_then(|g| g.as_array())
                .into_iter()
                .flatten(),
        );
        for item in candidates {
            if let Some(desc) = item.get("description").and_then(|d| d.as_str()) {
                if desc.chars().count() > 50 {
                    return Some(desc.to_string());
                }
            }
        }
    }
    None
}

fn heuristic_description(doc: &Html) -> Option<String> {
    let selector = Selector::parse("div").ok()?;
    for el in doc.select(&selector) {
        let text = element_text(&el);
        if text.chars().count() < 100 {
            continue;
        }
        let head: String = text.chars().take(50).collect();
        if ["ホーム", "Home", "トップ", "Top", "メニュー", "Menu"]
            .iter()
            .any(|t| head.contains(t))
        {
            continue;
        }
        return Some(text.chars().take(2000).collect());
    }
    None
}

fn extract_search_keywords(doc: &Html) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();

    if let Ok(selector) = Selector::parse("meta[name=\"keywords\"]") {
        if let Some(el) = doc.select(&selector).next() {
            if let Some(content) = el.value().attr("content") {
                keywords.extend(content.split(',').map(|k| clean_text(k)));
            }
        }
    }
    if let Ok(selector) = Selector::parse("input[name=\"search_keyword\"]") {
        if let Some(el) = doc.select(&selector).next() {
            if let Some(value) = el.value().attr("value") {
                keywords.push(clean_text(value));
            }
        }
    }

    let mut seen = HashSet::new();
    keywords
        .into_iter()
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

fn extract_reviews(doc: &Html, page_text: &str) -> ReviewInfo {
    let mut reviews = ReviewInfo::default();

    for (sel, attr) in [
        ("meta[itemprop=\"ratingValue\"]", Some("content")),
        ("meta[property=\"product:ratingValue\"]", Some("content")),
        ("span[class*=\"rating\"]", None),
        ("span[class*=\"star\"]", None),
        ("div[class*=\"rating\"]", None),
    ] {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        if let Some(el) = doc.select(&selector).next() {
            let text = match attr {
                Some(a) => el.value().attr(a).unwrap_or_default().to_string(),
                None => element_text(&el),
            };
            // "4.6(184)" carries the count alongside the rating.
            if let Some(caps) = lexicon::RATING_WITH_COUNT.captures(&text) {
                if let Some(rating) = parse_rating(&caps[1]) {
                    reviews.rating = rating;
                    reviews.count = caps[2].parse().unwrap_or(0);
                    break;
                }
            }
            if let Some(rating) = parse_rating(&text) {
                reviews.rating = rating;
                break;
            }
        }
    }

    // "4.6(184)" style text carries both the rating and the count.
    if reviews.rating == 0.0 {
        if let Some(caps) = lexicon::RATING_WITH_COUNT.captures(page_text) {
            if let Some(rating) = parse_rating(&caps[1]) {
                reviews.rating = rating;
                reviews.count = caps[2].parse().unwrap_or(0);
            }
        }
    }

    if reviews.count == 0 {
        for sel in [
            "meta[itemprop=\"reviewCount\"]",
            "meta[property=\"product:reviewCount\"]",
        ] {
            let Ok(selector) = Selector::parse(sel) else {
                continue;
            };
            if let Some(el) = doc.select(&selector).next() {
                if let Some(count) = el
                    .value()
                    .attr("content")
                    .and_then(|c| c.trim().parse().ok())
                {
                    reviews.count = count;
                    break;
                }
            }
        }
    }
    if reviews.count == 0 {
        if let Some(caps) = lexicon::REVIEW_COUNT_PAREN.captures(page_text) {
            reviews.count = caps[1].parse().unwrap_or(0);
        }
    }

    let mut seen = HashSet::new();
    'outer: for sel in REVIEW_SAMPLE_SELECTORS {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        for el in doc.select(&selector).take(20) {
            let text = element_text(&el);
            if text.chars().count() > 10 && seen.insert(text.clone()) {
                reviews.samples.push(text);
                if reviews.samples.len() >= MAX_REVIEW_SAMPLES {
                    break 'outer;
                }
            }
        }
    }

    reviews
}

fn parse_rating(text: &str) -> Option<f64> {
    lazy_static::lazy_static! {
        static ref NUMBER: regex::Regex = regex::Regex::new(r"(\d+(?:\.\d+)?)").unwrap();
    }
    let caps = NUMBER.captures(text)?;
    let rating: f64 = caps[1].parse().ok()?;
    if (0.0..=5.0).contains(&rating) {
        Some(rating)
    } else {
        None
    }
}

fn extract_seller(doc: &Html, page_text: &str) -> SellerInfo {
    let mut seller = SellerInfo::default();

    if let Ok(selector) = Selector::parse("a[href*=\"/shop/\"]") {
        if let Some(el) = doc.select(&selector).next() {
            let href = el.value().attr("href").unwrap_or_default();
            seller.id = urls::extract_shop_slug(href);
            let name = element_text(&el);
            if !name.is_empty() {
                seller.name = Some(name);
            }
        }
    }

    seller.level = if lexicon::POWER_SELLER.is_match(page_text) {
        SellerLevel::Power
    } else if lexicon::EXCELLENT_SELLER.is_match(page_text) {
        SellerLevel::Excellent
    } else if seller.name.is_some() {
        SellerLevel::Normal
    } else {
        SellerLevel::Unknown
    };

    seller
}

fn extract_shipping(doc: &Html) -> ShippingInfo {
    let mut shipping = ShippingInfo::default();

    if let Some(block) = smallest_matching_block(doc, &lexicon::SHIPPING_LABEL) {
        if lexicon::FREE_SHIPPING.is_match(&block) {
            shipping.free = true;
            shipping.fee = Some(0);
        } else if let Some(caps) = lexicon::SHIPPING_FEE.captures(&block) {
            shipping.fee = lexicon::parse_price(&caps[1]);
        } else {
            shipping.fee = lexicon::parse_price(&block);
        }
    }

    if let Some(block) = smallest_matching_block(doc, &lexicon::RETURN_LABEL) {
        shipping.return_policy = if lexicon::FREE_RETURN.is_match(&block) {
            ReturnPolicy::FreeReturn
        } else {
            ReturnPolicy::ReturnAvailable
        };
    }

    shipping
}

fn extract_points(doc: &Html) -> PointsInfo {
    let mut points = PointsInfo::default();
    let Some(block) = smallest_matching_block(doc, &lexicon::POINTS_LABEL) else {
        return points;
    };

    points.receive_confirm = lexicon::POINTS_RECEIVE
        .captures(&block)
        .and_then(|caps| caps[1].parse().ok());
    points.review_bonus = lexicon::POINTS_REVIEW
        .captures(&block)
        .and_then(|caps| caps[1].parse().ok());
    points.max = lexicon::POINTS_MAX
        .captures(&block)
        .and_then(|caps| caps[1].parse().ok());
    points.auto = lexicon::POINTS_AUTO
        .captures(&block)
        .and_then(|caps| caps[1].parse().ok());

    points
}

fn extract_coupon(doc: &Html) -> CouponInfo {
    let mut coupon = CouponInfo::default();
    let Some(block) = smallest_matching_block(doc, &lexicon::COUPON_LABEL) else {
        return coupon;
    };

    coupon.present = true;
    coupon.max_discount = lexicon::COUPON_DISCOUNT
        .captures(&block)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .and_then(|m| m.as_str().parse().ok());
    coupon.kind = if lexicon::COUPON_FAVORITE.is_match(&block) {
        CouponKind::Favorite
    } else if lexicon::COUPON_PASSWORD.is_match(&block) {
        CouponKind::Password
    } else {
        CouponKind::Auto
    };

    coupon
}

fn extract_promoted(doc: &Html, page_text: &str) -> bool {
    if let Ok(selector) = Selector::parse("a[href*=\"/move/\"]") {
        if doc.select(&selector).next().is_some() {
            return true;
        }
    }
    lexicon::PROMOTED_BADGE.is_match(page_text)
}
