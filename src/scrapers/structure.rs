//! Page structure fingerprinting
//!
//! A single linear scan over the page's div elements buckets every class name
//! by keyword into coarse key-element categories and finer semantic fields.
//! The fingerprint feeds the structure analyzer, the checklist's structure
//! mapping and the chunk feedback loop.

use crate::models::{ClassFreq, PageStructure};
use scraper::{Html, Selector};
use std::collections::HashMap;

const DIV_SCAN_LIMIT: usize = 1000;
const MAX_CLASSES: usize = 500;
const TOP_PER_BUCKET: usize = 20;

/// Coarse buckets keyed the way downstream consumers look them up.
const KEY_PATTERNS: &[(&str, &[&str])] = &[
    (
        "product_info",
        &["product", "goods", "item", "detail", "info", "name", "title"],
    ),
    (
        "price_info",
        &["price", "cost", "discount", "sale", "original", "prc"],
    ),
    (
        "image_info",
        &["image", "img", "photo", "thumbnail", "thmb", "picture"],
    ),
    (
        "review_info",
        &["review", "rating", "star", "comment", "evaluation"],
    ),
    (
        "seller_info",
        &["shop", "seller", "store", "vendor", "merchant"],
    ),
    (
        "shipping_info",
        &["shipping", "delivery", "ship", "配送", "送料"],
    ),
    ("coupon_info", &["coupon", "discount", "割引", "クーポン"]),
    ("points_info", &["qpoint", "point", "ポイント"]),
];

/// Finer per-field buckets.
const SEMANTIC_PATTERNS: &[(&str, &[&str])] = &[
    ("name", &["name", "title", "goods_name", "product_name"]),
    ("price", &["price", "prc", "cost"]),
    ("image", &["image", "img", "photo", "thmb", "thumbnail"]),
    ("description", &["description", "detail", "content"]),
    ("review", &["review", "rating", "star", "comment"]),
    ("seller", &["shop", "seller", "store"]),
    ("shipping", &["shipping", "ship", "delivery", "配送", "送料"]),
    ("coupon", &["coupon", "割引", "クーポン", "discount"]),
    ("points", &["qpoint", "point", "ポイント"]),
];

pub fn extract_page_structure(doc: &Html) -> PageStructure {
    let div_selector = Selector::parse("div").expect("static selector");

    let mut class_frequency: HashMap<String, u32> = HashMap::new();
    for div in doc.select(&div_selector).take(DIV_SCAN_LIMIT) {
        for cls in div.value().classes() {
            if cls.is_empty() {
                continue;
            }
            *class_frequency.entry(cls.to_string()).or_insert(0) += 1;
        }
    }

    let mut all_classes: Vec<String> = class_frequency.keys().cloned().collect();
    all_classes.sort();
    all_classes.truncate(MAX_CLASSES);

    let key_elements = bucket_classes(&class_frequency, KEY_PATTERNS);
    let semantic_structure = bucket_classes(&class_frequency, SEMANTIC_PATTERNS);

    PageStructure {
        all_classes,
        class_frequency,
        key_elements,
        semantic_structure,
    }
}

fn bucket_classes(
    class_frequency: &HashMap<String, u32>,
    patterns: &[(&str, &[&str])],
) -> HashMap<String, Vec<ClassFreq>> {
    let mut buckets: HashMap<String, Vec<ClassFreq>> = HashMap::new();

    for (bucket, keywords) in patterns {
        let mut entries: Vec<ClassFreq> = class_frequency
            .iter()
            .filter(|(cls, _)| {
                let lower = cls.to_lowercase();
                keywords.iter().any(|kw| lower.contains(kw))
            })
            .map(|(cls, freq)| ClassFreq {
                class: cls.clone(),
                frequency: *freq,
            })
            .collect();

        if entries.is_empty() {
            continue;
        }
        entries.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.class.cmp(&b.class))
        });
        entries.truncate(TOP_PER_BUCKET);
        buckets.insert(bucket.to_string(), entries);
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_classes_by_keyword() {
        let html = r#"
            <html><body>
                <div class="goods_name_wrap"><div class="goods_price">100円</div></div>
                <div class="goods_price"></div>
                <div class="review_list"></div>
                <div class="unrelated_nav"></div>
            </body></html>
        "#;
        let doc = Html::parse_document(html);
        let structure = extract_page_structure(&doc);

        assert_eq!(structure.class_frequency["goods_price"], 2);
        assert!(structure
            .semantic_structure
            .get("price")
            .unwrap()
            .iter()
            .any(|e| e.class == "goods_price"));
        assert!(structure
            .semantic_structure
            .get("review")
            .unwrap()
            .iter()
            .any(|e| e.class == "review_list"));
        assert!(structure.semantic_structure.get("coupon").is_none());
        assert!(structure.all_classes.contains(&"unrelated_nav".to_string()));
    }

    #[test]
    fn price_bucket_ranks_by_frequency() {
        let html = r#"
            <div class="prc_a"></div><div class="prc_a"></div><div class="prc_a"></div>
            <div class="price_b"></div>
        "#;
        let doc = Html::parse_document(html);
        let structure = extract_page_structure(&doc);
        let price = structure.semantic_structure.get("price").unwrap();
        assert_eq!(price[0].class, "prc_a");
        assert_eq!(price[0].frequency, 3);
    }
}
