//! Marketplace URL handling
//!
//! Product pages reach us in at least four shapes (query param, short path,
//! long path, legacy aspx). All of them canonicalize to the Goods.aspx form
//! keyed by the numeric goods code, so repeated submissions of any variant
//! land on the same record.

use crate::models::UrlKind;
use lazy_static::lazy_static;
use regex::Regex;

pub const BASE_URL: &str = "https://www.qoo10.jp";

lazy_static! {
    static ref CODE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)goodscode=(\d+)").unwrap(),
        Regex::new(r"(?i)/g/(\d+)").unwrap(),
        Regex::new(r"(?i)/item/[^/]+/(\d+)").unwrap(),
    ];
    static ref SHOP_SLUG_PATH: Regex = Regex::new(r"(?i)/shop/([^/?#]+)").unwrap();
    static ref SHOP_SLUG_PARAM: Regex = Regex::new(r"(?i)shop_?id=([^&#]+)").unwrap();
}

const VALID_HOSTS: &[&str] = &["qoo10.jp", "qoo10.com", "www.qoo10.jp", "www.qoo10.com"];

const PRODUCT_PATTERNS: &[&str] = &[
    "/goods/goods.aspx",
    "/goods/",
    "/g/",
    "/item/",
    "goodscode=",
    "gmkt.inc/goods",
];

const SHOP_PATTERNS: &[&str] = &["/shop/", "shopid=", "shop_id="];

/// Whether the URL points at the target marketplace at all.
pub fn is_marketplace_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => parsed
            .host_str()
            .map(|h| VALID_HOSTS.contains(&h.to_lowercase().as_str()))
            .unwrap_or(false),
        Err(_) => false,
    }
}

/// Classify a URL as product, shop or unknown.
pub fn detect_url_kind(url: &str) -> UrlKind {
    let lower = url.to_lowercase();

    for pattern in PRODUCT_PATTERNS {
        if lower.contains(pattern) {
            return UrlKind::Product;
        }
    }
    for pattern in SHOP_PATTERNS {
        if lower.contains(pattern) {
            return UrlKind::Shop;
        }
    }
    UrlKind::Unknown
}

/// Numeric goods code from any supported product URL shape.
pub fn extract_product_code(url: &str) -> Option<String> {
    for pattern in CODE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(url) {
            return Some(caps[1].to_string());
        }
    }
    None
}

pub fn canonical_product_url(code: &str) -> String {
    format!("{}/gmkt.inc/Goods/Goods.aspx?goodscode={}", BASE_URL, code)
}

/// Map any product URL variant to the canonical form. URLs without a
/// recognizable code pass through unchanged; the function is idempotent.
pub fn normalize_product_url(url: &str) -> String {
    match extract_product_code(url) {
        Some(code) => canonical_product_url(&code),
        None => url.to_string(),
    }
}

/// Shop slug from a path segment or query param.
pub fn extract_shop_slug(url: &str) -> Option<String> {
    if let Some(caps) = SHOP_SLUG_PATH.captures(url) {
        return Some(caps[1].to_string());
    }
    SHOP_SLUG_PARAM.captures(url).map(|caps| caps[1].to_string())
}

/// Resolve a possibly relative image/link URL against the marketplace base.
pub fn absolutize(src: &str) -> String {
    if src.starts_with("//") {
        format!("https:{}", src)
    } else if src.starts_with('/') {
        format!("{}{}", BASE_URL, src)
    } else {
        src.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_product_variants_share_one_code() {
        let variants = [
            "https://www.qoo10.jp/gmkt.inc/Goods/Goods.aspx?goodscode=1234",
            "https://www.qoo10.jp/g/1234",
            "https://www.qoo10.jp/item/some-slug/1234",
            "https://www.qoo10.jp/item/some-slug/1234?banner=1",
        ];
        for url in variants {
            assert_eq!(extract_product_code(url).as_deref(), Some("1234"), "{url}");
            assert_eq!(
                normalize_product_url(url),
                "https://www.qoo10.jp/gmkt.inc/Goods/Goods.aspx?goodscode=1234"
            );
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_product_url("https://www.qoo10.jp/g/1093098159");
        let twice = normalize_product_url(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn kind_detection_table() {
        assert_eq!(
            detect_url_kind("https://www.qoo10.jp/g/1093098159"),
            UrlKind::Product
        );
        assert_eq!(
            detect_url_kind("https://www.qoo10.jp/gmkt.inc/Goods/Goods.aspx?goodscode=1"),
            UrlKind::Product
        );
        assert_eq!(
            detect_url_kind("https://www.qoo10.jp/shop/my-cosme-shop"),
            UrlKind::Shop
        );
        assert_eq!(
            detect_url_kind("https://www.qoo10.jp/somewhere?shop_id=abc"),
            UrlKind::Shop
        );
        assert_eq!(detect_url_kind("https://www.qoo10.jp/event/summer"), UrlKind::Unknown);
    }

    #[test]
    fn host_validation_rejects_foreign_domains() {
        assert!(is_marketplace_url("https://www.qoo10.jp/g/1"));
        assert!(is_marketplace_url("https://qoo10.com/g/1"));
        assert!(!is_marketplace_url("https://example.com/g/1"));
        assert!(!is_marketplace_url("not a url"));
    }

    #[test]
    fn shop_slug_from_path_and_param() {
        assert_eq!(
            extract_shop_slug("https://www.qoo10.jp/shop/beauty-lab?tab=all").as_deref(),
            Some("beauty-lab")
        );
        assert_eq!(
            extract_shop_slug("https://www.qoo10.jp/x?shopid=beauty-lab").as_deref(),
            Some("beauty-lab")
        );
    }

    #[test]
    fn absolutize_handles_all_shapes() {
        assert_eq!(
            absolutize("//img.qoo10.jp/a.jpg"),
            "https://img.qoo10.jp/a.jpg"
        );
        assert_eq!(absolutize("/goods/a.jpg"), "https://www.qoo10.jp/goods/a.jpg");
        assert_eq!(absolutize("https://cdn.example/a.jpg"), "https://cdn.example/a.jpg");
    }
}
