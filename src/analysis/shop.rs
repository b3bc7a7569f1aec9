//! Shop analyzer
//!
//! Same shape as the product analyzer but over the shop record: follower
//! base, catalog size, category spread and coupon activity, averaged into an
//! overall score.

use crate::models::{ShopAnalyzerResult, ShopDimension, ShopRecord};

pub struct ShopAnalyzer;

impl ShopAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, record: &ShopRecord) -> ShopAnalyzerResult {
        let followers = analyze_followers(record);
        let products = analyze_products(record);
        let categories = analyze_categories(record);
        let coupons = analyze_coupons(record);

        let overall = (followers.score as u32
            + products.score as u32
            + categories.score as u32
            + coupons.score as u32)
            / 4;

        ShopAnalyzerResult {
            overall_score: overall as u8,
            shop_name: record.name.clone(),
            followers,
            products,
            categories,
            coupons,
        }
    }
}

impl Default for ShopAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn analyze_followers(record: &ShopRecord) -> ShopDimension {
    let mut dim = ShopDimension::default();
    dim.score = match record.follower_count {
        n if n >= 10_000 => 100,
        n if n >= 1_000 => 80,
        n if n >= 100 => 60,
        n if n > 0 => 40,
        _ => 20,
    };
    if record.follower_count < 1_000 {
        dim.recommendations
            .push("팔로워 확보 이벤트(즐겨찾기 쿠폰 등)를 활용해보세요".to_string());
    } else {
        dim.findings
            .push(format!("팔로워 {}명의 고객 기반을 보유하고 있습니다", record.follower_count));
    }
    dim
}

fn analyze_products(record: &ShopRecord) -> ShopDimension {
    let mut dim = ShopDimension::default();
    dim.score = match record.product_count {
        n if n >= 100 => 100,
        n if n >= 50 => 85,
        n if n >= 20 => 70,
        n if n >= 10 => 50,
        _ => 30,
    };
    if record.product_count < 20 {
        dim.recommendations
            .push("상품 수가 적습니다. 20개 이상 등록을 권장합니다".to_string());
    }
    dim
}

fn analyze_categories(record: &ShopRecord) -> ShopDimension {
    let mut dim = ShopDimension::default();
    let count = record.categories.len();
    dim.score = match count {
        n if n >= 5 => 100,
        n if n >= 3 => 80,
        n if n >= 2 => 60,
        1 => 40,
        _ => 20,
    };
    if count < 3 {
        dim.recommendations
            .push("카테고리를 다양화하면 노출 기회가 늘어납니다".to_string());
    }
    dim
}

fn analyze_coupons(record: &ShopRecord) -> ShopDimension {
    let mut dim = ShopDimension::default();
    if record.coupons.is_empty() {
        dim.score = 30;
        dim.recommendations
            .push("샵 쿠폰을 설정하면 구매 전환율이 올라갑니다".to_string());
    } else {
        dim.score = 90;
        dim.findings
            .push(format!("{}종의 쿠폰이 운영 중입니다", record.coupons.len()));
    }
    dim
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CouponKind, DataSource, ShopCoupon};
    use std::collections::BTreeMap;

    fn record() -> ShopRecord {
        let mut categories = BTreeMap::new();
        categories.insert("スキンケア".to_string(), 24);
        categories.insert("メイクアップ".to_string(), 24);
        categories.insert("ヘアケア".to_string(), 10);
        ShopRecord {
            url: "https://www.qoo10.jp/shop/beauty-lab".to_string(),
            id: "beauty-lab".to_string(),
            name: "ビューティーラボ".to_string(),
            level: Some("power".to_string()),
            follower_count: 12_345,
            product_count: 58,
            categories,
            products: vec![],
            coupons: vec![ShopCoupon {
                title: "최대500엔 할인".to_string(),
                discount: Some(500),
                kind: CouponKind::Favorite,
            }],
            source: DataSource::JsRender,
            page_structure: None,
        }
    }

    #[test]
    fn healthy_shop_scores_high() {
        let result = ShopAnalyzer::new().analyze(&record());
        assert_eq!(result.followers.score, 100);
        assert_eq!(result.products.score, 85);
        assert_eq!(result.categories.score, 80);
        assert_eq!(result.coupons.score, 90);
        assert_eq!(result.overall_score, 88);
    }

    #[test]
    fn empty_shop_collects_recommendations() {
        let mut r = record();
        r.follower_count = 0;
        r.product_count = 3;
        r.categories.clear();
        r.coupons.clear();
        let result = ShopAnalyzer::new().analyze(&r);
        assert!(result.overall_score < 40);
        assert!(!result.followers.recommendations.is_empty());
        assert!(!result.products.recommendations.is_empty());
        assert!(!result.categories.recommendations.is_empty());
        assert!(!result.coupons.recommendations.is_empty());
    }
}
