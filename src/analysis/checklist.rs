//! Checklist evaluator
//!
//! A fixed catalog of checkable items across four categories. Auto items are
//! bound to evaluator function values (no dispatch by string); manual items
//! always surface for the seller to confirm. Each auto evaluator runs under
//! a soft timeout so one slow check cannot stall the stage.

use crate::models::{
    AnalyzerResult, ChecklistCategoryOutcome, ChecklistItemOutcome, ChecklistOutcome, Confidence,
    ItemStatus, PageStructure, ProductRecord, ShopRecord, StructureMapping,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio::time::timeout;
use tracing::warn;

pub const EVALUATOR_TIMEOUT: Duration = Duration::from_secs(5);

/// Inputs shared by every evaluator. Owned so checks can run on the blocking
/// pool under a timeout.
#[derive(Debug, Default)]
pub struct EvalData {
    pub product: Option<ProductRecord>,
    pub shop: Option<ShopRecord>,
    pub analysis: Option<AnalyzerResult>,
    pub structure: Option<PageStructure>,
}

#[derive(Debug, Clone)]
pub struct EvalVerdict {
    pub passed: bool,
    pub recommendation: Option<String>,
}

impl EvalVerdict {
    fn pass(recommendation: impl Into<String>) -> Self {
        Self {
            passed: true,
            recommendation: Some(recommendation.into()),
        }
    }

    fn fail(recommendation: impl Into<String>) -> Self {
        Self {
            passed: false,
            recommendation: Some(recommendation.into()),
        }
    }
}

pub type EvaluatorFn = fn(&EvalData) -> EvalVerdict;

pub struct ItemDef {
    pub id: &'static str,
    pub title: &'static str,
    pub evaluator: Option<EvaluatorFn>,
    /// Logical field used for the structure mapping and confidence lookup.
    pub structure_field: Option<&'static str>,
}

pub struct CategoryDef {
    pub name: &'static str,
    pub items: Vec<ItemDef>,
}

fn item(
    id: &'static str,
    title: &'static str,
    evaluator: EvaluatorFn,
    structure_field: Option<&'static str>,
) -> ItemDef {
    ItemDef {
        id,
        title,
        evaluator: Some(evaluator),
        structure_field,
    }
}

fn manual(id: &'static str, title: &'static str) -> ItemDef {
    ItemDef {
        id,
        title,
        evaluator: None,
        structure_field: None,
    }
}

/// The fixed catalog. Order matters for presentation only.
pub fn catalog() -> Vec<CategoryDef> {
    vec![
        CategoryDef {
            name: "판매 준비",
            items: vec![
                item("item_001", "상품 등록 완료", check_product_registered, Some("name")),
                item("item_002", "검색어 설정 완료", check_search_keywords, None),
                item("item_003", "카테고리 및 브랜드 등록 완료", check_category_brand, None),
                item("item_004", "가격 설정 완료", check_price_set, Some("price")),
                item("item_005", "배송 정보 설정 완료", check_shipping_info, Some("shipping")),
                manual("item_006", "재고 관리 설정 완료"),
                item("item_006b", "포인트 정보 설정", check_points_info, Some("points")),
                item("item_006c", "반품 정책 명시", check_return_policy, Some("shipping")),
                item("item_006d", "MOVE 상품 등록 (해당 시)", check_promoted_listing, None),
            ],
        },
        CategoryDef {
            name: "매출 증대",
            items: vec![
                item("item_007", "상품 페이지 최적화", check_page_optimization, Some("image")),
                item("item_008", "검색 키워드 최적화", check_keyword_optimization, None),
                item("item_009", "가격 전략 수립", check_price_strategy, Some("price")),
                manual("item_010", "고객 리뷰 관리"),
                item("item_011", "프로모션 활용", check_promotion, Some("coupon")),
                item("item_011b", "쿠폰 상세 정보 제공", check_coupon_detail, Some("coupon")),
                manual("item_012", "광고 전략 수립"),
                manual("item_013", "배송 옵션 다양화"),
                manual("item_014", "고객 서비스 개선"),
                manual("item_015", "데이터 분석 기반 의사결정"),
                manual("item_016", "지속적인 개선 및 테스트"),
            ],
        },
        CategoryDef {
            name: "Shop 운영",
            items: vec![
                item("item_016b", "Shop 레벨 최적화", check_shop_level, Some("seller")),
                item("item_016c", "Shop 팔로워 수 관리", check_shop_followers, Some("seller")),
                item("item_016d", "Shop 상품 다양성", check_shop_product_diversity, None),
            ],
        },
        CategoryDef {
            name: "광고/프로모션",
            items: vec![
                manual("item_017", "파워랭크업 광고 활용"),
                manual("item_018", "스마트세일즈 광고 활용"),
                manual("item_019", "플러스 전시 광고 활용"),
                manual("item_020", "키워드 플러스 광고 활용"),
                item("item_021", "샵 쿠폰 설정", check_shop_coupon, Some("coupon")),
                item("item_022", "상품 할인 설정", check_product_discount, Some("price")),
                item("item_023", "샘플마켓 참가 (가능한 경우)", check_sample_market, None),
                manual("item_024", "메가할인 이벤트 대비 준비"),
            ],
        },
    ]
}

pub struct ChecklistEvaluator {
    evaluator_timeout: Duration,
}

impl ChecklistEvaluator {
    pub fn new() -> Self {
        Self {
            evaluator_timeout: EVALUATOR_TIMEOUT,
        }
    }

    /// Same evaluator with a custom per-item timeout.
    pub fn with_timeout(evaluator_timeout: Duration) -> Self {
        Self { evaluator_timeout }
    }

    pub async fn evaluate(&self, data: Arc<EvalData>) -> ChecklistOutcome {
        self.evaluate_catalog(catalog(), data).await
    }

    pub async fn evaluate_catalog(
        &self,
        catalog: Vec<CategoryDef>,
        data: Arc<EvalData>,
    ) -> ChecklistOutcome {
        let mut categories = Vec::with_capacity(catalog.len());
        let mut total_items = 0u32;
        let mut total_completed = 0u32;

        for category_def in catalog {
            let mut items = Vec::with_capacity(category_def.items.len());
            let mut completed = 0u32;

            for item_def in category_def.items {
                let outcome = self.evaluate_item(&item_def, &data).await;
                if outcome.status == ItemStatus::Completed {
                    completed += 1;
                }
                items.push(outcome);
            }

            total_items += items.len() as u32;
            total_completed += completed;
            categories.push(ChecklistCategoryOutcome {
                name: category_def.name.to_string(),
                completion: percent(completed, items.len() as u32),
                items,
            });
        }

        ChecklistOutcome {
            overall_completion: percent(total_completed, total_items),
            categories,
        }
    }

    async fn evaluate_item(&self, def: &ItemDef, data: &Arc<EvalData>) -> ChecklistItemOutcome {
        let structure_mapping = def
            .structure_field
            .and_then(|field| mapping_for(data.structure.as_ref(), field));

        let Some(evaluator) = def.evaluator else {
            return ChecklistItemOutcome {
                id: def.id.to_string(),
                title: def.title.to_string(),
                status: ItemStatus::Manual,
                auto_checked: false,
                recommendation: None,
                confidence: Confidence::Unknown,
                structure_mapping,
            };
        };

        let shared = data.clone();
        let task = task::spawn_blocking(move || evaluator(&shared));
        let verdict = match timeout(self.evaluator_timeout, task).await {
            Ok(Ok(verdict)) => Some(verdict),
            Ok(Err(e)) => {
                warn!("checklist evaluator {} panicked: {}", def.id, e);
                None
            }
            Err(_) => {
                warn!("checklist evaluator {} timed out", def.id);
                None
            }
        };

        let confidence = confidence_for(def, data, &structure_mapping);
        match verdict {
            Some(verdict) => ChecklistItemOutcome {
                id: def.id.to_string(),
                title: def.title.to_string(),
                status: if verdict.passed {
                    ItemStatus::Completed
                } else {
                    ItemStatus::Pending
                },
                auto_checked: true,
                recommendation: verdict.recommendation,
                confidence,
                structure_mapping,
            },
            None => ChecklistItemOutcome {
                id: def.id.to_string(),
                title: def.title.to_string(),
                status: ItemStatus::Pending,
                auto_checked: true,
                recommendation: Some("평가 시간 초과로 건너뛰었습니다".to_string()),
                confidence: Confidence::Low,
                structure_mapping,
            },
        }
    }
}

impl Default for ChecklistEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(part: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as u8
}

fn mapping_for(structure: Option<&PageStructure>, field: &str) -> Option<StructureMapping> {
    let structure = structure?;
    let related_classes = structure.related_classes(field);
    Some(StructureMapping {
        element_present: !related_classes.is_empty(),
        class_frequency: related_classes
            .iter()
            .filter_map(|cls| structure.class_frequency.get(cls).map(|f| (cls.clone(), *f)))
            .collect(),
        related_classes,
    })
}

fn confidence_for(
    def: &ItemDef,
    data: &EvalData,
    structure_mapping: &Option<StructureMapping>,
) -> Confidence {
    if data.product.is_none() && data.shop.is_none() {
        return Confidence::Low;
    }

    // A structure lookup that found nothing means the page shape is unknown
    // for this field.
    if def.structure_field.is_some() {
        match structure_mapping {
            Some(mapping) if mapping.element_present => {}
            _ => return Confidence::Medium,
        }
    }

    let complete = match (&data.product, &data.shop) {
        (Some(p), _) => !p.name.is_empty() && p.price.sale.is_some(),
        (None, Some(s)) => !s.name.is_empty(),
        (None, None) => false,
    };
    if complete {
        Confidence::High
    } else {
        Confidence::Medium
    }
}

// ---------------------------------------------------------------------------
// Evaluators
// ---------------------------------------------------------------------------

fn check_product_registered(data: &EvalData) -> EvalVerdict {
    let Some(product) = &data.product else {
        return EvalVerdict::fail("상품 정보가 없습니다");
    };
    let has_name = !product.name.is_empty();
    let has_description = !product.description.is_empty();
    let has_image = product.images.thumbnail.is_some() || !product.images.detail.is_empty();
    if has_name && has_description && has_image {
        EvalVerdict::pass("상품 기본 정보가 모두 등록되어 있습니다")
    } else {
        let mut missing = Vec::new();
        if !has_name {
            missing.push("상품명");
        }
        if !has_description {
            missing.push("설명");
        }
        if !has_image {
            missing.push("이미지");
        }
        EvalVerdict::fail(format!("누락된 항목: {}", missing.join(", ")))
    }
}

fn check_search_keywords(data: &EvalData) -> EvalVerdict {
    match &data.product {
        Some(p) if !p.search_keywords.is_empty() => {
            EvalVerdict::pass(format!("검색어 {}개가 설정되어 있습니다", p.search_keywords.len()))
        }
        _ => EvalVerdict::fail("검색어 필드에 키워드를 입력해주세요"),
    }
}

fn check_category_brand(data: &EvalData) -> EvalVerdict {
    let Some(product) = &data.product else {
        return EvalVerdict::fail("상품 정보가 없습니다");
    };
    let has_category = product
        .category
        .as_deref()
        .map(|c| !c.is_empty())
        .unwrap_or(false);
    let has_brand = product.brand.as_deref().map(|b| !b.is_empty()).unwrap_or(false);
    match (has_category, has_brand) {
        (true, true) => EvalVerdict::pass("카테고리 및 브랜드 등록 완료"),
        (false, true) => EvalVerdict::fail("카테고리를 등록해주세요"),
        (true, false) => EvalVerdict::fail("브랜드를 등록해주세요"),
        (false, false) => EvalVerdict::fail("카테고리와 브랜드를 모두 등록해주세요"),
    }
}

fn check_price_set(data: &EvalData) -> EvalVerdict {
    let Some(product) = &data.product else {
        return EvalVerdict::fail("상품 정보가 없습니다");
    };
    match product.price.sale {
        Some(sale) => {
            if product.price.original.is_some() {
                EvalVerdict::pass(format!("판매가 {}엔, 정가 및 할인율 설정 완료", sale))
            } else {
                EvalVerdict::pass(format!("판매가 {}엔 설정 완료 (정가 미설정)", sale))
            }
        }
        None => EvalVerdict::fail("판매가를 확인할 수 없습니다"),
    }
}

fn check_shipping_info(data: &EvalData) -> EvalVerdict {
    match &data.product {
        Some(p) if p.shipping.has_data() => EvalVerdict::pass("배송 정보가 표시되어 있습니다"),
        Some(_) => EvalVerdict::fail("배송비/배송 방법 정보를 명시해주세요"),
        None => EvalVerdict::fail("상품 정보가 없습니다"),
    }
}

fn check_points_info(data: &EvalData) -> EvalVerdict {
    match &data.product {
        Some(p) if p.points.has_data() => {
            EvalVerdict::pass("포인트 획득 방법이 안내되어 있습니다")
        }
        Some(_) => EvalVerdict::fail("포인트 획득 안내를 추가하면 구매 혜택이 명확해집니다"),
        None => EvalVerdict::fail("상품 정보가 없습니다"),
    }
}

fn check_return_policy(data: &EvalData) -> EvalVerdict {
    use crate::models::ReturnPolicy;
    match &data.product {
        Some(p) => match p.shipping.return_policy {
            ReturnPolicy::FreeReturn => EvalVerdict::pass("무료 반품 서비스가 표시되어 있습니다"),
            ReturnPolicy::ReturnAvailable => EvalVerdict::pass("반품 정책이 명시되어 있습니다"),
            ReturnPolicy::None => EvalVerdict::fail("반품 정책을 명시해주세요"),
        },
        None => EvalVerdict::fail("상품 정보가 없습니다"),
    }
}

fn check_promoted_listing(data: &EvalData) -> EvalVerdict {
    match &data.product {
        Some(p) if p.is_promoted => EvalVerdict::pass("MOVE 상품으로 등록되어 있습니다"),
        Some(_) => EvalVerdict::fail("해당 시 MOVE 상품 등록으로 추가 노출을 확보할 수 있습니다"),
        None => EvalVerdict::fail("상품 정보가 없습니다"),
    }
}

fn check_page_optimization(data: &EvalData) -> EvalVerdict {
    let Some(product) = &data.product else {
        return EvalVerdict::fail("상품 정보가 없습니다");
    };
    let enough_images = product.images.detail.len() >= 3;
    let enough_description = product.description.chars().count() >= 300;
    if enough_images && enough_description {
        EvalVerdict::pass("이미지와 설명 완성도가 양호합니다")
    } else if !enough_images {
        EvalVerdict::fail("상세 이미지를 3장 이상 등록해주세요")
    } else {
        EvalVerdict::fail("상품 설명을 300자 이상으로 보강해주세요")
    }
}

fn check_keyword_optimization(data: &EvalData) -> EvalVerdict {
    let Some(product) = &data.product else {
        return EvalVerdict::fail("상품 정보가 없습니다");
    };
    let keyword_in_name = product
        .search_keywords
        .iter()
        .any(|k| !k.is_empty() && product.name.contains(k.as_str()));
    if keyword_in_name {
        EvalVerdict::pass("상품명에 검색 키워드가 반영되어 있습니다")
    } else {
        EvalVerdict::fail("상품명에 주력 키워드를 포함해주세요")
    }
}

fn check_price_strategy(data: &EvalData) -> EvalVerdict {
    let Some(product) = &data.product else {
        return EvalVerdict::fail("상품 정보가 없습니다");
    };
    let discount_ok = (1..=50).contains(&product.price.discount_rate);
    let psych = product
        .price
        .sale
        .map(|s| s % 1000 < 100)
        .unwrap_or(false);
    if discount_ok || psych {
        EvalVerdict::pass("가격 전략(할인/심리적 가격)이 적용되어 있습니다")
    } else {
        EvalVerdict::fail("할인율 10~30% 구간 또는 심리적 가격 설정을 검토해주세요")
    }
}

fn check_promotion(data: &EvalData) -> EvalVerdict {
    let Some(product) = &data.product else {
        return EvalVerdict::fail("상품 정보가 없습니다");
    };
    if product.coupon.present || product.price.discount_rate > 0 {
        EvalVerdict::pass("쿠폰 또는 할인이 운영 중입니다")
    } else {
        EvalVerdict::fail("쿠폰/할인 등 프로모션을 활용해주세요")
    }
}

fn check_coupon_detail(data: &EvalData) -> EvalVerdict {
    let Some(product) = &data.product else {
        return EvalVerdict::fail("상품 정보가 없습니다");
    };
    if !product.coupon.present {
        EvalVerdict::fail("운영 중인 쿠폰이 없습니다")
    } else if product.coupon.max_discount.is_some() {
        EvalVerdict::pass("쿠폰 할인 정보가 명확히 표시되어 있습니다")
    } else {
        EvalVerdict::fail("쿠폰 할인 금액을 명확히 표시해주세요")
    }
}

fn check_shop_level(data: &EvalData) -> EvalVerdict {
    use crate::models::SellerLevel;
    let level_ok = match (&data.shop, &data.product) {
        (Some(shop), _) => shop
            .level
            .as_deref()
            .map(|l| l == "power" || l == "excellent")
            .unwrap_or(false),
        (None, Some(product)) => {
            matches!(product.seller.level, SellerLevel::Power | SellerLevel::Excellent)
        }
        (None, None) => false,
    };
    if level_ok {
        EvalVerdict::pass("POWER/우수 셀러 등급을 유지하고 있습니다")
    } else {
        EvalVerdict::fail("셀러 등급 상향으로 정산 리드타임을 단축할 수 있습니다")
    }
}

fn check_shop_followers(data: &EvalData) -> EvalVerdict {
    match &data.shop {
        Some(shop) if shop.follower_count >= 100 => {
            EvalVerdict::pass(format!("팔로워 {}명을 확보하고 있습니다", shop.follower_count))
        }
        Some(_) => EvalVerdict::fail("팔로워가 적습니다. 즐겨찾기 쿠폰을 활용해보세요"),
        None => EvalVerdict::fail("Shop 정보가 없어 확인할 수 없습니다"),
    }
}

fn check_shop_product_diversity(data: &EvalData) -> EvalVerdict {
    match &data.shop {
        Some(shop) if shop.product_count >= 20 && shop.categories.len() >= 3 => {
            EvalVerdict::pass(format!(
                "상품 {}개, 카테고리 {}개로 구색이 다양합니다",
                shop.product_count,
                shop.categories.len()
            ))
        }
        Some(_) => EvalVerdict::fail("상품 수 20개 이상, 카테고리 3개 이상을 권장합니다"),
        None => EvalVerdict::fail("Shop 정보가 없어 확인할 수 없습니다"),
    }
}

fn check_shop_coupon(data: &EvalData) -> EvalVerdict {
    let has_coupon = data
        .shop
        .as_ref()
        .map(|s| !s.coupons.is_empty())
        .unwrap_or(false)
        || data
            .product
            .as_ref()
            .map(|p| p.coupon.present)
            .unwrap_or(false);
    if has_coupon {
        EvalVerdict::pass("샵 쿠폰이 설정되어 있습니다")
    } else {
        EvalVerdict::fail("할인 쿠폰을 생성해주세요")
    }
}

fn check_product_discount(data: &EvalData) -> EvalVerdict {
    match &data.product {
        Some(p) if p.price.discount_rate > 0 => {
            EvalVerdict::pass(format!("할인율 {}%가 설정되어 있습니다", p.price.discount_rate))
        }
        Some(_) => EvalVerdict::fail("상품 할인율을 설정해주세요"),
        None => EvalVerdict::fail("상품 정보가 없습니다"),
    }
}

fn check_sample_market(data: &EvalData) -> EvalVerdict {
    match &data.shop {
        Some(shop) if shop.product_count >= 10 => {
            EvalVerdict::pass("샘플마켓 참가 조건(상품 10개 이상)을 충족합니다")
        }
        Some(_) => EvalVerdict::fail("상품 10개 이상 등록 후 샘플마켓 참가를 검토해주세요"),
        None => EvalVerdict::fail("Shop 정보가 없어 확인할 수 없습니다"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataSource, ImageInfo, PriceInfo};

    fn product() -> ProductRecord {
        ProductRecord {
            url: "u".to_string(),
            code: "1".to_string(),
            name: "ビタミンC セラム".to_string(),
            category: Some("ビューティー".to_string()),
            brand: Some("LabB".to_string()),
            price: PriceInfo {
                sale: Some(4980),
                original: Some(5980),
                discount_rate: 17,
                coupon_discount: None,
            },
            images: ImageInfo {
                thumbnail: Some("https://img/t.jpg".to_string()),
                detail: (0..4).map(|i| format!("https://img/{}.jpg", i)).collect(),
            },
            description: "説明".repeat(200),
            search_keywords: vec!["セラム".to_string()],
            reviews: Default::default(),
            seller: Default::default(),
            shipping: Default::default(),
            points: Default::default(),
            coupon: Default::default(),
            is_promoted: false,
            source: DataSource::HtmlFetch,
            page_structure: None,
        }
    }

    #[tokio::test]
    async fn completion_counts_completed_over_total() {
        let data = Arc::new(EvalData {
            product: Some(product()),
            ..Default::default()
        });
        let outcome = ChecklistEvaluator::new().evaluate(data).await;

        let total: usize = outcome.categories.iter().map(|c| c.items.len()).sum();
        assert_eq!(total, 31);

        let completed: u32 = outcome
            .categories
            .iter()
            .flat_map(|c| &c.items)
            .filter(|i| i.status == ItemStatus::Completed)
            .count() as u32;
        let expected = (completed as f64 / total as f64 * 100.0).round() as u8;
        assert_eq!(outcome.overall_completion, expected);
    }

    #[tokio::test]
    async fn manual_items_surface_as_manual_with_unknown_confidence() {
        let data = Arc::new(EvalData {
            product: Some(product()),
            ..Default::default()
        });
        let outcome = ChecklistEvaluator::new().evaluate(data).await;
        let inventory = outcome
            .categories
            .iter()
            .flat_map(|c| &c.items)
            .find(|i| i.id == "item_006")
            .unwrap();
        assert_eq!(inventory.status, ItemStatus::Manual);
        assert!(!inventory.auto_checked);
        assert_eq!(inventory.confidence, Confidence::Unknown);
    }

    #[tokio::test]
    async fn no_inputs_means_low_confidence() {
        let outcome = ChecklistEvaluator::new()
            .evaluate(Arc::new(EvalData::default()))
            .await;
        let auto_items: Vec<_> = outcome
            .categories
            .iter()
            .flat_map(|c| &c.items)
            .filter(|i| i.auto_checked)
            .collect();
        assert!(auto_items.iter().all(|i| i.confidence == Confidence::Low));
        assert!(auto_items.iter().all(|i| i.status == ItemStatus::Pending));
    }

    fn slow_evaluator(_: &EvalData) -> EvalVerdict {
        std::thread::sleep(Duration::from_secs(1));
        EvalVerdict::pass("never returned in time")
    }

    #[tokio::test]
    async fn slow_evaluator_degrades_to_pending_skipped() {
        let catalog = vec![CategoryDef {
            name: "테스트",
            items: vec![item("slow_001", "느린 평가", slow_evaluator, None)],
        }];
        let evaluator = ChecklistEvaluator::with_timeout(Duration::from_millis(50));
        let outcome = evaluator
            .evaluate_catalog(
                catalog,
                Arc::new(EvalData {
                    product: Some(product()),
                    ..Default::default()
                }),
            )
            .await;

        let slow = &outcome.categories[0].items[0];
        assert_eq!(slow.status, ItemStatus::Pending);
        assert!(slow
            .recommendation
            .as_deref()
            .unwrap()
            .contains("건너뛰었습니다"));
        assert_eq!(outcome.overall_completion, 0);
    }

    #[tokio::test]
    async fn healthy_product_completes_core_items() {
        let mut p = product();
        p.coupon.present = true;
        p.coupon.max_discount = Some(300);
        let data = Arc::new(EvalData {
            product: Some(p),
            ..Default::default()
        });
        let outcome = ChecklistEvaluator::new().evaluate(data).await;
        assert!(outcome.has_completed_item(&["item_001"]));
        assert!(outcome.has_completed_item(&["item_004"]));
        assert!(outcome.has_completed_item(&["item_011"]));
        assert!(outcome.has_completed_item(&["item_022"]));
    }
}
