//! Recommendation generator
//!
//! Pure function of (record, analysis, structure) → ordered action list.
//! Ids are UUIDv5 over (category, reason) so the same finding always gets
//! the same id across runs.

use crate::models::{
    AnalyzerResult, PageStructure, Priority, ProductRecord, Recommendation, ShopAnalyzerResult,
    ShopRecord, StructureMapping,
};
use uuid::Uuid;

/// Fixed namespace for deterministic recommendation ids.
const ID_NAMESPACE: Uuid = Uuid::NAMESPACE_OID;

fn recommendation_id(category: &str, reason: &str) -> String {
    Uuid::new_v5(&ID_NAMESPACE, format!("{}:{}", category, reason).as_bytes()).to_string()
}

fn structure_mapping_for(
    structure: Option<&PageStructure>,
    field: &str,
) -> Option<StructureMapping> {
    let structure = structure?;
    let related_classes = structure.related_classes(field);
    Some(StructureMapping {
        element_present: !related_classes.is_empty(),
        class_frequency: related_classes
            .iter()
            .filter_map(|cls| {
                structure
                    .class_frequency
                    .get(cls)
                    .map(|f| (cls.clone(), *f))
            })
            .collect(),
        related_classes,
    })
}

pub struct Recommender;

impl Recommender {
    pub fn new() -> Self {
        Self
    }

    pub fn for_product(
        &self,
        record: &ProductRecord,
        analysis: &AnalyzerResult,
    ) -> Vec<Recommendation> {
        let structure = record.page_structure.as_ref();
        let mut recs = Vec::new();

        // -- SEO ------------------------------------------------------------
        if !analysis.seo_analysis.keyword_in_name || record.search_keywords.is_empty() {
            recs.push(Recommendation {
                id: recommendation_id("SEO", "search-keywords"),
                category: "SEO".to_string(),
                priority: Priority::High,
                title: "검색 키워드 최적화".to_string(),
                description: "검색어 필드와 상품명에 구매 키워드를 반영해주세요".to_string(),
                action_items: vec![
                    "주력 키워드 3~5개 선정".to_string(),
                    "상품명 앞부분에 핵심 키워드 배치".to_string(),
                    "검색어 필드에 연관 키워드 입력".to_string(),
                ],
                expected_impact: "검색 노출 증가".to_string(),
                difficulty: "낮음".to_string(),
                estimated_time: "30분".to_string(),
                structure_mapping: None,
            });
        }
        if !analysis.seo_analysis.category_set {
            recs.push(Recommendation {
                id: recommendation_id("SEO", "category-missing"),
                category: "SEO".to_string(),
                priority: Priority::High,
                title: "카테고리 등록".to_string(),
                description: "카테고리가 확인되지 않습니다. 적절한 카테고리를 등록해주세요"
                    .to_string(),
                action_items: vec![
                    "상품과 가장 가까운 카테고리 선택".to_string(),
                    "페이지 구조에서 카테고리 요소(breadcrumb 등) 확인".to_string(),
                ],
                expected_impact: "카테고리 탐색 유입 확보".to_string(),
                difficulty: "낮음".to_string(),
                estimated_time: "10분".to_string(),
                structure_mapping: structure_mapping_for(structure, "name"),
            });
        }

        // -- 상품 페이지 ----------------------------------------------------
        if analysis.image_analysis.image_count < 3 {
            recs.push(Recommendation {
                id: recommendation_id("상품 페이지", "detail-images"),
                category: "상품 페이지".to_string(),
                priority: Priority::High,
                title: "상세 이미지 보강".to_string(),
                description: format!(
                    "상세 이미지가 {}장입니다. 5장 이상이면 전환율이 눈에 띄게 개선됩니다",
                    analysis.image_analysis.image_count
                ),
                action_items: vec![
                    "사용 장면/디테일 컷 추가".to_string(),
                    "크기·성분 등 정보성 이미지 추가".to_string(),
                ],
                expected_impact: "전환율 개선".to_string(),
                difficulty: "중간".to_string(),
                estimated_time: "2시간".to_string(),
                structure_mapping: structure_mapping_for(structure, "image"),
            });
        }
        if analysis.description_analysis.description_length < 300 {
            recs.push(Recommendation {
                id: recommendation_id("상품 페이지", "description-length"),
                category: "상품 페이지".to_string(),
                priority: Priority::Medium,
                title: "상품 설명 보강".to_string(),
                description: "설명이 300자 미만입니다. 특징/사용법/주의사항 구조로 보강해주세요"
                    .to_string(),
                action_items: vec![
                    "구매 포인트 3가지를 목록으로 정리".to_string(),
                    "사이즈·용량 등 스펙 표 추가".to_string(),
                ],
                expected_impact: "이탈률 감소".to_string(),
                difficulty: "낮음".to_string(),
                estimated_time: "1시간".to_string(),
                structure_mapping: structure_mapping_for(structure, "description"),
            });
        }

        // -- 프로모션 --------------------------------------------------------
        if !record.coupon.present {
            recs.push(Recommendation {
                id: recommendation_id("프로모션", "shop-coupon"),
                category: "프로모션".to_string(),
                priority: Priority::Medium,
                title: "샵 쿠폰 설정".to_string(),
                description: "쿠폰이 확인되지 않습니다. 즐겨찾기 쿠폰은 팔로워 확보에도 기여합니다"
                    .to_string(),
                action_items: vec![
                    "즐겨찾기 등록 쿠폰 생성".to_string(),
                    "첫 구매 할인 쿠폰 검토".to_string(),
                ],
                expected_impact: "구매 전환 및 팔로워 증가".to_string(),
                difficulty: "낮음".to_string(),
                estimated_time: "20분".to_string(),
                structure_mapping: structure_mapping_for(structure, "coupon"),
            });
        }
        if record.price.discount_rate == 0 {
            recs.push(Recommendation {
                id: recommendation_id("프로모션", "discount"),
                category: "프로모션".to_string(),
                priority: Priority::Low,
                title: "할인 전략 검토".to_string(),
                description: "정가 대비 할인이 없습니다. 10~30% 구간의 할인이 가장 효과적입니다"
                    .to_string(),
                action_items: vec!["기간 한정 할인 테스트".to_string()],
                expected_impact: "가격 경쟁력 확보".to_string(),
                difficulty: "중간".to_string(),
                estimated_time: "30분".to_string(),
                structure_mapping: None,
            });
        }

        // -- 광고 -------------------------------------------------------------
        if analysis.overall_score >= 60 && !record.is_promoted {
            recs.push(Recommendation {
                id: recommendation_id("광고", "power-rankup"),
                category: "광고".to_string(),
                priority: Priority::Medium,
                title: "파워랭크업 광고 검토".to_string(),
                description: "페이지 완성도가 광고 집행에 적합한 수준입니다. 검색형 광고로 노출을 늘려보세요"
                    .to_string(),
                action_items: vec![
                    "주력 키워드로 파워랭크업 설정 (200엔부터)".to_string(),
                    "1주 단위로 전환 성과 점검".to_string(),
                ],
                expected_impact: "검색 상위 노출".to_string(),
                difficulty: "중간".to_string(),
                estimated_time: "1시간".to_string(),
                structure_mapping: None,
            });
        }

        sort_by_priority(&mut recs);
        recs
    }

    pub fn for_shop(
        &self,
        record: &ShopRecord,
        analysis: &ShopAnalyzerResult,
    ) -> Vec<Recommendation> {
        let mut recs = Vec::new();

        if record.follower_count < 1_000 {
            recs.push(Recommendation {
                id: recommendation_id("Shop 운영", "followers"),
                category: "Shop 운영".to_string(),
                priority: Priority::High,
                title: "팔로워 기반 확대".to_string(),
                description: "팔로워가 적습니다. 즐겨찾기 쿠폰과 포인트 이벤트로 기반을 넓혀주세요"
                    .to_string(),
                action_items: vec![
                    "즐겨찾기 등록 쿠폰 상시 운영".to_string(),
                    "신상품 알림 활용".to_string(),
                ],
                expected_impact: "재방문 고객 증가".to_string(),
                difficulty: "낮음".to_string(),
                estimated_time: "30분".to_string(),
                structure_mapping: None,
            });
        }
        if analysis.products.score < 70 {
            recs.push(Recommendation {
                id: recommendation_id("상품 기획", "catalog-size"),
                category: "상품 기획".to_string(),
                priority: Priority::Medium,
                title: "상품 구색 확대".to_string(),
                description: "등록 상품이 적습니다. 연관 상품을 추가해 구색을 갖춰주세요".to_string(),
                action_items: vec!["주력 카테고리 내 연관 상품 기획".to_string()],
                expected_impact: "객단가 및 체류시간 증가".to_string(),
                difficulty: "높음".to_string(),
                estimated_time: "1주".to_string(),
                structure_mapping: None,
            });
        }
        if record.categories.len() > 5 {
            recs.push(Recommendation {
                id: recommendation_id("카테고리 전략", "focus"),
                category: "카테고리 전략".to_string(),
                priority: Priority::Low,
                title: "주력 카테고리 집중".to_string(),
                description: "카테고리가 넓게 퍼져 있습니다. 주력 카테고리 중심으로 재편을 검토해보세요"
                    .to_string(),
                action_items: vec!["매출 상위 카테고리 분석".to_string()],
                expected_impact: "샵 정체성 강화".to_string(),
                difficulty: "중간".to_string(),
                estimated_time: "2시간".to_string(),
                structure_mapping: None,
            });
        }
        if record.coupons.is_empty() {
            recs.push(Recommendation {
                id: recommendation_id("프로모션", "shop-coupon"),
                category: "프로모션".to_string(),
                priority: Priority::Medium,
                title: "샵 쿠폰 설정".to_string(),
                description: "운영 중인 쿠폰이 없습니다".to_string(),
                action_items: vec!["즐겨찾기 등록 쿠폰 생성".to_string()],
                expected_impact: "구매 전환 증가".to_string(),
                difficulty: "낮음".to_string(),
                estimated_time: "20분".to_string(),
                structure_mapping: None,
            });
        }

        sort_by_priority(&mut recs);
        recs
    }
}

impl Default for Recommender {
    fn default() -> Self {
        Self::new()
    }
}

/// Priority desc, then category/title for a stable order within a band.
fn sort_by_priority(recs: &mut [Recommendation]) {
    recs.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.category.cmp(&b.category))
            .then_with(|| a.title.cmp(&b.title))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataSource, ImageInfo, PriceInfo};

    fn bare_record() -> ProductRecord {
        ProductRecord {
            url: "u".to_string(),
            code: "1".to_string(),
            name: "テスト商品".to_string(),
            category: None,
            brand: None,
            price: PriceInfo::default(),
            images: ImageInfo::default(),
            description: String::new(),
            search_keywords: vec![],
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

    #[test]
    fn ids_are_deterministic() {
        let recommender = Recommender::new();
        let record = bare_record();
        let analysis = AnalyzerResult::default();
        let a = recommender.for_product(&record, &analysis);
        let b = recommender.for_product(&record, &analysis);
        let ids_a: Vec<_> = a.iter().map(|r| r.id.clone()).collect();
        let ids_b: Vec<_> = b.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
        assert!(!ids_a.is_empty());
    }

    #[test]
    fn ordering_is_priority_desc() {
        let recs = Recommender::new().for_product(&bare_record(), &AnalyzerResult::default());
        let priorities: Vec<Priority> = recs.iter().map(|r| r.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(priorities, sorted);
    }

    #[test]
    fn healthy_listing_gets_few_actions() {
        let mut record = bare_record();
        record.category = Some("ビューティー".to_string());
        record.search_keywords = vec!["テスト".to_string()];
        record.description = "長い説明".repeat(100);
        record.images.detail = (0..5).map(|i| format!("https://img/{}.jpg", i)).collect();
        record.coupon.present = true;
        record.price.discount_rate = 15;

        let mut analysis = AnalyzerResult::default();
        analysis.seo_analysis.keyword_in_name = true;
        analysis.seo_analysis.category_set = true;
        analysis.image_analysis.image_count = 5;
        analysis.description_analysis.description_length = 400;
        analysis.overall_score = 50;

        let recs = Recommender::new().for_product(&record, &analysis);
        assert!(recs.is_empty());
    }
}
