//! Product analyzer
//!
//! Stateless, deterministic scoring across six dimensions. The only I/O is
//! an optional HEAD probe against the thumbnail; a network failure there
//! degrades the image score instead of failing the analysis.

use crate::models::{
    AnalyzerResult, DescriptionAnalysis, ImageAnalysis, PageStructure, PriceAnalysis,
    ProductRecord, ReviewAnalysis, SeoAnalysis, StructureAnalysis,
};
use std::time::Duration;
use tracing::debug;

const THUMBNAIL_MIN_BYTES: u64 = 10 * 1024;
const THUMBNAIL_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Overall weights per dimension; must sum to 1.
const WEIGHTS: &[(f64, Dimension)] = &[
    (0.20, Dimension::Images),
    (0.20, Dimension::Description),
    (0.15, Dimension::Price),
    (0.15, Dimension::Reviews),
    (0.15, Dimension::Seo),
    (0.15, Dimension::Structure),
];

#[derive(Clone, Copy)]
enum Dimension {
    Images,
    Description,
    Price,
    Reviews,
    Seo,
    Structure,
}

const NEGATIVE_REVIEW_TOKENS: &[&str] = &[
    "悪い", "最悪", "不良", "壊れ", "がっかり", "ダメ", "残念", "届かない",
    "나쁨", "최악", "불량", "실망",
];

const PRODUCT_INTENT_TOKENS: &[&str] =
    &["product", "goods", "price", "image", "detail", "description"];

pub struct ProductAnalyzer {
    client: reqwest::Client,
}

impl ProductAnalyzer {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(THUMBNAIL_PROBE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    pub async fn analyze(&self, record: &ProductRecord) -> AnalyzerResult {
        let image_analysis = self.analyze_images(record).await;
        let description_analysis = analyze_description(record);
        let price_analysis = analyze_price(record);
        let review_analysis = analyze_reviews(record);
        let seo_analysis = analyze_seo(record);
        let structure_analysis = analyze_structure(record.page_structure.as_ref());

        let mut result = AnalyzerResult {
            overall_score: 0,
            product_name: record.name.clone(),
            image_analysis,
            description_analysis,
            price_analysis,
            review_analysis,
            seo_analysis,
            structure_analysis,
            points: record.points.has_data().then(|| record.points.clone()),
            coupon: record.coupon.present.then(|| record.coupon.clone()),
            shipping: record.shipping.has_data().then(|| record.shipping.clone()),
        };
        result.overall_score = overall_score(&result);
        result
    }

    async fn analyze_images(&self, record: &ProductRecord) -> ImageAnalysis {
        let mut analysis = ImageAnalysis {
            image_count: record.images.detail.len() as u32,
            has_thumbnail: record.images.thumbnail.is_some(),
            ..Default::default()
        };
        let mut score: u32 = 0;

        match &record.images.thumbnail {
            Some(url) => match self.thumbnail_size(url).await {
                Some(bytes) if bytes >= THUMBNAIL_MIN_BYTES => {
                    score += 30;
                    analysis
                        .findings
                        .push("대표 이미지가 충분한 해상도로 등록되어 있습니다".to_string());
                }
                Some(_) => {
                    score += 15;
                    analysis
                        .recommendations
                        .push("대표 이미지 해상도를 높여주세요 (10KB 이상 권장)".to_string());
                }
                None => {
                    // Probe failed; give partial credit for having a URL.
                    score += 15;
                    analysis
                        .findings
                        .push("대표 이미지 확인 불가 (네트워크)".to_string());
                }
            },
            None => {
                analysis
                    .recommendations
                    .push("대표 이미지를 등록해주세요".to_string());
            }
        }

        let detail_count = record.images.detail.len();
        score += match detail_count {
            n if n >= 5 => 40,
            n if n >= 3 => 25,
            _ => 10,
        };
        if detail_count > 0 {
            score += 30;
        } else {
            analysis
                .recommendations
                .push("상세 이미지를 추가해주세요 (5장 이상 권장)".to_string());
        }
        if detail_count < 5 {
            analysis
                .recommendations
                .push(format!("상세 이미지가 {}장입니다. 5장 이상을 권장합니다", detail_count));
        }

        analysis.score = score.min(100) as u8;
        analysis
    }

    async fn thumbnail_size(&self, url: &str) -> Option<u64> {
        match self.client.head(url).send().await {
            Ok(resp) if resp.status().is_success() => resp.content_length(),
            Ok(resp) => {
                debug!("thumbnail probe returned {}", resp.status());
                None
            }
            Err(e) => {
                debug!("thumbnail probe failed: {}", e);
                None
            }
        }
    }
}

impl Default for ProductAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn analyze_description(record: &ProductRecord) -> DescriptionAnalysis {
    let description = &record.description;
    let length = description.chars().count();
    let mut analysis = DescriptionAnalysis {
        description_length: length as u32,
        ..Default::default()
    };
    let mut score: u32 = 0;

    score += match length {
        n if n >= 500 => 40,
        n if n >= 300 => 25,
        _ => 10,
    };
    if length < 300 {
        analysis
            .recommendations
            .push("상품 설명을 300자 이상으로 보강해주세요".to_string());
    }

    if description.contains('\n') || description.contains('・') || description.contains('•') {
        score += 20;
    } else {
        analysis
            .recommendations
            .push("설명에 목록/단락 구조를 추가하면 가독성이 좋아집니다".to_string());
    }

    if record
        .search_keywords
        .iter()
        .any(|k| !k.is_empty() && description.contains(k.as_str()))
    {
        score += 20;
        analysis
            .findings
            .push("검색 키워드가 설명에 포함되어 있습니다".to_string());
    }

    if japanese_ratio(description) > 0.5 {
        score += 20;
    }

    analysis.score = score.min(100) as u8;
    analysis
}

/// Share of Japanese script characters among non-whitespace characters.
fn japanese_ratio(text: &str) -> f64 {
    let mut total = 0usize;
    let mut japanese = 0usize;
    for c in text.chars() {
        if c.is_whitespace() {
            continue;
        }
        total += 1;
        let code = c as u32;
        // Hiragana, Katakana, CJK unified ideographs
        if (0x3040..=0x309F).contains(&code)
            || (0x30A0..=0x30FF).contains(&code)
            || (0x4E00..=0x9FFF).contains(&code)
        {
            japanese += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        japanese as f64 / total as f64
    }
}

fn analyze_price(record: &ProductRecord) -> PriceAnalysis {
    let mut analysis = PriceAnalysis {
        sale_price: record.price.sale,
        original_price: record.price.original,
        discount_rate: record.price.discount_rate,
        ..Default::default()
    };
    let mut score: i32 = 70;

    let discount = record.price.discount_rate;
    match discount {
        0 => {}
        d if (10..=30).contains(&d) => {
            score += 20;
            analysis
                .findings
                .push(format!("할인율 {}%는 구매 전환에 효과적인 구간입니다", d));
        }
        d if d > 30 => {
            score -= 10;
            analysis
                .recommendations
                .push("과도한 할인율은 품질 신뢰를 떨어뜨릴 수 있습니다".to_string());
        }
        _ => {
            score += 10;
        }
    }

    if let Some(sale) = record.price.sale {
        if sale % 1000 < 100 {
            score += 10;
            analysis
                .findings
                .push("심리적 가격 설정이 적용되어 있습니다".to_string());
        }
    } else {
        analysis
            .recommendations
            .push("판매가를 확인할 수 없습니다".to_string());
    }

    analysis.score = score.clamp(0, 100) as u8;
    analysis
}

fn analyze_reviews(record: &ProductRecord) -> ReviewAnalysis {
    let reviews = &record.reviews;
    let mut analysis = ReviewAnalysis {
        rating: reviews.rating,
        review_count: reviews.count,
        ..Default::default()
    };
    let mut score: i32 = 0;

    score += match reviews.rating {
        r if r >= 4.5 => 40,
        r if r >= 4.0 => 30,
        r if r >= 3.5 => 20,
        _ => 10,
    };
    score += match reviews.count {
        n if n >= 50 => 30,
        n if n >= 20 => 25,
        n if n >= 10 => 20,
        _ => 10,
    };

    if !reviews.samples.is_empty() {
        let negative = reviews
            .samples
            .iter()
            .filter(|s| NEGATIVE_REVIEW_TOKENS.iter().any(|t| s.contains(t)))
            .count();
        let ratio = negative as f64 / reviews.samples.len() as f64;
        if ratio > 0.2 {
            score -= 20;
            analysis
                .recommendations
                .push("부정 리뷰 비중이 높습니다. 고객 대응을 강화해주세요".to_string());
        }
    }

    if reviews.count < 10 {
        analysis
            .recommendations
            .push("리뷰 수가 적습니다. 리뷰 작성 포인트를 활용해보세요".to_string());
    }

    analysis.score = score.clamp(0, 100) as u8;
    analysis
}

fn analyze_seo(record: &ProductRecord) -> SeoAnalysis {
    let mut analysis = SeoAnalysis::default();
    let mut score: u32 = 0;

    analysis.keyword_in_name = record
        .search_keywords
        .iter()
        .any(|k| !k.is_empty() && record.name.contains(k.as_str()));
    analysis.keyword_in_description = record
        .search_keywords
        .iter()
        .any(|k| !k.is_empty() && record.description.contains(k.as_str()));
    analysis.category_set = record
        .category
        .as_deref()
        .map(|c| !c.is_empty())
        .unwrap_or(false);
    analysis.brand_set = record
        .brand
        .as_deref()
        .map(|b| !b.is_empty())
        .unwrap_or(false);

    for (present, rec) in [
        (analysis.keyword_in_name, "상품명에 검색 키워드를 포함해주세요"),
        (
            analysis.keyword_in_description,
            "설명에 검색 키워드를 포함해주세요",
        ),
        (analysis.category_set, "카테고리를 등록해주세요"),
        (analysis.brand_set, "브랜드를 등록해주세요"),
    ] {
        if present {
            score += 25;
        } else {
            analysis.recommendations.push(rec.to_string());
        }
    }

    analysis.score = score.min(100) as u8;
    analysis
}

fn analyze_structure(structure: Option<&PageStructure>) -> StructureAnalysis {
    let mut analysis = StructureAnalysis::default();
    let Some(structure) = structure else {
        analysis
            .recommendations
            .push("페이지 구조 정보를 추출할 수 없습니다".to_string());
        return analysis;
    };

    analysis.total_classes = structure.all_classes.len() as u32;
    let mut score: u32 = 0;

    for field in ["name", "price", "image", "description"] {
        let present = structure.has_semantic(field);
        analysis.essentials_present.insert(field.to_string(), present);
        if present {
            score += 15;
        } else {
            analysis
                .recommendations
                .push(format!("{} 요소가 페이지에서 확인되지 않습니다", field));
        }
    }

    let optional_present = ["review", "seller", "shipping", "coupon", "points"]
        .iter()
        .filter(|f| structure.has_semantic(f))
        .count() as u32;
    score += (optional_present * 5).min(25);

    // Frequent classes carrying product intent mean the page is built around
    // its listing content rather than chrome.
    let mut ranked: Vec<(&String, &u32)> = structure.class_frequency.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    let intent_hits = ranked
        .iter()
        .take(10)
        .filter(|(cls, _)| {
            let lower = cls.to_lowercase();
            PRODUCT_INTENT_TOKENS.iter().any(|t| lower.contains(t))
        })
        .count();
    if intent_hits >= 5 {
        score += 10;
    }

    analysis.score = score.min(100) as u8;
    analysis
}

/// Weighted sum of the dimension scores, rounded to an integer.
fn overall_score(result: &AnalyzerResult) -> u8 {
    let total: f64 = WEIGHTS
        .iter()
        .map(|(weight, dim)| {
            let score = match dim {
                Dimension::Images => result.image_analysis.score,
                Dimension::Description => result.description_analysis.score,
                Dimension::Price => result.price_analysis.score,
                Dimension::Reviews => result.review_analysis.score,
                Dimension::Seo => result.seo_analysis.score,
                Dimension::Structure => result.structure_analysis.score,
            };
            weight * score as f64
        })
        .sum();
    total.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataSource, ImageInfo, PriceInfo, ReviewInfo};

    fn record() -> ProductRecord {
        ProductRecord {
            url: "https://www.qoo10.jp/gmkt.inc/Goods/Goods.aspx?goodscode=1".to_string(),
            code: "1".to_string(),
            name: "ビタミンC セラム 30ml".to_string(),
            category: Some("ビューティー".to_string()),
            brand: Some("LabB".to_string()),
            price: PriceInfo {
                sale: Some(4980),
                original: Some(5980),
                discount_rate: 17,
                coupon_discount: None,
            },
            images: ImageInfo {
                thumbnail: None,
                detail: vec![
                    "https://img.example/1.jpg".to_string(),
                    "https://img.example/2.jpg".to_string(),
                    "https://img.example/3.jpg".to_string(),
                ],
            },
            description: "高濃度ビタミンC配合の美容液です。\n・毎日のスキンケアに\n・敏感肌にも対応".repeat(8),
            search_keywords: vec!["セラム".to_string(), "ビタミンC".to_string()],
            reviews: ReviewInfo {
                rating: 4.6,
                count: 184,
                samples: vec!["とても良い".to_string()],
            },
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
    async fn overall_score_is_weighted_sum() {
        let result = ProductAnalyzer::new().analyze(&record()).await;
        let expected = (0.20 * result.image_analysis.score as f64
            + 0.20 * result.description_analysis.score as f64
            + 0.15 * result.price_analysis.score as f64
            + 0.15 * result.review_analysis.score as f64
            + 0.15 * result.seo_analysis.score as f64
            + 0.15 * result.structure_analysis.score as f64)
            .round() as u8;
        assert_eq!(result.overall_score, expected);
        assert!(result.overall_score <= 100);
    }

    #[tokio::test]
    async fn missing_thumbnail_limits_image_score() {
        let result = ProductAnalyzer::new().analyze(&record()).await;
        // 3 detail images, no thumbnail: 25 (count tier) + 30 (any detail)
        assert_eq!(result.image_analysis.score, 55);
        assert!(result
            .image_analysis
            .recommendations
            .iter()
            .any(|r| r.contains("대표 이미지")));
    }

    #[test]
    fn discount_bands_shift_price_score() {
        let mut r = record();
        r.price.discount_rate = 17;
        assert_eq!(analyze_price(&r).score, 90); // 70 + 20 band, no psych pricing
        r.price.discount_rate = 45;
        assert_eq!(analyze_price(&r).score, 60); // 70 - 10
        r.price.discount_rate = 5;
        assert_eq!(analyze_price(&r).score, 80); // 70 + 10
        r.price.sale = Some(4080);
        assert_eq!(analyze_price(&r).score, 90); // + psych pricing (080 < 100)
    }

    #[test]
    fn high_rating_and_volume_max_reviews() {
        let r = record();
        let analysis = analyze_reviews(&r);
        assert_eq!(analysis.score, 70); // 40 (>=4.5) + 30 (>=50)
    }

    #[test]
    fn negative_sample_ratio_penalizes() {
        let mut r = record();
        r.reviews.samples = vec![
            "最悪でした".to_string(),
            "不良品が届きました".to_string(),
            "普通です".to_string(),
        ];
        let analysis = analyze_reviews(&r);
        assert_eq!(analysis.score, 50); // 70 - 20
    }

    #[test]
    fn seo_counts_25_per_signal() {
        let r = record();
        let analysis = analyze_seo(&r);
        // keyword in name + keyword in description + category + brand
        assert_eq!(analysis.score, 100);

        let mut bare = record();
        bare.search_keywords.clear();
        bare.category = None;
        bare.brand = None;
        assert_eq!(analyze_seo(&bare).score, 0);
        assert_eq!(analyze_seo(&bare).recommendations.len(), 4);
    }

    #[test]
    fn japanese_ratio_detects_scripts() {
        assert!(japanese_ratio("高濃度ビタミン配合の美容液") > 0.9);
        assert!(japanese_ratio("only english text") < 0.1);
    }

    #[test]
    fn structure_score_counts_essentials_and_optionals() {
        use crate::models::ClassFreq;
        use std::collections::HashMap;

        let mut semantic = HashMap::new();
        for key in ["name", "price", "image", "description", "review", "seller"] {
            semantic.insert(
                key.to_string(),
                vec![ClassFreq {
                    class: format!("{}_box", key),
                    frequency: 3,
                }],
            );
        }
        let structure = PageStructure {
            all_classes: vec!["a".to_string()],
            class_frequency: HashMap::new(),
            key_elements: HashMap::new(),
            semantic_structure: semantic,
        };
        let analysis = analyze_structure(Some(&structure));
        // 4 essentials * 15 + 2 optionals * 5
        assert_eq!(analysis.score, 70);
    }
}
