//! Shared domain types
//!
//! Jobs, normalized records, page-structure fingerprints and the report
//! payload assembled by the pipeline. Everything here is serde-serializable;
//! these shapes are both the wire format and the stored format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// What kind of marketplace page a submitted URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlKind {
    Product,
    Shop,
    Unknown,
}

impl UrlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Shop => "shop",
            Self::Unknown => "unknown",
        }
    }
}

/// How the record was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    #[serde(rename = "html-fetch")]
    HtmlFetch,
    #[serde(rename = "js-render")]
    JsRender,
    #[serde(rename = "api")]
    Api,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub port: u16,
    pub proxies: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub worker_concurrency: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./shoplens.db".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .unwrap_or(8000);

        let proxies = std::env::var("PROXY_LIST")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let worker_concurrency = std::env::var("WORKER_CONCURRENCY")
            .unwrap_or_else(|_| "4".to_string())
            .parse()
            .unwrap_or(4);

        Ok(Self {
            database_path,
            port,
            proxies,
            allowed_origins,
            worker_concurrency,
        })
    }
}

// ---------------------------------------------------------------------------
// Job lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Pipeline stage names as recorded by the monitor and shown in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Crawling,
    Analyzing,
    GeneratingRecommendations,
    EvaluatingChecklist,
    Validating,
    Finalizing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crawling => "crawling",
            Self::Analyzing => "analyzing",
            Self::GeneratingRecommendations => "generating_recommendations",
            Self::EvaluatingChecklist => "evaluating_checklist",
            Self::Validating => "validating",
            Self::Finalizing => "finalizing",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub stage: String,
    pub percent: u8,
    pub message: String,
}

impl Progress {
    pub fn new(stage: &str, percent: u8, message: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

/// One client-submitted analysis request, tracked from queued to terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub url: String,
    pub url_kind: UrlKind,
    pub status: JobStatus,
    pub progress: Progress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Report>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Normalized records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceInfo {
    pub sale: Option<u32>,
    pub original: Option<u32>,
    pub discount_rate: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_discount: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageInfo {
    pub thumbnail: Option<String>,
    pub detail: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewInfo {
    pub rating: f64,
    pub count: u32,
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SellerLevel {
    Power,
    Excellent,
    Normal,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SellerInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub level: SellerLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnPolicy {
    FreeReturn,
    ReturnAvailable,
    #[default]
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub fee: Option<u32>,
    pub free: bool,
    pub return_policy: ReturnPolicy,
}

impl ShippingInfo {
    /// Whether anything beyond the defaults was actually extracted.
    pub fn has_data(&self) -> bool {
        self.fee.is_some() || self.free || self.return_policy != ReturnPolicy::None
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointsInfo {
    pub max: Option<u32>,
    pub receive_confirm: Option<u32>,
    pub review_bonus: Option<u32>,
    pub auto: Option<u32>,
}

impl PointsInfo {
    pub fn has_data(&self) -> bool {
        self.max.is_some()
            || self.receive_confirm.is_some()
            || self.review_bonus.is_some()
            || self.auto.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponKind {
    Auto,
    Favorite,
    Password,
    #[default]
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CouponInfo {
    pub present: bool,
    pub kind: CouponKind,
    pub max_discount: Option<u32>,
}

/// Normalized product page record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub url: String,
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub price: PriceInfo,
    pub images: ImageInfo,
    pub description: String,
    pub search_keywords: Vec<String>,
    pub reviews: ReviewInfo,
    pub seller: SellerInfo,
    pub shipping: ShippingInfo,
    pub points: PointsInfo,
    pub coupon: CouponInfo,
    pub is_promoted: bool,
    pub source: DataSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_structure: Option<PageStructure>,
}

/// Product entry on a shop page; only what the listing grid exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopProduct {
    pub code: Option<String>,
    pub name: String,
    pub price: Option<u32>,
    pub url: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopCoupon {
    pub title: String,
    pub discount: Option<u32>,
    pub kind: CouponKind,
}

/// Normalized shop page record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopRecord {
    pub url: String,
    pub id: String,
    pub name: String,
    pub level: Option<String>,
    pub follower_count: u32,
    pub product_count: u32,
    pub categories: BTreeMap<String, u32>,
    pub products: Vec<ShopProduct>,
    pub coupons: Vec<ShopCoupon>,
    pub source: DataSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_structure: Option<PageStructure>,
}

// ---------------------------------------------------------------------------
// Page structure fingerprint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassFreq {
    pub class: String,
    pub frequency: u32,
}

/// Compressed summary of a page's div class usage. Used for heuristic
/// scoring, checklist structure mapping, and as training data for the
/// learning substrate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageStructure {
    pub all_classes: Vec<String>,
    pub class_frequency: HashMap<String, u32>,
    pub key_elements: HashMap<String, Vec<ClassFreq>>,
    pub semantic_structure: HashMap<String, Vec<ClassFreq>>,
}

impl PageStructure {
    /// Related classes for a logical field. Semantic buckets win; the coarser
    /// key-element buckets are the fallback.
    pub fn related_classes(&self, field: &str) -> Vec<String> {
        let semantic_key = Self::semantic_key(field);
        if let Some(entries) = self.semantic_structure.get(semantic_key) {
            if !entries.is_empty() {
                return entries.iter().map(|e| e.class.clone()).collect();
            }
        }
        let key = format!("{}_info", semantic_key);
        self.key_elements
            .get(key.as_str())
            .map(|entries| entries.iter().map(|e| e.class.clone()).collect())
            .unwrap_or_default()
    }

    pub fn has_semantic(&self, field: &str) -> bool {
        self.semantic_structure
            .get(Self::semantic_key(field))
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    fn semantic_key(field: &str) -> &str {
        match field {
            "product_name" | "name" => "name",
            "price_sale" | "price_original" | "price" => "price",
            "image_count" | "image" => "image",
            "description_length" | "description" => "description",
            "review_count" | "rating" | "review" => "review",
            "seller" => "seller",
            "shipping_info" | "shipping" => "shipping",
            "coupon_info" | "coupon" => "coupon",
            "points_info" | "points" => "points",
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub score: u8,
    pub image_count: u32,
    pub has_thumbnail: bool,
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescriptionAnalysis {
    pub score: u8,
    pub description_length: u32,
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceAnalysis {
    pub score: u8,
    pub sale_price: Option<u32>,
    pub original_price: Option<u32>,
    pub discount_rate: u8,
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewAnalysis {
    pub score: u8,
    pub rating: f64,
    pub review_count: u32,
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeoAnalysis {
    pub score: u8,
    pub keyword_in_name: bool,
    pub keyword_in_description: bool,
    pub category_set: bool,
    pub brand_set: bool,
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructureAnalysis {
    pub score: u8,
    pub total_classes: u32,
    pub essentials_present: BTreeMap<String, bool>,
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Per-dimension product scores plus the derived fields the validator
/// reconciles against the crawl record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerResult {
    pub overall_score: u8,
    pub product_name: String,
    pub image_analysis: ImageAnalysis,
    pub description_analysis: DescriptionAnalysis,
    pub price_analysis: PriceAnalysis,
    pub review_analysis: ReviewAnalysis,
    pub seo_analysis: SeoAnalysis,
    pub structure_analysis: StructureAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<PointsInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<CouponInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping: Option<ShippingInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopDimension {
    pub score: u8,
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopAnalyzerResult {
    pub overall_score: u8,
    pub shop_name: String,
    pub followers: ShopDimension,
    pub products: ShopDimension,
    pub categories: ShopDimension,
    pub coupons: ShopDimension,
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureMapping {
    pub related_classes: Vec<String>,
    pub element_present: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub class_frequency: HashMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub category: String,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub action_items: Vec<String>,
    pub expected_impact: String,
    pub difficulty: String,
    pub estimated_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure_mapping: Option<StructureMapping>,
}

// ---------------------------------------------------------------------------
// Checklist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Completed,
    Pending,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItemOutcome {
    pub id: String,
    pub title: String,
    pub status: ItemStatus,
    pub auto_checked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure_mapping: Option<StructureMapping>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistCategoryOutcome {
    pub name: String,
    pub completion: u8,
    pub items: Vec<ChecklistItemOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistOutcome {
    pub overall_completion: u8,
    pub categories: Vec<ChecklistCategoryOutcome>,
}

impl ChecklistOutcome {
    pub fn has_completed_item(&self, ids: &[&str]) -> bool {
        self.categories.iter().any(|c| {
            c.items
                .iter()
                .any(|i| ids.contains(&i.id.as_str()) && i.status == ItemStatus::Completed)
        })
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mismatch {
    pub field: String,
    pub source_value: serde_json::Value,
    pub derived_value: serde_json::Value,
    pub severity: Severity,
    pub corrected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingItem {
    pub field: String,
    pub checklist_item_id: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub score: f64,
    pub mismatches: Vec<Mismatch>,
    pub missing: Vec<MissingItem>,
    pub corrected_fields: Vec<String>,
}

impl Default for ValidationOutcome {
    fn default() -> Self {
        Self {
            valid: true,
            score: 100.0,
            mismatches: Vec::new(),
            missing: Vec::new(),
            corrected_fields: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chunks (field-bound page-structure snippets fed back to the extractor)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkContext {
    pub url: String,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub field: String,
    pub issue_type: String,
    pub extraction_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector_pattern: Option<String>,
    pub related_classes: Vec<String>,
    pub class_frequency: HashMap<String, u32>,
    pub element_present: bool,
    pub context: ChunkContext,
}

impl Chunk {
    /// Selector pattern derived from the three most frequent related classes.
    pub fn derive_selector_pattern(class_frequency: &HashMap<String, u32>) -> Option<String> {
        if class_frequency.is_empty() {
            return None;
        }
        let mut ranked: Vec<(&String, &u32)> = class_frequency.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let pattern = ranked
            .iter()
            .take(3)
            .map(|(cls, _)| format!(".{}", cls))
            .collect::<Vec<_>>()
            .join(" > ");
        Some(pattern)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Payload of a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shop: Option<ShopRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzer_result: Option<AnalyzerResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shop_analyzer_result: Option<ShopAnalyzerResult>,
    pub recommendations: Vec<Recommendation>,
    pub checklist_outcome: Option<ChecklistOutcome>,
    pub validation_outcome: Option<ValidationOutcome>,
    pub data_source: DataSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_are_snake_case() {
        assert_eq!(
            Stage::GeneratingRecommendations.as_str(),
            "generating_recommendations"
        );
        assert_eq!(Stage::EvaluatingChecklist.as_str(), "evaluating_checklist");
    }

    #[test]
    fn progress_percent_is_clamped() {
        let p = Progress::new("finalizing", 140, "done");
        assert_eq!(p.percent, 100);
    }

    #[test]
    fn selector_pattern_ranks_by_frequency() {
        let mut freq = HashMap::new();
        freq.insert("goods_price".to_string(), 9);
        freq.insert("price_wrap".to_string(), 4);
        freq.insert("detail".to_string(), 2);
        freq.insert("rare".to_string(), 1);
        let pattern = Chunk::derive_selector_pattern(&freq).unwrap();
        assert_eq!(pattern, ".goods_price > .price_wrap > .detail");
    }

    #[test]
    fn data_source_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&DataSource::JsRender).unwrap(),
            "\"js-render\""
        );
    }
}
