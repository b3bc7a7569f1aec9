//! Data validator / reconciler
//!
//! Compares the crawl record against the analyzer's derived fields, corrects
//! the derived side in place, and reports what drifted. Presence-only fields
//! (points, coupon, shipping) are silently added when the analyzer dropped
//! them. Every mismatch and missing item also becomes a chunk bound to the
//! field's page-structure snippet, feeding the extraction learning loop.

use crate::models::{
    AnalyzerResult, Chunk, ChunkContext, ChecklistOutcome, Mismatch, MissingItem, PageStructure,
    ProductRecord, Severity, ValidationOutcome,
};
use serde_json::json;

/// Fields participating in the validation score.
const TOTAL_VALIDATED_FIELDS: f64 = 10.0;

pub struct DataValidator;

impl DataValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate and auto-correct. The analyzer result is mutated in place so
    /// the final report is internally consistent.
    pub fn validate(
        &self,
        record: &ProductRecord,
        analysis: &mut AnalyzerResult,
        checklist: Option<&ChecklistOutcome>,
    ) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();

        // -- name (high) ----------------------------------------------------
        if !record.name.is_empty() && analysis.product_name != record.name {
            // Mismatch only when a pre-existing derived value differed;
            // silent correction when the analyzer had nothing.
            if !analysis.product_name.is_empty() {
                outcome.mismatches.push(Mismatch {
                    field: "product_name".to_string(),
                    source_value: json!(record.name),
                    derived_value: json!(analysis.product_name),
                    severity: Severity::High,
                    corrected: true,
                });
            }
            analysis.product_name = record.name.clone();
            outcome.corrected_fields.push("product_name".to_string());
        }

        // -- prices (high) --------------------------------------------------
        if let Some(sale) = record.price.sale {
            if analysis.price_analysis.sale_price != Some(sale) {
                if let Some(derived) = analysis.price_analysis.sale_price {
                    outcome.mismatches.push(Mismatch {
                        field: "price_sale".to_string(),
                        source_value: json!(sale),
                        derived_value: json!(derived),
                        severity: Severity::High,
                        corrected: true,
                    });
                }
                analysis.price_analysis.sale_price = Some(sale);
                outcome.corrected_fields.push("price_sale".to_string());
            }
        }
        if let Some(original) = record.price.original {
            if analysis.price_analysis.original_price != Some(original) {
                if let Some(derived) = analysis.price_analysis.original_price {
                    outcome.mismatches.push(Mismatch {
                        field: "price_original".to_string(),
                        source_value: json!(original),
                        derived_value: json!(derived),
                        severity: Severity::High,
                        corrected: true,
                    });
                }
                analysis.price_analysis.original_price = Some(original);
                outcome.corrected_fields.push("price_original".to_string());
            }
            // Keep the derived discount rate in sync with the source prices.
            if let Some(sale) = record.price.sale {
                if original > sale {
                    let rate =
                        ((original - sale) as f64 / original as f64 * 100.0).round() as u8;
                    analysis.price_analysis.discount_rate = rate;
                }
            }
        }

        // -- review metrics (medium) ----------------------------------------
        if analysis.review_analysis.review_count != record.reviews.count {
            outcome.mismatches.push(Mismatch {
                field: "review_count".to_string(),
                source_value: json!(record.reviews.count),
                derived_value: json!(analysis.review_analysis.review_count),
                severity: Severity::Medium,
                corrected: true,
            });
            analysis.review_analysis.review_count = record.reviews.count;
            outcome.corrected_fields.push("review_count".to_string());
        }
        if record.reviews.rating > 0.0
            && (analysis.review_analysis.rating - record.reviews.rating).abs() > f64::EPSILON
        {
            outcome.mismatches.push(Mismatch {
                field: "rating".to_string(),
                source_value: json!(record.reviews.rating),
                derived_value: json!(analysis.review_analysis.rating),
                severity: Severity::Medium,
                corrected: true,
            });
            analysis.review_analysis.rating = record.reviews.rating;
            outcome.corrected_fields.push("rating".to_string());
        }

        let source_image_count = record.images.detail.len() as u32;
        if analysis.image_analysis.image_count != source_image_count {
            outcome.mismatches.push(Mismatch {
                field: "image_count".to_string(),
                source_value: json!(source_image_count),
                derived_value: json!(analysis.image_analysis.image_count),
                severity: Severity::Medium,
                corrected: true,
            });
            analysis.image_analysis.image_count = source_image_count;
            outcome.corrected_fields.push("image_count".to_string());
        }

        let source_description_length = record.description.chars().count() as u32;
        if analysis.description_analysis.description_length != source_description_length {
            outcome.mismatches.push(Mismatch {
                field: "description_length".to_string(),
                source_value: json!(source_description_length),
                derived_value: json!(analysis.description_analysis.description_length),
                severity: Severity::Medium,
                corrected: true,
            });
            analysis.description_analysis.description_length = source_description_length;
            outcome
                .corrected_fields
                .push("description_length".to_string());
        }

        // -- presence-only fields -------------------------------------------
        if record.points.has_data() && analysis.points.is_none() {
            analysis.points = Some(record.points.clone());
            outcome.corrected_fields.push("points_info".to_string());
        }
        if record.coupon.present && analysis.coupon.is_none() {
            analysis.coupon = Some(record.coupon.clone());
            outcome.corrected_fields.push("coupon_info".to_string());
        }
        if record.shipping.has_data() && analysis.shipping.is_none() {
            analysis.shipping = Some(record.shipping.clone());
            outcome.corrected_fields.push("shipping_info".to_string());
        }

        // -- checklist coverage ---------------------------------------------
        if let Some(checklist) = checklist {
            if record.points.has_data() && !checklist.has_completed_item(&["item_006b"]) {
                outcome.missing.push(MissingItem {
                    field: "points_info".to_string(),
                    checklist_item_id: "item_006b".to_string(),
                    severity: Severity::High,
                });
            }
            if record.coupon.present
                && !checklist.has_completed_item(&["item_011", "item_011b", "item_021"])
            {
                outcome.missing.push(MissingItem {
                    field: "coupon_info".to_string(),
                    checklist_item_id: "item_011".to_string(),
                    severity: Severity::High,
                });
            }
            if record.shipping.has_data() && !checklist.has_completed_item(&["item_005"]) {
                outcome.missing.push(MissingItem {
                    field: "shipping_info".to_string(),
                    checklist_item_id: "item_005".to_string(),
                    severity: Severity::High,
                });
            }
        }

        let uncorrected = outcome.mismatches.iter().filter(|m| !m.corrected).count();
        let errors = uncorrected + outcome.missing.len();
        outcome.score = (100.0 - errors as f64 / TOTAL_VALIDATED_FIELDS * 100.0).max(0.0);
        outcome.valid = uncorrected == 0 && outcome.missing.is_empty();

        outcome
    }

    /// One chunk per mismatch and per missing item, carrying the field's
    /// page-structure snippet for future extractions.
    pub fn extract_chunks(
        &self,
        outcome: &ValidationOutcome,
        record: &ProductRecord,
        structure: Option<&PageStructure>,
    ) -> Vec<Chunk> {
        let context = ChunkContext {
            url: record.url.clone(),
            code: (!record.code.is_empty()).then(|| record.code.clone()),
        };

        let build = |field: &str, issue_type: &str| {
            let related_classes = structure
                .map(|s| s.related_classes(field))
                .unwrap_or_default();
            let class_frequency: std::collections::HashMap<String, u32> = structure
                .map(|s| {
                    related_classes
                        .iter()
                        .filter_map(|cls| s.class_frequency.get(cls).map(|f| (cls.clone(), *f)))
                        .collect()
                })
                .unwrap_or_default();
            Chunk {
                field: field.to_string(),
                issue_type: issue_type.to_string(),
                extraction_method: "dom_analysis".to_string(),
                selector_pattern: Chunk::derive_selector_pattern(&class_frequency),
                element_present: !related_classes.is_empty(),
                related_classes,
                class_frequency,
                context: context.clone(),
            }
        };

        outcome
            .mismatches
            .iter()
            .map(|m| build(&m.field, "mismatch"))
            .chain(outcome.missing.iter().map(|m| build(&m.field, "missing")))
            .collect()
    }
}

impl Default for DataValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataSource, ImageInfo, PointsInfo, PriceInfo, ReviewInfo};

    fn record() -> ProductRecord {
        ProductRecord {
            url: "https://www.qoo10.jp/gmkt.inc/Goods/Goods.aspx?goodscode=1".to_string(),
            code: "1".to_string(),
            name: "ビタミンC セラム".to_string(),
            category: None,
            brand: None,
            price: PriceInfo {
                sale: Some(4980),
                original: Some(5980),
                discount_rate: 17,
                coupon_discount: None,
            },
            images: ImageInfo {
                thumbnail: None,
                detail: vec!["https://img/1.jpg".to_string()],
            },
            description: "説明文".to_string(),
            search_keywords: vec![],
            reviews: ReviewInfo {
                rating: 4.6,
                count: 184,
                samples: vec![],
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

    fn matching_analysis() -> AnalyzerResult {
        let r = record();
        let mut analysis = AnalyzerResult {
            product_name: r.name.clone(),
            ..Default::default()
        };
        analysis.price_analysis.sale_price = r.price.sale;
        analysis.price_analysis.original_price = r.price.original;
        analysis.review_analysis.review_count = r.reviews.count;
        analysis.review_analysis.rating = r.reviews.rating;
        analysis.image_analysis.image_count = r.images.detail.len() as u32;
        analysis.description_analysis.description_length = r.description.chars().count() as u32;
        analysis
    }

    #[test]
    fn consistent_report_is_valid_with_full_score() {
        let mut analysis = matching_analysis();
        let outcome = DataValidator::new().validate(&record(), &mut analysis, None);
        assert!(outcome.valid);
        assert_eq!(outcome.score, 100.0);
        assert!(outcome.mismatches.is_empty());
        assert!(outcome.corrected_fields.is_empty());
    }

    #[test]
    fn price_drift_is_recorded_and_corrected_in_place() {
        let mut analysis = matching_analysis();
        analysis.price_analysis.sale_price = Some(5980);

        let outcome = DataValidator::new().validate(&record(), &mut analysis, None);

        assert_eq!(analysis.price_analysis.sale_price, Some(4980));
        assert!(outcome.corrected_fields.contains(&"price_sale".to_string()));
        let mismatch = outcome
            .mismatches
            .iter()
            .find(|m| m.field == "price_sale")
            .unwrap();
        assert!(mismatch.corrected);
        assert_eq!(mismatch.severity, Severity::High);
        // Corrected mismatches do not invalidate the report.
        assert!(outcome.valid);
    }

    #[test]
    fn missing_derived_value_corrects_silently() {
        let mut analysis = matching_analysis();
        analysis.product_name = String::new();

        let outcome = DataValidator::new().validate(&record(), &mut analysis, None);

        assert_eq!(analysis.product_name, record().name);
        assert!(outcome.corrected_fields.contains(&"product_name".to_string()));
        assert!(outcome.mismatches.iter().all(|m| m.field != "product_name"));
    }

    #[test]
    fn rating_and_description_drift_are_recorded_as_mismatches() {
        let mut analysis = matching_analysis();
        analysis.review_analysis.rating = 3.1;
        analysis.description_analysis.description_length = 9_000;

        let validator = DataValidator::new();
        let outcome = validator.validate(&record(), &mut analysis, None);

        for field in ["rating", "description_length"] {
            let mismatch = outcome
                .mismatches
                .iter()
                .find(|m| m.field == field)
                .unwrap_or_else(|| panic!("{} drift must be recorded", field));
            assert!(mismatch.corrected);
            assert_eq!(mismatch.severity, Severity::Medium);
        }
        assert!((analysis.review_analysis.rating - record().reviews.rating).abs() < f64::EPSILON);
        assert_eq!(
            analysis.description_analysis.description_length,
            record().description.chars().count() as u32
        );

        // Every mismatch now feeds the chunk loop.
        let r = record();
        let chunks = validator.extract_chunks(&outcome, &r, None);
        assert_eq!(chunks.len(), outcome.mismatches.len());
        assert!(chunks.iter().any(|c| c.field == "rating"));
        assert!(chunks.iter().any(|c| c.field == "description_length"));
    }

    #[test]
    fn missing_checklist_coverage_invalidates() {
        let mut r = record();
        r.points = PointsInfo {
            max: Some(20),
            ..Default::default()
        };
        let mut analysis = matching_analysis();
        let checklist = ChecklistOutcome {
            overall_completion: 0,
            categories: vec![],
        };

        let outcome = DataValidator::new().validate(&r, &mut analysis, Some(&checklist));

        assert!(!outcome.valid);
        assert_eq!(outcome.missing.len(), 1);
        assert_eq!(outcome.missing[0].checklist_item_id, "item_006b");
        assert_eq!(outcome.score, 90.0);
        // The presence-only field was still pushed into the analysis.
        assert!(analysis.points.is_some());
    }

    #[test]
    fn chunks_cover_every_mismatch_and_missing() {
        use crate::models::ClassFreq;
        use std::collections::HashMap;

        let mut r = record();
        r.points = PointsInfo {
            max: Some(20),
            ..Default::default()
        };
        let mut analysis = matching_analysis();
        analysis.price_analysis.sale_price = Some(9999);
        let checklist = ChecklistOutcome {
            overall_completion: 0,
            categories: vec![],
        };

        let validator = DataValidator::new();
        let outcome = validator.validate(&r, &mut analysis, Some(&checklist));

        let mut class_frequency = HashMap::new();
        class_frequency.insert("goods_price".to_string(), 4);
        let structure = PageStructure {
            all_classes: vec!["goods_price".to_string()],
            class_frequency,
            key_elements: HashMap::new(),
            semantic_structure: {
                let mut m = HashMap::new();
                m.insert(
                    "price".to_string(),
                    vec![ClassFreq {
                        class: "goods_price".to_string(),
                        frequency: 4,
                    }],
                );
                m
            },
        };

        let chunks = validator.extract_chunks(&outcome, &r, Some(&structure));
        assert_eq!(chunks.len(), outcome.mismatches.len() + outcome.missing.len());

        let price_chunk = chunks.iter().find(|c| c.field == "price_sale").unwrap();
        assert_eq!(price_chunk.issue_type, "mismatch");
        assert!(price_chunk.element_present);
        assert_eq!(price_chunk.related_classes, vec!["goods_price"]);
        assert_eq!(price_chunk.selector_pattern.as_deref(), Some(".goods_price"));
        assert_eq!(price_chunk.context.code.as_deref(), Some("1"));
    }
}
