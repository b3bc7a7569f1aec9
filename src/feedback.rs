//! Chunk feedback loop
//!
//! Users report field mismatches against completed jobs. Each report becomes
//! an error-report row plus a chunk carrying the field's page-structure
//! snippet; open report counts drive the parser's priority-field list.
//! Resolving a report closes it; its chunks stay behind as learning
//! artifacts.

use crate::models::{Chunk, ChunkContext, PageStructure};
use crate::store::PerformanceStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

const PRIORITY_FIELD_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct ErrorReportInput {
    pub job_id: String,
    pub url: String,
    pub field: String,
    pub issue_type: String,
    pub severity: String,
    pub description: Option<String>,
    pub crawler_value: Option<serde_json::Value>,
    pub report_value: Option<serde_json::Value>,
}

pub struct ErrorReportingService {
    store: Arc<PerformanceStore>,
}

impl ErrorReportingService {
    pub fn new(store: Arc<PerformanceStore>) -> Self {
        Self { store }
    }

    /// Persist a user report and derive a chunk from the job's structure
    /// snapshot for the reported field.
    pub fn report(
        &self,
        input: &ErrorReportInput,
        structure: Option<&PageStructure>,
        product_code: Option<&str>,
    ) -> Result<i64> {
        let crawler_value = input.crawler_value.as_ref().map(|v| v.to_string());
        let report_value = input.report_value.as_ref().map(|v| v.to_string());

        let report_id = self.store.save_error_report(
            &input.job_id,
            &input.url,
            &input.field,
            &input.issue_type,
            &input.severity,
            input.description.as_deref(),
            crawler_value.as_deref(),
            report_value.as_deref(),
        )?;

        let related_classes = structure
            .map(|s| s.related_classes(&input.field))
            .unwrap_or_default();
        let class_frequency: std::collections::HashMap<String, u32> = structure
            .map(|s| {
                related_classes
                    .iter()
                    .filter_map(|cls| s.class_frequency.get(cls).map(|f| (cls.clone(), *f)))
                    .collect()
            })
            .unwrap_or_default();

        let chunk = Chunk {
            field: input.field.clone(),
            issue_type: input.issue_type.clone(),
            extraction_method: "dom_analysis".to_string(),
            selector_pattern: Chunk::derive_selector_pattern(&class_frequency),
            element_present: !related_classes.is_empty(),
            related_classes,
            class_frequency,
            context: ChunkContext {
                url: input.url.clone(),
                code: product_code.map(str::to_string),
            },
        };
        self.store.add_chunk(&chunk)?;

        info!(
            "error report {} filed for field {} on job {}",
            report_id, input.field, input.job_id
        );
        Ok(report_id)
    }

    /// Close a report. Returns false for unknown or already-resolved ids.
    pub fn resolve(&self, report_id: i64) -> Result<bool> {
        self.store.resolve_error_report(report_id)
    }

    /// Fields the parser should prioritize, most-reported first.
    pub fn priority_fields(&self) -> Result<Vec<String>> {
        self.store.priority_fields(PRIORITY_FIELD_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassFreq;
    use std::collections::HashMap;

    fn service() -> (ErrorReportingService, Arc<PerformanceStore>) {
        let store = Arc::new(PerformanceStore::in_memory().unwrap());
        (ErrorReportingService::new(store.clone()), store)
    }

    fn input(field: &str) -> ErrorReportInput {
        ErrorReportInput {
            job_id: "job-1".to_string(),
            url: "https://www.qoo10.jp/g/1".to_string(),
            field: field.to_string(),
            issue_type: "mismatch".to_string(),
            severity: "high".to_string(),
            description: Some("가격이 다릅니다".to_string()),
            crawler_value: Some(serde_json::json!(4980)),
            report_value: Some(serde_json::json!(5980)),
        }
    }

    fn structure() -> PageStructure {
        let mut class_frequency = HashMap::new();
        class_frequency.insert("goods_price".to_string(), 3);
        let mut semantic = HashMap::new();
        semantic.insert(
            "price".to_string(),
            vec![ClassFreq {
                class: "goods_price".to_string(),
                frequency: 3,
            }],
        );
        PageStructure {
            all_classes: vec!["goods_price".to_string()],
            class_frequency,
            key_elements: HashMap::new(),
            semantic_structure: semantic,
        }
    }

    #[test]
    fn report_creates_chunk_and_priority_entry() {
        let (service, store) = service();
        let id = service
            .report(&input("price_sale"), Some(&structure()), Some("1"))
            .unwrap();
        assert!(id > 0);

        assert_eq!(service.priority_fields().unwrap(), vec!["price_sale"]);
        let chunks = store.chunks_for_field("price_sale").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].related_classes, vec!["goods_price"]);
        assert_eq!(chunks[0].selector_pattern.as_deref(), Some(".goods_price"));
    }

    #[test]
    fn resolving_clears_priority_but_keeps_chunks() {
        let (service, store) = service();
        let id = service
            .report(&input("review_count"), Some(&structure()), None)
            .unwrap();

        assert!(service.resolve(id).unwrap());
        assert!(!service.resolve(id).unwrap());
        assert!(service.priority_fields().unwrap().is_empty());
        assert_eq!(store.chunks_for_field("review_count").unwrap().len(), 1);
    }
}
