//! Pipeline orchestrator
//!
//! Drives one job through crawl → analyze → recommend → checklist → validate
//! → finalize. Stage boundaries are the only places a job can fail; the
//! stage table below says which stages degrade instead. Every transition is
//! recorded to the monitor and mirrored into the job store.
//!
//! Degradation table:
//!   crawling     required  (ExtractionError / FetchError fail the job)
//!   analyzing    required
//!   recommending degrades to an empty list
//!   checklist    degrades to null, 5 s wall-clock budget
//!   validating   degrades to null
//!   finalizing   required (assembling the report is infallible in practice)

use crate::analysis::checklist::EvalData;
use crate::analysis::{
    ChecklistEvaluator, DataValidator, ProductAnalyzer, Recommender, ShopAnalyzer,
};
use crate::error::PipelineError;
use crate::models::{
    ChecklistOutcome, Job, Report, Stage, UrlKind,
};
use crate::pipeline::job_store::JobStore;
use crate::pipeline::monitor::{PipelineMonitor, StageStatus};
use crate::scrapers::Scraper;
use crate::store::PerformanceStore;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const CHECKLIST_BUDGET: Duration = Duration::from_secs(5);

pub struct Orchestrator {
    pub store: Arc<PerformanceStore>,
    pub scraper: Arc<Scraper>,
    pub analyzer: Arc<ProductAnalyzer>,
    pub shop_analyzer: Arc<ShopAnalyzer>,
    pub recommender: Arc<Recommender>,
    pub checklist: Arc<ChecklistEvaluator>,
    pub validator: Arc<DataValidator>,
    pub monitor: Arc<PipelineMonitor>,
    pub jobs: Arc<JobStore>,
}

impl Orchestrator {
    /// Run one job end to end. Never panics the worker; every failure path
    /// lands in the job store as a translated message.
    pub async fn run(&self, job_id: &str) {
        let Some(job) = self.jobs.get(job_id) else {
            warn!("job {} vanished before execution", job_id);
            return;
        };

        info!("[{}] analysis started - {} ({})", job.id, job.url, job.url_kind.as_str());
        self.jobs.mark_running(job_id);

        match job.url_kind {
            UrlKind::Product => self.run_product(&job).await,
            UrlKind::Shop => self.run_shop(&job).await,
            UrlKind::Unknown => {
                let err = PipelineError::input("could not detect url type");
                self.jobs.set_error(job_id, &err.user_message());
            }
        }
    }

    async fn run_product(&self, job: &Job) {
        // ---- crawling (20%) ------------------------------------------------
        self.jobs
            .update_progress(&job.id, Stage::Crawling.as_str(), 10, "상품 페이지를 수집하는 중...");
        let stage_start = Instant::now();
        let mut record = match self.scraper.crawl_product(&job.url).await {
            Ok(record) => record,
            Err(e) => {
                self.record(job, Stage::Crawling, StageStatus::Failure, stage_start, None, Some(&e));
                self.jobs.set_error(&job.id, &e.user_message());
                return;
            }
        };
        if record.name.is_empty() {
            // A partial record is preferred over failure; synthesize a name.
            let fallback = format!("상품 {}", record.code);
            warn!("[{}] product name missing, using fallback: {}", job.id, fallback);
            record.name = fallback;
        }
        self.record(
            job,
            Stage::Crawling,
            StageStatus::Success,
            stage_start,
            Some(json!({"product_code": record.code, "product_name": record.name})),
            None,
        );
        self.jobs
            .update_progress(&job.id, Stage::Crawling.as_str(), 20, "페이지 데이터를 추출했습니다");

        // ---- analyzing (50%) -----------------------------------------------
        self.jobs
            .update_progress(&job.id, Stage::Analyzing.as_str(), 30, "상품 데이터를 분석하는 중...");
        let stage_start = Instant::now();
        let mut analysis = self.analyzer.analyze(&record).await;
        self.record(
            job,
            Stage::Analyzing,
            StageStatus::Success,
            stage_start,
            Some(json!({"overall_score": analysis.overall_score})),
            None,
        );
        self.jobs
            .update_progress(&job.id, Stage::Analyzing.as_str(), 50, "분석이 완료되었습니다");

        // ---- recommendations (60%) ------------------------------------------
        self.jobs.update_progress(
            &job.id,
            Stage::GeneratingRecommendations.as_str(),
            55,
            "개선 제안을 생성하는 중...",
        );
        let stage_start = Instant::now();
        let recommendations = self.recommender.for_product(&record, &analysis);
        self.record(
            job,
            Stage::GeneratingRecommendations,
            StageStatus::Success,
            stage_start,
            Some(json!({"count": recommendations.len()})),
            None,
        );
        self.jobs.update_progress(
            &job.id,
            Stage::GeneratingRecommendations.as_str(),
            60,
            "개선 제안이 준비되었습니다",
        );

        // ---- checklist (75%), 5s wall-clock budget ---------------------------
        self.jobs.update_progress(
            &job.id,
            Stage::EvaluatingChecklist.as_str(),
            65,
            "체크리스트를 평가하는 중...",
        );
        let stage_start = Instant::now();
        let eval_data = Arc::new(EvalData {
            product: Some(record.clone()),
            shop: None,
            analysis: Some(analysis.clone()),
            structure: record.page_structure.clone(),
        });
        let checklist_outcome = self.run_checklist(job, eval_data, stage_start).await;
        self.jobs.update_progress(
            &job.id,
            Stage::EvaluatingChecklist.as_str(),
            75,
            "체크리스트 평가가 끝났습니다",
        );

        // ---- validating (85%), degrades to null ------------------------------
        self.jobs.update_progress(
            &job.id,
            Stage::Validating.as_str(),
            80,
            "데이터 일치 여부를 검증하는 중...",
        );
        let stage_start = Instant::now();
        let validation =
            self.validator
                .validate(&record, &mut analysis, checklist_outcome.as_ref());
        let chunks =
            self.validator
                .extract_chunks(&validation, &record, record.page_structure.as_ref());
        for chunk in &chunks {
            // Learning artifacts are best-effort.
            if let Err(e) = self.store.add_chunk(chunk) {
                warn!("[{}] validation chunk not stored: {}", job.id, e);
            }
        }
        self.record(
            job,
            Stage::Validating,
            StageStatus::Success,
            stage_start,
            Some(json!({
                "valid": validation.valid,
                "mismatches": validation.mismatches.len(),
                "corrected": validation.corrected_fields.len(),
            })),
            None,
        );
        self.jobs
            .update_progress(&job.id, Stage::Validating.as_str(), 85, "검증이 완료되었습니다");

        // ---- finalizing (100%) -----------------------------------------------
        self.jobs
            .update_progress(&job.id, Stage::Finalizing.as_str(), 90, "결과를 정리하는 중...");
        let stage_start = Instant::now();
        let data_source = record.source;
        let report = Report {
            product: Some(record),
            shop: None,
            analyzer_result: Some(analysis),
            shop_analyzer_result: None,
            recommendations,
            checklist_outcome,
            validation_outcome: Some(validation),
            data_source,
        };
        self.jobs.set_result(&job.id, report);
        self.record(job, Stage::Finalizing, StageStatus::Success, stage_start, None, None);
        info!("[{}] analysis completed", job.id);
    }

    async fn run_shop(&self, job: &Job) {
        // ---- crawling (20%) ------------------------------------------------
        self.jobs
            .update_progress(&job.id, Stage::Crawling.as_str(), 10, "Shop 페이지를 수집하는 중...");
        let stage_start = Instant::now();
        let record = match self.scraper.crawl_shop(&job.url).await {
            Ok(record) => record,
            Err(e) => {
                self.record(job, Stage::Crawling, StageStatus::Failure, stage_start, None, Some(&e));
                self.jobs.set_error(&job.id, &e.user_message());
                return;
            }
        };
        self.record(
            job,
            Stage::Crawling,
            StageStatus::Success,
            stage_start,
            Some(json!({"shop_id": record.id, "product_count": record.product_count})),
            None,
        );
        self.jobs
            .update_progress(&job.id, Stage::Crawling.as_str(), 20, "페이지 데이터를 추출했습니다");

        // ---- analyzing (50%) -----------------------------------------------
        self.jobs
            .update_progress(&job.id, Stage::Analyzing.as_str(), 40, "Shop 데이터를 분석하는 중...");
        let stage_start = Instant::now();
        let analysis = self.shop_analyzer.analyze(&record);
        self.record(
            job,
            Stage::Analyzing,
            StageStatus::Success,
            stage_start,
            Some(json!({"overall_score": analysis.overall_score})),
            None,
        );
        self.jobs
            .update_progress(&job.id, Stage::Analyzing.as_str(), 50, "분석이 완료되었습니다");

        // ---- recommendations (60%) ------------------------------------------
        self.jobs.update_progress(
            &job.id,
            Stage::GeneratingRecommendations.as_str(),
            55,
            "개선 제안을 생성하는 중...",
        );
        let stage_start = Instant::now();
        let recommendations = self.recommender.for_shop(&record, &analysis);
        self.record(
            job,
            Stage::GeneratingRecommendations,
            StageStatus::Success,
            stage_start,
            Some(json!({"count": recommendations.len()})),
            None,
        );

        // ---- checklist (75%) -------------------------------------------------
        self.jobs.update_progress(
            &job.id,
            Stage::EvaluatingChecklist.as_str(),
            65,
            "체크리스트를 평가하는 중...",
        );
        let stage_start = Instant::now();
        let eval_data = Arc::new(EvalData {
            product: None,
            shop: Some(record.clone()),
            analysis: None,
            structure: record.page_structure.clone(),
        });
        let checklist_outcome = self.run_checklist(job, eval_data, stage_start).await;
        self.jobs.update_progress(
            &job.id,
            Stage::EvaluatingChecklist.as_str(),
            75,
            "체크리스트 평가가 끝났습니다",
        );

        // ---- finalizing (100%) -----------------------------------------------
        // Shop reports carry no crawler-vs-derived reconciliation; the
        // validator's field table is product-shaped.
        self.jobs
            .update_progress(&job.id, Stage::Finalizing.as_str(), 90, "결과를 정리하는 중...");
        let stage_start = Instant::now();
        let data_source = record.source;
        let report = Report {
            product: None,
            shop: Some(record),
            analyzer_result: None,
            shop_analyzer_result: Some(analysis),
            recommendations,
            checklist_outcome,
            validation_outcome: None,
            data_source,
        };
        self.jobs.set_result(&job.id, report);
        self.record(job, Stage::Finalizing, StageStatus::Success, stage_start, None, None);
        info!("[{}] shop analysis completed", job.id);
    }

    /// Checklist stage with its own wall-clock budget. Overrun degrades the
    /// outcome to null and marks the stage failed in the monitor; the job
    /// continues either way.
    async fn run_checklist(
        &self,
        job: &Job,
        eval_data: Arc<EvalData>,
        stage_start: Instant,
    ) -> Option<ChecklistOutcome> {
        match tokio::time::timeout(CHECKLIST_BUDGET, self.checklist.evaluate(eval_data)).await {
            Ok(outcome) => {
                self.record(
                    job,
                    Stage::EvaluatingChecklist,
                    StageStatus::Success,
                    stage_start,
                    Some(json!({"overall_completion": outcome.overall_completion})),
                    None,
                );
                Some(outcome)
            }
            Err(_) => {
                warn!("[{}] checklist stage exceeded its budget, degrading", job.id);
                let err = PipelineError::degradable("evaluating_checklist", "budget exceeded");
                self.record(
                    job,
                    Stage::EvaluatingChecklist,
                    StageStatus::Failure,
                    stage_start,
                    None,
                    Some(&err),
                );
                None
            }
        }
    }

    fn record(
        &self,
        job: &Job,
        stage: Stage,
        status: StageStatus,
        stage_start: Instant,
        metadata: Option<serde_json::Value>,
        error: Option<&PipelineError>,
    ) {
        self.monitor.record_stage(
            &job.id,
            &job.url,
            job.url_kind,
            stage,
            status,
            stage_start.elapsed().as_millis() as u64,
            metadata,
            error.map(|e| e.to_string()).as_deref(),
        );
    }
}
