pub mod report;
pub mod routes;

use crate::analysis::{
    ChecklistEvaluator, DataValidator, ProductAnalyzer, Recommender, ShopAnalyzer,
};
use crate::feedback::ErrorReportingService;
use crate::models::Config;
use crate::pipeline::{JobStore, Orchestrator, PipelineMonitor};
use crate::scrapers::Scraper;
use crate::store::PerformanceStore;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Shared handles for the HTTP layer and the workers it spawns.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PerformanceStore>,
    pub jobs: Arc<JobStore>,
    pub monitor: Arc<PipelineMonitor>,
    pub orchestrator: Arc<Orchestrator>,
    pub feedback: Arc<ErrorReportingService>,
    pub worker_semaphore: Arc<Semaphore>,
}

impl AppState {
    /// Wire up every component against one performance store.
    pub fn build(config: &Config, store: Arc<PerformanceStore>) -> Result<Self> {
        let jobs = Arc::new(JobStore::new());
        let monitor = Arc::new(PipelineMonitor::new(store.clone()));
        let orchestrator = Arc::new(Orchestrator {
            store: store.clone(),
            scraper: Arc::new(Scraper::new(store.clone(), config.proxies.clone())),
            analyzer: Arc::new(ProductAnalyzer::new()),
            shop_analyzer: Arc::new(ShopAnalyzer::new()),
            recommender: Arc::new(Recommender::new()),
            checklist: Arc::new(ChecklistEvaluator::new()),
            validator: Arc::new(DataValidator::new()),
            monitor: monitor.clone(),
            jobs: jobs.clone(),
        });
        let feedback = Arc::new(ErrorReportingService::new(store.clone()));

        Ok(Self {
            store,
            jobs,
            monitor,
            orchestrator,
            feedback,
            worker_semaphore: Arc::new(Semaphore::new(config.worker_concurrency.max(1))),
        })
    }
}
