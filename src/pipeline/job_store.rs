//! In-process job store
//!
//! Jobs live for the process lifetime in a map behind a parking_lot RwLock.
//! Only the worker driving a job mutates it; readers always see a cloned
//! snapshot. Progress percent is monotone while the job is running and
//! freezes at its last value on failure.

use crate::models::{Job, JobStatus, Progress, Report, UrlKind};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn create(&self, url: &str, url_kind: UrlKind) -> Job {
        let job = Job {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            url_kind,
            status: JobStatus::Queued,
            progress: Progress::new("queued", 0, "분석 대기 중입니다"),
            result: None,
            error: None,
            created_at: Utc::now(),
        };
        self.jobs.write().insert(job.id.clone(), job.clone());
        job
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().get(job_id).cloned()
    }

    pub fn mark_running(&self, job_id: &str) {
        if let Some(job) = self.jobs.write().get_mut(job_id) {
            if job.status == JobStatus::Queued {
                job.status = JobStatus::Running;
            }
        }
    }

    /// Progress only moves forward; a stage reporting a lower percent keeps
    /// the previous value.
    pub fn update_progress(&self, job_id: &str, stage: &str, percent: u8, message: &str) {
        if let Some(job) = self.jobs.write().get_mut(job_id) {
            if job.status.is_terminal() {
                return;
            }
            let percent = percent.max(job.progress.percent);
            job.progress = Progress::new(stage, percent, message);
        }
    }

    pub fn set_result(&self, job_id: &str, report: Report) {
        if let Some(job) = self.jobs.write().get_mut(job_id) {
            job.status = JobStatus::Completed;
            job.result = Some(report);
            job.error = None;
            job.progress = Progress::new("finalizing", 100, "분석이 완료되었습니다");
        }
    }

    /// Terminal failure; percent freezes at the last reported value.
    pub fn set_error(&self, job_id: &str, message: &str) {
        if let Some(job) = self.jobs.write().get_mut(job_id) {
            job.status = JobStatus::Failed;
            job.result = None;
            job.error = Some(message.to_string());
            job.progress.message = message.to_string();
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DataSource;

    fn empty_report() -> Report {
        Report {
            product: None,
            shop: None,
            analyzer_result: None,
            shop_analyzer_result: None,
            recommendations: vec![],
            checklist_outcome: None,
            validation_outcome: None,
            data_source: DataSource::HtmlFetch,
        }
    }

    #[test]
    fn completed_jobs_satisfy_terminal_invariants() {
        let store = JobStore::new();
        let job = store.create("https://www.qoo10.jp/g/1", UrlKind::Product);
        store.mark_running(&job.id);
        store.update_progress(&job.id, "crawling", 20, "수집 중");
        store.set_result(&job.id, empty_report());

        let done = store.get(&job.id).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress.percent, 100);
        assert!(done.result.is_some());
        assert!(done.error.is_none());
    }

    #[test]
    fn failed_jobs_freeze_percent_and_carry_error() {
        let store = JobStore::new();
        let job = store.create("https://www.qoo10.jp/g/1", UrlKind::Product);
        store.mark_running(&job.id);
        store.update_progress(&job.id, "crawling", 20, "수집 중");
        store.set_error(&job.id, "네트워크 오류가 발생했습니다");

        let failed = store.get(&job.id).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.progress.percent, 20);
        assert!(failed.result.is_none());
        assert_eq!(failed.error.as_deref(), Some("네트워크 오류가 발생했습니다"));

        // Terminal jobs ignore further progress updates.
        store.update_progress(&job.id, "analyzing", 50, "무시되어야 함");
        assert_eq!(store.get(&job.id).unwrap().progress.percent, 20);
    }

    #[test]
    fn progress_is_monotone_while_running() {
        let store = JobStore::new();
        let job = store.create("https://www.qoo10.jp/g/1", UrlKind::Product);
        store.mark_running(&job.id);
        store.update_progress(&job.id, "checklist", 75, "평가 중");
        store.update_progress(&job.id, "validating", 60, "검증 중");
        assert_eq!(store.get(&job.id).unwrap().progress.percent, 75);
    }
}
