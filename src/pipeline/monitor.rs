//! Pipeline monitor
//!
//! Every stage transition lands as one raw row plus an upsert into rolling
//! aggregates for four period buckets (hour/day/week/month). Both writes run
//! under the store's connection lock so counter read-modify-writes are
//! linearizable per (period_type, period_start, stage) key.

use crate::models::{Stage, UrlKind};
use crate::store::PerformanceStore;
use anyhow::Result;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, Timelike, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Success,
    Failure,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Hour,
    Day,
    Week,
    Month,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            _ => None,
        }
    }

    fn lookback_window(&self, periods: u32) -> ChronoDuration {
        match self {
            Self::Hour => ChronoDuration::hours(periods as i64),
            Self::Day => ChronoDuration::days(periods as i64),
            Self::Week => ChronoDuration::weeks(periods as i64),
            Self::Month => ChronoDuration::days(periods as i64 * 31),
        }
    }
}

/// One aggregate row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRates {
    pub stage: String,
    pub period_start: String,
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    pub success_rate: f64,
    pub avg_duration_ms: Option<f64>,
}

/// One raw stage row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDetail {
    pub job_id: String,
    pub url: String,
    pub url_kind: String,
    pub stage: String,
    pub status: String,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub recorded_at: String,
}

pub struct PipelineMonitor {
    store: Arc<PerformanceStore>,
}

impl PipelineMonitor {
    pub fn new(store: Arc<PerformanceStore>) -> Self {
        Self { store }
    }

    /// Record one stage transition. A monitoring failure is logged, never
    /// propagated; the pipeline does not depend on its own telemetry.
    #[allow(clippy::too_many_arguments)]
    pub fn record_stage(
        &self,
        job_id: &str,
        url: &str,
        url_kind: UrlKind,
        stage: Stage,
        status: StageStatus,
        duration_ms: u64,
        metadata: Option<serde_json::Value>,
        error_message: Option<&str>,
    ) {
        if let Err(e) = self.record_stage_inner(
            job_id,
            url,
            url_kind,
            stage,
            status,
            duration_ms,
            metadata,
            error_message,
        ) {
            error!("failed to record pipeline stage: {}", e);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_stage_inner(
        &self,
        job_id: &str,
        url: &str,
        url_kind: UrlKind,
        stage: Stage,
        status: StageStatus,
        duration_ms: u64,
        metadata: Option<serde_json::Value>,
        error_message: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now();
        let conn = self.store.lock_conn();

        conn.execute(
            "INSERT INTO pipeline_monitoring (job_id, url, url_kind, stage, status, duration_ms, error, metadata, recorded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                job_id,
                url,
                url_kind.as_str(),
                stage.as_str(),
                status.as_str(),
                duration_ms as i64,
                error_message,
                metadata.map(|m| m.to_string()),
                now.to_rfc3339(),
            ],
        )?;

        for period in [
            PeriodType::Hour,
            PeriodType::Day,
            PeriodType::Week,
            PeriodType::Month,
        ] {
            let period_start = period_start(period, now);
            update_period_rate(&conn, period, &period_start, stage, status, duration_ms)?;
        }

        Ok(())
    }

    pub fn get_success_rates(
        &self,
        period: PeriodType,
        lookback: u32,
    ) -> Result<Vec<StageRates>> {
        let cutoff = (Utc::now() - period.lookback_window(lookback)).to_rfc3339();
        let conn = self.store.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT stage, period_start, total_count, success_count, failure_count, success_rate, avg_duration_ms \
             FROM pipeline_success_rates \
             WHERE period_type = ?1 AND period_start >= ?2 \
             ORDER BY period_start DESC, stage",
        )?;
        let rows = stmt
            .query_map(params![period.as_str(), cutoff], |row| {
                Ok(StageRates {
                    stage: row.get(0)?,
                    period_start: row.get(1)?,
                    total: row.get::<_, i64>(2)? as u64,
                    success: row.get::<_, i64>(3)? as u64,
                    failure: row.get::<_, i64>(4)? as u64,
                    success_rate: row.get(5)?,
                    avg_duration_ms: row.get(6)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn get_stage_details(&self, stage: &str, limit: usize) -> Result<Vec<StageDetail>> {
        let conn = self.store.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT job_id, url, url_kind, stage, status, duration_ms, error, metadata, recorded_at \
             FROM pipeline_monitoring \
             WHERE stage = ?1 \
             ORDER BY id DESC \
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![stage, limit as i64], |row| {
                Ok(StageDetail {
                    job_id: row.get(0)?,
                    url: row.get(1)?,
                    url_kind: row.get(2)?,
                    stage: row.get(3)?,
                    status: row.get(4)?,
                    duration_ms: row.get(5)?,
                    error: row.get(6)?,
                    metadata: row
                        .get::<_, Option<String>>(7)?
                        .and_then(|m| serde_json::from_str(&m).ok()),
                    recorded_at: row.get(8)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }
}

/// Bucket start for a period type, RFC3339. Weeks start on Monday.
fn period_start(period: PeriodType, now: DateTime<Utc>) -> String {
    let day_start = now
        .with_hour(0)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);

    let start = match period {
        PeriodType::Hour => now
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now),
        PeriodType::Day => day_start,
        PeriodType::Week => {
            day_start - ChronoDuration::days(now.weekday().num_days_from_monday() as i64)
        }
        PeriodType::Month => day_start
            .with_day(1)
            .unwrap_or(day_start),
    };
    start.to_rfc3339()
}

fn update_period_rate(
    conn: &Connection,
    period: PeriodType,
    period_start: &str,
    stage: Stage,
    status: StageStatus,
    duration_ms: u64,
) -> Result<()> {
    let existing: Option<(i64, i64, i64, Option<f64>)> = conn
        .query_row(
            "SELECT total_count, success_count, failure_count, avg_duration_ms \
             FROM pipeline_success_rates \
             WHERE period_type = ?1 AND period_start = ?2 AND stage = ?3",
            params![period.as_str(), period_start, stage.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    let now = Utc::now().to_rfc3339();
    match existing {
        Some((total, success, failure, avg)) => {
            let total = total + 1;
            let success = success + i64::from(status == StageStatus::Success);
            let failure = failure + i64::from(status == StageStatus::Failure);
            let success_rate = success as f64 / total as f64 * 100.0;
            let new_avg = match avg {
                Some(current) => (current * (total - 1) as f64 + duration_ms as f64) / total as f64,
                None => duration_ms as f64,
            };
            conn.execute(
                "UPDATE pipeline_success_rates \
                 SET total_count = ?1, success_count = ?2, failure_count = ?3, \
                     success_rate = ?4, avg_duration_ms = ?5, updated_at = ?6 \
                 WHERE period_type = ?7 AND period_start = ?8 AND stage = ?9",
                params![
                    total,
                    success,
                    failure,
                    success_rate,
                    new_avg,
                    now,
                    period.as_str(),
                    period_start,
                    stage.as_str(),
                ],
            )?;
        }
        None => {
            let success = i64::from(status == StageStatus::Success);
            let failure = i64::from(status == StageStatus::Failure);
            let success_rate = success as f64 * 100.0;
            conn.execute(
                "INSERT INTO pipeline_success_rates \
                 (period_type, period_start, stage, total_count, success_count, failure_count, success_rate, avg_duration_ms, updated_at) \
                 VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6, ?7, ?8)",
                params![
                    period.as_str(),
                    period_start,
                    stage.as_str(),
                    success,
                    failure,
                    success_rate,
                    duration_ms as f64,
                    now,
                ],
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> PipelineMonitor {
        PipelineMonitor::new(Arc::new(PerformanceStore::in_memory().unwrap()))
    }

    #[test]
    fn aggregates_match_recorded_outcomes() {
        let m = monitor();
        for i in 0..10 {
            let status = if i < 8 {
                StageStatus::Success
            } else {
                StageStatus::Failure
            };
            m.record_stage(
                &format!("job-{}", i),
                "https://www.qoo10.jp/g/1",
                UrlKind::Product,
                Stage::Crawling,
                status,
                1_000,
                None,
                (status == StageStatus::Failure).then_some("HTTP 429"),
            );
        }

        let rates = m.get_success_rates(PeriodType::Day, 1).unwrap();
        let crawling = rates.iter().find(|r| r.stage == "crawling").unwrap();
        assert_eq!(crawling.total, 10);
        assert_eq!(crawling.success, 8);
        assert_eq!(crawling.failure, 2);
        assert_eq!(crawling.success + crawling.failure, crawling.total);
        assert!((crawling.success_rate - 80.0).abs() < 1e-9);
        assert!((crawling.avg_duration_ms.unwrap() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn all_four_period_buckets_are_updated() {
        let m = monitor();
        m.record_stage(
            "job-1",
            "https://www.qoo10.jp/g/1",
            UrlKind::Product,
            Stage::Analyzing,
            StageStatus::Success,
            250,
            None,
            None,
        );
        for period in [
            PeriodType::Hour,
            PeriodType::Day,
            PeriodType::Week,
            PeriodType::Month,
        ] {
            let rates = m.get_success_rates(period, 1).unwrap();
            assert_eq!(rates.len(), 1, "missing bucket for {:?}", period);
            assert_eq!(rates[0].total, 1);
        }
    }

    #[test]
    fn stage_details_return_newest_first() {
        let m = monitor();
        for i in 0..3 {
            m.record_stage(
                &format!("job-{}", i),
                "u",
                UrlKind::Product,
                Stage::Crawling,
                StageStatus::Success,
                i * 100,
                Some(serde_json::json!({"attempt": i})),
                None,
            );
        }
        let details = m.get_stage_details("crawling", 2).unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].job_id, "job-2");
        assert_eq!(details[1].job_id, "job-1");
        assert_eq!(details[0].metadata.as_ref().unwrap()["attempt"], 2);
    }
}
