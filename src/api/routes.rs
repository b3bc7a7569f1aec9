//! HTTP API routes
//!
//! Submit / poll / download plus the monitor, statistics and error-report
//! surfaces. Handlers translate domain state into status codes; everything
//! else lives below the API layer.

use crate::api::{report, AppState};
use crate::models::{JobStatus, Progress, Report, UrlKind};
use crate::scrapers::urls;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub job_id: String,
    pub status: &'static str,
    pub url_kind: UrlKind,
    pub eta_s: u32,
}

/// Enqueue one analysis job and return immediately.
pub async fn start_analysis(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Response {
    let url = request.url.trim().to_string();

    if !urls::is_marketplace_url(&url) {
        return error_body(StatusCode::BAD_REQUEST, "지원하지 않는 URL입니다 (qoo10.jp 전용)");
    }
    let url_kind = urls::detect_url_kind(&url);
    if url_kind == UrlKind::Unknown {
        return error_body(StatusCode::BAD_REQUEST, "URL 유형을 감지할 수 없습니다");
    }

    let job = state.jobs.create(&url, url_kind);
    info!("[{}] job queued - {} ({})", job.id, url, url_kind.as_str());

    let orchestrator = state.orchestrator.clone();
    let semaphore = state.worker_semaphore.clone();
    let job_id = job.id.clone();
    tokio::spawn(async move {
        let _permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return, // semaphore closed on shutdown; job is dropped
        };
        orchestrator.run(&job_id).await;
    });

    let eta_s = match url_kind {
        UrlKind::Product => 30,
        UrlKind::Shop => 60,
        UrlKind::Unknown => 0,
    };

    (
        StatusCode::ACCEPTED,
        Json(AnalyzeResponse {
            job_id: job.id,
            status: "queued",
            url_kind,
            eta_s,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub url_kind: UrlKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Report>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn get_analysis(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    let Some(job) = state.jobs.get(&job_id) else {
        return error_body(StatusCode::NOT_FOUND, "해당 분석을 찾을 수 없습니다");
    };

    Json(JobSnapshot {
        job_id: job.id,
        status: job.status,
        url_kind: job.url_kind,
        progress: Some(job.progress),
        result: job.result,
        error: job.error,
    })
    .into_response()
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub format: Option<String>,
}

pub async fn download_report(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Response {
    let Some(job) = state.jobs.get(&job_id) else {
        return error_body(StatusCode::NOT_FOUND, "해당 분석을 찾을 수 없습니다");
    };
    if job.status != JobStatus::Completed {
        return error_body(StatusCode::BAD_REQUEST, "분석이 아직 완료되지 않았습니다");
    }
    let Some(result) = &job.result else {
        return error_body(StatusCode::BAD_REQUEST, "분석 결과가 비어 있습니다");
    };

    match query.format.as_deref().unwrap_or("markdown") {
        "markdown" => {
            let body = report::render_markdown(&job, result);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
                body,
            )
                .into_response()
        }
        "pdf" | "excel" => error_body(
            StatusCode::NOT_IMPLEMENTED,
            "PDF/Excel 렌더링은 외부 리포트 서비스에서 제공됩니다",
        ),
        _ => error_body(StatusCode::BAD_REQUEST, "지원하지 않는 형식입니다"),
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "ts": Utc::now().to_rfc3339() }))
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SuccessRateQuery {
    pub period: Option<String>,
    pub lookback: Option<u32>,
}

pub async fn get_success_rates(
    State(state): State<AppState>,
    Query(query): Query<SuccessRateQuery>,
) -> Response {
    let period_raw = query.period.unwrap_or_else(|| "day".to_string());
    let Some(period) = crate::pipeline::PeriodType::parse(&period_raw) else {
        return error_body(
            StatusCode::BAD_REQUEST,
            "period는 hour/day/week/month 중 하나여야 합니다",
        );
    };
    let lookback = query.lookback.unwrap_or(7).clamp(1, 90);

    match state.monitor.get_success_rates(period, lookback) {
        Ok(rates) => Json(json!({
            "period": period.as_str(),
            "lookback": lookback,
            "rates": rates,
        }))
        .into_response(),
        Err(e) => {
            error!("success-rate query failed: {}", e);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "집계 조회에 실패했습니다")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StageDetailQuery {
    pub limit: Option<usize>,
}

pub async fn get_stage_details(
    State(state): State<AppState>,
    Path(stage): Path<String>,
    Query(query): Query<StageDetailQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    match state.monitor.get_stage_details(&stage, limit) {
        Ok(details) => Json(json!({ "stage": stage, "records": details })).into_response(),
        Err(e) => {
            error!("stage detail query failed: {}", e);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "조회에 실패했습니다")
        }
    }
}

// ---------------------------------------------------------------------------
// Crawler statistics
// ---------------------------------------------------------------------------

pub async fn get_crawler_statistics(State(state): State<AppState>) -> Response {
    match state.store.statistics() {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            error!("statistics query failed: {}", e);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "통계 조회에 실패했습니다")
        }
    }
}

// ---------------------------------------------------------------------------
// Error reports (chunk feedback loop)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ErrorReportRequest {
    pub job_id: String,
    pub field: String,
    #[serde(default)]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub crawler_value: Option<serde_json::Value>,
    #[serde(default)]
    pub report_value: Option<serde_json::Value>,
}

pub async fn submit_error_report(
    State(state): State<AppState>,
    Json(request): Json<ErrorReportRequest>,
) -> Response {
    let Some(job) = state.jobs.get(&request.job_id) else {
        return error_body(StatusCode::NOT_FOUND, "해당 분석을 찾을 수 없습니다");
    };
    if job.status != JobStatus::Completed {
        return error_body(StatusCode::BAD_REQUEST, "완료된 분석에 대해서만 신고할 수 있습니다");
    }

    let (structure, code) = match job.result.as_ref() {
        Some(result) => match (&result.product, &result.shop) {
            (Some(product), _) => (product.page_structure.clone(), Some(product.code.clone())),
            (None, Some(shop)) => (shop.page_structure.clone(), None),
            (None, None) => (None, None),
        },
        None => (None, None),
    };

    let input = crate::feedback::ErrorReportInput {
        job_id: request.job_id,
        url: job.url.clone(),
        field: request.field,
        issue_type: request.issue_type.unwrap_or_else(|| "mismatch".to_string()),
        severity: request.severity.unwrap_or_else(|| "medium".to_string()),
        description: request.description,
        crawler_value: request.crawler_value,
        report_value: request.report_value,
    };

    match state.feedback.report(&input, structure.as_ref(), code.as_deref()) {
        Ok(report_id) => (
            StatusCode::CREATED,
            Json(json!({
                "error_report_id": report_id,
                "status": "reported",
                "message": "오류 신고가 저장되었습니다",
            })),
        )
            .into_response(),
        Err(e) => {
            error!("error report not saved: {}", e);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "신고 저장에 실패했습니다")
        }
    }
}

pub async fn resolve_error_report(
    State(state): State<AppState>,
    Path(report_id): Path<i64>,
) -> Response {
    match state.feedback.resolve(report_id) {
        Ok(true) => Json(json!({ "status": "resolved" })).into_response(),
        Ok(false) => error_body(StatusCode::NOT_FOUND, "열린 신고를 찾을 수 없습니다"),
        Err(e) => {
            error!("error report not resolved: {}", e);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "신고 처리에 실패했습니다")
        }
    }
}
