//! Pipeline error kinds
//!
//! Stage boundaries are the only places a job may terminate; everything below
//! a stage raises one of these kinds and the orchestrator decides whether the
//! job fails or degrades.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// URL invalid or kind undetectable. Rejected at the HTTP boundary,
    /// never creates a job.
    #[error("invalid input: {0}")]
    Input(String),

    /// Network failure or non-retryable HTTP status after the retry budget.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Neither product code nor name could be derived from the page.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Unexpected failure inside the analyzer.
    #[error("analysis failed: {0}")]
    Analyze(String),

    /// Recommender / checklist / validator / side-effect failure. The stage
    /// is recorded as a failure but the job proceeds with a degraded field.
    #[error("stage {stage} degraded: {reason}")]
    Degradable { stage: &'static str, reason: String },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    pub fn degradable(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::Degradable {
            stage,
            reason: reason.into(),
        }
    }

    /// Translate to the short Korean message shown to polling clients.
    pub fn user_message(&self) -> String {
        let cause = self.to_string();
        let lower = cause.to_lowercase();

        if lower.contains("timeout") || lower.contains("timed out") {
            return "요청 시간이 초과되었습니다".to_string();
        }
        if lower.contains("detect") || lower.contains("url type") {
            return "URL 유형을 감지할 수 없습니다".to_string();
        }

        match self {
            Self::Fetch(_) => "네트워크 오류가 발생했습니다".to_string(),
            _ => "분석 중 오류가 발생했습니다".to_string(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_errors_translate_to_network_message() {
        let err = PipelineError::fetch("connection refused");
        assert_eq!(err.user_message(), "네트워크 오류가 발생했습니다");
    }

    #[test]
    fn timeout_wins_over_kind() {
        let err = PipelineError::fetch("request timed out after 15s");
        assert_eq!(err.user_message(), "요청 시간이 초과되었습니다");
    }

    #[test]
    fn undetectable_kind_translates() {
        let err = PipelineError::input("could not detect url type");
        assert_eq!(err.user_message(), "URL 유형을 감지할 수 없습니다");
    }

    #[test]
    fn other_kinds_fall_to_the_generic_message() {
        let err = PipelineError::extraction("no code, no name");
        assert_eq!(err.user_message(), "분석 중 오류가 발생했습니다");
    }
}
