use reqwest::StatusCode;
use thiserror::Error;

/// Generic chat text shown for any failed analysis turn.
pub const ANALYZE_FAILURE_TEXT: &str = "❌ Ocorreu um erro ao analisar sua solicitação.";

/// Generic chat text shown when the CSV report endpoint fails.
pub const REPORT_FAILURE_TEXT: &str = "❌ Erro ao gerar o relatório CSV.";

/// Failure taxonomy of the analysis API.
///
/// None of the variants carry enough detail for the end user; callers surface
/// [`ApiError::user_message`] and log the rest.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server responded {status}: {detail}")]
    Status { status: StatusCode, detail: String },

    #[error("response could not be parsed: {0}")]
    Parse(String),

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn user_message(&self) -> &'static str {
        ANALYZE_FAILURE_TEXT
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Parse(err.to_string())
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
