use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use modelhost_learning::{SchemaError, ScoringError, TableError, TrainingError};
use thiserror::Error;

/// Every way a pipeline run can fail.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Network failure, timeout or non-success status from a remote service.
    #[error("upstream {url} unavailable: {reason}")]
    UpstreamUnavailable {
        /// Remote URL.
        url: String,
        /// Transport error or status line.
        reason: String,
    },
    /// Fetched payload is not a table.
    #[error("data source {url} is not a readable table: {source}")]
    MalformedTable {
        /// Source URL.
        url: String,
        /// Parser failure.
        source: TableError,
    },
    /// Requested predictor/target columns are not in the fetched table.
    #[error("data source {url} doesn't have required columns ({source})")]
    Schema {
        /// Source URL.
        url: String,
        /// Which columns were wrong.
        source: SchemaError,
    },
    /// Split, fit or evaluation failed.
    #[error("training failed: {0}")]
    Training(#[from] TrainingError),
    /// Artifact decoding or prediction failed.
    #[error("scoring failed: {0}")]
    Scoring(#[from] ScoringError),
    /// Registry rejected the upload or answered with something other than JSON.
    #[error("registry {url} rejected the upload (status {status}): {body}")]
    Publish {
        /// Registry endpoint.
        url: String,
        /// Status reported by the registry.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// Inbound request is incomplete or inconsistent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Worker pool or other local failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Short machine-readable kind, used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::MalformedTable { .. } => "malformed_table",
            Self::Schema { .. } => "schema",
            Self::Training(_) => "training",
            Self::Scoring(_) => "scoring",
            Self::Publish { .. } => "publish",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Internal(_) => "internal",
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Schema { .. } => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}
