//! Error responses for the HTTP handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::progress::ProgressLogError;
use crate::storage::CacheError;

/// Failures surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("record store unavailable: {0}")]
    Store(#[source] anyhow::Error),
    #[error("page cache unavailable: {0}")]
    Cache(#[from] CacheError),
    #[error("progress log unavailable: {0}")]
    Progress(#[from] ProgressLogError),
    #[error("job queue unavailable: {0}")]
    Queue(#[source] anyhow::Error),
}

impl ApiError {
    /// HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Progress(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Store(_) | Self::Cache(_) | Self::Queue(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        error!(status = status.as_u16(), error = %self, "request failed");
        let body = ErrorBody {
            error: self.to_string(),
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
