//! Cache job endpoints: trigger a refresh, inspect progress, invalidate.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use empcache_core::ProgressEvent;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{ApiError, AppState};
use crate::service::WarmerTask;

/// Optional body of `POST /jobs/refresh`.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    /// Records already processed; omitted means resume from the progress log.
    #[serde(default)]
    pub start_after: Option<u64>,
    /// Records per page; omitted means the configured page size.
    #[serde(default)]
    pub batch_size: Option<usize>,
}

/// Queues a cache refresh and returns immediately with 202.
///
/// # Errors
///
/// Returns [`ApiError::Queue`] if the scheduler is no longer running.
pub async fn refresh_handler(
    State(state): State<AppState>,
    body: Option<Json<RefreshRequest>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let task = WarmerTask::Refresh {
        start_after: request.start_after,
        batch_size: request.batch_size,
    };
    state.jobs.enqueue(task).await.map_err(ApiError::Queue)?;
    info!(
        start_after = ?request.start_after,
        batch_size = ?request.batch_size,
        "refresh queued over http"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "queued": true,
            "start_after": request.start_after,
            "batch_size": request.batch_size,
        })),
    ))
}

/// Returns the latest progress event of the refresh job, or `null`.
///
/// # Errors
///
/// Returns [`ApiError::Progress`] if the progress log cannot be read.
pub async fn job_status_handler(
    State(state): State<AppState>,
) -> Result<Json<Option<ProgressEvent>>, ApiError> {
    let job = state.job_name.clone();
    let latest = state
        .progress
        .run_blocking(move |log| log.latest_state(&job))
        .await?;
    Ok(Json(latest))
}

/// Drops every cached page and the cached-pages index.
///
/// # Errors
///
/// Returns [`ApiError::Cache`] if the cache backend is unreachable.
pub async fn clear_cache_handler(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let removed = state.cache.clear_all()?;
    info!(removed, "page cache cleared over http");
    Ok(StatusCode::NO_CONTENT)
}
