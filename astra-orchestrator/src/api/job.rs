//! Job API Handlers
//!
//! HTTP endpoints for the generation-job lifecycle. Submission always
//! succeeds at the HTTP level and reports job state; only status retrieval
//! reports FAILED with a display-ready message.

use axum::{
    Json,
    extract::{Path, State},
};
use astra_core::dto::job::{JobStatusView, SubmitJobRequest};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /subject/{subject_id}/job
/// Submit a generation job; idempotent per normalized input.
pub async fn submit_job(
    State(state): State<AppState>,
    Path(subject_id): Path<Uuid>,
    Json(req): Json<SubmitJobRequest>,
) -> ApiResult<Json<JobStatusView>> {
    tracing::info!(%subject_id, kind = %req.kind, "job submission");

    let view = state
        .jobs
        .submit(subject_id, req.kind, &req.locale, &req.input)
        .await?;

    Ok(Json(view))
}

/// GET /subject/{subject_id}/job/{job_id}
/// Current job status, result reference or failure message included.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path((subject_id, job_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<JobStatusView>> {
    tracing::debug!(%subject_id, %job_id, "job status lookup");

    let view = state.jobs.get_status(subject_id, job_id).await?;

    Ok(Json(view))
}

/// POST /subject/{subject_id}/job/{job_id}/retry
/// Reset a FAILED job to PENDING; a no-op in every other state.
pub async fn retry_job(
    State(state): State<AppState>,
    Path((subject_id, job_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<JobStatusView>> {
    tracing::info!(%subject_id, %job_id, "job retry requested");

    let view = state.jobs.retry(subject_id, job_id).await?;

    Ok(Json(view))
}
