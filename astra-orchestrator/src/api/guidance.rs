//! Daily Guidance API Handler
//!
//! The lazy-compute endpoint: responds READY with content when generation
//! finishes inside the wait budget, PENDING otherwise. Never hangs, never
//! errors on "still working".

use axum::{
    Json,
    extract::{Path, Query, State},
};
use astra_core::dto::guidance::GuidanceResponse;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct GuidanceQuery {
    /// Explicit IANA timezone hint; wins over stored preferences.
    pub tz: Option<String>,
    pub locale: Option<String>,
}

/// GET /subject/{subject_id}/guidance/today
pub async fn get_or_compute_guidance(
    State(state): State<AppState>,
    Path(subject_id): Path<Uuid>,
    Query(params): Query<GuidanceQuery>,
) -> ApiResult<Json<GuidanceResponse>> {
    let locale = params.locale.as_deref().unwrap_or("en");
    tracing::debug!(%subject_id, tz = ?params.tz, "guidance request");

    let response = state
        .guidance
        .get_or_compute(subject_id, params.tz.as_deref(), locale)
        .await?;

    Ok(Json(response))
}
