//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod guidance;
pub mod health;
pub mod job;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::service::guidance::GuidanceService;
use crate::service::job::JobService;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobService>,
    pub guidance: Arc<GuidanceService>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/subject/{subject_id}/job", post(job::submit_job))
        .route("/subject/{subject_id}/job/{job_id}", get(job::get_job_status))
        .route(
            "/subject/{subject_id}/job/{job_id}/retry",
            post(job::retry_job),
        )
        // Daily guidance (lazy compute)
        .route(
            "/subject/{subject_id}/guidance/today",
            get(guidance::get_or_compute_guidance),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
