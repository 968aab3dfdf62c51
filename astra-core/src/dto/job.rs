//! Job DTOs for the orchestrator API

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::{GenerationJob, JobKind, JobStatus};

/// Request to submit (or re-submit) a generation job.
///
/// Submission is idempotent: the same logical input always resolves to the
/// same job, so clients may retry this request freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJobRequest {
    pub kind: JobKind,
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Raw kind-specific input; normalized and hashed server-side.
    pub input: serde_json::Value,
}

fn default_locale() -> String {
    "en".to_string()
}

/// Caller-facing view of a job's current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub requested_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<GenerationJob> for JobStatusView {
    fn from(job: GenerationJob) -> Self {
        Self {
            job_id: job.id,
            kind: job.kind,
            status: job.status,
            result_ref: job.result_ref,
            error_message: job.error_message,
            requested_at: job.requested_at,
            completed_at: job.completed_at,
        }
    }
}
