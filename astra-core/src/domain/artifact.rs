//! Daily artifact domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One generated daily-guidance artifact per (subject, local calendar date).
///
/// The local date string is computed once from the subject's resolved
/// timezone when the record is first touched and never recomputed mid-flow,
/// so a request straddling midnight is never evaluated against two "todays".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyArtifact {
    pub id: Uuid,
    pub subject_id: Uuid,
    /// Calendar date in the subject's local timezone, "YYYY-MM-DD".
    pub local_date: String,
    pub status: ArtifactStatus,
    pub content: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub generated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Artifact lifecycle status.
///
/// Unlike jobs, FAILED artifacts are deleted by the read path itself on next
/// access, so the polling read path self-heals without an explicit retry call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ArtifactStatus {
    Pending,
    Ready,
    Failed,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Pending => "PENDING",
            ArtifactStatus::Ready => "READY",
            ArtifactStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<ArtifactStatus> {
        match s {
            "PENDING" => Some(ArtifactStatus::Pending),
            "READY" => Some(ArtifactStatus::Ready),
            "FAILED" => Some(ArtifactStatus::Failed),
            _ => None,
        }
    }
}
