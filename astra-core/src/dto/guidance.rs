//! Daily guidance DTOs

use serde::{Deserialize, Serialize};

use crate::domain::artifact::{ArtifactStatus, DailyArtifact};

/// Response of the lazy-compute guidance endpoint.
///
/// READY carries the content; PENDING means the caller should poll again
/// shortly; FAILED carries a display-ready message and heals itself on the
/// next request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidanceResponse {
    pub status: ArtifactStatus,
    pub local_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GuidanceResponse {
    pub fn ready(artifact: DailyArtifact) -> Self {
        Self {
            status: ArtifactStatus::Ready,
            local_date: artifact.local_date,
            content: artifact.content,
            message: None,
        }
    }

    pub fn failed(artifact: DailyArtifact) -> Self {
        Self {
            status: ArtifactStatus::Failed,
            local_date: artifact.local_date,
            content: None,
            message: artifact.error_message,
        }
    }

    pub fn pending(local_date: &str) -> Self {
        Self {
            status: ArtifactStatus::Pending,
            local_date: local_date.to_string(),
            content: None,
            message: Some("Your guidance is still being generated, check back shortly".to_string()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == ArtifactStatus::Ready
    }
}
