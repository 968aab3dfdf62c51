//! Generation job domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One attempt to produce a named content artifact for a subject.
///
/// The tuple (subject_id, kind, locale, input_hash) is unique: re-submitting
/// the same logical request always resolves to the same record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub kind: JobKind,
    pub locale: String,
    pub input_hash: String,
    pub status: JobStatus,
    /// Kind-specific normalized request data, stored for audit and for the
    /// pipeline runner to read.
    pub payload: serde_json::Value,
    /// Opaque description of where the produced artifact lives. Set on READY.
    pub result_ref: Option<serde_json::Value>,
    /// Human-readable failure message. Set on FAILED, cleared by retry.
    pub error_message: Option<String>,
    pub requested_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Which generation pipeline a job invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    DailyGuidance,
    NatalChartBasic,
    NatalChartExtended,
    KarmicReading,
    OneTimeReport,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::DailyGuidance,
        JobKind::NatalChartBasic,
        JobKind::NatalChartExtended,
        JobKind::KarmicReading,
        JobKind::OneTimeReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::DailyGuidance => "daily-guidance",
            JobKind::NatalChartBasic => "natal-chart-basic",
            JobKind::NatalChartExtended => "natal-chart-extended",
            JobKind::KarmicReading => "karmic-reading",
            JobKind::OneTimeReport => "one-time-report",
        }
    }

    pub fn parse(s: &str) -> Option<JobKind> {
        JobKind::ALL.iter().copied().find(|k| k.as_str() == s)
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job lifecycle status.
///
/// Created PENDING on first submission; moved to RUNNING by the pipeline
/// runner immediately before invoking the pipeline; RUNNING goes to READY or
/// FAILED when the pipeline call returns; FAILED may be reset to PENDING by
/// an explicit retry. Records are never deleted by the orchestrator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Running,
    Ready,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Ready => "READY",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "PENDING" => Some(JobStatus::Pending),
            "RUNNING" => Some(JobStatus::Running),
            "READY" => Some(JobStatus::Ready),
            "FAILED" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in JobKind::ALL {
            assert_eq!(JobKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(JobKind::parse("tarot-spread"), None);
    }

    #[test]
    fn test_kind_serde_uses_kebab_case() {
        let json = serde_json::to_string(&JobKind::NatalChartBasic).unwrap();
        assert_eq!(json, "\"natal-chart-basic\"");
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Ready,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Ready.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
