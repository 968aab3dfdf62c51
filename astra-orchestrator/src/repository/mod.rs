//! Repository layer
//!
//! Durable storage for job and daily-artifact records behind async traits,
//! so services can be tested against an in-memory store and the Postgres
//! implementation can later be swapped for anything honoring the same
//! uniqueness contracts.
//!
//! All coordination (dedup, exactly-one-RUNNING) is expressed as store-level
//! uniqueness and conditional updates, never as in-memory locks in the
//! services, so the design stays correct if the scheduler is ever replaced
//! by a distributed one.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use astra_core::domain::artifact::DailyArtifact;
use astra_core::domain::job::{GenerationJob, JobKind};
use thiserror::Error;
use uuid::Uuid;

/// Store error type
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    /// A unique key already exists. Internal race signal only: callers must
    /// convert this to a re-fetch, never surface it.
    #[error("unique key already exists")]
    Duplicate,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store error: {0}")]
    Internal(String),
}

/// Fields needed to create a PENDING job record.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub subject_id: Uuid,
    pub kind: JobKind,
    pub locale: String,
    pub input_hash: String,
    pub payload: serde_json::Value,
}

/// Stored timezone preferences for a subject. Both fields may be absent;
/// resolution falls back to UTC.
#[derive(Debug, Clone, Default)]
pub struct SubjectTimezone {
    pub iana_zone: Option<String>,
    pub utc_offset_minutes: Option<i32>,
}

/// Storage contract for generation-job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a PENDING record. Fails with [`StoreError::Duplicate`] when the
    /// unique tuple (subject, kind, locale, input_hash) already exists; under
    /// concurrent identical requests exactly one caller's create succeeds.
    async fn create_job(&self, new: NewJob) -> Result<GenerationJob, StoreError>;

    async fn find_job(&self, id: Uuid) -> Result<Option<GenerationJob>, StoreError>;

    async fn find_job_by_key(
        &self,
        subject_id: Uuid,
        kind: JobKind,
        locale: &str,
        input_hash: &str,
    ) -> Result<Option<GenerationJob>, StoreError>;

    /// PENDING -> RUNNING, conditional on the record still being PENDING.
    /// Returns false when the record was not PENDING (already claimed or
    /// terminal), in which case the caller must not execute.
    async fn mark_job_running(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn mark_job_ready(
        &self,
        id: Uuid,
        result_ref: serde_json::Value,
    ) -> Result<(), StoreError>;

    async fn mark_job_failed(&self, id: Uuid, message: &str) -> Result<(), StoreError>;

    /// FAILED -> PENDING with error cleared. Returns false when the record
    /// was not FAILED; retry is inert in every other state.
    async fn reset_job_pending(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Storage contract for daily artifacts and subject timezone preferences.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Insert a PENDING artifact. Fails with [`StoreError::Duplicate`] when
    /// (subject, local_date) already exists.
    async fn create_artifact(
        &self,
        subject_id: Uuid,
        local_date: &str,
    ) -> Result<DailyArtifact, StoreError>;

    async fn find_artifact(
        &self,
        subject_id: Uuid,
        local_date: &str,
    ) -> Result<Option<DailyArtifact>, StoreError>;

    async fn mark_artifact_ready(
        &self,
        subject_id: Uuid,
        local_date: &str,
        content: serde_json::Value,
    ) -> Result<(), StoreError>;

    async fn mark_artifact_failed(
        &self,
        subject_id: Uuid,
        local_date: &str,
        message: &str,
    ) -> Result<(), StoreError>;

    /// Remove an artifact record. Used by the read path to self-heal FAILED
    /// records. Returns whether a record was deleted.
    async fn delete_artifact(&self, subject_id: Uuid, local_date: &str)
    -> Result<bool, StoreError>;

    /// Which of `local_dates` already have an artifact record for the subject.
    async fn existing_dates(
        &self,
        subject_id: Uuid,
        local_dates: &[String],
    ) -> Result<Vec<String>, StoreError>;

    /// Stored timezone preferences; defaults when the subject is unknown.
    async fn subject_timezone(&self, subject_id: Uuid) -> Result<SubjectTimezone, StoreError>;
}
