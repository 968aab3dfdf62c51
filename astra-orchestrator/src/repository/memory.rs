//! In-memory repository
//!
//! Implements the store traits over locked hash maps, honoring the same
//! uniqueness contracts as Postgres. Used by service tests and local
//! development without a database.

use std::collections::HashMap;
use std::sync::RwLock;

use astra_core::domain::artifact::{ArtifactStatus, DailyArtifact};
use astra_core::domain::job::{GenerationJob, JobKind, JobStatus};
use async_trait::async_trait;
use uuid::Uuid;

use super::{ArtifactStore, JobStore, NewJob, StoreError, SubjectTimezone};

#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<Uuid, GenerationJob>>,
    artifacts: RwLock<HashMap<Uuid, DailyArtifact>>,
    subjects: RwLock<HashMap<Uuid, SubjectTimezone>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed timezone preferences for a subject.
    pub fn put_subject_timezone(&self, subject_id: Uuid, prefs: SubjectTimezone) {
        self.subjects
            .write()
            .expect("subjects lock poisoned")
            .insert(subject_id, prefs);
    }
}

fn lock_err<T>(_: T) -> StoreError {
    StoreError::Internal("store lock poisoned".to_string())
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, new: NewJob) -> Result<GenerationJob, StoreError> {
        let mut jobs = self.jobs.write().map_err(lock_err)?;

        let duplicate = jobs.values().any(|j| {
            j.subject_id == new.subject_id
                && j.kind == new.kind
                && j.locale == new.locale
                && j.input_hash == new.input_hash
        });
        if duplicate {
            return Err(StoreError::Duplicate);
        }

        let job = GenerationJob {
            id: Uuid::new_v4(),
            subject_id: new.subject_id,
            kind: new.kind,
            locale: new.locale,
            input_hash: new.input_hash,
            status: JobStatus::Pending,
            payload: new.payload,
            result_ref: None,
            error_message: None,
            requested_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
        };
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<GenerationJob>, StoreError> {
        let jobs = self.jobs.read().map_err(lock_err)?;
        Ok(jobs.get(&id).cloned())
    }

    async fn find_job_by_key(
        &self,
        subject_id: Uuid,
        kind: JobKind,
        locale: &str,
        input_hash: &str,
    ) -> Result<Option<GenerationJob>, StoreError> {
        let jobs = self.jobs.read().map_err(lock_err)?;
        Ok(jobs
            .values()
            .find(|j| {
                j.subject_id == subject_id
                    && j.kind == kind
                    && j.locale == locale
                    && j.input_hash == input_hash
            })
            .cloned())
    }

    async fn mark_job_running(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.write().map_err(lock_err)?;
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(false);
        };
        if job.status != JobStatus::Pending {
            return Ok(false);
        }
        job.status = JobStatus::Running;
        job.started_at = Some(chrono::Utc::now());
        Ok(true)
    }

    async fn mark_job_ready(
        &self,
        id: Uuid,
        result_ref: serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().map_err(lock_err)?;
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound)?;
        job.status = JobStatus::Ready;
        job.result_ref = Some(result_ref);
        job.error_message = None;
        job.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn mark_job_failed(&self, id: Uuid, message: &str) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().map_err(lock_err)?;
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound)?;
        job.status = JobStatus::Failed;
        job.error_message = Some(message.to_string());
        job.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn reset_job_pending(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.write().map_err(lock_err)?;
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(false);
        };
        if job.status != JobStatus::Failed {
            return Ok(false);
        }
        job.status = JobStatus::Pending;
        job.error_message = None;
        job.result_ref = None;
        job.started_at = None;
        job.completed_at = None;
        Ok(true)
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn create_artifact(
        &self,
        subject_id: Uuid,
        local_date: &str,
    ) -> Result<DailyArtifact, StoreError> {
        let mut artifacts = self.artifacts.write().map_err(lock_err)?;

        let duplicate = artifacts
            .values()
            .any(|a| a.subject_id == subject_id && a.local_date == local_date);
        if duplicate {
            return Err(StoreError::Duplicate);
        }

        let artifact = DailyArtifact {
            id: Uuid::new_v4(),
            subject_id,
            local_date: local_date.to_string(),
            status: ArtifactStatus::Pending,
            content: None,
            error_message: None,
            generated_at: None,
            created_at: chrono::Utc::now(),
        };
        artifacts.insert(artifact.id, artifact.clone());
        Ok(artifact)
    }

    async fn find_artifact(
        &self,
        subject_id: Uuid,
        local_date: &str,
    ) -> Result<Option<DailyArtifact>, StoreError> {
        let artifacts = self.artifacts.read().map_err(lock_err)?;
        Ok(artifacts
            .values()
            .find(|a| a.subject_id == subject_id && a.local_date == local_date)
            .cloned())
    }

    async fn mark_artifact_ready(
        &self,
        subject_id: Uuid,
        local_date: &str,
        content: serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut artifacts = self.artifacts.write().map_err(lock_err)?;
        let artifact = artifacts
            .values_mut()
            .find(|a| a.subject_id == subject_id && a.local_date == local_date)
            .ok_or(StoreError::NotFound)?;
        artifact.status = ArtifactStatus::Ready;
        artifact.content = Some(content);
        artifact.error_message = None;
        artifact.generated_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn mark_artifact_failed(
        &self,
        subject_id: Uuid,
        local_date: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        let mut artifacts = self.artifacts.write().map_err(lock_err)?;
        let artifact = artifacts
            .values_mut()
            .find(|a| a.subject_id == subject_id && a.local_date == local_date)
            .ok_or(StoreError::NotFound)?;
        artifact.status = ArtifactStatus::Failed;
        artifact.error_message = Some(message.to_string());
        Ok(())
    }

    async fn delete_artifact(
        &self,
        subject_id: Uuid,
        local_date: &str,
    ) -> Result<bool, StoreError> {
        let mut artifacts = self.artifacts.write().map_err(lock_err)?;
        let id = artifacts
            .values()
            .find(|a| a.subject_id == subject_id && a.local_date == local_date)
            .map(|a| a.id);
        Ok(match id {
            Some(id) => artifacts.remove(&id).is_some(),
            None => false,
        })
    }

    async fn existing_dates(
        &self,
        subject_id: Uuid,
        local_dates: &[String],
    ) -> Result<Vec<String>, StoreError> {
        let artifacts = self.artifacts.read().map_err(lock_err)?;
        Ok(local_dates
            .iter()
            .filter(|date| {
                artifacts
                    .values()
                    .any(|a| a.subject_id == subject_id && a.local_date == **date)
            })
            .cloned()
            .collect())
    }

    async fn subject_timezone(&self, subject_id: Uuid) -> Result<SubjectTimezone, StoreError> {
        let subjects = self.subjects.read().map_err(lock_err)?;
        Ok(subjects.get(&subject_id).cloned().unwrap_or_default())
    }
}
