//! Postgres repository
//!
//! sqlx-backed implementation of the store traits. Unique-violation errors
//! (SQLSTATE 23505) are mapped to [`StoreError::Duplicate`] so services can
//! resolve create races with a re-fetch.

use astra_core::domain::artifact::{ArtifactStatus, DailyArtifact};
use astra_core::domain::job::{GenerationJob, JobKind, JobStatus};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ArtifactStore, JobStore, NewJob, StoreError, SubjectTimezone};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn create_job(&self, new: NewJob) -> Result<GenerationJob, StoreError> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        sqlx::query(
            r#"
            INSERT INTO jobs (id, subject_id, kind, locale, input_hash, status, payload, requested_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(new.subject_id)
        .bind(new.kind.as_str())
        .bind(&new.locale)
        .bind(&new.input_hash)
        .bind(JobStatus::Pending.as_str())
        .bind(&new.payload)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_insert_err)?;

        Ok(GenerationJob {
            id,
            subject_id: new.subject_id,
            kind: new.kind,
            locale: new.locale,
            input_hash: new.input_hash,
            status: JobStatus::Pending,
            payload: new.payload,
            result_ref: None,
            error_message: None,
            requested_at: now,
            started_at: None,
            completed_at: None,
        })
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<GenerationJob>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, subject_id, kind, locale, input_hash, status, payload,
                   result_ref, error_message, requested_at, started_at, completed_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn find_job_by_key(
        &self,
        subject_id: Uuid,
        kind: JobKind,
        locale: &str,
        input_hash: &str,
    ) -> Result<Option<GenerationJob>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, subject_id, kind, locale, input_hash, status, payload,
                   result_ref, error_message, requested_at, started_at, completed_at
            FROM jobs
            WHERE subject_id = $1 AND kind = $2 AND locale = $3 AND input_hash = $4
            "#,
        )
        .bind(subject_id)
        .bind(kind.as_str())
        .bind(locale)
        .bind(input_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn mark_job_running(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1, started_at = $2
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(JobStatus::Running.as_str())
        .bind(chrono::Utc::now())
        .bind(id)
        .bind(JobStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_job_ready(
        &self,
        id: Uuid,
        result_ref: serde_json::Value,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1, result_ref = $2, error_message = NULL, completed_at = $3
            WHERE id = $4
            "#,
        )
        .bind(JobStatus::Ready.as_str())
        .bind(result_ref)
        .bind(chrono::Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn mark_job_failed(&self, id: Uuid, message: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1, error_message = $2, completed_at = $3
            WHERE id = $4
            "#,
        )
        .bind(JobStatus::Failed.as_str())
        .bind(message)
        .bind(chrono::Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn reset_job_pending(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1, error_message = NULL, result_ref = NULL,
                started_at = NULL, completed_at = NULL
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(JobStatus::Pending.as_str())
        .bind(id)
        .bind(JobStatus::Failed.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ArtifactStore for PgStore {
    async fn create_artifact(
        &self,
        subject_id: Uuid,
        local_date: &str,
    ) -> Result<DailyArtifact, StoreError> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        sqlx::query(
            r#"
            INSERT INTO daily_artifacts (id, subject_id, local_date, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(subject_id)
        .bind(local_date)
        .bind(ArtifactStatus::Pending.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_insert_err)?;

        Ok(DailyArtifact {
            id,
            subject_id,
            local_date: local_date.to_string(),
            status: ArtifactStatus::Pending,
            content: None,
            error_message: None,
            generated_at: None,
            created_at: now,
        })
    }

    async fn find_artifact(
        &self,
        subject_id: Uuid,
        local_date: &str,
    ) -> Result<Option<DailyArtifact>, StoreError> {
        let row = sqlx::query_as::<_, ArtifactRow>(
            r#"
            SELECT id, subject_id, local_date, status, content, error_message,
                   generated_at, created_at
            FROM daily_artifacts
            WHERE subject_id = $1 AND local_date = $2
            "#,
        )
        .bind(subject_id)
        .bind(local_date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn mark_artifact_ready(
        &self,
        subject_id: Uuid,
        local_date: &str,
        content: serde_json::Value,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE daily_artifacts
            SET status = $1, content = $2, error_message = NULL, generated_at = $3
            WHERE subject_id = $4 AND local_date = $5
            "#,
        )
        .bind(ArtifactStatus::Ready.as_str())
        .bind(content)
        .bind(chrono::Utc::now())
        .bind(subject_id)
        .bind(local_date)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn mark_artifact_failed(
        &self,
        subject_id: Uuid,
        local_date: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE daily_artifacts
            SET status = $1, error_message = $2
            WHERE subject_id = $3 AND local_date = $4
            "#,
        )
        .bind(ArtifactStatus::Failed.as_str())
        .bind(message)
        .bind(subject_id)
        .bind(local_date)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_artifact(
        &self,
        subject_id: Uuid,
        local_date: &str,
    ) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM daily_artifacts WHERE subject_id = $1 AND local_date = $2")
                .bind(subject_id)
                .bind(local_date)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn existing_dates(
        &self,
        subject_id: Uuid,
        local_dates: &[String],
    ) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT local_date
            FROM daily_artifacts
            WHERE subject_id = $1 AND local_date = ANY($2)
            "#,
        )
        .bind(subject_id)
        .bind(local_dates)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(date,)| date).collect())
    }

    async fn subject_timezone(&self, subject_id: Uuid) -> Result<SubjectTimezone, StoreError> {
        let row: Option<(Option<String>, Option<i32>)> = sqlx::query_as(
            "SELECT iana_zone, utc_offset_minutes FROM subjects WHERE id = $1",
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|(iana_zone, utc_offset_minutes)| SubjectTimezone {
                iana_zone,
                utc_offset_minutes,
            })
            .unwrap_or_default())
    }
}

fn map_insert_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::Duplicate;
        }
    }
    StoreError::Database(err)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    subject_id: Uuid,
    kind: String,
    locale: String,
    input_hash: String,
    status: String,
    payload: serde_json::Value,
    result_ref: Option<serde_json::Value>,
    error_message: Option<String>,
    requested_at: chrono::DateTime<chrono::Utc>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<JobRow> for GenerationJob {
    fn from(row: JobRow) -> Self {
        GenerationJob {
            id: row.id,
            subject_id: row.subject_id,
            kind: JobKind::parse(&row.kind).unwrap_or(JobKind::DailyGuidance),
            locale: row.locale,
            input_hash: row.input_hash,
            status: JobStatus::parse(&row.status).unwrap_or(JobStatus::Pending),
            payload: row.payload,
            result_ref: row.result_ref,
            error_message: row.error_message,
            requested_at: row.requested_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ArtifactRow {
    id: Uuid,
    subject_id: Uuid,
    local_date: String,
    status: String,
    content: Option<serde_json::Value>,
    error_message: Option<String>,
    generated_at: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<ArtifactRow> for DailyArtifact {
    fn from(row: ArtifactRow) -> Self {
        DailyArtifact {
            id: row.id,
            subject_id: row.subject_id,
            local_date: row.local_date,
            status: ArtifactStatus::parse(&row.status).unwrap_or(ArtifactStatus::Pending),
            content: row.content,
            error_message: row.error_message,
            generated_at: row.generated_at,
            created_at: row.created_at,
        }
    }
}
