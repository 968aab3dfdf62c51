use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create subjects table (timezone preferences; profile data lives elsewhere)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subjects (
            id UUID PRIMARY KEY,
            iana_zone VARCHAR(64),
            utc_offset_minutes INTEGER,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create jobs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id UUID PRIMARY KEY,
            subject_id UUID NOT NULL,
            kind VARCHAR(50) NOT NULL,
            locale VARCHAR(16) NOT NULL,
            input_hash VARCHAR(64) NOT NULL,
            status VARCHAR(20) NOT NULL,
            payload JSONB NOT NULL DEFAULT '{}',
            result_ref JSONB,
            error_message TEXT,
            requested_at TIMESTAMPTZ NOT NULL,
            started_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // The idempotency key: one record per logical request. Concurrent
    // identical submissions resolve through this constraint.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_identity
        ON jobs(subject_id, kind, locale, input_hash)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_subject ON jobs(subject_id, requested_at DESC)")
        .execute(pool)
        .await?;

    // Create daily artifacts table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_artifacts (
            id UUID PRIMARY KEY,
            subject_id UUID NOT NULL,
            local_date VARCHAR(10) NOT NULL,
            status VARCHAR(20) NOT NULL,
            content JSONB,
            error_message TEXT,
            generated_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One artifact per subject-local calendar day.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_daily_artifacts_identity
        ON daily_artifacts(subject_id, local_date)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
