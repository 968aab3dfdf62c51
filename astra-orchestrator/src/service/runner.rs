//! Pipeline runner
//!
//! The single place where job state transitions happen and where a job kind
//! is resolved to a pipeline implementation. Invoked by the scheduler; every
//! failure is converted into a FAILED record and never escapes to the
//! dispatch loop.

use std::sync::Arc;

use astra_core::domain::artifact::ArtifactStatus;
use astra_core::domain::job::{GenerationJob, JobKind, JobStatus};
use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::pipeline::PipelineMap;
use crate::repository::{ArtifactStore, JobStore, StoreError};
use crate::scheduler::JobExecutor;

pub struct PipelineRunner {
    jobs: Arc<dyn JobStore>,
    artifacts: Arc<dyn ArtifactStore>,
    pipelines: PipelineMap,
}

impl PipelineRunner {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        artifacts: Arc<dyn ArtifactStore>,
        pipelines: PipelineMap,
    ) -> Self {
        Self {
            jobs,
            artifacts,
            pipelines,
        }
    }

    async fn run(&self, job_id: Uuid) -> Result<(), StoreError> {
        let Some(job) = self.jobs.find_job(job_id).await? else {
            tracing::warn!(%job_id, "dequeued job no longer exists");
            return Ok(());
        };

        // Enqueue dedup is best-effort; the store decides. A stale queue
        // entry for a record that is no longer PENDING is dropped here.
        if job.status != JobStatus::Pending {
            tracing::debug!(%job_id, status = ?job.status, "skipping non-pending job");
            return Ok(());
        }
        if !self.jobs.mark_job_running(job_id).await? {
            tracing::debug!(%job_id, "job already claimed, skipping");
            return Ok(());
        }

        // Cheap database-verifiable idempotency signal: the artifact may
        // already exist under its date key even though this job never ran.
        if let Some(result_ref) = self.short_circuit(&job).await? {
            self.jobs.mark_job_ready(job_id, result_ref).await?;
            tracing::info!(%job_id, kind = %job.kind, "job satisfied by existing artifact");
            return Ok(());
        }

        let Some(pipeline) = self.pipelines.get(&job.kind) else {
            self.jobs
                .mark_job_failed(job_id, "no pipeline registered for this job kind")
                .await?;
            tracing::error!(%job_id, kind = %job.kind, "no pipeline registered");
            return Ok(());
        };

        match pipeline
            .generate(job.subject_id, &job.payload, &job.locale)
            .await
        {
            Ok(output) => self.record_success(&job, output).await?,
            Err(err) => self.record_failure(&job, &err.message).await?,
        }
        Ok(())
    }

    /// For daily guidance, a READY artifact row for the payload's date proves
    /// the work is already done; skip the expensive pipeline. An optimization
    /// only: the input-hash check upstream already prevents duplicate
    /// submission.
    async fn short_circuit(
        &self,
        job: &GenerationJob,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        if job.kind != JobKind::DailyGuidance {
            return Ok(None);
        }
        let Some(local_date) = job.payload.get("local_date").and_then(|v| v.as_str()) else {
            return Ok(None);
        };
        let artifact = self.artifacts.find_artifact(job.subject_id, local_date).await?;
        Ok(artifact
            .filter(|a| a.status == ArtifactStatus::Ready)
            .map(|a| artifact_ref(job.subject_id, &a.local_date)))
    }

    async fn record_success(
        &self,
        job: &GenerationJob,
        output: serde_json::Value,
    ) -> Result<(), StoreError> {
        let result_ref = if job.kind == JobKind::DailyGuidance {
            // The artifact row carries the content; the job references it.
            let local_date = job
                .payload
                .get("local_date")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            match self
                .artifacts
                .mark_artifact_ready(job.subject_id, &local_date, output)
                .await
            {
                Ok(()) | Err(StoreError::NotFound) => {}
                Err(e) => return Err(e),
            }
            artifact_ref(job.subject_id, &local_date)
        } else {
            output
        };

        self.jobs.mark_job_ready(job.id, result_ref).await?;
        tracing::info!(job_id = %job.id, kind = %job.kind, "job ready");
        Ok(())
    }

    async fn record_failure(&self, job: &GenerationJob, message: &str) -> Result<(), StoreError> {
        self.jobs.mark_job_failed(job.id, message).await?;
        if job.kind == JobKind::DailyGuidance {
            if let Some(local_date) = job.payload.get("local_date").and_then(|v| v.as_str()) {
                match self
                    .artifacts
                    .mark_artifact_failed(job.subject_id, local_date, message)
                    .await
                {
                    Ok(()) | Err(StoreError::NotFound) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        tracing::warn!(job_id = %job.id, kind = %job.kind, error = %message, "job failed");
        Ok(())
    }
}

fn artifact_ref(subject_id: Uuid, local_date: &str) -> serde_json::Value {
    json!({
        "type": "daily-artifact",
        "subject_id": subject_id,
        "local_date": local_date,
    })
}

#[async_trait]
impl JobExecutor for PipelineRunner {
    async fn execute(&self, job_id: Uuid) {
        if let Err(e) = self.run(job_id).await {
            // Store failures mid-execution can leave the record RUNNING;
            // reconciling those is the recovery sweep's job, not ours.
            tracing::error!(%job_id, "job execution error: {e}");
        }
    }
}
