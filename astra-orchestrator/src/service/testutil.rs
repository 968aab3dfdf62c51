//! Shared helpers for service tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use astra_core::domain::job::{GenerationJob, JobKind, JobStatus};
use async_trait::async_trait;
use uuid::Uuid;

use crate::pipeline::{Pipeline, PipelineError, PipelineMap};
use crate::repository::JobStore;

/// Scripted pipeline: optional delay, a configurable number of leading
/// failures, then a fixed result. Counts invocations.
pub struct FakePipeline {
    delay: Duration,
    failures_remaining: AtomicUsize,
    error_message: String,
    result: serde_json::Value,
    calls: AtomicUsize,
}

impl FakePipeline {
    pub fn instant(result: serde_json::Value) -> Arc<Self> {
        Self::build(Duration::ZERO, 0, "", result)
    }

    pub fn delayed(delay: Duration, result: serde_json::Value) -> Arc<Self> {
        Self::build(delay, 0, "", result)
    }

    /// Fails the first call with `message`, succeeds afterwards.
    pub fn flaky_once(message: &str, result: serde_json::Value) -> Arc<Self> {
        Self::build(Duration::ZERO, 1, message, result)
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::build(Duration::ZERO, usize::MAX, message, serde_json::Value::Null)
    }

    fn build(
        delay: Duration,
        failures: usize,
        message: &str,
        result: serde_json::Value,
    ) -> Arc<Self> {
        Arc::new(Self {
            delay,
            failures_remaining: AtomicUsize::new(failures),
            error_message: message.to_string(),
            result,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Register one fake for every job kind.
    pub fn map_for_all_kinds(pipeline: Arc<FakePipeline>) -> PipelineMap {
        JobKind::ALL
            .into_iter()
            .map(|kind| (kind, pipeline.clone() as Arc<dyn Pipeline>))
            .collect()
    }
}

#[async_trait]
impl Pipeline for FakePipeline {
    async fn generate(
        &self,
        _subject_id: Uuid,
        _payload: &serde_json::Value,
        _locale: &str,
    ) -> Result<serde_json::Value, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay > Duration::ZERO {
            tokio::time::sleep(self.delay).await;
        }
        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(PipelineError::new(self.error_message.clone()));
        }
        Ok(self.result.clone())
    }
}

/// Poll the store until the job reaches `status` (bounded at 5 s).
pub async fn wait_for_status(
    store: &dyn JobStore,
    job_id: Uuid,
    status: JobStatus,
) -> GenerationJob {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(job) = store.find_job(job_id).await.unwrap() {
                if job.status == status {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job did not reach expected status in time")
}
