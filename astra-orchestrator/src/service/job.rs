//! Job orchestration service
//!
//! The façade callers use: idempotent submit, status lookup with ownership
//! checks, retry from FAILED. Submission never blocks on generation; callers
//! observe progress through `get_status` or the lazy-compute guidance path.

use std::sync::Arc;

use astra_core::domain::job::{JobKind, JobStatus};
use astra_core::dto::job::JobStatusView;
use astra_core::hash;
use uuid::Uuid;

use crate::repository::{JobStore, NewJob, StoreError};
use crate::scheduler::{Priority, Scheduler};

use super::ServiceError;

pub struct JobService {
    store: Arc<dyn JobStore>,
    scheduler: Arc<Scheduler>,
}

impl JobService {
    pub fn new(store: Arc<dyn JobStore>, scheduler: Arc<Scheduler>) -> Self {
        Self { store, scheduler }
    }

    /// Submit a generation request at interactive priority.
    ///
    /// Always safe to repeat: the normalized input is content-addressed, and
    /// an existing record for the same (subject, kind, locale, hash) tuple is
    /// returned verbatim, whatever its state.
    pub async fn submit(
        &self,
        subject_id: Uuid,
        kind: JobKind,
        locale: &str,
        raw_input: &serde_json::Value,
    ) -> Result<JobStatusView, ServiceError> {
        self.submit_prioritized(subject_id, kind, locale, raw_input, Priority::Interactive)
            .await
    }

    pub async fn submit_prioritized(
        &self,
        subject_id: Uuid,
        kind: JobKind,
        locale: &str,
        raw_input: &serde_json::Value,
        priority: Priority,
    ) -> Result<JobStatusView, ServiceError> {
        let payload = hash::normalize(kind, raw_input);
        let input_hash = hash::input_hash(kind, locale, &payload);

        if let Some(existing) = self
            .store
            .find_job_by_key(subject_id, kind, locale, &input_hash)
            .await?
        {
            tracing::debug!(job_id = %existing.id, %kind, "submission matched existing job");
            return Ok(existing.into());
        }

        let new = NewJob {
            subject_id,
            kind,
            locale: locale.to_string(),
            input_hash: input_hash.clone(),
            payload,
        };
        match self.store.create_job(new).await {
            Ok(job) => {
                tracing::info!(job_id = %job.id, %subject_id, %kind, "job created");
                self.enqueue(job.id, priority);
                Ok(job.into())
            }
            // Lost a create race with an identical concurrent request; the
            // winner enqueued, so just re-fetch and return its record.
            Err(StoreError::Duplicate) => {
                let job = self
                    .store
                    .find_job_by_key(subject_id, kind, locale, &input_hash)
                    .await?
                    .ok_or(StoreError::NotFound)?;
                tracing::debug!(job_id = %job.id, "create race resolved to existing job");
                Ok(job.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Current state of a job, with an ownership check.
    pub async fn get_status(
        &self,
        subject_id: Uuid,
        job_id: Uuid,
    ) -> Result<JobStatusView, ServiceError> {
        let job = self
            .store
            .find_job(job_id)
            .await?
            .ok_or(ServiceError::NotFound(job_id))?;
        if job.subject_id != subject_id {
            return Err(ServiceError::Forbidden(job_id));
        }
        Ok(job.into())
    }

    /// Reset a FAILED job to PENDING and re-enqueue it.
    ///
    /// Deliberately inert for every other state so callers can retry
    /// defensively without checking first: the current view is returned.
    pub async fn retry(
        &self,
        subject_id: Uuid,
        job_id: Uuid,
    ) -> Result<JobStatusView, ServiceError> {
        let job = self
            .store
            .find_job(job_id)
            .await?
            .ok_or(ServiceError::NotFound(job_id))?;
        if job.subject_id != subject_id {
            return Err(ServiceError::Forbidden(job_id));
        }

        if job.status != JobStatus::Failed {
            return Ok(job.into());
        }

        // Conditional reset: a concurrent retry may have won already.
        if self.store.reset_job_pending(job_id).await? {
            tracing::info!(%job_id, "failed job reset to pending for retry");
            self.enqueue(job_id, Priority::Interactive);
        }

        let job = self
            .store
            .find_job(job_id)
            .await?
            .ok_or(ServiceError::NotFound(job_id))?;
        Ok(job.into())
    }

    fn enqueue(&self, job_id: Uuid, priority: Priority) {
        match priority {
            Priority::Interactive => self.scheduler.enqueue(job_id),
            Priority::Backfill => self.scheduler.enqueue_low(job_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryStore;
    use crate::service::runner::PipelineRunner;
    use crate::service::testutil::{FakePipeline, wait_for_status};
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: Arc<JobService>,
        pipeline: Arc<FakePipeline>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let scheduler = Arc::new(Scheduler::new(5));
        let pipeline = FakePipeline::instant(json!({"document_id": "doc-1"}));
        let runner = Arc::new(PipelineRunner::new(
            store.clone(),
            store.clone(),
            FakePipeline::map_for_all_kinds(pipeline.clone()),
        ));
        scheduler.start(runner);
        let service = Arc::new(JobService::new(store.clone(), scheduler.clone()));
        Fixture {
            store,
            service,
            pipeline,
        }
    }

    #[tokio::test]
    async fn test_submit_is_idempotent_across_input_shapes() {
        let f = fixture();
        let subject = Uuid::new_v4();

        let a = f
            .service
            .submit(
                subject,
                JobKind::NatalChartBasic,
                "en",
                &json!({"birth_date": "1990-04-12", "latitude": 52.52}),
            )
            .await
            .unwrap();
        // Same logical input: different key order, explicit null, extra field.
        let b = f
            .service
            .submit(
                subject,
                JobKind::NatalChartBasic,
                "en",
                &json!({"latitude": 52.52, "birth_date": "1990-04-12", "birth_time": null, "junk": 1}),
            )
            .await
            .unwrap();

        assert_eq!(a.job_id, b.job_id);
    }

    #[tokio::test]
    async fn test_concurrent_identical_submissions_share_one_record() {
        let f = fixture();
        let subject = Uuid::new_v4();
        let input = json!({"birth_date": "1990-04-12", "latitude": 52.52, "longitude": 13.405});

        let (a, b) = tokio::join!(
            f.service.submit(subject, JobKind::NatalChartBasic, "en", &input),
            f.service.submit(subject, JobKind::NatalChartBasic, "en", &input),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.job_id, b.job_id);
        assert!(f.store.find_job(a.job_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_submit_returns_pending_then_job_completes() {
        let f = fixture();
        let subject = Uuid::new_v4();

        let view = f
            .service
            .submit(subject, JobKind::KarmicReading, "en", &json!({"birth_date": "1990-04-12"}))
            .await
            .unwrap();
        assert_eq!(view.status, JobStatus::Pending);

        let done = wait_for_status(&*f.store, view.job_id, JobStatus::Ready).await;
        assert_eq!(done.result_ref, Some(json!({"document_id": "doc-1"})));
        assert_eq!(f.pipeline.calls(), 1);
    }

    #[tokio::test]
    async fn test_resubmitting_completed_job_returns_it_verbatim() {
        let f = fixture();
        let subject = Uuid::new_v4();
        let input = json!({"birth_date": "1990-04-12"});

        let view = f
            .service
            .submit(subject, JobKind::KarmicReading, "en", &input)
            .await
            .unwrap();
        wait_for_status(&*f.store, view.job_id, JobStatus::Ready).await;

        let again = f
            .service
            .submit(subject, JobKind::KarmicReading, "en", &input)
            .await
            .unwrap();
        assert_eq!(again.job_id, view.job_id);
        assert_eq!(again.status, JobStatus::Ready);
        // The expensive pipeline ran exactly once.
        assert_eq!(f.pipeline.calls(), 1);
    }

    #[tokio::test]
    async fn test_get_status_ownership() {
        let f = fixture();
        let subject = Uuid::new_v4();
        let view = f
            .service
            .submit(subject, JobKind::KarmicReading, "en", &json!({}))
            .await
            .unwrap();

        assert!(f.service.get_status(subject, view.job_id).await.is_ok());

        let err = f
            .service
            .get_status(Uuid::new_v4(), view.job_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = f
            .service
            .get_status(subject, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_retry_is_inert_unless_failed() {
        let f = fixture();
        let subject = Uuid::new_v4();

        let view = f
            .service
            .submit(subject, JobKind::KarmicReading, "en", &json!({}))
            .await
            .unwrap();
        wait_for_status(&*f.store, view.job_id, JobStatus::Ready).await;

        let retried = f.service.retry(subject, view.job_id).await.unwrap();
        assert_eq!(retried.status, JobStatus::Ready);
        assert_eq!(f.pipeline.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_from_failed_runs_exactly_once_more() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = Arc::new(Scheduler::new(5));
        // Fails on the first call, succeeds afterwards.
        let pipeline = FakePipeline::flaky_once("rate limited", json!({"document_id": "doc-2"}));
        let runner = Arc::new(PipelineRunner::new(
            store.clone(),
            store.clone(),
            FakePipeline::map_for_all_kinds(pipeline.clone()),
        ));
        scheduler.start(runner);
        let service = JobService::new(store.clone(), scheduler.clone());

        let subject = Uuid::new_v4();
        let view = service
            .submit(subject, JobKind::OneTimeReport, "en", &json!({"report_type": "compatibility"}))
            .await
            .unwrap();

        let failed = wait_for_status(&*store, view.job_id, JobStatus::Failed).await;
        assert_eq!(failed.error_message.as_deref(), Some("rate limited"));

        let retried = service.retry(subject, view.job_id).await.unwrap();
        assert_eq!(retried.status, JobStatus::Pending);
        assert_eq!(retried.error_message, None);

        let done = wait_for_status(&*store, view.job_id, JobStatus::Ready).await;
        assert_eq!(done.result_ref, Some(json!({"document_id": "doc-2"})));
        assert_eq!(pipeline.calls(), 2);

        scheduler.shutdown(Duration::from_secs(1)).await;
    }
}
