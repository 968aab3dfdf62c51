//! Lazy-compute guidance gateway
//!
//! Presents the asynchronous daily-guidance pipeline as a synchronous-feeling
//! API: check or create the artifact record for the caller's local "today",
//! enqueue generation, and wait a bounded time before degrading to a "still
//! generating" response. The worst-case request latency is the wait budget,
//! regardless of downstream pipeline slowness.

use std::sync::Arc;
use std::time::Duration;

use astra_core::domain::artifact::ArtifactStatus;
use astra_core::domain::job::{JobKind, JobStatus};
use astra_core::dto::guidance::GuidanceResponse;
use astra_core::timezone::{self, EffectiveZone};
use serde_json::json;
use uuid::Uuid;

use crate::repository::{ArtifactStore, StoreError};

use super::ServiceError;
use super::backfill::BackfillPlanner;
use super::job::JobService;

pub struct GuidanceService {
    artifacts: Arc<dyn ArtifactStore>,
    jobs: Arc<JobService>,
    backfill: Arc<BackfillPlanner>,
    poll_interval: Duration,
    wait_budget: Duration,
}

impl GuidanceService {
    pub fn new(
        artifacts: Arc<dyn ArtifactStore>,
        jobs: Arc<JobService>,
        backfill: Arc<BackfillPlanner>,
        poll_interval: Duration,
        wait_budget: Duration,
    ) -> Self {
        Self {
            artifacts,
            jobs,
            backfill,
            poll_interval,
            wait_budget,
        }
    }

    /// Return today's guidance, computing it if necessary.
    ///
    /// Timezone precedence: explicit hint > stored IANA zone > stored offset
    /// > UTC. The local date is derived exactly once per request; a request
    /// straddling midnight is never evaluated against two different "todays".
    pub async fn get_or_compute(
        &self,
        subject_id: Uuid,
        tz_hint: Option<&str>,
        locale: &str,
    ) -> Result<GuidanceResponse, ServiceError> {
        let prefs = self.artifacts.subject_timezone(subject_id).await?;
        let zone = timezone::resolve_zone(
            tz_hint,
            prefs.iana_zone.as_deref(),
            prefs.utc_offset_minutes,
        );
        let local_date = timezone::local_date_str(&zone, chrono::Utc::now());

        match self.artifacts.find_artifact(subject_id, &local_date).await? {
            Some(artifact) if artifact.status == ArtifactStatus::Ready => {
                self.spawn_backfill(subject_id, zone, &local_date, locale);
                return Ok(GuidanceResponse::ready(artifact));
            }
            Some(artifact) if artifact.status == ArtifactStatus::Failed => {
                // Self-healing read path: drop the failed record and start over.
                tracing::info!(%subject_id, %local_date, "clearing failed artifact for retry");
                self.artifacts.delete_artifact(subject_id, &local_date).await?;
            }
            _ => {}
        }

        self.ensure_generation(subject_id, &zone, &local_date, locale)
            .await?;

        match tokio::time::timeout(
            self.wait_budget,
            self.wait_for_artifact(subject_id, &local_date),
        )
        .await
        {
            Ok(result) => {
                let response = result?;
                if response.is_ready() {
                    self.spawn_backfill(subject_id, zone, &local_date, locale);
                }
                Ok(response)
            }
            Err(_) => {
                tracing::debug!(%subject_id, %local_date, "wait budget elapsed, returning pending");
                Ok(GuidanceResponse::pending(&local_date))
            }
        }
    }

    /// Make sure an artifact record and its generation job exist and that the
    /// job is moving. Safe under concurrent identical requests: artifact
    /// creation races resolve via the unique key, job submission via the
    /// input hash, and enqueueing via scheduler dedup.
    async fn ensure_generation(
        &self,
        subject_id: Uuid,
        zone: &EffectiveZone,
        local_date: &str,
        locale: &str,
    ) -> Result<(), ServiceError> {
        if self
            .artifacts
            .find_artifact(subject_id, local_date)
            .await?
            .is_none()
        {
            match self.artifacts.create_artifact(subject_id, local_date).await {
                Ok(_) => {}
                Err(StoreError::Duplicate) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let input = json!({"local_date": local_date, "timezone": zone.to_string()});
        let view = self
            .jobs
            .submit(subject_id, JobKind::DailyGuidance, locale, &input)
            .await?;
        // A FAILED job here belongs to the artifact we just cleared; the
        // polling read path owns making that retry happen.
        if view.status == JobStatus::Failed {
            self.jobs.retry(subject_id, view.job_id).await?;
        }
        Ok(())
    }

    async fn wait_for_artifact(
        &self,
        subject_id: Uuid,
        local_date: &str,
    ) -> Result<GuidanceResponse, ServiceError> {
        let mut poll = tokio::time::interval(self.poll_interval);
        loop {
            poll.tick().await;
            match self.artifacts.find_artifact(subject_id, local_date).await? {
                Some(artifact) if artifact.status == ArtifactStatus::Ready => {
                    return Ok(GuidanceResponse::ready(artifact));
                }
                Some(artifact) if artifact.status == ArtifactStatus::Failed => {
                    // Reported as-is; the next request deletes it and retries.
                    return Ok(GuidanceResponse::failed(artifact));
                }
                _ => {}
            }
        }
    }

    /// Backfill is fire-and-forget: it must never delay or fail the request
    /// that triggered it.
    fn spawn_backfill(&self, subject_id: Uuid, zone: EffectiveZone, local_date: &str, locale: &str) {
        let planner = Arc::clone(&self.backfill);
        let local_date = local_date.to_string();
        let locale = locale.to_string();
        tokio::spawn(async move {
            if let Err(e) = planner
                .plan_missing(subject_id, &zone, &local_date, &locale)
                .await
            {
                tracing::warn!(%subject_id, "backfill planning failed: {e}");
            }
        });
    }
}
