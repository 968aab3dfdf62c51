//! Backfill planner
//!
//! After a successful interactive guidance fetch, fills in artifacts missing
//! from a bounded window of recent dates at backfill priority. A convenience
//! for recent gaps, never a historical reprocessing tool: the current date is
//! always handled by the interactive path, and the window never widens.

use std::sync::Arc;
use std::time::Duration;

use astra_core::domain::job::JobKind;
use astra_core::timezone::EffectiveZone;
use chrono::{Days, NaiveDate};
use serde_json::json;
use uuid::Uuid;

use crate::repository::{ArtifactStore, StoreError};
use crate::scheduler::Priority;

use super::ServiceError;
use super::job::JobService;

pub struct BackfillPlanner {
    artifacts: Arc<dyn ArtifactStore>,
    jobs: Arc<JobService>,
    max_days: u32,
    enqueue_delay: Duration,
}

impl BackfillPlanner {
    pub fn new(
        artifacts: Arc<dyn ArtifactStore>,
        jobs: Arc<JobService>,
        max_days: u32,
        enqueue_delay: Duration,
    ) -> Self {
        Self {
            artifacts,
            jobs,
            max_days,
            enqueue_delay,
        }
    }

    /// Enqueue generation for dates in the window that have no artifact yet.
    /// Returns how many were planned. Runs detached from the request path;
    /// callers spawn it and log failures.
    pub async fn plan_missing(
        &self,
        subject_id: Uuid,
        zone: &EffectiveZone,
        current_date: &str,
        locale: &str,
    ) -> Result<usize, ServiceError> {
        let Ok(today) = NaiveDate::parse_from_str(current_date, "%Y-%m-%d") else {
            tracing::warn!(%subject_id, %current_date, "unparseable current date, skipping backfill");
            return Ok(0);
        };

        let window: Vec<String> = (1..=u64::from(self.max_days))
            .filter_map(|days_back| today.checked_sub_days(Days::new(days_back)))
            .map(|date| date.format("%Y-%m-%d").to_string())
            .collect();

        let existing = self.artifacts.existing_dates(subject_id, &window).await?;
        let missing: Vec<String> = window
            .into_iter()
            .filter(|date| !existing.contains(date))
            .collect();
        if missing.is_empty() {
            tracing::debug!(%subject_id, "no recent dates to backfill");
            return Ok(0);
        }

        // Small head start for the interactive burst that triggered us.
        tokio::time::sleep(self.enqueue_delay).await;

        let mut planned = 0;
        for local_date in &missing {
            match self.artifacts.create_artifact(subject_id, local_date).await {
                Ok(_) => {}
                // Another planner or an interactive request got there first.
                Err(StoreError::Duplicate) => continue,
                Err(e) => return Err(e.into()),
            }
            let input = json!({"local_date": local_date, "timezone": zone.to_string()});
            self.jobs
                .submit_prioritized(
                    subject_id,
                    JobKind::DailyGuidance,
                    locale,
                    &input,
                    Priority::Backfill,
                )
                .await?;
            planned += 1;
        }

        tracing::info!(%subject_id, planned, "backfill planned");
        Ok(planned)
    }
}
