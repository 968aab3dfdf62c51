//! Service layer
//!
//! Business logic for job orchestration and guidance delivery. Services own
//! all job-record state transitions; pipelines only return results or errors.

pub mod backfill;
pub mod guidance;
pub mod job;
pub mod runner;

#[cfg(test)]
pub mod testutil;

use thiserror::Error;
use uuid::Uuid;

use crate::repository::StoreError;

/// Service error type
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("job {0} not found")]
    NotFound(Uuid),
    /// The job exists but belongs to another subject. Job ids are not
    /// capability tokens by themselves.
    #[error("job {0} does not belong to the caller")]
    Forbidden(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}
