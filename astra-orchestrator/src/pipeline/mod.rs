//! Generation pipeline seam
//!
//! One implementation per job kind, held in a kind-to-pipeline map. The
//! runner selects the pipeline; nothing else in the orchestrator is
//! kind-aware. Implementations must be safe to invoke more than once for the
//! same input: the orchestrator guarantees at-most-one-concurrent execution,
//! not at-most-one-ever across retries.

pub mod remote;

use std::collections::HashMap;
use std::sync::Arc;

use astra_core::domain::job::JobKind;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// A generation pipeline failed. The message is recorded on the job and is
/// suitable for display to polling callers.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct PipelineError {
    pub message: String,
}

impl PipelineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Capability: generate an artifact for a subject from a normalized payload,
/// returning an opaque result reference. External calls (language model,
/// astrology data, translation) live behind this trait.
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn generate(
        &self,
        subject_id: Uuid,
        payload: &serde_json::Value,
        locale: &str,
    ) -> Result<serde_json::Value, PipelineError>;
}

pub type PipelineMap = HashMap<JobKind, Arc<dyn Pipeline>>;
