//! Remote pipeline client
//!
//! Thin HTTP client for the external content service that hosts the actual
//! generation pipelines (prompt assembly, language-model and astrology-data
//! calls). One endpoint per job kind; the response body is the result
//! reference stored on the job record.

use astra_core::domain::job::JobKind;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{Pipeline, PipelineError, PipelineMap};

pub struct RemotePipeline {
    client: reqwest::Client,
    base_url: String,
    kind: JobKind,
}

impl RemotePipeline {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, kind: JobKind) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            kind,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    subject_id: Uuid,
    locale: &'a str,
    payload: &'a serde_json::Value,
}

#[async_trait]
impl Pipeline for RemotePipeline {
    async fn generate(
        &self,
        subject_id: Uuid,
        payload: &serde_json::Value,
        locale: &str,
    ) -> Result<serde_json::Value, PipelineError> {
        let url = format!("{}/generate/{}", self.base_url, self.kind.as_str());
        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                subject_id,
                locale,
                payload,
            })
            .send()
            .await
            .map_err(|e| PipelineError::new(format!("content service unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::new(format!(
                "content service returned {status}: {body}"
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| PipelineError::new(format!("invalid content service response: {e}")))
    }
}

/// Build the full kind-to-pipeline map against one content service. Adding a
/// job kind means adding it here and nowhere else.
pub fn remote_pipelines(base_url: &str) -> PipelineMap {
    let client = reqwest::Client::new();
    JobKind::ALL
        .into_iter()
        .map(|kind| {
            let pipeline: Arc<dyn Pipeline> =
                Arc::new(RemotePipeline::new(client.clone(), base_url, kind));
            (kind, pipeline)
        })
        .collect()
}
