use crate::error::TransportError;
use async_trait::async_trait;
use model::{
    core::identifiers::{BatchId, Sid},
    execution::retry::SentenceRetryOutput,
    records::{manifest::Manifest, result::BatchResult},
};
use serde::{Deserialize, Serialize};

/// Backend acknowledgement of a submitted manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub batch_id: BatchId,
    /// Backend estimate in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatusKind {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatus {
    pub status: BatchStatusKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub ok: bool,
}

/// Contract between the pipeline and a batch-processing backend, whatever the
/// wire protocol. Every failure is a [`TransportError`] with a closed kind.
#[async_trait]
pub trait BatchTransport: Send + Sync {
    /// Pre-flight check. Network-down and server-down are distinct kinds.
    async fn health(&self) -> Result<Health, TransportError>;

    async fn submit_batch(&self, manifest: &Manifest) -> Result<SubmitReceipt, TransportError>;

    /// Fails with `StillProcessing` until the result is ready. A returned
    /// result has already passed schema validation.
    async fn get_batch_result(&self, batch_id: &BatchId) -> Result<BatchResult, TransportError>;

    async fn get_batch_status(&self, batch_id: &BatchId) -> Result<BatchStatus, TransportError>;

    /// Idempotent; an unknown batch counts as already cancelled.
    async fn cancel_batch(&self, batch_id: &BatchId) -> Result<(), TransportError>;

    /// Second-pass processing of a single sentence.
    async fn retry_sentence(
        &self,
        batch_id: &BatchId,
        sid: Sid,
        text: &str,
    ) -> Result<SentenceRetryOutput, TransportError>;
}
