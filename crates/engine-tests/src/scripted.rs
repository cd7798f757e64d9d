use async_trait::async_trait;
use connectors::{
    adapter::{BatchStatus, BatchStatusKind, BatchTransport, Health, SubmitReceipt},
    error::{TransportError, TransportErrorKind},
};
use model::{
    core::identifiers::{BatchId, Sid},
    execution::retry::SentenceRetryOutput,
    records::{manifest::Manifest, result::BatchResult},
};
use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};
use tokio::time::Instant;

/// Everything the pipeline asked the backend for, in order.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub health: usize,
    pub submitted: Vec<BatchId>,
    pub polls: Vec<(BatchId, Instant)>,
    pub cancelled: Vec<BatchId>,
    pub retried: Vec<Sid>,
}

impl CallLog {
    pub fn polls_for(&self, batch_id: &str) -> Vec<Instant> {
        self.polls
            .iter()
            .filter(|(id, _)| id.as_str() == batch_id)
            .map(|(_, at)| *at)
            .collect()
    }
}

/// Backend double driven by scripted responses.
///
/// Unscripted calls fall back to: healthy, accepted as `batch-<n>`, result
/// still processing, retry failing with a server error.
#[derive(Default)]
pub struct ScriptedTransport {
    health: Mutex<VecDeque<Result<Health, TransportError>>>,
    submits: Mutex<VecDeque<Result<SubmitReceipt, TransportError>>>,
    results: Mutex<HashMap<BatchId, VecDeque<Result<BatchResult, TransportError>>>>,
    retries: Mutex<HashMap<Sid, VecDeque<Result<SentenceRetryOutput, TransportError>>>>,
    submit_delay: Option<Duration>,
    calls: Mutex<CallLog>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = Some(delay);
        self
    }

    pub fn push_health(&self, health: Result<Health, TransportError>) -> &Self {
        self.health.lock().unwrap().push_back(health);
        self
    }

    pub fn push_submit(&self, receipt: Result<SubmitReceipt, TransportError>) -> &Self {
        self.submits.lock().unwrap().push_back(receipt);
        self
    }

    pub fn accept_as(&self, batch_id: &str) -> &Self {
        self.push_submit(Ok(SubmitReceipt {
            batch_id: BatchId::new(batch_id),
            estimated_time: Some(5.0),
        }))
    }

    pub fn push_result(&self, batch_id: &str, result: Result<BatchResult, TransportError>) -> &Self {
        self.results
            .lock()
            .unwrap()
            .entry(BatchId::new(batch_id))
            .or_default()
            .push_back(result);
        self
    }

    pub fn push_retry(&self, sid: Sid, output: Result<SentenceRetryOutput, TransportError>) -> &Self {
        self.retries
            .lock()
            .unwrap()
            .entry(sid)
            .or_default()
            .push_back(output);
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchTransport for ScriptedTransport {
    async fn health(&self) -> Result<Health, TransportError> {
        self.calls.lock().unwrap().health += 1;
        self.health
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Health { ok: true }))
    }

    async fn submit_batch(&self, _manifest: &Manifest) -> Result<SubmitReceipt, TransportError> {
        if let Some(delay) = self.submit_delay {
            tokio::time::sleep(delay).await;
        }

        let receipt = self.submits.lock().unwrap().pop_front();
        let mut calls = self.calls.lock().unwrap();
        let receipt = receipt.unwrap_or_else(|| {
            Ok(SubmitReceipt {
                batch_id: BatchId::new(format!("batch-{}", calls.submitted.len() + 1)),
                estimated_time: None,
            })
        });
        if let Ok(receipt) = &receipt {
            calls.submitted.push(receipt.batch_id.clone());
        }
        receipt
    }

    async fn get_batch_result(&self, batch_id: &BatchId) -> Result<BatchResult, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .polls
            .push((batch_id.clone(), Instant::now()));
        self.results
            .lock()
            .unwrap()
            .get_mut(batch_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(TransportError::still_processing("Batch still processing")))
    }

    async fn get_batch_status(&self, _batch_id: &BatchId) -> Result<BatchStatus, TransportError> {
        Ok(BatchStatus {
            status: BatchStatusKind::Processing,
            progress: None,
            error: None,
        })
    }

    async fn cancel_batch(&self, batch_id: &BatchId) -> Result<(), TransportError> {
        self.calls.lock().unwrap().cancelled.push(batch_id.clone());
        Ok(())
    }

    async fn retry_sentence(
        &self,
        _batch_id: &BatchId,
        sid: Sid,
        _text: &str,
    ) -> Result<SentenceRetryOutput, TransportError> {
        self.calls.lock().unwrap().retried.push(sid);
        self.retries
            .lock()
            .unwrap()
            .get_mut(&sid)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(TransportError::new(
                    TransportErrorKind::Server,
                    "Single-sentence retry failed",
                ))
            })
    }
}
