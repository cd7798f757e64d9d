use crate::{
    error::RunError,
    execution::{
        options::RunOptions,
        polling::{self, PollOutcome, PollPlan, poll_until_ready, with_deadline},
        report::RunReport,
    },
};
use connectors::{
    adapter::{BatchTransport, SubmitReceipt},
    error::{TransportError, TransportErrorKind},
};
use engine_core::{
    fsm::{BatchFsmState, FsmEvent, reduce, validate_state},
    manifest::validate_manifest,
    metrics::{RunMetrics, RunMetricsSnapshot},
    retry::RetryError,
};
use engine_processing::{
    aggregate::{Aggregation, aggregate, merge, retry_partial},
    retry::classify_transport_error,
    retry_queue::{RetryPassSummary, RetryQueue},
};
use model::{
    core::identifiers::{BatchId, Sid},
    execution::retry::SentenceRetryOutput,
    records::{manifest::Manifest, result::BatchResult},
};
use std::{collections::BTreeSet, sync::Arc};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub enum RunOutcome {
    Completed(Box<RunReport>),
    /// The run was cancelled. No failure is recorded for it.
    Cancelled,
}

/// Submits one manifest, polls for its result, folds the result into the
/// batch state machine and runs a single retry pass over failed sentences.
///
/// The driver owns the FSM state; every transition goes through
/// [`BatchDriver::dispatch`] and is published to subscribers.
pub struct BatchDriver {
    transport: Arc<dyn BatchTransport>,
    options: RunOptions,
    metrics: RunMetrics,
    state: BatchFsmState,
    progress: watch::Sender<BatchFsmState>,
    aggregation: Option<Aggregation>,
    retry_queue: RetryQueue,
    batch_id: Option<BatchId>,
    report: Option<RunReport>,
}

/// Runs `manifest` to completion with a fresh driver.
pub async fn run(
    transport: Arc<dyn BatchTransport>,
    options: RunOptions,
    manifest: &Manifest,
    cancel: &CancellationToken,
) -> Result<RunOutcome, RunError> {
    BatchDriver::new(transport, options).run(manifest, cancel).await
}

impl BatchDriver {
    pub fn new(transport: Arc<dyn BatchTransport>, options: RunOptions) -> Self {
        let state = BatchFsmState::new(0, 0);
        let (progress, _) = watch::channel(state.clone());
        Self {
            transport,
            options,
            metrics: RunMetrics::new(),
            state,
            progress,
            aggregation: None,
            retry_queue: RetryQueue::new(),
            batch_id: None,
            report: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<BatchFsmState> {
        self.progress.subscribe()
    }

    pub fn state(&self) -> &BatchFsmState {
        &self.state
    }

    pub fn metrics(&self) -> RunMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Backend identifier of the submitted batch, if any.
    pub fn batch_id(&self) -> Option<&BatchId> {
        self.batch_id.as_ref()
    }

    pub fn report(&self) -> Option<&RunReport> {
        self.report.as_ref()
    }

    pub fn dispatch(&mut self, event: FsmEvent) {
        debug!(event = event.name(), from = %self.state.batch_state, "Dispatching");
        let current = std::mem::replace(&mut self.state, BatchFsmState::new(0, 0));
        self.state = reduce(current, event);
        self.progress.send_replace(self.state.clone());
    }

    /// Drops all run state and sizes the FSM for `manifest`.
    fn begin(&mut self, manifest: &Manifest) {
        self.state = BatchFsmState::for_manifest(manifest);
        self.aggregation = None;
        self.retry_queue.clear();
        self.batch_id = None;
        self.report = None;
        self.progress.send_replace(self.state.clone());
    }

    /// Returns the FSM to idle, keeping its dimensions.
    pub fn reset(&mut self) {
        self.dispatch(FsmEvent::Reset);
        self.aggregation = None;
        self.retry_queue.clear();
        self.batch_id = None;
        self.report = None;
    }

    fn fail(&mut self, err: RunError) -> RunError {
        error!(error = %err, "Batch run failed");
        self.dispatch(FsmEvent::BatchFailed {
            error: err.to_string(),
        });
        err
    }

    pub async fn run(
        &mut self,
        manifest: &Manifest,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunError> {
        self.begin(manifest);
        info!(
            manifest_batch_id = %manifest.batch_id,
            sentences = manifest.len(),
            chunks = manifest.chunk_count(),
            "Starting batch run"
        );

        match self.run_inner(manifest, cancel).await {
            Ok(RunOutcome::Cancelled) => {
                info!(manifest_batch_id = %manifest.batch_id, "Batch run cancelled");
                Ok(RunOutcome::Cancelled)
            }
            Ok(outcome) => Ok(outcome),
            Err(err) => Err(self.fail(err)),
        }
    }

    async fn run_inner(
        &mut self,
        manifest: &Manifest,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunError> {
        validate_manifest(manifest)?;

        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }

        let health = tokio::select! {
            _ = cancel.cancelled() => return Ok(RunOutcome::Cancelled),
            health = with_deadline(
                self.options.health_timeout,
                "Health check",
                self.transport.health(),
            ) => health,
        };
        let health = health.map_err(RunError::HealthCheck)?;
        if !health.ok {
            return Err(RunError::HealthCheck(TransportError::new(
                TransportErrorKind::ServerDown,
                "Backend reported unhealthy",
            )));
        }

        self.dispatch(FsmEvent::SubmitBatch);
        let receipt = match self.submit(manifest, cancel).await? {
            Some(receipt) => receipt,
            None => return Ok(RunOutcome::Cancelled),
        };
        self.batch_id = Some(receipt.batch_id.clone());
        self.dispatch(FsmEvent::BatchStarted);
        info!(
            batch_id = %receipt.batch_id,
            estimated_time = ?receipt.estimated_time,
            "Batch accepted"
        );

        let plan = PollPlan {
            schedule: &self.options.schedule,
            max_duration: self.options.max_poll_duration,
            max_attempts: self.options.max_poll_attempts,
            request_timeout: self.options.request_timeout,
        };
        let result = match poll_until_ready(
            self.transport.as_ref(),
            &receipt.batch_id,
            &plan,
            &self.metrics,
            cancel,
        )
        .await?
        {
            PollOutcome::Ready(result) => result,
            PollOutcome::Cancelled => return Ok(RunOutcome::Cancelled),
        };

        self.complete(manifest, result, cancel).await
    }

    /// Submits under the retry policy. `None` means the run was cancelled.
    async fn submit(
        &self,
        manifest: &Manifest,
        cancel: &CancellationToken,
    ) -> Result<Option<SubmitReceipt>, RunError> {
        let policy = &self.options.submit_policy;
        let submit_once = |attempt: usize| {
            self.metrics.increment_submit_attempts();
            debug!(attempt, max_attempts = policy.max_attempts, "Submitting batch");
            with_deadline(
                self.options.request_timeout,
                "Batch submission",
                self.transport.submit_batch(manifest),
            )
        };

        let submitted = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            submitted = policy.run(cancel, submit_once, classify_transport_error) => submitted,
        };

        match submitted {
            Ok(receipt) => Ok(Some(receipt)),
            Err(RetryError::Cancelled) => Ok(None),
            Err(RetryError::Fatal(err)) => Err(RunError::Transport(err)),
            Err(RetryError::AttemptsExceeded { attempts, last }) => {
                Err(RunError::SubmitRetriesExhausted { attempts, last })
            }
        }
    }

    /// Makes a single poll against the submitted batch and folds the result
    /// when it is ready. Returns whether the run completed.
    pub async fn poll_once(
        &mut self,
        manifest: &Manifest,
        cancel: &CancellationToken,
    ) -> Result<bool, RunError> {
        let Some(batch_id) = self.batch_id.clone() else {
            return Err(RunError::NotSubmitted);
        };
        if !self.state.is_busy() {
            return Err(RunError::NotSubmitted);
        }

        let polled = polling::poll_once(
            self.transport.as_ref(),
            &batch_id,
            self.options.request_timeout,
            &self.metrics,
        )
        .await;

        let result = match polled {
            Ok(Ok(result)) => result,
            Ok(Err(pending)) => {
                debug!(batch_id = %batch_id, kind = %pending.kind, "Batch not ready");
                return Ok(false);
            }
            Err(err) => return Err(self.fail(err)),
        };

        match self.complete(manifest, result, cancel).await {
            Ok(RunOutcome::Completed(_)) => Ok(true),
            Ok(RunOutcome::Cancelled) => Ok(false),
            Err(err) => Err(self.fail(err)),
        }
    }

    async fn complete(
        &mut self,
        manifest: &Manifest,
        result: BatchResult,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunError> {
        let Some(batch_id) = self.batch_id.clone() else {
            return Err(RunError::NotSubmitted);
        };

        self.fold_result(manifest, &batch_id, &result);

        let retry = self.retry_failed(manifest, &batch_id, cancel).await;
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }

        self.dispatch(FsmEvent::BatchCompleted);
        if let Err(violation) = validate_state(&self.state) {
            warn!(%violation, "Completed batch state is inconsistent");
        }

        let aggregation = self
            .aggregation
            .get_or_insert_with(|| Aggregation::empty(manifest));
        let report = RunReport::build(
            batch_id,
            manifest,
            aggregation,
            self.options.use_newlines,
            retry,
            self.metrics.snapshot(),
            self.state.clone(),
        );
        info!(
            batch_id = %report.batch_id,
            received = report.metrics.received_sids,
            total = report.metrics.total_sids,
            cards = report.cards.len(),
            "Batch run completed"
        );
        self.report = Some(report.clone());
        Ok(RunOutcome::Completed(Box::new(report)))
    }

    /// Aggregates `result` and moves every SID out of `pending`. Every
    /// sentence error marks its SID failed, even when the SID also carries
    /// content; non-permanent ones are queued for the retry pass.
    fn fold_result(&mut self, manifest: &Manifest, batch_id: &BatchId, result: &BatchResult) {
        if &result.batch_id != batch_id {
            warn!(
                expected = %batch_id,
                received = %result.batch_id,
                "Batch result carries a different batch id"
            );
        }

        let aggregation = aggregate(manifest, result);
        self.metrics.increment_results_folded();

        for item in &manifest.items {
            let has_content = aggregation
                .bucket(item.sid)
                .is_some_and(|bucket| bucket.has_content());
            if has_content {
                self.dispatch(FsmEvent::SidReceived { sid: item.sid });
            }
        }

        let mut failed = BTreeSet::new();
        for err in &result.errors {
            let Some(item) = manifest.item(err.sid) else {
                warn!(sid = err.sid, error = %err.error, "Error reported for unknown SID");
                continue;
            };
            self.dispatch(FsmEvent::SidFailed {
                sid: item.sid,
                error: err.error.clone(),
            });
            if !failed.insert(item.sid) {
                continue;
            }
            if err.is_permanent() {
                debug!(sid = item.sid, "Permanent failure, not retrying");
            } else {
                self.retry_queue.enqueue(item.sid, &item.lv, &err.error);
            }
        }

        for item in &manifest.items {
            let has_content = aggregation
                .bucket(item.sid)
                .is_some_and(|bucket| bucket.has_content());
            if !has_content && failed.insert(item.sid) {
                self.dispatch(FsmEvent::SidFailed {
                    sid: item.sid,
                    error: "missing from batch result".into(),
                });
            }
        }
        self.metrics.increment_failed(failed.len() as u64);

        for chunk_index in 0..manifest.chunk_count() {
            self.dispatch(FsmEvent::ChunkProcessed { chunk_index });
        }

        self.aggregation = Some(aggregation);
    }

    /// One pass over the retry queue. Outcomes are applied in the order they
    /// arrive.
    async fn retry_failed(
        &mut self,
        manifest: &Manifest,
        batch_id: &BatchId,
        cancel: &CancellationToken,
    ) -> RetryPassSummary {
        if self.retry_queue.is_empty() {
            return RetryPassSummary::default();
        }

        let queued: Vec<Sid> = self.retry_queue.entries().iter().map(|e| e.sid).collect();
        self.metrics.increment_retried(queued.len() as u64);
        for sid in queued {
            self.dispatch(FsmEvent::RetrySid { sid });
        }

        let (outcome_tx, mut outcomes) =
            mpsc::unbounded_channel::<(Sid, Result<SentenceRetryOutput, TransportError>)>();
        let failure_tx = outcome_tx.clone();
        let transport = Arc::clone(&self.transport);
        let request_timeout = self.options.request_timeout;

        let summary = self
            .retry_queue
            .process(
                batch_id,
                cancel,
                |sid, text, batch_id| {
                    let transport = Arc::clone(&transport);
                    async move {
                        with_deadline(
                            request_timeout,
                            "Sentence retry",
                            transport.retry_sentence(&batch_id, sid, &text),
                        )
                        .await
                    }
                },
                |entry, output| {
                    let _ = outcome_tx.send((entry.sid, Ok(output)));
                },
                |entry, err| {
                    let _ = failure_tx.send((entry.sid, Err(err)));
                },
            )
            .await;

        while let Ok((sid, outcome)) = outcomes.try_recv() {
            match outcome {
                Ok(output) => {
                    let partial = retry_partial(manifest, sid, &output);
                    let recovered = partial.bucket(sid).is_some_and(|b| b.has_content());
                    if let Some(current) = self.aggregation.as_ref() {
                        self.aggregation = Some(merge(current, &partial));
                    }
                    if recovered {
                        self.metrics.increment_recovered();
                        self.dispatch(FsmEvent::SidReceived { sid });
                    } else {
                        self.dispatch(FsmEvent::SidFailed {
                            sid,
                            error: "retry returned no content".into(),
                        });
                    }
                }
                Err(err) => self.dispatch(FsmEvent::SidFailed {
                    sid,
                    error: err.to_string(),
                }),
            }
        }

        info!(
            batch_id = %batch_id,
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            abandoned = summary.abandoned,
            "Retry pass finished"
        );
        summary
    }

    /// Asks the backend to cancel the submitted batch, then resets. Backend
    /// errors are logged and otherwise ignored.
    pub async fn cancel(&mut self) {
        if let Some(batch_id) = self.batch_id.clone() {
            let cancelled = with_deadline(
                self.options.request_timeout,
                "Batch cancellation",
                self.transport.cancel_batch(&batch_id),
            )
            .await;
            match cancelled {
                Ok(()) => info!(batch_id = %batch_id, "Batch cancelled"),
                Err(err) => warn!(batch_id = %batch_id, error = %err, "Failed to cancel batch"),
            }
        }
        self.reset();
    }
}
