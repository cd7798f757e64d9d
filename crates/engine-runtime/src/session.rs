use crate::{
    error::RunError,
    execution::{
        driver::{BatchDriver, RunOutcome},
        options::RunOptions,
    },
};
use connectors::adapter::BatchTransport;
use engine_core::fsm::BatchFsmState;
use model::records::manifest::Manifest;
use std::sync::Arc;
use tokio::{
    sync::{Mutex, oneshot, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Caller's view of a spawned run.
pub struct RunTicket {
    pub progress: watch::Receiver<BatchFsmState>,
    outcome: oneshot::Receiver<Result<RunOutcome, RunError>>,
    cancel: CancellationToken,
}

impl RunTicket {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn outcome(self) -> Result<RunOutcome, RunError> {
        self.outcome.await.unwrap_or(Err(RunError::Aborted))
    }
}

struct ActiveRun {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// A single submission slot. Submitting while a run is in flight cancels
/// that run, waits for it to wind down, and only then starts the new one.
pub struct BatchSession {
    transport: Arc<dyn BatchTransport>,
    options: RunOptions,
    active: Mutex<Option<ActiveRun>>,
    shutdown: CancellationToken,
}

impl BatchSession {
    pub fn new(transport: Arc<dyn BatchTransport>, options: RunOptions) -> Self {
        Self {
            transport,
            options,
            active: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Ties every run in this session to `shutdown`; cancelling it cancels
    /// whatever is in flight.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub async fn submit(&self, manifest: Manifest) -> RunTicket {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            Self::wind_down(previous).await;
        }

        let cancel = self.shutdown.child_token();
        let mut driver = BatchDriver::new(Arc::clone(&self.transport), self.options.clone());
        let progress = driver.subscribe();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let outcome = driver.run(&manifest, &token).await;
            if matches!(outcome, Ok(RunOutcome::Cancelled)) {
                driver.cancel().await;
            }
            if outcome_tx.send(outcome).is_err() {
                info!(manifest_batch_id = %manifest.batch_id, "Run outcome dropped, nobody is waiting");
            }
        });

        *active = Some(ActiveRun {
            cancel: cancel.clone(),
            handle,
        });

        RunTicket {
            progress,
            outcome: outcome_rx,
            cancel,
        }
    }

    /// Cancels the in-flight run, if any, and waits for it to finish.
    pub async fn cancel(&self) {
        if let Some(previous) = self.active.lock().await.take() {
            Self::wind_down(previous).await;
        }
    }

    async fn wind_down(run: ActiveRun) {
        run.cancel.cancel();
        if let Err(err) = run.handle.await {
            warn!(error = %err, "Previous run task did not finish cleanly");
        }
    }
}
