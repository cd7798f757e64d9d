use crate::error::RunError;
use connectors::{adapter::BatchTransport, error::TransportError};
use engine_core::{metrics::RunMetrics, retry::sleep_or_cancel, schedule::PollingSchedule};
use model::{core::identifiers::BatchId, records::result::BatchResult};
use std::{future::Future, time::Duration};
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum PollOutcome {
    Ready(BatchResult),
    Cancelled,
}

/// Limits and cadence for one poll loop.
#[derive(Debug, Clone)]
pub struct PollPlan<'a> {
    pub schedule: &'a PollingSchedule,
    pub max_duration: Duration,
    pub max_attempts: u32,
    pub request_timeout: Duration,
}

/// Awaits `fut` for at most `limit`, mapping an elapsed deadline to a
/// `Timeout` transport error.
pub async fn with_deadline<T, Fut>(limit: Duration, what: &str, fut: Fut) -> Result<T, TransportError>
where
    Fut: Future<Output = Result<T, TransportError>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::timeout(format!(
            "{what} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

/// Fetches the result once. `Ok(None)` means "not ready yet, ask again"; the
/// error that caused it is returned alongside for its Retry-After hint.
pub async fn poll_once(
    transport: &dyn BatchTransport,
    batch_id: &BatchId,
    request_timeout: Duration,
    metrics: &RunMetrics,
) -> Result<Result<BatchResult, TransportError>, RunError> {
    metrics.increment_poll_attempts();
    let fetched = with_deadline(
        request_timeout,
        "Fetching batch result",
        transport.get_batch_result(batch_id),
    )
    .await;

    match fetched {
        Ok(result) => Ok(Ok(result)),
        Err(err) if err.is_retryable() => Ok(Err(err)),
        Err(err) => Err(RunError::Transport(err)),
    }
}

/// Polls until the result is ready, a non-retryable error occurs, a limit is
/// hit, or `cancel` fires. The first request goes out immediately; later
/// delays come from the schedule stage for the elapsed time, or from the
/// server's Retry-After when the schedule honors it.
pub async fn poll_until_ready(
    transport: &dyn BatchTransport,
    batch_id: &BatchId,
    plan: &PollPlan<'_>,
    metrics: &RunMetrics,
    cancel: &CancellationToken,
) -> Result<PollOutcome, RunError> {
    let started = Instant::now();
    let mut attempts: u32 = 0;

    info!(batch_id = %batch_id, "Polling for batch result");

    loop {
        let elapsed = started.elapsed();
        if attempts >= plan.max_attempts || elapsed >= plan.max_duration {
            warn!(batch_id = %batch_id, attempts, ?elapsed, "Giving up on batch result");
            return Err(RunError::PollTimeout { attempts, elapsed });
        }
        attempts += 1;

        let polled = tokio::select! {
            _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
            polled = poll_once(transport, batch_id, plan.request_timeout, metrics) => polled?,
        };

        let pending = match polled {
            Ok(result) => {
                info!(batch_id = %batch_id, attempts, items = result.items.len(), "Batch result ready");
                return Ok(PollOutcome::Ready(result));
            }
            Err(pending) => pending,
        };

        // Never sleep past the poll budget; the limit check ends the loop.
        let elapsed = started.elapsed();
        let delay = plan
            .schedule
            .resolve(elapsed, pending.retry_after)
            .min(plan.max_duration.saturating_sub(elapsed));
        debug!(
            batch_id = %batch_id,
            attempt = attempts,
            kind = %pending.kind,
            delay_ms = delay.as_millis() as u64,
            "Batch not ready"
        );

        if !sleep_or_cancel(delay, cancel).await {
            return Ok(PollOutcome::Cancelled);
        }
    }
}
