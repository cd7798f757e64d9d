//! One-shot second pass for sentences that failed inside a batch.

use model::core::identifiers::{BatchId, Sid};
use serde::Serialize;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryQueueEntry {
    pub sid: Sid,
    pub text: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryPassSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Entries dropped because the pass was cancelled.
    pub abandoned: usize,
}

#[derive(Debug, Default)]
pub struct RetryQueue {
    entries: Vec<RetryQueueEntry>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a sentence; a second enqueue for the same SID replaces the first.
    pub fn enqueue(&mut self, sid: Sid, text: impl Into<String>, error: impl Into<String>) {
        let entry = RetryQueueEntry {
            sid,
            text: text.into(),
            error: error.into(),
        };
        match self.entries.iter_mut().find(|e| e.sid == sid) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RetryQueueEntry] {
        &self.entries
    }

    /// Runs `retry_one` for every queued entry in enqueue order and routes
    /// each outcome to `on_success` or `on_failure`. A failing entry never
    /// stops the others. The queue is empty afterwards, whatever happened.
    pub async fn process<R, Fut, T, E, S, F>(
        &mut self,
        batch_id: &BatchId,
        cancel: &CancellationToken,
        mut retry_one: R,
        mut on_success: S,
        mut on_failure: F,
    ) -> RetryPassSummary
    where
        R: FnMut(Sid, String, BatchId) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        S: FnMut(&RetryQueueEntry, T),
        F: FnMut(&RetryQueueEntry, E),
        E: std::fmt::Display,
    {
        let entries = std::mem::take(&mut self.entries);
        let mut summary = RetryPassSummary::default();
        if entries.is_empty() {
            return summary;
        }

        info!(batch_id = %batch_id, queued = entries.len(), "Processing retry queue");

        for (idx, entry) in entries.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.abandoned = entries.len() - idx;
                break;
            }

            summary.attempted += 1;
            let attempt = retry_one(entry.sid, entry.text.clone(), batch_id.clone());
            let outcome = tokio::select! {
                _ = cancel.cancelled() => None,
                outcome = attempt => Some(outcome),
            };

            match outcome {
                Some(Ok(value)) => {
                    debug!(sid = entry.sid, "Retry succeeded");
                    summary.succeeded += 1;
                    on_success(entry, value);
                }
                Some(Err(err)) => {
                    warn!(sid = entry.sid, error = %err, "Retry failed");
                    summary.failed += 1;
                    on_failure(entry, err);
                }
                None => {
                    summary.attempted -= 1;
                    summary.abandoned = entries.len() - idx;
                    break;
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, time::Duration};

    fn queue_of(sids: &[Sid]) -> RetryQueue {
        let mut queue = RetryQueue::new();
        for &sid in sids {
            queue.enqueue(sid, format!("Teikums {sid}."), "timeout");
        }
        queue
    }

    #[tokio::test]
    async fn routes_each_outcome_and_clears() {
        let mut queue = queue_of(&[0, 1]);
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        let summary = queue
            .process(
                &BatchId::new("b"),
                &CancellationToken::new(),
                |sid, text, _| async move {
                    if sid == 0 { Ok(text) } else { Err(format!("boom {sid}")) }
                },
                |entry, value: String| succeeded.push((entry.sid, value)),
                |entry, err: String| failed.push((entry.sid, err)),
            )
            .await;

        assert_eq!(succeeded, vec![(0, "Teikums 0.".to_string())]);
        assert_eq!(failed, vec![(1, "boom 1".to_string())]);
        assert_eq!(summary.attempted, 2);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn first_failure_does_not_stop_second() {
        let mut queue = queue_of(&[4, 9]);
        let order = RefCell::new(Vec::new());

        queue
            .process(
                &BatchId::new("b"),
                &CancellationToken::new(),
                |sid, _, _| async move { if sid == 4 { Err("x") } else { Ok(()) } },
                |entry, _| order.borrow_mut().push(("ok", entry.sid)),
                |entry, _| order.borrow_mut().push(("err", entry.sid)),
            )
            .await;

        assert_eq!(order.into_inner(), vec![("err", 4), ("ok", 9)]);
    }

    #[tokio::test]
    async fn passes_batch_id_to_each_attempt() {
        let mut queue = queue_of(&[0]);
        let mut seen = None;
        queue
            .process(
                &BatchId::new("batch-7"),
                &CancellationToken::new(),
                |_, _, batch_id| async move { Ok::<_, String>(batch_id) },
                |_, batch_id| seen = Some(batch_id),
                |_, _| {},
            )
            .await;
        assert_eq!(seen, Some(BatchId::new("batch-7")));
    }

    #[test]
    fn enqueue_replaces_same_sid() {
        let mut queue = RetryQueue::new();
        queue.enqueue(3, "a", "first");
        queue.enqueue(3, "a", "second");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.entries()[0].error, "second");

        queue.clear();
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_the_rest_and_clears() {
        let mut queue = queue_of(&[0, 1, 2]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.cancel();
        });

        let summary = queue
            .process(
                &BatchId::new("b"),
                &cancel,
                |_, _, _| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok::<_, String>(())
                },
                |_, _| panic!("no success expected"),
                |_, _| panic!("no failure expected"),
            )
            .await;

        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.abandoned, 3);
        assert!(queue.is_empty());
    }
}
