#[cfg(test)]
mod tests {
    use crate::{
        scripted::ScriptedTransport,
        utils::{TRANSLATIONS, full_items, manifest, options, result},
    };
    use engine_runtime::{BatchSession, RunOutcome};
    use model::{core::identifiers::BatchId, execution::lifecycle::BatchState};
    use std::{sync::Arc, time::Duration};
    use tokio::time::sleep;
    use tokio_util::sync::CancellationToken;

    // Scenario: a second manifest is submitted while the first is still polling.
    // Expected Outcome: the first run is cancelled on the backend; the second completes.
    #[tokio::test(start_paused = true)]
    async fn resubmission_cancels_previous_run() {
        let manifest = manifest();
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .accept_as("batch-a")
            .accept_as("batch-b")
            .push_result("batch-b", Ok(result("batch-b", full_items(&manifest), Vec::new())));
        let session = BatchSession::new(transport.clone(), options());

        let first = session.submit(manifest.clone()).await;
        sleep(Duration::from_secs(3)).await;
        let second = session.submit(manifest.clone()).await;

        assert!(matches!(first.outcome().await, Ok(RunOutcome::Cancelled)));
        match second.outcome().await {
            Ok(RunOutcome::Completed(report)) => {
                assert_eq!(report.batch_id, BatchId::new("batch-b"));
                assert_eq!(report.translated_text, TRANSLATIONS.join("\n"));
            }
            other => panic!("expected the second run to complete, got {other:?}"),
        }

        let calls = transport.calls();
        assert_eq!(calls.cancelled, vec![BatchId::new("batch-a")]);
        assert!(calls.polls_for("batch-a").len() >= 3);
    }

    // Scenario: the run is cancelled before the backend accepted it.
    // Expected Outcome: nothing to cancel remotely; the slot resets to idle.
    #[tokio::test(start_paused = true)]
    async fn cancel_during_submission_skips_backend_cancel() {
        let transport =
            Arc::new(ScriptedTransport::new().with_submit_delay(Duration::from_secs(10)));
        let session = BatchSession::new(transport.clone(), options());

        let ticket = session.submit(manifest()).await;
        sleep(Duration::from_secs(1)).await;
        ticket.cancel();
        let progress = ticket.progress.clone();

        assert!(matches!(ticket.outcome().await, Ok(RunOutcome::Cancelled)));
        let calls = transport.calls();
        assert!(calls.submitted.is_empty());
        assert!(calls.cancelled.is_empty());
        assert_eq!(progress.borrow().batch_state, BatchState::Idle);
    }

    // Scenario: process shutdown fires while a run is polling.
    // Expected Outcome: the run is cancelled and never marked failed.
    #[tokio::test(start_paused = true)]
    async fn shutdown_token_cancels_in_flight_run() {
        let transport = Arc::new(ScriptedTransport::new());
        let shutdown = CancellationToken::new();
        let session =
            BatchSession::new(transport.clone(), options()).with_shutdown(shutdown.clone());

        let ticket = session.submit(manifest()).await;
        let mut progress = ticket.progress.clone();
        sleep(Duration::from_secs(2)).await;
        shutdown.cancel();

        assert!(matches!(ticket.outcome().await, Ok(RunOutcome::Cancelled)));
        assert_ne!(progress.borrow_and_update().batch_state, BatchState::Failed);
        assert_eq!(transport.calls().cancelled, vec![BatchId::new("batch-1")]);
    }

    #[tokio::test(start_paused = true)]
    async fn session_cancel_waits_for_the_run() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = BatchSession::new(transport.clone(), options());

        let ticket = session.submit(manifest()).await;
        sleep(Duration::from_millis(1_500)).await;
        session.cancel().await;

        // The task has already wound down by the time `cancel` returns.
        assert_eq!(transport.calls().cancelled, vec![BatchId::new("batch-1")]);
        assert!(matches!(ticket.outcome().await, Ok(RunOutcome::Cancelled)));
    }
}
