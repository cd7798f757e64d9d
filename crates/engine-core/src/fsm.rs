//! Batch lifecycle state machine.
//!
//! [`reduce`] is the only way to change a [`BatchFsmState`]. Events that are
//! not legal in the current state are logged and leave the state untouched,
//! so stray or duplicated events from the async side cannot corrupt it.

use crate::error::FsmViolation;
use chrono::{DateTime, Utc};
use model::{
    core::identifiers::{ChunkIndex, Sid},
    execution::lifecycle::{BatchState, SidState},
    records::manifest::Manifest,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// SID recorded for batch-level (not sentence-level) failures.
pub const BATCH_ERROR_SID: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub sid: i64,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn is_batch_level(&self) -> bool {
        self.sid == BATCH_ERROR_SID
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsmEvent {
    SubmitBatch,
    BatchStarted,
    ChunkProcessed { chunk_index: ChunkIndex },
    SidReceived { sid: Sid },
    SidFailed { sid: Sid, error: String },
    RetrySid { sid: Sid },
    BatchCompleted,
    BatchFailed { error: String },
    Reset,
}

impl FsmEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FsmEvent::SubmitBatch => "SUBMIT_BATCH",
            FsmEvent::BatchStarted => "BATCH_STARTED",
            FsmEvent::ChunkProcessed { .. } => "CHUNK_PROCESSED",
            FsmEvent::SidReceived { .. } => "SID_RECEIVED",
            FsmEvent::SidFailed { .. } => "SID_FAILED",
            FsmEvent::RetrySid { .. } => "RETRY_SID",
            FsmEvent::BatchCompleted => "BATCH_COMPLETED",
            FsmEvent::BatchFailed { .. } => "BATCH_FAILED",
            FsmEvent::Reset => "RESET",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFsmState {
    pub batch_state: BatchState,
    pub per_sid: BTreeMap<Sid, SidState>,
    pub errors: Vec<ErrorRecord>,
    pub processed_chunks: BTreeSet<ChunkIndex>,
    pub total_chunks: usize,
    pub total_sids: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SidStateCounts {
    pub pending: usize,
    pub received: usize,
    pub invalid: usize,
    pub retrying: usize,
    pub skipped: usize,
}

impl BatchFsmState {
    /// Idle state with every SID pending.
    pub fn new(total_sids: usize, total_chunks: usize) -> Self {
        Self {
            batch_state: BatchState::Idle,
            per_sid: (0..total_sids).map(|sid| (sid, SidState::Pending)).collect(),
            errors: Vec::new(),
            processed_chunks: BTreeSet::new(),
            total_chunks,
            total_sids,
            start_time: None,
            end_time: None,
        }
    }

    pub fn for_manifest(manifest: &Manifest) -> Self {
        Self::new(manifest.len(), manifest.chunk_count())
    }

    pub fn sid_state(&self, sid: Sid) -> Option<SidState> {
        self.per_sid.get(&sid).copied()
    }

    pub fn sid_state_counts(&self) -> SidStateCounts {
        let mut counts = SidStateCounts::default();
        for state in self.per_sid.values() {
            match state {
                SidState::Pending => counts.pending += 1,
                SidState::Received => counts.received += 1,
                SidState::Invalid => counts.invalid += 1,
                SidState::Retrying => counts.retrying += 1,
                SidState::Skipped => counts.skipped += 1,
            }
        }
        counts
    }

    /// Received SIDs over total SIDs, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.total_sids == 0 {
            return 0.0;
        }
        self.sid_state_counts().received as f64 / self.total_sids as f64
    }

    /// Elapsed time since submission; frozen at the end time once finished.
    pub fn processing_time(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        let start = self.start_time?;
        Some(self.end_time.unwrap_or(now) - start)
    }

    /// No SID is pending or retrying.
    pub fn is_ready_to_complete(&self) -> bool {
        let counts = self.sid_state_counts();
        counts.pending == 0 && counts.retrying == 0
    }

    pub fn has_critical_errors(&self) -> bool {
        self.errors.iter().any(ErrorRecord::is_batch_level)
    }

    pub fn is_idle(&self) -> bool {
        self.batch_state == BatchState::Idle
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.batch_state,
            BatchState::Submitted | BatchState::InProgress | BatchState::PartialReady
        )
    }

    pub fn is_done(&self) -> bool {
        self.batch_state == BatchState::Ready
    }

    pub fn is_failed(&self) -> bool {
        self.batch_state == BatchState::Failed
    }

    fn with_sid(mut self, sid: Sid, state: SidState, event: &FsmEvent) -> Self {
        match self.per_sid.get_mut(&sid) {
            Some(slot) => *slot = state,
            None => warn!(
                event = event.name(),
                sid,
                total_sids = self.total_sids,
                "Ignoring event for unknown SID"
            ),
        }
        self
    }
}

/// Applies `event` at the current time.
pub fn reduce(state: BatchFsmState, event: FsmEvent) -> BatchFsmState {
    reduce_at(state, event, Utc::now())
}

/// Applies `event` with an explicit clock reading.
pub fn reduce_at(state: BatchFsmState, event: FsmEvent, now: DateTime<Utc>) -> BatchFsmState {
    match event {
        FsmEvent::Reset => BatchFsmState::new(state.total_sids, state.total_chunks),

        FsmEvent::SubmitBatch => {
            if state.batch_state != BatchState::Idle {
                return invalid_transition(state, &event);
            }
            BatchFsmState {
                batch_state: BatchState::Submitted,
                errors: Vec::new(),
                processed_chunks: BTreeSet::new(),
                start_time: Some(now),
                end_time: None,
                ..state
            }
        }

        FsmEvent::BatchStarted => {
            if state.batch_state != BatchState::Submitted {
                return invalid_transition(state, &event);
            }
            BatchFsmState {
                batch_state: BatchState::InProgress,
                ..state
            }
        }

        FsmEvent::ChunkProcessed { chunk_index } => {
            if state.batch_state != BatchState::InProgress {
                return invalid_transition(state, &event);
            }
            if chunk_index >= state.total_chunks {
                warn!(
                    chunk_index,
                    total_chunks = state.total_chunks,
                    "Ignoring CHUNK_PROCESSED for unknown chunk"
                );
                return state;
            }

            let mut processed_chunks = state.processed_chunks;
            processed_chunks.insert(chunk_index);
            let batch_state = if processed_chunks.len() == state.total_chunks {
                BatchState::PartialReady
            } else {
                state.batch_state
            };
            BatchFsmState {
                batch_state,
                processed_chunks,
                ..state
            }
        }

        FsmEvent::SidReceived { sid } => state.with_sid(sid, SidState::Received, &event),

        FsmEvent::RetrySid { sid } => state.with_sid(sid, SidState::Retrying, &event),

        FsmEvent::SidFailed { sid, ref error } => {
            if !state.per_sid.contains_key(&sid) {
                return state.with_sid(sid, SidState::Invalid, &event);
            }
            let mut next = state.with_sid(sid, SidState::Invalid, &event);
            next.errors.push(ErrorRecord {
                sid: sid as i64,
                error: error.clone(),
                timestamp: now,
            });
            next
        }

        FsmEvent::BatchCompleted => {
            if !matches!(
                state.batch_state,
                BatchState::InProgress | BatchState::PartialReady
            ) {
                return invalid_transition(state, &event);
            }
            BatchFsmState {
                batch_state: BatchState::Ready,
                end_time: Some(now),
                ..state
            }
        }

        FsmEvent::BatchFailed { error } => {
            if state.batch_state.is_terminal() {
                return invalid_transition(state, &FsmEvent::BatchFailed { error });
            }
            let mut errors = Vec::with_capacity(state.errors.len() + 1);
            errors.push(ErrorRecord {
                sid: BATCH_ERROR_SID,
                error,
                timestamp: now,
            });
            errors.extend(state.errors);
            BatchFsmState {
                batch_state: BatchState::Failed,
                end_time: Some(now),
                errors,
                ..state
            }
        }
    }
}

fn invalid_transition(state: BatchFsmState, event: &FsmEvent) -> BatchFsmState {
    warn!(
        event = event.name(),
        from = %state.batch_state,
        "Invalid transition"
    );
    state
}

/// Structural checks for diagnostics and tests; not run on the hot path.
pub fn validate_state(state: &BatchFsmState) -> Result<(), FsmViolation> {
    let tracked_match = state.per_sid.len() == state.total_sids
        && state.per_sid.keys().copied().eq(0..state.total_sids);
    if !tracked_match {
        return Err(FsmViolation::SidSetMismatch {
            expected: state.total_sids,
        });
    }

    if state.batch_state == BatchState::Ready && !state.is_ready_to_complete() {
        let counts = state.sid_state_counts();
        return Err(FsmViolation::ReadyWithUnfinishedSids {
            unfinished: counts.pending + counts.retrying,
        });
    }

    if state.processed_chunks.len() > state.total_chunks {
        return Err(FsmViolation::TooManyChunks {
            processed: state.processed_chunks.len(),
            total: state.total_chunks,
        });
    }

    Ok(())
}
