use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level batch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Idle,
    Submitted,
    InProgress,
    /// Every chunk has been processed; waiting for the completion event.
    PartialReady,
    Ready,
    Failed,
}

impl BatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchState::Idle => "idle",
            BatchState::Submitted => "submitted",
            BatchState::InProgress => "in_progress",
            BatchState::PartialReady => "partial_ready",
            BatchState::Ready => "ready",
            BatchState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchState::Ready | BatchState::Failed)
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-sentence lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SidState {
    Pending,
    Received,
    Invalid,
    Retrying,
    /// Reserved; no transition produces it.
    Skipped,
}

impl SidState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SidState::Pending => "pending",
            SidState::Received => "received",
            SidState::Invalid => "invalid",
            SidState::Retrying => "retrying",
            SidState::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SidState::Pending | SidState::Retrying)
    }
}

impl fmt::Display for SidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
