use connectors::error::TransportError;
use engine_core::error::ManifestError;
use std::time::Duration;
use thiserror::Error;

/// Failures that end a run in the `failed` state. Cancellation is not an
/// error and never shows up here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Manifest rejected: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Health check failed: {0}")]
    HealthCheck(#[source] TransportError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Submission failed after {attempts} attempts: {last}")]
    SubmitRetriesExhausted {
        attempts: usize,
        #[source]
        last: TransportError,
    },

    #[error("Batch result not ready after {attempts} polls ({elapsed:?})")]
    PollTimeout { attempts: u32, elapsed: Duration },

    #[error("No batch has been submitted")]
    NotSubmitted,

    #[error("Run task ended without reporting an outcome")]
    Aborted,
}

impl RunError {
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            RunError::HealthCheck(err) | RunError::Transport(err) => Some(err),
            RunError::SubmitRetriesExhausted { last, .. } => Some(last),
            _ => None,
        }
    }

    /// Banner key for the caller, derived from the error kind and never from
    /// the message text.
    pub fn message_key(&self) -> &'static str {
        match self {
            RunError::Manifest(_) => "errors.invalid_input",
            RunError::PollTimeout { .. } => "errors.timeout",
            _ => self
                .transport()
                .map(|err| err.kind.message_key())
                .unwrap_or("errors.unknown"),
        }
    }
}
