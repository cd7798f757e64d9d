use connectors::error::TransportError;
use engine_core::retry::RetryDisposition;

/// Maps a transport failure onto the retry policy. Retryable kinds honour a
/// server-provided delay when one came back with the error.
pub fn classify_transport_error(err: &TransportError) -> RetryDisposition {
    if !err.kind.is_retryable() {
        return RetryDisposition::Stop;
    }
    match err.retry_after {
        Some(delay) => RetryDisposition::RetryAfter(delay),
        None => RetryDisposition::Retry,
    }
}

/// Whether a failed result fetch means "keep polling" rather than "give up".
pub fn should_continue_polling(err: &TransportError) -> bool {
    err.kind.is_retryable()
}
