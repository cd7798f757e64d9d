use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Closed set of failure kinds every transport must produce. Retry loops
/// decide on the kind alone, never on raw status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Connection refused, reset or DNS failure.
    Network,
    /// The request did not complete within its deadline.
    Timeout,
    RateLimited,
    Overloaded,
    /// Any other 5xx response.
    Server,
    RequestTooLarge,
    /// The batch is accepted but its result is not ready yet.
    StillProcessing,
    NotFound,
    /// The batch existed but is gone (410).
    Expired,
    /// The backend answered but the payload does not match the contract.
    SchemaInvalid,
    /// The backend is reachable but reports itself unhealthy.
    ServerDown,
    Unknown,
}

impl TransportErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportErrorKind::Network
                | TransportErrorKind::Timeout
                | TransportErrorKind::RateLimited
                | TransportErrorKind::Overloaded
                | TransportErrorKind::Server
                | TransportErrorKind::StillProcessing
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            TransportErrorKind::Network => "NETWORK_ERROR",
            TransportErrorKind::Timeout => "TIMEOUT",
            TransportErrorKind::RateLimited => "RATE_LIMIT",
            TransportErrorKind::Overloaded => "OVERLOADED",
            TransportErrorKind::Server => "SERVER_ERROR",
            TransportErrorKind::RequestTooLarge => "REQUEST_TOO_LARGE",
            TransportErrorKind::StillProcessing => "BATCH_PROCESSING",
            TransportErrorKind::NotFound => "BATCH_NOT_FOUND",
            TransportErrorKind::Expired => "EXPIRED",
            TransportErrorKind::SchemaInvalid => "SCHEMA_INVALID",
            TransportErrorKind::ServerDown => "PROXY_DOWN",
            TransportErrorKind::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Stable key for a localizable user-facing banner.
    pub fn message_key(&self) -> &'static str {
        match self {
            TransportErrorKind::Network => "errors.network_down",
            TransportErrorKind::Timeout => "errors.timeout",
            TransportErrorKind::RateLimited => "errors.rate_limited",
            TransportErrorKind::Overloaded => "errors.overloaded",
            TransportErrorKind::Server => "errors.server_error",
            TransportErrorKind::RequestTooLarge => "errors.request_too_large",
            TransportErrorKind::StillProcessing => "errors.processing",
            TransportErrorKind::NotFound => "errors.batch_not_found",
            TransportErrorKind::Expired => "errors.expired",
            TransportErrorKind::SchemaInvalid => "errors.schema_invalid",
            TransportErrorKind::ServerDown => "errors.proxy_down",
            TransportErrorKind::Unknown => "errors.unknown",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    pub status: Option<u16>,
    /// Server-suggested wait before the next attempt.
    pub retry_after: Option<Duration>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn still_processing(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::StillProcessing, message)
    }

    pub fn schema_invalid(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::SchemaInvalid, message)
    }

    /// Generic status mapping shared by every endpoint. Statuses without a
    /// dedicated kind map to [`TransportErrorKind::Unknown`] (not retryable).
    pub fn from_status(status: u16, context: &str, retry_after: Option<Duration>) -> Self {
        let kind = match status {
            429 => TransportErrorKind::RateLimited,
            413 => TransportErrorKind::RequestTooLarge,
            529 => TransportErrorKind::Overloaded,
            s if s >= 500 => TransportErrorKind::Server,
            _ => TransportErrorKind::Unknown,
        };
        Self::new(kind, format!("{context}: HTTP {status}"))
            .with_status(status)
            .with_retry_after(retry_after)
    }
}

impl From<model::execution::errors::SchemaError> for TransportError {
    fn from(err: model::execution::errors::SchemaError) -> Self {
        TransportError::schema_invalid(err.to_string())
    }
}
