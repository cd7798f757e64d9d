//! Status/body interpretation for each endpoint, kept free of I/O.

use crate::{
    adapter::{BatchStatus, Health, SubmitReceipt},
    error::{TransportError, TransportErrorKind},
};
use model::{core::identifiers::BatchId, records::result::BatchResult};
use serde::Deserialize;
use std::time::Duration;

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

pub fn interpret_health(status: u16, body: &str) -> Result<Health, TransportError> {
    if !is_success(status) {
        return Err(TransportError::new(
            TransportErrorKind::ServerDown,
            format!("Health check failed: HTTP {status}"),
        )
        .with_status(status));
    }

    let health = if body.trim().is_empty() {
        Health { ok: false }
    } else {
        serde_json::from_str::<Health>(body)
            .map_err(|e| TransportError::schema_invalid(format!("invalid health body: {e}")))?
    };

    if !health.ok {
        return Err(TransportError::new(
            TransportErrorKind::ServerDown,
            "Backend reports unhealthy",
        )
        .with_status(status));
    }
    Ok(health)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody {
    batch_id: Option<String>,
    estimated_time: Option<f64>,
}

pub fn interpret_submit(
    status: u16,
    retry_after: Option<Duration>,
    body: &str,
) -> Result<SubmitReceipt, TransportError> {
    if !is_success(status) {
        return Err(TransportError::from_status(status, "Submit failed", retry_after));
    }

    let parsed: SubmitBody = serde_json::from_str(body)
        .map_err(|e| TransportError::schema_invalid(format!("invalid submit body: {e}")))?;

    let batch_id = parsed
        .batch_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            TransportError::schema_invalid("Server did not return batchId").with_status(status)
        })?;

    Ok(SubmitReceipt {
        batch_id: BatchId::new(batch_id),
        estimated_time: parsed.estimated_time,
    })
}

/// 202/204 and an empty 200 mean "still processing"; 404 and 410 are
/// terminal; any other 2xx body must pass strict schema validation.
pub fn interpret_result(
    batch_id: &BatchId,
    status: u16,
    retry_after: Option<Duration>,
    body: &str,
) -> Result<BatchResult, TransportError> {
    match status {
        202 | 204 => {
            return Err(TransportError::still_processing(format!(
                "Batch {batch_id} is still processing"
            ))
            .with_status(status)
            .with_retry_after(retry_after));
        }
        404 => {
            return Err(TransportError::new(
                TransportErrorKind::NotFound,
                format!("Batch {batch_id} not found"),
            )
            .with_status(status));
        }
        410 => {
            return Err(TransportError::new(
                TransportErrorKind::Expired,
                format!("Batch {batch_id} expired"),
            )
            .with_status(status));
        }
        s if !is_success(s) => {
            return Err(TransportError::from_status(
                s,
                "Failed to get batch result",
                retry_after,
            ));
        }
        _ => {}
    }

    if body.trim().is_empty() {
        return Err(
            TransportError::still_processing(format!("Batch {batch_id} has no content yet"))
                .with_status(status)
                .with_retry_after(retry_after),
        );
    }

    Ok(BatchResult::from_json(body)?)
}

pub fn interpret_status(status: u16, body: &str) -> Result<BatchStatus, TransportError> {
    if !is_success(status) {
        return Err(TransportError::from_status(
            status,
            "Failed to get batch status",
            None,
        ));
    }
    serde_json::from_str(body)
        .map_err(|e| TransportError::schema_invalid(format!("invalid status body: {e}")))
}

pub fn interpret_cancel(status: u16) -> Result<(), TransportError> {
    if is_success(status) || status == 404 {
        return Ok(());
    }
    Err(TransportError::from_status(
        status,
        "Failed to cancel batch",
        None,
    ))
}

pub fn interpret_single(status: u16, body: &str) -> Result<(), TransportError> {
    if is_success(status) {
        return Ok(());
    }
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/message")
                .or_else(|| json.get("error"))
                .or_else(|| json.get("message"))
                .and_then(|v| v.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string());

    let mut err = TransportError::from_status(status, "Provider error", None);
    if !detail.is_empty() {
        err.message = format!("{}: {detail}", err.message);
    }
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::BatchStatusKind;

    fn id() -> BatchId {
        BatchId::new("b-1")
    }

    const VALID: &str = r#"{
        "schemaVersion": 1,
        "batchId": "b-1",
        "items": [{ "sid": 0, "sig": "x", "translation": "Привет." }]
    }"#;

    #[test]
    fn still_processing_statuses() {
        for status in [202, 204] {
            let err = interpret_result(&id(), status, Some(Duration::from_secs(4)), "").unwrap_err();
            assert_eq!(err.kind, TransportErrorKind::StillProcessing);
            assert!(err.is_retryable());
            assert_eq!(err.retry_after, Some(Duration::from_secs(4)));
        }

        let err = interpret_result(&id(), 200, None, "  \n").unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::StillProcessing);
    }

    #[test]
    fn terminal_result_statuses() {
        let err = interpret_result(&id(), 404, None, "").unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::NotFound);
        assert!(!err.is_retryable());

        let err = interpret_result(&id(), 410, None, "").unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Expired);

        let err = interpret_result(&id(), 503, None, "").unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Server);
        assert!(err.is_retryable());
    }

    #[test]
    fn strict_schema_on_success() {
        let result = interpret_result(&id(), 200, None, VALID).unwrap();
        assert_eq!(result.items.len(), 1);

        let err = interpret_result(&id(), 200, None, "{not json").unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::SchemaInvalid);

        let wrong_version = VALID.replace("\"schemaVersion\": 1", "\"schemaVersion\": 2");
        let err = interpret_result(&id(), 200, None, &wrong_version).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::SchemaInvalid);

        let err = interpret_result(&id(), 200, None, r#"{"schemaVersion":1}"#).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::SchemaInvalid);
        assert!(!err.is_retryable());
    }

    #[test]
    fn submit_requires_batch_id() {
        let receipt =
            interpret_submit(200, None, r#"{"batchId":"srv-9","estimatedTime":12}"#).unwrap();
        assert_eq!(receipt.batch_id.as_str(), "srv-9");
        assert_eq!(receipt.estimated_time, Some(12.0));

        let err = interpret_submit(200, None, r#"{"batchId":"  "}"#).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::SchemaInvalid);

        let err = interpret_submit(429, Some(Duration::from_secs(2)), "").unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::RateLimited);
        assert_eq!(err.retry_after, Some(Duration::from_secs(2)));

        let err = interpret_submit(413, None, "").unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn health_distinguishes_server_down() {
        assert!(interpret_health(200, r#"{"ok":true}"#).is_ok());

        let err = interpret_health(200, r#"{"ok":false}"#).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::ServerDown);

        let err = interpret_health(502, "").unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::ServerDown);
    }

    #[test]
    fn cancel_treats_not_found_as_done() {
        assert!(interpret_cancel(204).is_ok());
        assert!(interpret_cancel(404).is_ok());
        assert_eq!(
            interpret_cancel(500).unwrap_err().kind,
            TransportErrorKind::Server
        );
    }

    #[test]
    fn parses_status_body() {
        let status = interpret_status(200, r#"{"status":"processing","progress":0.5}"#).unwrap();
        assert_eq!(status.status, BatchStatusKind::Processing);
        assert_eq!(status.progress, Some(0.5));
    }

    #[test]
    fn single_errors_carry_provider_message() {
        let err = interpret_single(529, r#"{"error":{"message":"busy"}}"#).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Overloaded);
        assert!(err.message.ends_with("busy"));
    }
}
