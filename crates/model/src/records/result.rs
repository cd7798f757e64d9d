use crate::{
    core::identifiers::{BatchId, Sid},
    execution::errors::SchemaError,
    records::card::Flashcard,
};
use serde::{Deserialize, Serialize};

pub const BATCH_RESULT_SCHEMA_VERSION: u32 = 1;

/// Error code (or message) marking a sentence failure that must not be retried.
pub const PERMANENT_FAILURE: &str = "PERMANENT_FAILURE";

/// Raw response of one processing round. Untrusted: items may arrive in any
/// order, repeat a sid, or be missing entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub schema_version: u32,
    pub batch_id: BatchId,
    pub items: Vec<BatchResultItem>,
    #[serde(default)]
    pub errors: Vec<SentenceError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BatchMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResultItem {
    pub sid: Sid,
    pub sig: String,
    #[serde(default, alias = "russian", skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<Flashcard>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    /// Milliseconds spent by the backend on this sentence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceError {
    pub sid: Sid,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_processing_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks_processed: Option<u32>,
}

impl BatchResult {
    /// Parses and validates a raw payload. A body that is valid JSON but has
    /// the wrong shape or version is rejected, never coerced.
    pub fn from_json(raw: &str) -> Result<Self, SchemaError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| SchemaError::InvalidJson(e.to_string()))?;
        let result: BatchResult =
            serde_json::from_value(value).map_err(|e| SchemaError::Shape(e.to_string()))?;
        result.check_schema()?;
        Ok(result)
    }

    pub fn check_schema(&self) -> Result<(), SchemaError> {
        if self.schema_version != BATCH_RESULT_SCHEMA_VERSION {
            return Err(SchemaError::Version {
                expected: BATCH_RESULT_SCHEMA_VERSION,
                found: self.schema_version,
            });
        }
        Ok(())
    }
}

impl SentenceError {
    pub fn is_permanent(&self) -> bool {
        self.error.eq_ignore_ascii_case(PERMANENT_FAILURE)
            || self
                .error_code
                .as_deref()
                .is_some_and(|code| code.eq_ignore_ascii_case(PERMANENT_FAILURE))
    }
}
