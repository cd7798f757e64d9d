use thiserror::Error;

/// A payload that parsed (or failed to parse) but does not match the result schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("invalid JSON in batch result: {0}")]
    InvalidJson(String),

    #[error("invalid batch result format: {0}")]
    Shape(String),

    #[error("unsupported schema version {found} (expected {expected})")]
    Version { expected: u32, found: u32 },
}
