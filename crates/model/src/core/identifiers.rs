use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// Dense, zero-based sentence identifier assigned by the manifest builder.
pub type Sid = usize;

/// Transport-level grouping of consecutive sentences.
pub type ChunkIndex = usize;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Arc<str>);

impl BatchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    /// Fresh random id for a new submission.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BatchId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for BatchId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(BatchId::generate(), BatchId::generate());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = BatchId::from("batch-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"batch-1\"");
        let back: BatchId = serde_json::from_str("\"batch-1\"").unwrap();
        assert_eq!(back, id);
    }
}
