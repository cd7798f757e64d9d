use crate::core::identifiers::{BatchId, ChunkIndex, Sid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MANIFEST_VERSION: &str = "1.0";

/// One segmented sentence. Created once by the manifest builder, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItem {
    pub sid: Sid,
    pub lv: String,
    pub sig: String,
    pub chunk_index: ChunkIndex,
}

/// Canonical ordered task list for one submission.
///
/// Results coming back from the backend are keyed onto this by `sid`; the
/// manifest alone decides which sentence lives at which position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub batch_id: BatchId,
    pub source: String,
    pub items: Vec<ManifestItem>,
    pub created_at: DateTime<Utc>,
    pub version: String,
}

impl Manifest {
    pub fn item(&self, sid: Sid) -> Option<&ManifestItem> {
        self.items.get(sid)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of chunks, i.e. highest chunk index plus one.
    pub fn chunk_count(&self) -> usize {
        self.items
            .iter()
            .map(|item| item.chunk_index + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Diagnostic flags for the four manifest invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestInvariants {
    pub sid_sequential: bool,
    pub signatures_valid: bool,
    pub source_matches: bool,
    pub no_empty_items: bool,
}

impl ManifestInvariants {
    pub fn all_hold(&self) -> bool {
        self.sid_sequential && self.signatures_valid && self.source_matches && self.no_empty_items
    }
}

/// Consecutive manifest items sharing one chunk index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestChunk {
    pub chunk_index: ChunkIndex,
    pub items: Vec<ManifestItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestStats {
    pub total_sentences: usize,
    pub total_chunks: usize,
    pub avg_sentences_per_chunk: f64,
    pub max_chunk_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(sid: Sid, chunk_index: ChunkIndex) -> ManifestItem {
        ManifestItem {
            sid,
            lv: format!("S{sid}."),
            sig: String::new(),
            chunk_index,
        }
    }

    #[test]
    fn chunk_count_uses_highest_index() {
        let manifest = Manifest {
            batch_id: BatchId::from("b"),
            source: String::new(),
            items: vec![item(0, 0), item(1, 0), item(2, 1)],
            created_at: Utc::now(),
            version: MANIFEST_VERSION.into(),
        };
        assert_eq!(manifest.chunk_count(), 2);
        assert_eq!(manifest.item(2).map(|i| i.chunk_index), Some(1));
        assert!(manifest.item(3).is_none());
    }

    #[test]
    fn wire_format_is_camel_case() {
        let json = serde_json::to_value(item(0, 3)).unwrap();
        assert_eq!(json["chunkIndex"], 3);
    }
}
