use crate::{
    error::{ManifestError, ManifestViolation},
    signature::signature,
    text::{SegmenterEngine, normalize_text, segment},
};
use chrono::Utc;
use model::{
    core::identifiers::BatchId,
    records::manifest::{
        MANIFEST_VERSION, Manifest, ManifestChunk, ManifestInvariants, ManifestItem,
        ManifestStats,
    },
};
use std::collections::BTreeMap;
use tracing::debug;

pub const DEFAULT_MAX_SENTENCES_PER_CHUNK: usize = 20;

/// Builds a manifest with the primitive segmentation engine.
pub fn build_manifest(
    source: &str,
    max_sentences_per_chunk: usize,
) -> Result<Manifest, ManifestError> {
    build_manifest_with_engine(source, max_sentences_per_chunk, SegmenterEngine::Primitive)
}

/// Segments `source`, assigns SIDs in segmentation order, groups them into
/// chunks of at most `max_sentences_per_chunk` and signs every item. The
/// result is validated before it is returned.
pub fn build_manifest_with_engine(
    source: &str,
    max_sentences_per_chunk: usize,
    engine: SegmenterEngine,
) -> Result<Manifest, ManifestError> {
    if max_sentences_per_chunk == 0 {
        return Err(ManifestError::InvalidInput(
            "max_sentences_per_chunk must be at least 1".to_string(),
        ));
    }

    let sentences = segment(source, engine)?;
    if sentences.is_empty() {
        return Err(ManifestError::InvalidInput(
            "source text contains no sentences".to_string(),
        ));
    }

    let items = sentences
        .into_iter()
        .enumerate()
        .map(|(sid, lv)| ManifestItem {
            sig: signature(&lv, sid),
            chunk_index: sid / max_sentences_per_chunk,
            sid,
            lv,
        })
        .collect::<Vec<_>>();

    let manifest = Manifest {
        batch_id: BatchId::generate(),
        source: source.to_string(),
        items,
        created_at: Utc::now(),
        version: MANIFEST_VERSION.to_string(),
    };

    validate_manifest(&manifest)?;

    debug!(
        batch_id = %manifest.batch_id,
        sentences = manifest.len(),
        chunks = manifest.chunk_count(),
        engine = %engine,
        "Built manifest"
    );

    Ok(manifest)
}

/// Evaluates every invariant without failing.
pub fn compute_invariants(manifest: &Manifest) -> ManifestInvariants {
    let sid_sequential = manifest
        .items
        .iter()
        .enumerate()
        .all(|(idx, item)| item.sid == idx);

    let signatures_valid = manifest
        .items
        .iter()
        .all(|item| item.sig == signature(&item.lv, item.sid));

    let joined = manifest
        .items
        .iter()
        .map(|item| item.lv.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let source_matches = normalize_text(&manifest.source) == normalize_text(&joined);

    let no_empty_items = manifest.items.iter().all(|item| !item.lv.trim().is_empty());

    ManifestInvariants {
        sid_sequential,
        signatures_valid,
        source_matches,
        no_empty_items,
    }
}

/// Fails on the first violated invariant; returns the flags when all hold.
pub fn validate_manifest(manifest: &Manifest) -> Result<ManifestInvariants, ManifestError> {
    if manifest.is_empty() {
        return Err(ManifestViolation::Empty.into());
    }

    let invariants = compute_invariants(manifest);
    if invariants.all_hold() {
        return Ok(invariants);
    }

    let violation = if !invariants.sid_sequential {
        ManifestViolation::SidSequence
    } else if !invariants.signatures_valid {
        let sid = manifest
            .items
            .iter()
            .find(|item| item.sig != signature(&item.lv, item.sid))
            .map(|item| item.sid)
            .unwrap_or_default();
        ManifestViolation::Signature(sid)
    } else if !invariants.source_matches {
        ManifestViolation::SourceMismatch
    } else {
        let sid = manifest
            .items
            .iter()
            .find(|item| item.lv.trim().is_empty())
            .map(|item| item.sid)
            .unwrap_or_default();
        ManifestViolation::EmptyItem(sid)
    };

    Err(violation.into())
}

/// Groups items by chunk index, ordered by chunk index.
pub fn manifest_chunks(manifest: &Manifest) -> Vec<ManifestChunk> {
    let mut by_chunk: BTreeMap<usize, Vec<ManifestItem>> = BTreeMap::new();
    for item in &manifest.items {
        by_chunk
            .entry(item.chunk_index)
            .or_default()
            .push(item.clone());
    }

    by_chunk
        .into_iter()
        .map(|(chunk_index, items)| ManifestChunk { chunk_index, items })
        .collect()
}

pub fn manifest_stats(manifest: &Manifest) -> ManifestStats {
    let chunks = manifest_chunks(manifest);
    let total_sentences = manifest.len();
    let total_chunks = chunks.len();

    ManifestStats {
        total_sentences,
        total_chunks,
        avg_sentences_per_chunk: if total_chunks == 0 {
            0.0
        } else {
            total_sentences as f64 / total_chunks as f64
        },
        max_chunk_size: chunks.iter().map(|c| c.items.len()).max().unwrap_or(0),
    }
}

/// Original-language text rebuilt from the manifest alone.
pub fn source_text(manifest: &Manifest, use_newlines: bool) -> String {
    let sep = if use_newlines { "\n" } else { " " };
    manifest
        .items
        .iter()
        .map(|item| item.lv.as_str())
        .collect::<Vec<_>>()
        .join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Pirmais teikums. Otrais teikums! Trešais?\nCeturtais. Piektais.";

    #[test]
    fn assigns_dense_sids_and_greedy_chunks() {
        let manifest = build_manifest(TEXT, 2).unwrap();

        let sids: Vec<_> = manifest.items.iter().map(|i| i.sid).collect();
        let chunks: Vec<_> = manifest.items.iter().map(|i| i.chunk_index).collect();
        assert_eq!(sids, vec![0, 1, 2, 3, 4]);
        assert_eq!(chunks, vec![0, 0, 1, 1, 2]);
        assert_eq!(manifest.items[2].lv, "Trešais?");
        assert_eq!(manifest.version, MANIFEST_VERSION);
        assert!(compute_invariants(&manifest).all_hold());
    }

    #[test]
    fn every_item_is_signed() {
        let manifest = build_manifest(TEXT, 20).unwrap();
        for item in &manifest.items {
            assert_eq!(item.sig, signature(&item.lv, item.sid));
        }
    }

    #[test]
    fn batch_ids_differ_per_build() {
        let a = build_manifest(TEXT, 20).unwrap();
        let b = build_manifest(TEXT, 20).unwrap();
        assert_ne!(a.batch_id, b.batch_id);
        assert_eq!(a.items, b.items);
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(
            build_manifest(" \n\t ", 20),
            Err(ManifestError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_zero_chunk_size() {
        assert!(matches!(
            build_manifest(TEXT, 0),
            Err(ManifestError::InvalidInput(_))
        ));
    }

    #[test]
    fn uses_requested_engine() {
        let text = "Dzimis 1990. gadā. Tas ir viss.";
        assert_eq!(build_manifest(text, 20).unwrap().len(), 3);
        assert_eq!(
            build_manifest_with_engine(text, 20, SegmenterEngine::AbbreviationAware)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn detects_wrong_sid_order() {
        let mut manifest = build_manifest(TEXT, 20).unwrap();
        manifest.items.swap(0, 1);

        assert!(!compute_invariants(&manifest).sid_sequential);
        assert_eq!(
            validate_manifest(&manifest),
            Err(ManifestError::Invalid(ManifestViolation::SidSequence))
        );
    }

    #[test]
    fn detects_wrong_signature() {
        let mut manifest = build_manifest(TEXT, 20).unwrap();
        manifest.items[3].sig = "WRONG".into();

        let invariants = compute_invariants(&manifest);
        assert!(!invariants.signatures_valid);
        assert!(invariants.sid_sequential);
        assert_eq!(
            validate_manifest(&manifest),
            Err(ManifestError::Invalid(ManifestViolation::Signature(3)))
        );
    }

    #[test]
    fn detects_source_mismatch() {
        let mut manifest = build_manifest(TEXT, 20).unwrap();
        manifest.source.push_str(" Sestais.");

        assert!(!compute_invariants(&manifest).source_matches);
        assert_eq!(
            validate_manifest(&manifest),
            Err(ManifestError::Invalid(ManifestViolation::SourceMismatch))
        );
    }

    #[test]
    fn detects_empty_item() {
        let mut manifest = build_manifest("Viens. Divi.", 20).unwrap();
        manifest.items.push(ManifestItem {
            sid: 2,
            lv: "  ".into(),
            sig: signature("  ", 2),
            chunk_index: 0,
        });

        let invariants = compute_invariants(&manifest);
        assert!(!invariants.no_empty_items);
        assert!(invariants.source_matches);
        assert_eq!(
            validate_manifest(&manifest),
            Err(ManifestError::Invalid(ManifestViolation::EmptyItem(2)))
        );
    }

    #[test]
    fn rejects_empty_manifest() {
        let mut manifest = build_manifest(TEXT, 20).unwrap();
        manifest.items.clear();
        assert_eq!(
            validate_manifest(&manifest),
            Err(ManifestError::Invalid(ManifestViolation::Empty))
        );
    }

    #[test]
    fn chunks_and_stats() {
        let manifest = build_manifest(TEXT, 2).unwrap();
        let chunks = manifest_chunks(&manifest);

        assert_eq!(
            chunks.iter().map(|c| c.chunk_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(chunks[2].items[0].sid, 4);

        let stats = manifest_stats(&manifest);
        assert_eq!(stats.total_sentences, 5);
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.max_chunk_size, 2);
        assert!((stats.avg_sentences_per_chunk - 5.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rebuilds_source_text_in_sid_order() {
        let manifest = build_manifest("A. B! C?", 20).unwrap();
        assert_eq!(source_text(&manifest, true), "A.\nB!\nC?");
        assert_eq!(source_text(&manifest, false), "A. B! C?");
    }
}
