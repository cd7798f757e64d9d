//! Folds unordered, possibly duplicated backend results into one bucket per SID.
//!
//! The manifest is the only authority on which SIDs exist; results are keyed
//! onto it and anything it does not know is counted and dropped.

use model::{
    core::identifiers::Sid,
    execution::{metrics::ProcessingMetrics, retry::SentenceRetryOutput},
    records::{
        card::Flashcard,
        manifest::{Manifest, ManifestItem},
        result::{BatchResult, BatchResultItem},
    },
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SidBucket {
    /// Distinct non-empty translation variants, in arrival order.
    pub translations: Vec<String>,
    /// Cards with every context traced back to this SID.
    pub cards: Vec<Flashcard>,
    pub warnings: Vec<String>,
}

impl SidBucket {
    pub fn has_content(&self) -> bool {
        !self.translations.is_empty() || !self.cards.is_empty()
    }
}

pub type AggregatedBySid = BTreeMap<Sid, SidBucket>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    pub by_sid: AggregatedBySid,
    pub metrics: ProcessingMetrics,
}

impl Aggregation {
    /// One empty bucket per manifest SID.
    pub fn empty(manifest: &Manifest) -> Self {
        Self {
            by_sid: manifest
                .items
                .iter()
                .map(|item| (item.sid, SidBucket::default()))
                .collect(),
            metrics: ProcessingMetrics::new(manifest.len()),
        }
    }

    pub fn bucket(&self, sid: Sid) -> Option<&SidBucket> {
        self.by_sid.get(&sid)
    }

    fn recount_coverage(&mut self) {
        let received = self.by_sid.values().filter(|b| b.has_content()).count();
        self.metrics.received_sids = received;
        self.metrics.missing_sids = self.metrics.total_sids.saturating_sub(received);
    }
}

fn manifest_entry(manifest: &Manifest, sid: Sid) -> Option<&ManifestItem> {
    manifest.item(sid).filter(|item| item.sid == sid)
}

/// Appends content to a bucket using the accumulation rules shared by
/// aggregation and retry merging.
fn fold_into(
    bucket: &mut SidBucket,
    metrics: &mut ProcessingMetrics,
    sid: Sid,
    sig: &str,
    translation: Option<&str>,
    cards: &[Flashcard],
    warnings: &[String],
) {
    if let Some(raw) = translation {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            metrics.empty_translations += 1;
        } else if bucket.translations.iter().any(|t| t == trimmed) {
            metrics.duplicate_translations += 1;
        } else {
            bucket.translations.push(trimmed.to_string());
        }
    }

    bucket
        .cards
        .extend(cards.iter().map(|card| card.traced_to(sid, sig)));
    bucket.warnings.extend(warnings.iter().cloned());
}

fn apply_item(manifest: &Manifest, aggregation: &mut Aggregation, item: &BatchResultItem) {
    let Some(expected) = manifest_entry(manifest, item.sid) else {
        debug!(sid = item.sid, "Result item for unknown SID dropped");
        aggregation.metrics.schema_violations += 1;
        return;
    };

    // A signature mismatch is a quality signal; the content is still used.
    if expected.sig != item.sig {
        aggregation.metrics.invalid_sigs += 1;
    }

    let Some(bucket) = aggregation.by_sid.get_mut(&item.sid) else {
        aggregation.metrics.schema_violations += 1;
        return;
    };

    fold_into(
        bucket,
        &mut aggregation.metrics,
        item.sid,
        &item.sig,
        item.translation.as_deref(),
        item.cards.as_deref().unwrap_or_default(),
        item.warnings.as_deref().unwrap_or_default(),
    );
}

/// Aggregates one batch result against its manifest. Item order in the
/// result is irrelevant.
pub fn aggregate(manifest: &Manifest, result: &BatchResult) -> Aggregation {
    let mut aggregation = Aggregation::empty(manifest);
    for item in &result.items {
        apply_item(manifest, &mut aggregation, item);
    }
    aggregation.recount_coverage();

    debug!(
        total = aggregation.metrics.total_sids,
        received = aggregation.metrics.received_sids,
        invalid_sigs = aggregation.metrics.invalid_sigs,
        duplicates = aggregation.metrics.duplicate_translations,
        empty = aggregation.metrics.empty_translations,
        violations = aggregation.metrics.schema_violations,
        "Aggregated batch result"
    );
    aggregation
}

/// Single-SID partial built from a second-pass result. The manifest signature
/// is used for tracing since the retry path carries none of its own.
pub fn retry_partial(manifest: &Manifest, sid: Sid, output: &SentenceRetryOutput) -> Aggregation {
    let mut metrics = ProcessingMetrics::new(manifest.len());
    let mut by_sid = AggregatedBySid::new();

    match manifest_entry(manifest, sid) {
        Some(item) => {
            let mut bucket = SidBucket::default();
            fold_into(
                &mut bucket,
                &mut metrics,
                sid,
                &item.sig,
                output.translation.as_deref(),
                &output.cards,
                &output.warnings,
            );
            by_sid.insert(sid, bucket);
        }
        None => metrics.schema_violations += 1,
    }

    Aggregation { by_sid, metrics }
}

/// Pure merge: appends `partial`'s content onto a copy of `prev` with the same
/// rules as [`aggregate`]. Coverage is recomputed from the merged buckets;
/// quality counters accumulate.
pub fn merge(prev: &Aggregation, partial: &Aggregation) -> Aggregation {
    let mut merged = prev.clone();

    merged.metrics.invalid_sigs += partial.metrics.invalid_sigs;
    merged.metrics.duplicate_translations += partial.metrics.duplicate_translations;
    merged.metrics.empty_translations += partial.metrics.empty_translations;
    merged.metrics.schema_violations += partial.metrics.schema_violations;

    for (sid, incoming) in &partial.by_sid {
        let Some(bucket) = merged.by_sid.get_mut(sid) else {
            merged.metrics.schema_violations += 1;
            continue;
        };

        for translation in &incoming.translations {
            if bucket.translations.contains(translation) {
                merged.metrics.duplicate_translations += 1;
            } else {
                bucket.translations.push(translation.clone());
            }
        }
        bucket.cards.extend(incoming.cards.iter().cloned());
        bucket.warnings.extend(incoming.warnings.iter().cloned());
    }

    merged.recount_coverage();
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{manifest::build_manifest, signature::signature};
    use model::{
        core::identifiers::BatchId,
        records::card::{CardContext, CardUnit},
    };

    fn item(sid: Sid, sig: &str, translation: Option<&str>) -> BatchResultItem {
        BatchResultItem {
            sid,
            sig: sig.to_string(),
            translation: translation.map(str::to_string),
            cards: None,
            warnings: None,
            processing_time: None,
        }
    }

    fn result(items: Vec<BatchResultItem>) -> BatchResult {
        BatchResult {
            schema_version: 1,
            batch_id: BatchId::new("b"),
            items,
            errors: Vec::new(),
            metadata: None,
        }
    }

    fn card(base: &str) -> Flashcard {
        Flashcard {
            base_form: base.to_string(),
            base_translation: None,
            unit: CardUnit::Word,
            forms: Vec::new(),
            contexts: vec![CardContext {
                lv: base.to_string(),
                translation: "x".to_string(),
                sid: None,
                sig: None,
            }],
            visible: true,
        }
    }

    #[test]
    fn counts_quality_signals() {
        let manifest = build_manifest("Labrīt. Labvakar.", 20).unwrap();
        let sig0 = signature("Labrīt.", 0);

        let aggregation = aggregate(
            &manifest,
            &result(vec![
                item(0, &sig0, Some("A")),
                item(0, &sig0, Some("A")),
                item(0, &sig0, Some("  ")),
                item(1, "WRONG", None),
            ]),
        );

        let m = aggregation.metrics;
        assert_eq!(m.total_sids, 2);
        assert_eq!(m.received_sids, 1);
        assert_eq!(m.missing_sids, 1);
        assert_eq!(m.duplicate_translations, 1);
        assert_eq!(m.empty_translations, 1);
        assert_eq!(m.invalid_sigs, 1);
        assert_eq!(m.schema_violations, 0);
        assert_eq!(aggregation.by_sid[&0].translations, vec!["A"]);
    }

    #[test]
    fn every_manifest_sid_gets_a_bucket() {
        let manifest = build_manifest("Viens. Divi. Trīs.", 20).unwrap();
        let aggregation = aggregate(&manifest, &result(Vec::new()));
        assert_eq!(aggregation.by_sid.len(), 3);
        assert!(aggregation.by_sid.values().all(|b| !b.has_content()));
        assert_eq!(aggregation.metrics.missing_sids, 3);
    }

    #[test]
    fn unknown_sid_is_a_schema_violation() {
        let manifest = build_manifest("Viens.", 20).unwrap();
        let aggregation = aggregate(&manifest, &result(vec![item(7, "x", Some("Семь."))]));
        assert_eq!(aggregation.metrics.schema_violations, 1);
        assert_eq!(aggregation.by_sid.len(), 1);
    }

    #[test]
    fn invalid_signature_still_aggregates() {
        let manifest = build_manifest("Viens.", 20).unwrap();
        let aggregation = aggregate(&manifest, &result(vec![item(0, "bad", Some("Один."))]));
        assert_eq!(aggregation.metrics.invalid_sigs, 1);
        assert_eq!(aggregation.metrics.received_sids, 1);
    }

    #[test]
    fn cards_are_traced_and_count_as_received() {
        let manifest = build_manifest("Viens. Divi.", 20).unwrap();
        let mut with_cards = item(1, "s1", None);
        with_cards.cards = Some(vec![card("divi")]);
        with_cards.warnings = Some(vec!["low confidence".into()]);

        let aggregation = aggregate(&manifest, &result(vec![with_cards]));
        let bucket = &aggregation.by_sid[&1];
        assert_eq!(bucket.cards[0].contexts[0].sid, Some(1));
        assert_eq!(bucket.cards[0].contexts[0].sig.as_deref(), Some("s1"));
        assert_eq!(bucket.warnings, vec!["low confidence"]);
        assert_eq!(aggregation.metrics.received_sids, 1);
    }

    #[test]
    fn merge_appends_without_mutating_inputs() {
        let manifest = build_manifest("Viens. Divi.", 20).unwrap();
        let first = aggregate(&manifest, &result(vec![item(0, "s", Some("Один."))]));
        let snapshot = first.clone();

        let output = SentenceRetryOutput {
            translation: Some("Два.".into()),
            cards: vec![card("divi")],
            warnings: Vec::new(),
        };
        let partial = retry_partial(&manifest, 1, &output);
        let merged = merge(&first, &partial);

        assert_eq!(first, snapshot);
        assert_eq!(merged.by_sid[&1].translations, vec!["Два."]);
        assert_eq!(
            merged.by_sid[&1].cards[0].contexts[0].sig.as_deref(),
            Some(manifest.items[1].sig.as_str())
        );
        assert_eq!(merged.metrics.received_sids, 2);
        assert_eq!(merged.metrics.missing_sids, 0);
    }

    #[test]
    fn merge_counts_duplicates_and_accumulates() {
        let manifest = build_manifest("Viens.", 20).unwrap();
        let first = aggregate(
            &manifest,
            &result(vec![item(0, "bad", Some("Один.")), item(0, "bad", Some(" "))]),
        );

        let partial = retry_partial(
            &manifest,
            0,
            &SentenceRetryOutput {
                translation: Some("Один.".into()),
                ..SentenceRetryOutput::default()
            },
        );
        let merged = merge(&first, &partial);

        assert_eq!(merged.by_sid[&0].translations.len(), 1);
        assert_eq!(merged.metrics.duplicate_translations, 1);
        assert_eq!(merged.metrics.empty_translations, 1);
        assert_eq!(merged.metrics.invalid_sigs, 2);
    }

    #[test]
    fn retry_partial_for_unknown_sid() {
        let manifest = build_manifest("Viens.", 20).unwrap();
        let partial = retry_partial(&manifest, 3, &SentenceRetryOutput::default());
        assert!(partial.by_sid.is_empty());
        assert_eq!(partial.metrics.schema_violations, 1);
    }
}
