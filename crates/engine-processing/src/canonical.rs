use crate::aggregate::AggregatedBySid;
use engine_core::text::{is_terminal, normalize_text};
use model::records::{card::Flashcard, manifest::Manifest};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationStats {
    pub total_sids: usize,
    pub sids_with_translation: usize,
    pub sids_with_cards: usize,
    pub total_cards: usize,
    pub total_warnings: usize,
}

/// Case-insensitive key with trailing sentence punctuation removed.
fn variant_key(variant: &str) -> String {
    normalize_text(variant)
        .to_lowercase()
        .trim_end_matches(is_terminal)
        .to_string()
}

fn ensure_terminal(text: &str) -> String {
    if text.chars().last().is_some_and(is_terminal) {
        text.to_string()
    } else {
        format!("{text}.")
    }
}

struct KeyTally<'a> {
    key: String,
    count: usize,
    longest: &'a str,
}

/// Picks one translation among variants: the most frequent key wins, a tie
/// goes to the longer original. The result always ends with terminal
/// punctuation. A lone variant is kept as-is, even punctuation only.
/// `None` when no usable variant exists.
pub fn pick_canonical_translation(variants: &[String]) -> Option<String> {
    if let [only] = variants {
        let trimmed = only.trim();
        return (!trimmed.is_empty()).then(|| ensure_terminal(trimmed));
    }

    let mut tallies: Vec<KeyTally<'_>> = Vec::new();

    for variant in variants {
        let trimmed = variant.trim();
        let key = variant_key(trimmed);
        if key.is_empty() {
            continue;
        }

        match tallies.iter_mut().find(|t| t.key == key) {
            Some(tally) => {
                tally.count += 1;
                if trimmed.chars().count() > tally.longest.chars().count() {
                    tally.longest = trimmed;
                }
            }
            None => tallies.push(KeyTally {
                key,
                count: 1,
                longest: trimmed,
            }),
        }
    }

    let mut best: Option<&KeyTally<'_>> = None;
    for tally in &tallies {
        let better = match best {
            None => true,
            Some(current) => {
                tally.count > current.count
                    || (tally.count == current.count
                        && tally.longest.chars().count() > current.longest.chars().count())
            }
        };
        if better {
            best = Some(tally);
        }
    }

    best.map(|tally| ensure_terminal(tally.longest))
}

/// Translated text in manifest order. SIDs without a translation are skipped.
pub fn build_translated_text(
    manifest: &Manifest,
    aggregated: &AggregatedBySid,
    use_newlines: bool,
) -> String {
    let sep = if use_newlines { "\n" } else { " " };
    manifest
        .items
        .iter()
        .filter_map(|item| aggregated.get(&item.sid))
        .filter_map(|bucket| pick_canonical_translation(&bucket.translations))
        .collect::<Vec<_>>()
        .join(sep)
}

/// Every card from every bucket; order carries no meaning.
pub fn extract_cards(aggregated: &AggregatedBySid) -> Vec<Flashcard> {
    aggregated
        .values()
        .flat_map(|bucket| bucket.cards.iter().cloned())
        .collect()
}

pub fn aggregation_stats(aggregated: &AggregatedBySid) -> AggregationStats {
    aggregated
        .values()
        .fold(
            AggregationStats {
                total_sids: aggregated.len(),
                ..AggregationStats::default()
            },
            |mut stats, bucket| {
                if !bucket.translations.is_empty() {
                    stats.sids_with_translation += 1;
                }
                if !bucket.cards.is_empty() {
                    stats.sids_with_cards += 1;
                }
                stats.total_cards += bucket.cards.len();
                stats.total_warnings += bucket.warnings.len();
                stats
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::SidBucket;
    use engine_core::manifest::build_manifest;

    fn variants(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn most_frequent_key_wins() {
        let picked = pick_canonical_translation(&variants(&[
            "Это дом.",
            "это дом",
            "Вот дом, который построил Джек.",
        ]));
        assert_eq!(picked.as_deref(), Some("Это дом."));
    }

    #[test]
    fn tie_goes_to_longer_variant() {
        let picked = pick_canonical_translation(&variants(&["Дом.", "Большой дом."]));
        assert_eq!(picked.as_deref(), Some("Большой дом."));
    }

    #[test]
    fn longest_spelling_represents_its_key() {
        let picked = pick_canonical_translation(&variants(&["Привет", "привет!!!"]));
        assert_eq!(picked.as_deref(), Some("привет!!!"));
    }

    #[test]
    fn appends_missing_terminal() {
        assert_eq!(
            pick_canonical_translation(&variants(&["Без точки"])).as_deref(),
            Some("Без точки.")
        );
        assert_eq!(
            pick_canonical_translation(&variants(&["Ну…"])).as_deref(),
            Some("Ну…")
        );
    }

    #[test]
    fn empty_or_punctuation_only_yields_none() {
        assert_eq!(pick_canonical_translation(&[]), None);
        assert_eq!(pick_canonical_translation(&variants(&["  "])), None);
        assert_eq!(pick_canonical_translation(&variants(&["  ", "..."])), None);
    }

    #[test]
    fn lone_punctuation_variant_is_kept() {
        assert_eq!(
            pick_canonical_translation(&variants(&["..."])).as_deref(),
            Some("...")
        );
        assert_eq!(
            pick_canonical_translation(&variants(&[" ?! "])).as_deref(),
            Some("?!")
        );
    }

    #[test]
    fn text_follows_manifest_order() {
        let manifest = build_manifest("First. Second. Third.", 20).unwrap();
        let mut aggregated = AggregatedBySid::new();
        for (sid, text) in [(2, "Третий."), (0, "Первый."), (1, "Второй.")] {
            aggregated.insert(
                sid,
                SidBucket {
                    translations: vec![text.to_string()],
                    ..SidBucket::default()
                },
            );
        }

        assert_eq!(
            build_translated_text(&manifest, &aggregated, true),
            "Первый.\nВторой.\nТретий."
        );
        assert_eq!(
            build_translated_text(&manifest, &aggregated, false),
            "Первый. Второй. Третий."
        );
    }

    #[test]
    fn missing_translations_are_skipped() {
        let manifest = build_manifest("A. B. C.", 20).unwrap();
        let mut aggregated = AggregatedBySid::new();
        aggregated.insert(0, SidBucket::default());
        aggregated.insert(
            2,
            SidBucket {
                translations: vec!["В".into()],
                ..SidBucket::default()
            },
        );
        assert_eq!(build_translated_text(&manifest, &aggregated, true), "В.");
    }

    #[test]
    fn stats_and_cards() {
        let mut aggregated = AggregatedBySid::new();
        aggregated.insert(
            0,
            SidBucket {
                translations: vec!["A.".into()],
                cards: Vec::new(),
                warnings: vec!["w1".into(), "w2".into()],
            },
        );
        aggregated.insert(1, SidBucket::default());

        let stats = aggregation_stats(&aggregated);
        assert_eq!(stats.total_sids, 2);
        assert_eq!(stats.sids_with_translation, 1);
        assert_eq!(stats.sids_with_cards, 0);
        assert_eq!(stats.total_warnings, 2);
        assert!(extract_cards(&aggregated).is_empty());
    }
}
