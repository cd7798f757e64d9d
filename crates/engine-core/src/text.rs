use crate::error::SegmentError;
use serde::{Deserialize, Serialize};
use std::fmt;

const TERMINALS: [char; 4] = ['.', '!', '?', '…'];

/// Abbreviations after which the abbreviation-aware engine never ends a sentence.
const ABBREVIATIONS: &[&str] = &[
    "piem.", "u.c.", "utt.", "t.i.", "t.s.", "u.tml.", "sk.", "sal.", "gs.", "g.", "nr.", "dr.",
    "mr.", "mrs.", "ms.", "prof.", "st.", "e.g.", "i.e.", "vs.",
];

/// Collapses every whitespace run (line breaks included) into a single space
/// and trims both ends. Signatures use this exact function too.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn is_terminal(ch: char) -> bool {
    TERMINALS.contains(&ch)
}

/// Splits already-normalized text into sentences.
pub trait Segmenter: Send + Sync {
    fn name(&self) -> &'static str;

    fn split(&self, normalized: &str) -> Vec<String>;
}

/// Ends a sentence at `.`, `!`, `?` or `…` followed by whitespace or end of input.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveSegmenter;

impl Segmenter for PrimitiveSegmenter {
    fn name(&self) -> &'static str {
        "primitive"
    }

    fn split(&self, normalized: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut current = String::new();
        let mut chars = normalized.chars().peekable();

        while let Some(ch) = chars.next() {
            current.push(ch);

            if is_terminal(ch) && chars.peek().is_none_or(|next| next.is_whitespace()) {
                let sentence = current.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                current.clear();

                while chars.peek().is_some_and(|next| next.is_whitespace()) {
                    chars.next();
                }
            }
        }

        let tail = current.trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }
        sentences
    }
}

/// Primitive splitting, then re-joins any break that follows a known
/// abbreviation, a single capital initial or a bare ordinal such as `2024.`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbbreviationAwareSegmenter;

impl AbbreviationAwareSegmenter {
    fn ends_with_abbreviation(sentence: &str) -> bool {
        let last = sentence.rsplit(' ').next().unwrap_or(sentence);
        if !last.ends_with('.') {
            return false;
        }

        let lower = last.to_lowercase();
        if ABBREVIATIONS.contains(&lower.as_str()) {
            return true;
        }

        let stem = &last[..last.len() - 1];
        let mut stem_chars = stem.chars();
        let single_initial = matches!(
            (stem_chars.next(), stem_chars.next()),
            (Some(c), None) if c.is_uppercase()
        );
        let ordinal = !stem.is_empty() && stem.chars().all(|c| c.is_ascii_digit());

        single_initial || ordinal
    }
}

impl Segmenter for AbbreviationAwareSegmenter {
    fn name(&self) -> &'static str {
        "abbreviation_aware"
    }

    fn split(&self, normalized: &str) -> Vec<String> {
        let mut merged: Vec<String> = Vec::new();
        for sentence in PrimitiveSegmenter.split(normalized) {
            match merged.last_mut() {
                Some(prev) if Self::ends_with_abbreviation(prev) => {
                    prev.push(' ');
                    prev.push_str(&sentence);
                }
                _ => merged.push(sentence),
            }
        }
        merged
    }
}

/// Built-in segmentation engines selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmenterEngine {
    #[default]
    Primitive,
    AbbreviationAware,
}

impl SegmenterEngine {
    pub fn segmenter(&self) -> &'static dyn Segmenter {
        match self {
            SegmenterEngine::Primitive => &PrimitiveSegmenter,
            SegmenterEngine::AbbreviationAware => &AbbreviationAwareSegmenter,
        }
    }
}

impl fmt::Display for SegmenterEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segmenter().name())
    }
}

/// Segments `text` with the given engine and checks the round-trip invariant.
pub fn segment(text: &str, engine: SegmenterEngine) -> Result<Vec<String>, SegmentError> {
    segment_with(engine.segmenter(), text)
}

/// Segments with any engine; the round-trip check applies regardless.
pub fn segment_with(segmenter: &dyn Segmenter, text: &str) -> Result<Vec<String>, SegmentError> {
    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return Ok(Vec::new());
    }

    let sentences = segmenter.split(&normalized);
    validate_round_trip(text, &sentences)?;
    Ok(sentences)
}

/// Rejoining the sentences with single spaces must reproduce the normalized original.
pub fn validate_round_trip(original: &str, sentences: &[String]) -> Result<(), SegmentError> {
    let original = normalize_text(original);
    let rejoined = normalize_text(&sentences.join(" "));
    if original != rejoined {
        return Err(SegmentError::RoundTrip { original, rejoined });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn split(text: &str) -> Vec<String> {
        segment(text, SegmenterEngine::Primitive).unwrap()
    }

    #[test]
    fn normalizes_line_endings_and_runs() {
        assert_eq!(normalize_text("  a\r\nb\rc\n\n  d\t e  "), "a b c d e");
        assert_eq!(normalize_text(" \n\t "), "");
    }

    #[test]
    fn splits_on_terminal_followed_by_space() {
        assert_eq!(
            split("Labdien! Kā jums iet? Labi. Paldies…"),
            vec!["Labdien!", "Kā jums iet?", "Labi.", "Paldies…"]
        );
    }

    #[test]
    fn keeps_inner_punctuation_without_space() {
        assert_eq!(
            split("Cena ir 3.50 eiro.Tiešām? Jā."),
            vec!["Cena ir 3.50 eiro.Tiešām?", "Jā."]
        );
    }

    #[test]
    fn keeps_unterminated_tail() {
        assert_eq!(split("Pirmais. Otrais bez punkta"), vec!["Pirmais.", "Otrais bez punkta"]);
    }

    #[test]
    fn runs_of_terminals_stay_together() {
        assert_eq!(split("Ko?! Nē... Jā."), vec!["Ko?!", "Nē...", "Jā."]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(split("   \n ").is_empty());
    }

    #[test]
    fn abbreviation_aware_merges_known_breaks() {
        let text = "Piem. šis ir viens teikums. Dzimis 1990. gadā. J. Bērziņš ieradās.";
        assert_eq!(
            segment(text, SegmenterEngine::AbbreviationAware).unwrap(),
            vec![
                "Piem. šis ir viens teikums.",
                "Dzimis 1990. gadā.",
                "J. Bērziņš ieradās."
            ]
        );
        assert_eq!(split(text).len(), 6);
    }

    #[test]
    fn round_trip_violation_is_reported() {
        let err = validate_round_trip("A. B.", &["A.".to_string()]).unwrap_err();
        assert!(matches!(err, SegmentError::RoundTrip { .. }));
    }

    struct DroppingSegmenter;

    impl Segmenter for DroppingSegmenter {
        fn name(&self) -> &'static str {
            "dropping"
        }

        fn split(&self, normalized: &str) -> Vec<String> {
            normalized.split(' ').skip(1).map(str::to_string).collect()
        }
    }

    #[test]
    fn custom_engines_are_checked_too() {
        assert!(segment_with(&DroppingSegmenter, "one two three").is_err());
    }

    proptest! {
        #[test]
        fn primitive_round_trips(text in "[a-zA-Zāē .!?…\n\r\t]{0,120}") {
            let sentences = PrimitiveSegmenter.split(&normalize_text(&text));
            prop_assert!(validate_round_trip(&text, &sentences).is_ok());
            prop_assert!(sentences.iter().all(|s| !s.trim().is_empty()));
        }

        #[test]
        fn abbreviation_aware_round_trips(text in "[A-Za-z0-9 .!?\n]{0,120}") {
            let sentences = AbbreviationAwareSegmenter.split(&normalize_text(&text));
            prop_assert!(validate_round_trip(&text, &sentences).is_ok());
        }

        #[test]
        fn segmentation_is_deterministic(text in "\\PC{0,80}") {
            prop_assert_eq!(
                segment(&text, SegmenterEngine::Primitive),
                segment(&text, SegmenterEngine::Primitive)
            );
        }
    }
}
