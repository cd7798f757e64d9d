use crate::records::card::Flashcard;
use serde::{Deserialize, Serialize};

/// Content recovered by a second-pass attempt for a single sentence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentenceRetryOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(default)]
    pub cards: Vec<Flashcard>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl SentenceRetryOutput {
    /// Builds an output from emitted cards, taking the translation from the
    /// first context of the first card when present.
    pub fn from_cards(cards: Vec<Flashcard>) -> Self {
        let translation = cards
            .first()
            .and_then(|card| card.contexts.first())
            .map(|ctx| ctx.translation.trim().to_string())
            .filter(|t| !t.is_empty());
        Self {
            translation,
            cards,
            warnings: Vec::new(),
        }
    }
}
