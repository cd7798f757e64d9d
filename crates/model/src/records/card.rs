use crate::core::identifiers::Sid;
use serde::{Deserialize, Serialize};

/// Vocabulary card produced by the annotation backend for one sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub base_form: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_translation: Option<String>,
    #[serde(default)]
    pub unit: CardUnit,
    #[serde(default)]
    pub forms: Vec<CardForm>,
    #[serde(default)]
    pub contexts: Vec<CardContext>,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardUnit {
    #[default]
    Word,
    Phrase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardForm {
    pub form: String,
    pub translation: String,
    /// Grammatical tag, free-form.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Usage context of a card. `sid`/`sig` trace it back to its source sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardContext {
    pub lv: String,
    #[serde(rename = "ru")]
    pub translation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<Sid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
}

fn default_visible() -> bool {
    true
}

impl Flashcard {
    /// Returns a copy whose every context points at `sid`/`sig`.
    pub fn traced_to(&self, sid: Sid, sig: &str) -> Self {
        let mut card = self.clone();
        for ctx in &mut card.contexts {
            ctx.sid = Some(sid);
            ctx.sig = Some(sig.to_string());
        }
        card
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_defaults_for_sparse_cards() {
        let card: Flashcard = serde_json::from_str(r#"{"base_form":"māja"}"#).unwrap();
        assert_eq!(card.unit, CardUnit::Word);
        assert!(card.visible);
        assert!(card.forms.is_empty());
        assert!(card.contexts.is_empty());
    }

    #[test]
    fn traced_to_rewrites_every_context() {
        let card: Flashcard = serde_json::from_str(
            r#"{"base_form":"iet","contexts":[{"lv":"Es eju.","ru":"Я иду."},{"lv":"Viņš iet.","ru":"Он идёт.","sid":9}]}"#,
        )
        .unwrap();

        let traced = card.traced_to(2, "c2ln");
        assert!(traced.contexts.iter().all(|c| c.sid == Some(2)));
        assert!(traced.contexts.iter().all(|c| c.sig.as_deref() == Some("c2ln")));
        assert_eq!(card.contexts[1].sid, Some(9), "original is untouched");
    }
}
