use engine_core::{
    manifest::build_manifest, retry::RetryPolicy, schedule::{PollingSchedule, PollingStage},
};
use engine_runtime::RunOptions;
use model::{
    core::identifiers::{BatchId, Sid},
    execution::retry::SentenceRetryOutput,
    records::{
        card::{CardContext, CardUnit, Flashcard},
        manifest::Manifest,
        result::{BatchResult, BatchResultItem, SentenceError},
    },
};
use std::time::Duration;

/// Four sentences, two per chunk.
pub const SOURCE: &str = "Labdien. Kā jums iet? Viss kārtībā! Paldies.";

pub const TRANSLATIONS: [&str; 4] = ["Добрый день.", "Как у вас дела?", "Всё в порядке!", "Спасибо."];

pub fn manifest() -> Manifest {
    build_manifest(SOURCE, 2).unwrap()
}

/// A result item carrying the manifest's own signature for `sid`.
pub fn item(manifest: &Manifest, sid: Sid, translation: &str) -> BatchResultItem {
    BatchResultItem {
        sid,
        sig: manifest.items[sid].sig.clone(),
        translation: Some(translation.to_string()),
        cards: None,
        warnings: None,
        processing_time: None,
    }
}

pub fn full_items(manifest: &Manifest) -> Vec<BatchResultItem> {
    (0..manifest.len())
        .map(|sid| item(manifest, sid, TRANSLATIONS[sid]))
        .collect()
}

pub fn result(batch_id: &str, items: Vec<BatchResultItem>, errors: Vec<SentenceError>) -> BatchResult {
    BatchResult {
        schema_version: 1,
        batch_id: BatchId::new(batch_id),
        items,
        errors,
        metadata: None,
    }
}

pub fn sentence_error(sid: Sid, error: &str, code: Option<&str>) -> SentenceError {
    SentenceError {
        sid,
        error: error.to_string(),
        error_code: code.map(str::to_string),
    }
}

pub fn card(base_form: &str, lv: &str, translation: &str) -> Flashcard {
    Flashcard {
        base_form: base_form.to_string(),
        base_translation: None,
        unit: CardUnit::Word,
        forms: Vec::new(),
        contexts: vec![CardContext {
            lv: lv.to_string(),
            translation: translation.to_string(),
            sid: None,
            sig: None,
        }],
        visible: true,
    }
}

pub fn recovered(translation: &str) -> SentenceRetryOutput {
    SentenceRetryOutput {
        translation: Some(translation.to_string()),
        cards: Vec::new(),
        warnings: Vec::new(),
    }
}

/// Fixed one-second polling, unjittered one-second submit backoff.
pub fn options() -> RunOptions {
    RunOptions {
        schedule: PollingSchedule::new(vec![PollingStage::new(0, 1_000, 1_000)], true),
        submit_policy: RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(4)),
        ..RunOptions::default()
    }
}
