//! `emit_flashcards` tool definition and tool-use response decoding.

use crate::error::TransportError;
use model::records::card::Flashcard;
use serde::Deserialize;
use serde_json::{Value, json};
use std::future::Future;
use tracing::debug;

pub const EMITTER_TOOL_NAME: &str = "emit_flashcards";

const EMITTER_DESCRIPTION: &str = "Returns strictly structured JSON with a set of vocabulary \
flashcards for learning Latvian. Every card holds the base form of a word or phrase, its \
translations, grammatical forms and usage contexts. All fields must follow the schema; no text \
outside the defined fields.";

/// Tool definition in the Messages API shape (`name`, `description`,
/// `input_schema`). Pure: every call serializes to the same bytes.
pub fn build_emit_flashcards_tool() -> Value {
    json!({
        "name": EMITTER_TOOL_NAME,
        "description": EMITTER_DESCRIPTION,
        "input_schema": emit_flashcards_input_schema(),
    })
}

fn emit_flashcards_input_schema() -> Value {
    let form = json!({
        "type": "object",
        "properties": {
            "form": { "type": "string" },
            "translation": { "type": "string" },
            "type": { "type": "string" },
        },
        "required": ["form", "translation", "type"],
    });

    let context = json!({
        "type": "object",
        "properties": {
            "lv": { "type": "string" },
            "ru": { "type": "string" },
        },
        "required": ["lv", "ru"],
    });

    let card = json!({
        "type": "object",
        "properties": {
            "base_form": { "type": "string" },
            "base_translation": { "type": "string" },
            "unit": { "type": "string", "enum": ["word", "phrase"], "default": "word" },
            "forms": { "type": "array", "items": form, "default": [] },
            "contexts": { "type": "array", "items": context, "default": [] },
            "visible": { "type": "boolean", "default": true },
        },
        "required": ["base_form"],
    });

    json!({
        "type": "object",
        "properties": {
            "flashcards": { "type": "array", "items": card, "minItems": 1 },
        },
        "required": ["flashcards"],
    })
}

/// Request body for a single-sentence call forcing the emitter tool.
pub fn single_sentence_request(text: &str, max_tokens: u32) -> Value {
    json!({
        "text": text,
        "tools": [build_emit_flashcards_tool()],
        "tool_choice": { "type": "tool", "name": EMITTER_TOOL_NAME },
        "max_tokens": max_tokens,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxTokens,
    ToolUse,
    EndTurn,
    Unknown,
}

impl StopReason {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("max_tokens") => StopReason::MaxTokens,
            Some("tool_use") => StopReason::ToolUse,
            Some("end_turn") => StopReason::EndTurn,
            _ => StopReason::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::MaxTokens => "max_tokens",
            StopReason::ToolUse => "tool_use",
            StopReason::EndTurn => "end_turn",
            StopReason::Unknown => "unknown",
        }
    }
}

/// What a tool-use response amounted to.
#[derive(Debug)]
pub enum ToolUseOutcome {
    Emitted(Vec<Flashcard>),
    /// No usable `emit_flashcards` block; the model stopped for this reason.
    Stopped(StopReason),
}

/// How `max_tokens` grows when a tool-use response is cut off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxTokensBump {
    pub initial: u32,
    /// Total calls, the first one included.
    pub attempts: usize,
    pub multiplier: f64,
    pub cap: u32,
}

impl MaxTokensBump {
    /// Two calls, doubling once, never above four times `max_tokens`.
    pub fn for_budget(max_tokens: u32) -> Self {
        let initial = max_tokens.max(1);
        Self {
            initial,
            attempts: 2,
            multiplier: 2.0,
            cap: initial.saturating_mul(4),
        }
    }

    pub fn next(&self, current: u32) -> u32 {
        let multiplier = if self.multiplier > 1.0 { self.multiplier } else { 2.0 };
        let grown = (f64::from(current) * multiplier).ceil() as u32;
        grown.min(self.cap.max(1))
    }
}

/// Calls `invoke` with a growing `max_tokens` for as long as the response
/// stops on `max_tokens`, up to `bump.attempts` calls.
pub async fn invoke_with_max_tokens_bump<F, Fut>(
    bump: &MaxTokensBump,
    mut invoke: F,
) -> Result<Vec<Flashcard>, TransportError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<ToolUseOutcome, TransportError>>,
{
    let attempts = bump.attempts.max(1);
    let mut max_tokens = bump.initial.max(1);
    let mut attempt = 1;

    loop {
        match invoke(max_tokens).await? {
            ToolUseOutcome::Emitted(cards) => return Ok(cards),
            ToolUseOutcome::Stopped(StopReason::MaxTokens) if attempt < attempts => {
                let next = bump.next(max_tokens);
                debug!(attempt, from = max_tokens, to = next, "Tool use truncated, raising max_tokens");
                max_tokens = next;
                attempt += 1;
            }
            ToolUseOutcome::Stopped(StopReason::MaxTokens) => {
                return Err(TransportError::schema_invalid(format!(
                    "tool use truncated at max_tokens={max_tokens} after {attempts} attempts"
                )));
            }
            ToolUseOutcome::Stopped(reason) => {
                return Err(TransportError::schema_invalid(format!(
                    "no emit_flashcards tool_use block (stop_reason: {})",
                    reason.as_str()
                )));
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct EmitFlashcardsInput {
    flashcards: Vec<Flashcard>,
}

/// Pulls the `emit_flashcards` input out of a tool-use response. A response
/// cut off at `max_tokens` is reported as stopped even if it carries a
/// partial block. At least one card is required.
pub fn decode_tool_use(body: &str) -> Result<ToolUseOutcome, TransportError> {
    let response: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| TransportError::schema_invalid(format!("invalid tool-use response: {e}")))?;

    let stop_reason = StopReason::parse(response.stop_reason.as_deref());
    if stop_reason == StopReason::MaxTokens {
        return Ok(ToolUseOutcome::Stopped(stop_reason));
    }

    let Some(input) = response
        .content
        .into_iter()
        .find(|block| block.kind == "tool_use" && block.name.as_deref() == Some(EMITTER_TOOL_NAME))
        .and_then(|block| block.input)
    else {
        return Ok(ToolUseOutcome::Stopped(stop_reason));
    };

    let parsed: EmitFlashcardsInput = serde_json::from_value(input)
        .map_err(|e| TransportError::schema_invalid(format!("invalid emit_flashcards input: {e}")))?;

    if parsed.flashcards.is_empty() {
        return Err(TransportError::schema_invalid("emit_flashcards returned no cards"));
    }
    Ok(ToolUseOutcome::Emitted(parsed.flashcards))
}
