use engine_core::{
    manifest::DEFAULT_MAX_SENTENCES_PER_CHUNK,
    retry::RetryPolicy,
    schedule::{PollingSchedule, PollingStage, default_stages},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub polling: PollingSettings,
    pub chunking: ChunkingSettings,
    pub submit: SubmitSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub stages: Vec<PollingStage>,
    pub respect_retry_after: bool,
    /// Upper bound on the whole poll loop.
    pub max_duration_secs: u64,
    pub max_attempts: u32,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            stages: default_stages(),
            respect_retry_after: true,
            max_duration_secs: 600,
            max_attempts: 10_000,
        }
    }
}

impl PollingSettings {
    pub fn schedule(&self) -> PollingSchedule {
        PollingSchedule::new(self.stages.clone(), self.respect_retry_after)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub max_sentences_per_chunk: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_sentences_per_chunk: DEFAULT_MAX_SENTENCES_PER_CHUNK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitSettings {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for SubmitSettings {
    fn default() -> Self {
        let policy = RetryPolicy::for_submission();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            jitter: policy.jitter,
        }
    }
}

impl SubmitSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
        .with_jitter(self.jitter)
    }
}
