//! Adaptive poll delays.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lower bound for any delay the schedule hands out.
pub const MIN_POLL_DELAY: Duration = Duration::from_millis(100);

/// A delay band that applies once `from_sec` seconds have elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingStage {
    pub from_sec: u64,
    pub min_ms: u64,
    pub max_ms: u64,
}

impl PollingStage {
    pub const fn new(from_sec: u64, min_ms: u64, max_ms: u64) -> Self {
        Self {
            from_sec,
            min_ms,
            max_ms,
        }
    }
}

pub fn default_stages() -> Vec<PollingStage> {
    vec![
        PollingStage::new(0, 1_000, 2_000),
        PollingStage::new(10, 2_000, 5_000),
        PollingStage::new(60, 5_000, 15_000),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingSchedule {
    stages: Vec<PollingStage>,
    respect_retry_after: bool,
}

impl Default for PollingSchedule {
    fn default() -> Self {
        Self::new(default_stages(), true)
    }
}

impl PollingSchedule {
    /// Stages are sorted by `from_sec`; an empty list falls back to the defaults.
    pub fn new(mut stages: Vec<PollingStage>, respect_retry_after: bool) -> Self {
        if stages.is_empty() {
            stages = default_stages();
        }
        stages.sort_by_key(|stage| stage.from_sec);
        Self {
            stages,
            respect_retry_after,
        }
    }

    pub fn stages(&self) -> &[PollingStage] {
        &self.stages
    }

    pub fn respects_retry_after(&self) -> bool {
        self.respect_retry_after
    }

    /// The last stage whose start is not after `elapsed`. Before the first
    /// stage starts, the first stage applies.
    pub fn stage_for(&self, elapsed: Duration) -> PollingStage {
        let secs = elapsed.as_secs_f64();
        self.stages
            .iter()
            .rev()
            .find(|stage| stage.from_sec as f64 <= secs)
            .or_else(|| self.stages.first())
            .copied()
            .unwrap_or(PollingStage::new(0, 1_000, 2_000))
    }

    /// Uniform pick within the active stage's band, floored at [`MIN_POLL_DELAY`].
    pub fn delay_for<R: Rng + ?Sized>(&self, elapsed: Duration, rng: &mut R) -> Duration {
        let stage = self.stage_for(elapsed);
        let (low, high) = if stage.min_ms <= stage.max_ms {
            (stage.min_ms, stage.max_ms)
        } else {
            (stage.max_ms, stage.min_ms)
        };
        let ms = if low == high {
            low
        } else {
            rng.gen_range(low..=high)
        };
        Duration::from_millis(ms).max(MIN_POLL_DELAY)
    }

    pub fn next_delay(&self, elapsed: Duration) -> Duration {
        self.delay_for(elapsed, &mut rand::thread_rng())
    }

    /// A server-provided Retry-After replaces the adaptive delay when enabled.
    pub fn resolve(&self, elapsed: Duration, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) if self.respect_retry_after => hint.max(MIN_POLL_DELAY),
            _ => self.next_delay(elapsed),
        }
    }
}
