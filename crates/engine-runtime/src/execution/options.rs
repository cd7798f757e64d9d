use engine_config::Settings;
use engine_core::{retry::RetryPolicy, schedule::PollingSchedule};
use std::time::Duration;

/// Runtime knobs for one driver, resolved from [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub schedule: PollingSchedule,
    pub max_poll_duration: Duration,
    pub max_poll_attempts: u32,
    pub submit_policy: RetryPolicy,
    /// Per-attempt deadline for submit, poll and retry requests.
    pub request_timeout: Duration,
    pub health_timeout: Duration,
    pub use_newlines: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl RunOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        let polling = &settings.batch.polling;
        Self {
            schedule: polling.schedule(),
            max_poll_duration: polling.max_duration(),
            max_poll_attempts: polling.max_attempts,
            submit_policy: settings.batch.submit.retry_policy(),
            request_timeout: settings.network.request_timeout(),
            health_timeout: settings.network.health_timeout(),
            use_newlines: settings.output.use_newlines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_from_settings() {
        let mut settings = Settings::default();
        settings.batch.polling.max_attempts = 5;
        settings.output.use_newlines = false;

        let options = RunOptions::from_settings(&settings);
        assert_eq!(options.max_poll_attempts, 5);
        assert_eq!(options.max_poll_duration, Duration::from_secs(600));
        assert_eq!(options.submit_policy.max_attempts, 3);
        assert_eq!(options.health_timeout, Duration::from_secs(5));
        assert!(!options.use_newlines);
    }
}
