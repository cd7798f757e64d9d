use crate::{error::SettingsError, settings::Settings};
use tracing::warn;

/// Fail-fast checks run once after loading; the first violation wins.
pub struct SettingsValidator<'a> {
    settings: &'a Settings,
}

impl<'a> SettingsValidator<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.validate_network()?;
        self.validate_polling()?;
        self.validate_chunking()?;
        self.validate_submit()?;
        Ok(())
    }

    fn validate_network(&self) -> Result<(), SettingsError> {
        let network = &self.settings.network;
        let url = network.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SettingsError::invalid(
                "network.api_base_url",
                format!("expected an http(s) URL, got '{url}'"),
            ));
        }
        if network.request_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "network.request_timeout_ms",
                "must be greater than 0",
            ));
        }
        if network.health_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "network.health_timeout_ms",
                "must be greater than 0",
            ));
        }
        if network.max_tokens == 0 {
            return Err(SettingsError::invalid(
                "network.max_tokens",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    fn validate_polling(&self) -> Result<(), SettingsError> {
        let polling = &self.settings.batch.polling;
        if polling.stages.is_empty() {
            return Err(SettingsError::invalid(
                "batch.polling.stages",
                "at least one stage is required",
            ));
        }

        for (idx, stage) in polling.stages.iter().enumerate() {
            if stage.min_ms == 0 || stage.min_ms > stage.max_ms {
                return Err(SettingsError::invalid(
                    format!("batch.polling.stages[{idx}]"),
                    format!(
                        "requires 0 < min_ms <= max_ms, got {}..{}",
                        stage.min_ms, stage.max_ms
                    ),
                ));
            }
            if idx > 0 && stage.from_sec <= polling.stages[idx - 1].from_sec {
                return Err(SettingsError::invalid(
                    format!("batch.polling.stages[{idx}].from_sec"),
                    "stages must be in ascending from_sec order",
                ));
            }
        }

        if polling.max_duration_secs == 0 {
            return Err(SettingsError::invalid(
                "batch.polling.max_duration_secs",
                "must be greater than 0",
            ));
        }
        if polling.max_attempts == 0 {
            return Err(SettingsError::invalid(
                "batch.polling.max_attempts",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    fn validate_chunking(&self) -> Result<(), SettingsError> {
        let size = self.settings.batch.chunking.max_sentences_per_chunk;
        if size == 0 {
            return Err(SettingsError::invalid(
                "batch.chunking.max_sentences_per_chunk",
                "must be greater than 0",
            ));
        }
        if size > 1_000 {
            warn!(size, "Very large chunks may exceed backend request limits");
        }
        Ok(())
    }

    fn validate_submit(&self) -> Result<(), SettingsError> {
        let submit = &self.settings.batch.submit;
        if submit.max_attempts == 0 {
            return Err(SettingsError::invalid(
                "batch.submit.max_attempts",
                "must be greater than 0",
            ));
        }
        if submit.base_delay_ms > submit.max_delay_ms {
            return Err(SettingsError::invalid(
                "batch.submit.base_delay_ms",
                "must not exceed max_delay_ms",
            ));
        }
        Ok(())
    }
}
