use crate::error::SettingsError;
use batch::BatchSettings;
use engine_core::text::SegmenterEngine;
use network::NetworkSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use validator::SettingsValidator;

pub mod batch;
pub mod network;
pub mod validator;

pub const ENV_API_BASE_URL: &str = "LEXBATCH_API_BASE_URL";
pub const ENV_MODEL: &str = "LEXBATCH_MODEL";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationSettings {
    pub engine: SegmenterEngine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Join reconstructed text with newlines instead of spaces.
    pub use_newlines: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self { use_newlines: true }
    }
}

/// Everything the pipeline can be tuned with. Every field has a default, so
/// an empty JSON object is a complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub network: NetworkSettings,
    pub batch: BatchSettings,
    pub segmentation: SegmentationSettings,
    pub output: OutputSettings,
}

impl Settings {
    pub fn from_json_str(raw: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json_str(&raw)?;
        info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Loads `path` when given, otherwise validated defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let settings = Self::default();
                settings.validate()?;
                Ok(settings)
            }
        }
    }

    /// Applies `LEXBATCH_*` overrides from the given variables and re-validates.
    pub fn with_env_overrides<I, K, V>(mut self, vars: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            match key.as_ref() {
                ENV_API_BASE_URL => self.network.api_base_url = value.into(),
                ENV_MODEL => self.network.model = Some(value.into()),
                _ => {}
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        SettingsValidator::new(self).validate()
    }
}
