use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds a value the pipeline cannot run with.
    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

impl SettingsError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SettingsError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
