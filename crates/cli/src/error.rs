use connectors::error::TransportError;
use engine_config::SettingsError;
use engine_core::error::{ManifestError, SegmentError};
use engine_runtime::RunError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to segment the input: {0}")]
    Segment(#[from] SegmentError),

    #[error("Failed to build the manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Batch run failed: {0}")]
    Run(#[from] RunError),

    /// A direct backend call (health, status, cancel) failed.
    #[error("Backend request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(serde_json::Error),

    #[error("Backend reports itself unhealthy")]
    Unhealthy,
}

impl CliError {
    /// Localizable banner key; transport failures are keyed by their kind.
    pub fn message_key(&self) -> &'static str {
        match self {
            CliError::Run(err) => err.message_key(),
            CliError::Transport(err) => err.kind.message_key(),
            CliError::Unhealthy => "errors.proxy_down",
            CliError::Settings(_) => "errors.config",
            CliError::Segment(_) | CliError::Manifest(_) => "errors.invalid_input",
            CliError::Io(_) | CliError::JsonSerialize(_) => "errors.unknown",
        }
    }

    pub fn banner(&self) -> String {
        format!("[{}] {self}", self.message_key())
    }
}
