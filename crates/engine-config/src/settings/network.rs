use connectors::http::HttpClientConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub api_base_url: String,
    /// Prefix for batch routes, e.g. `/api/llm` gives `/api/llm/batch`.
    pub route_base: String,
    pub request_timeout_ms: u64,
    pub health_timeout_ms: u64,
    /// Initial `max_tokens` for single-sentence retries; bumped on truncation.
    pub max_tokens: u32,
    /// Sent as `X-LLM-Model` on submission when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:3001".to_string(),
            route_base: "/api/llm".to_string(),
            request_timeout_ms: 30_000,
            health_timeout_ms: 5_000,
            max_tokens: 1_024,
            model: None,
        }
    }
}

impl NetworkSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            base_url: self.api_base_url.clone(),
            route_base: self.route_base.clone(),
            request_timeout: self.request_timeout(),
            health_timeout: self.health_timeout(),
            max_tokens: self.max_tokens,
            model: self.model.clone(),
        }
    }
}
