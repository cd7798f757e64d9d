use crate::{
    adapter::{BatchStatus, BatchTransport, Health, SubmitReceipt},
    error::{TransportError, TransportErrorKind},
    http::{
        headers::{MODEL_HEADER, RETRY_AFTER, parse_retry_after},
        response,
    },
    tool::{self, MaxTokensBump},
};
use async_trait::async_trait;
use chrono::Utc;
use model::{
    core::identifiers::{BatchId, Sid},
    execution::retry::SentenceRetryOutput,
    records::{manifest::Manifest, result::BatchResult},
};
use reqwest::{Client, RequestBuilder, Url};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Lower bound applied to every per-request timeout.
const MIN_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientConfig {
    pub base_url: String,
    pub route_base: String,
    pub request_timeout: Duration,
    pub health_timeout: Duration,
    /// Starting `max_tokens` for single-sentence calls.
    pub max_tokens: u32,
    pub model: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3001".to_string(),
            route_base: "/api/llm".to_string(),
            request_timeout: Duration::from_secs(30),
            health_timeout: Duration::from_secs(5),
            max_tokens: 1_024,
            model: None,
        }
    }
}

/// [`BatchTransport`] over the batch proxy's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBatchClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpBatchClient {
    pub fn new(mut config: HttpClientConfig) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        config.route_base = format!("/{}", config.route_base.trim_matches('/'));
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// `{base_url}{route_base}/{segments...}`, each segment percent-encoded.
    pub fn route_url(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let prefix = format!("{}{}", self.config.base_url, self.config.route_base);
        join_segments(&prefix, segments)
    }

    pub fn health_url(&self) -> Result<Url, TransportError> {
        join_segments(&self.config.base_url, &["health"])
    }

    async fn send(
        &self,
        request: RequestBuilder,
        timeout: Duration,
    ) -> Result<(u16, Option<Duration>, String), TransportError> {
        let timeout = timeout.max(MIN_TIMEOUT);
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, Utc::now()));
        // A body that cannot be read is treated as empty.
        let body = response.text().await.unwrap_or_default();

        debug!(status, bytes = body.len(), "HTTP response");
        Ok((status, retry_after, body))
    }
}

fn join_segments(prefix: &str, segments: &[&str]) -> Result<Url, TransportError> {
    let mut url = Url::parse(prefix).map_err(|e| {
        TransportError::new(TransportErrorKind::Unknown, format!("invalid URL {prefix}: {e}"))
    })?;
    url.path_segments_mut()
        .map_err(|_| {
            TransportError::new(
                TransportErrorKind::Unknown,
                format!("URL cannot be a base: {prefix}"),
            )
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::timeout(format!("Request timeout after {}ms", timeout.as_millis()))
    } else if err.is_connect() || err.is_request() {
        TransportError::network(format!("Network error: {err}"))
    } else {
        TransportError::new(TransportErrorKind::Unknown, err.to_string())
    }
}

#[async_trait]
impl BatchTransport for HttpBatchClient {
    async fn health(&self) -> Result<Health, TransportError> {
        let url = self.health_url()?;
        let (status, _, body) = self
            .send(self.client.get(url), self.config.health_timeout)
            .await?;
        response::interpret_health(status, &body)
    }

    async fn submit_batch(&self, manifest: &Manifest) -> Result<SubmitReceipt, TransportError> {
        let url = self.route_url(&["batch"])?;
        let mut request = self.client.post(url).json(&json!({ "manifest": manifest }));
        if let Some(model) = &self.config.model {
            request = request.header(MODEL_HEADER, model);
        }

        let (status, retry_after, body) = self.send(request, self.config.request_timeout).await?;
        response::interpret_submit(status, retry_after, &body)
    }

    async fn get_batch_result(&self, batch_id: &BatchId) -> Result<BatchResult, TransportError> {
        let url = self.route_url(&["batch", batch_id.as_str()])?;
        let (status, retry_after, body) = self
            .send(self.client.get(url), self.config.request_timeout)
            .await?;
        response::interpret_result(batch_id, status, retry_after, &body)
    }

    async fn get_batch_status(&self, batch_id: &BatchId) -> Result<BatchStatus, TransportError> {
        let url = self.route_url(&["batch", batch_id.as_str(), "status"])?;
        let (status, _, body) = self
            .send(self.client.get(url), self.config.request_timeout)
            .await?;
        response::interpret_status(status, &body)
    }

    async fn cancel_batch(&self, batch_id: &BatchId) -> Result<(), TransportError> {
        let url = self.route_url(&["batch", batch_id.as_str()])?;
        let (status, _, _) = self
            .send(self.client.delete(url), self.config.request_timeout)
            .await?;
        response::interpret_cancel(status)
    }

    async fn retry_sentence(
        &self,
        batch_id: &BatchId,
        sid: Sid,
        text: &str,
    ) -> Result<SentenceRetryOutput, TransportError> {
        debug!(batch_id = %batch_id, sid, "Retrying single sentence");

        let url = self.route_url(&["single"])?;
        let bump = MaxTokensBump::for_budget(self.config.max_tokens);
        let cards = tool::invoke_with_max_tokens_bump(&bump, |max_tokens| {
            let request = self
                .client
                .post(url.clone())
                .json(&tool::single_sentence_request(text, max_tokens));
            async move {
                let (status, _, body) = self.send(request, self.config.request_timeout).await?;
                response::interpret_single(status, &body)?;
                tool::decode_tool_use(&body)
            }
        })
        .await?;
        Ok(SentenceRetryOutput::from_cards(cards))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str, route_base: &str) -> HttpBatchClient {
        HttpBatchClient::new(HttpClientConfig {
            base_url: base_url.to_string(),
            route_base: route_base.to_string(),
            ..HttpClientConfig::default()
        })
    }

    #[test]
    fn builds_routes_under_route_base() {
        let client = client("http://localhost:3001/", "api/llm/");
        assert_eq!(
            client.route_url(&["batch"]).unwrap().as_str(),
            "http://localhost:3001/api/llm/batch"
        );
        assert_eq!(
            client.route_url(&["batch", "b-1", "status"]).unwrap().as_str(),
            "http://localhost:3001/api/llm/batch/b-1/status"
        );
        assert_eq!(
            client.health_url().unwrap().as_str(),
            "http://localhost:3001/health"
        );
    }

    #[test]
    fn encodes_batch_ids() {
        let client = client("http://localhost:3001", "/api/llm");
        assert_eq!(
            client.route_url(&["batch", "a/b c"]).unwrap().as_str(),
            "http://localhost:3001/api/llm/batch/a%2Fb%20c"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        let client = client("not a url", "/api");
        assert_eq!(
            client.route_url(&["batch"]).unwrap_err().kind,
            TransportErrorKind::Unknown
        );
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let client = HttpBatchClient::new(HttpClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            health_timeout: Duration::from_secs(2),
            ..HttpClientConfig::default()
        });

        let err = client.health().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(
            err.kind,
            TransportErrorKind::Network | TransportErrorKind::Timeout
        ));
    }
}
