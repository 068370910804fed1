//! HTTP sink posting JSON records to a remote logging/evaluation service.

use crate::error::{Result, SinkError};
use crate::sink::{Ack, Sink, SinkRecord};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Configuration for connecting to a remote record endpoint.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Full URL records are POSTed to.
    pub endpoint: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Connection-level timeout applied to the underlying HTTP client.
    pub timeout: Option<Duration>,
}

impl SinkConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            timeout: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Sink that delivers records to a remote service as JSON over HTTP.
///
/// A 4xx response maps to `Rejected` (the service refused the payload), any other
/// non-success status and transport failures map to `Unreachable`, and client-level
/// timeouts map to `Timeout`.
pub struct HttpSink {
    client: Client,
    config: SinkConfig,
}

impl HttpSink {
    pub fn new(config: SinkConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn send(&self, record: &SinkRecord) -> std::result::Result<Ack, SinkError> {
        let mut request = self.client.post(&self.config.endpoint).json(record);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SinkError::Timeout(e.to_string())
            } else {
                SinkError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            // The service may assign its own id; fall back to ours when it doesn't.
            let id = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| body.get("id").and_then(|v| v.as_str()).map(String::from))
                .unwrap_or_else(|| record.record_id());
            return Ok(Ack { id });
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(SinkError::Rejected(format!("{}: {}", status, body)))
        } else {
            Err(SinkError::Unreachable(format!("{}: {}", status, body)))
        }
    }
}
