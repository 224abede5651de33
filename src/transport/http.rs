//! HTTP client for the collector records API
//!
//! Posts record batches to `<server_url>/streams/<stream>/records`. The
//! client is async inside (reqwest) behind a blocking facade backed by a
//! current-thread runtime, so hosts stay free of any runtime requirement.

use std::borrow::Cow;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::TransportConfig;
use crate::error::{Error, Result};

use super::{BatchReceipt, Record, RecordStatus, Transport};

/// Request body for POST /streams/{stream}/records
#[derive(Serialize)]
struct SendBatchRequest<'a> {
    records: Vec<WireRecord<'a>>,
}

#[derive(Serialize)]
struct WireRecord<'a> {
    data: Cow<'a, str>,
}

/// Response from POST /streams/{stream}/records
#[derive(Debug, Deserialize)]
struct SendBatchResponse {
    /// One entry per submitted record, in submission order
    #[serde(default)]
    results: Vec<RecordStatus>,
}

/// HTTP transport for a collector server
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: String,
    runtime: tokio::runtime::Runtime,
}

impl HttpTransport {
    /// Create a new transport from configuration
    ///
    /// Returns an error if the configuration is invalid or missing required fields.
    pub fn new(config: TransportConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .server_url
            .clone()
            .ok_or_else(|| Error::Config("transport.server_url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(api_key) = &config.api_key {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Transport(format!("failed to create runtime: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            runtime,
        })
    }

    async fn post_batch(&self, stream: &str, records: &[Record]) -> Result<BatchReceipt> {
        let url = format!(
            "{}/streams/{}/records",
            self.base_url,
            urlencoding::encode(stream)
        );

        let request_body = SendBatchRequest {
            records: records
                .iter()
                .map(|r| WireRecord {
                    data: String::from_utf8_lossy(&r.data),
                })
                .collect(),
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            let result: SendBatchResponse = response
                .json()
                .await
                .map_err(|e| Error::Transport(format!("failed to parse response: {}", e)))?;
            Ok(BatchReceipt {
                statuses: result.results,
            })
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Transport(format!(
                "API error ({}): {}",
                status, error_text
            )))
        }
    }

    /// Check if the transport can reach the collector
    pub fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);

        self.runtime.block_on(async {
            match self.http_client.get(&url).send().await {
                Ok(response) => Ok(response.status().is_success()),
                Err(_) => Ok(false),
            }
        })
    }
}

impl Transport for HttpTransport {
    fn send_batch(&self, stream: &str, records: &[Record]) -> Result<BatchReceipt> {
        self.runtime.block_on(self.post_batch(stream, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_requires_server_url() {
        let config = TransportConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(HttpTransport::new(config).is_err());
    }

    #[test]
    fn test_transport_with_valid_config() {
        let config = TransportConfig {
            enabled: true,
            server_url: Some("https://collector.example.com/".to_string()),
            stream: Some("cli-events".to_string()),
            api_key: Some("sk_live_test".to_string()),
            ..Default::default()
        };
        let transport = HttpTransport::new(config).unwrap();
        assert_eq!(transport.base_url, "https://collector.example.com");
    }
}
