//! HTTP client for the counterparty relay

use crate::pipeline::SwapRelay;
use async_trait::async_trait;
use gasless_core::api::{ExecuteSwapRequest, ExecuteSwapResponse};
use gasless_core::{Error, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// `POST {base}/execute-swap` over HTTP
#[derive(Debug, Clone)]
pub struct RelayHttpClient {
    base_url: String,
    client: Client,
}

impl RelayHttpClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl SwapRelay for RelayHttpClient {
    async fn execute_swap(&self, request: ExecuteSwapRequest) -> Result<ExecuteSwapResponse> {
        let url = format!("{}/execute-swap", self.base_url);
        debug!(url = %url, "Submitting swap to relay");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout("execute-swap".into())
                } else {
                    Error::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        if !status.is_success() {
            let reason = serde_json::from_str::<ExecuteSwapResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(body);
            return Err(Error::Execution(format!("relay returned {}: {}", status, reason)));
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::Serialization(format!("relay response: {}", e)))
    }
}
