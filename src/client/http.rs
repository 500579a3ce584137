// Copyright (c) 2025 ADBC Drivers Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP implementation of [`ChunkFetcher`] over reqwest.

use crate::client::{ChunkFetcher, FetchResponse};
use crate::error::{redact_url, Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Transport-level retry attempts for throttling and gateway errors.
    pub max_retries: u32,
    /// Base delay between retry attempts (doubles each retry).
    pub retry_delay: Duration,
    /// Maximum number of idle connections per host.
    pub max_connections_per_host: usize,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            max_connections_per_host: 100,
            user_agent: format!("warehouse-chunks/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Fetches chunk bodies from pre-signed storage URLs.
///
/// Pre-signed URLs carry their own credentials, so no authorization header is
/// added; the pipeline supplies the SSE-C or custom headers per request.
///
/// Throttling and gateway statuses (429, 502, 503, 504) and connect/timeout
/// failures are retried here with exponential backoff. Whatever status is
/// left after that is handed back to the pipeline.
#[derive(Debug)]
pub struct HttpChunkFetcher {
    client: Client,
    config: HttpClientConfig,
}

impl HttpChunkFetcher {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.max_connections_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    async fn fetch_once(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> std::result::Result<FetchResponse, reqwest::Error> {
        let mut request_builder = self.client.get(url).timeout(timeout);
        for (key, value) in headers {
            request_builder = request_builder.header(key, value);
        }

        let response = request_builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(FetchResponse { status, body })
    }

    /// Check if the HTTP status code indicates a retryable error.
    fn is_retryable_status(status: u16) -> bool {
        StatusCode::from_u16(status)
            .map(|s| {
                matches!(
                    s,
                    StatusCode::TOO_MANY_REQUESTS
                        | StatusCode::SERVICE_UNAVAILABLE
                        | StatusCode::GATEWAY_TIMEOUT
                        | StatusCode::BAD_GATEWAY
                )
            })
            .unwrap_or(false)
    }

    /// Check if the request error is retryable.
    fn is_retryable_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect()
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.config.retry_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

#[async_trait]
impl ChunkFetcher for HttpChunkFetcher {
    async fn fetch(
        &self,
        cancel: &CancellationToken,
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<FetchResponse> {
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(
                "GET {} (attempt {}/{})",
                redact_url(url),
                attempts,
                self.config.max_retries + 1
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::cancelled()),
                result = self.fetch_once(url, headers, timeout) => result,
            };

            let retry_reason = match result {
                Ok(response) if Self::is_retryable_status(response.status) => {
                    if attempts > self.config.max_retries {
                        return Ok(response);
                    }
                    format!("HTTP {}", response.status)
                }
                Ok(response) => return Ok(response),
                Err(e) if Self::is_retryable_error(&e) && attempts <= self.config.max_retries => {
                    e.to_string()
                }
                Err(e) => {
                    return Err(Error::transport(format!(
                        "request to {} failed after {} attempts: {}",
                        redact_url(url),
                        attempts,
                        e
                    )))
                }
            };

            let delay = self.backoff(attempts);
            warn!(
                "Chunk request failed with {} (attempt {}/{}), retrying in {:?}",
                retry_reason,
                attempts,
                self.config.max_retries + 1,
                delay
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::cancelled()),
                _ = sleep(delay) => {}
            }
        }
    }
}
