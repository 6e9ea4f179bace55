//! HTTP transport layer for the toolmesh SDK.

use crate::config::{ClientConfig, RetryConfig};
use crate::error::{ToolmeshError, ToolmeshResult};
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// HTTP transport for making API requests against one node.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: Arc<ClientConfig>,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given configuration.
    pub fn new(config: Arc<ClientConfig>) -> ToolmeshResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client, config })
    }

    /// Build a URL for the given path.
    fn build_url(&self, path: &str) -> ToolmeshResult<url::Url> {
        Ok(self.config.base_url.join(path)?)
    }

    /// Execute a GET request.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ToolmeshResult<T> {
        let url = self.build_url(path)?;
        debug!(url = %url, "GET request");

        let response = send_with_retry(self.client.get(url), &self.config.retry_config).await?;
        Ok(response.json().await?)
    }

    /// Execute a GET request with query parameters.
    pub async fn get_with_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> ToolmeshResult<T> {
        let url = self.build_url(path)?;
        debug!(url = %url, "GET request with query");

        let response =
            send_with_retry(self.client.get(url).query(query), &self.config.retry_config).await?;
        Ok(response.json().await?)
    }

    /// Execute a POST request.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ToolmeshResult<T> {
        let url = self.build_url(path)?;
        debug!(url = %url, "POST request");

        let response =
            send_with_retry(self.client.post(url).json(body), &self.config.retry_config).await?;
        Ok(response.json().await?)
    }
}

/// Send a request, retrying retryable statuses and timeouts with backoff.
/// Non-success responses become [`ToolmeshError::Api`] or `NotFound`.
pub(crate) async fn send_with_retry(
    request_builder: RequestBuilder,
    retry_config: &RetryConfig,
) -> ToolmeshResult<Response> {
    let mut attempts = 0;

    loop {
        let request = request_builder
            .try_clone()
            .ok_or_else(|| ToolmeshError::Config("Request cannot be cloned".to_string()))?;

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();

                if response.status().is_success() {
                    return Ok(response);
                }

                if attempts < retry_config.max_retries && retry_config.should_retry_status(status) {
                    let backoff = retry_config.backoff_for_attempt(attempts);
                    warn!(
                        status = status,
                        attempt = attempts + 1,
                        backoff_ms = backoff.as_millis(),
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempts += 1;
                    continue;
                }

                let body = response.text().await.unwrap_or_default();
                return Err(ToolmeshError::from_response(status, &body));
            }
            Err(e) => {
                if attempts < retry_config.max_retries && e.is_timeout() {
                    let backoff = retry_config.backoff_for_attempt(attempts);
                    warn!(
                        attempt = attempts + 1,
                        backoff_ms = backoff.as_millis(),
                        "Request timed out, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempts += 1;
                    continue;
                }
                if e.is_timeout() {
                    return Err(ToolmeshError::Timeout);
                }
                return Err(e.into());
            }
        }
    }
}
