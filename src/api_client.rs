//! Shared HTTP client for the OpenAI-compatible API
//!
//! Both the embedding model and the chat model talk to the same base URL with
//! the same bearer key. Transport failures and 5xx/429 responses are retried
//! with a short linear backoff; other 4xx responses fail immediately with the
//! response body in the error.

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Which error variant failures are reported as
pub type ErrorKind = fn(String) -> Error;

pub struct ApiClient {
    client: Client,
    config: LlmConfig,
    api_key: String,
    retries: usize,
}

impl ApiClient {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        // validate the base URL up front rather than on the first request
        config.endpoint("")?;
        Ok(Self {
            client,
            config: config.clone(),
            api_key,
            retries: 2,
        })
    }

    /// Disable retries; used by tests that assert on a single failure
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.config.endpoint(path)
    }

    /// POST a JSON body and decode the JSON response
    pub async fn post_json<B, T>(&self, path: &str, body: &B, kind: ErrorKind) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.retries {
            debug!("POST {} (attempt {})", url, attempt + 1);
            let sent = self
                .client
                .post(url.clone())
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            match sent {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<T>()
                            .await
                            .map_err(|e| kind(format!("Malformed response from {}: {}", path, e)));
                    }

                    let text = response.text().await.unwrap_or_default();
                    let err = kind(format!("{} returned {}: {}", path, status, text.trim()));
                    if !is_retryable(status) {
                        return Err(err);
                    }
                    last_err = Some(err);
                }
                Err(e) => last_err = Some(kind(format!("Request to {} failed: {}", path, e))),
            }

            if attempt < self.retries {
                warn!("Retrying {} after failed attempt {}", path, attempt + 1);
                tokio::time::sleep(Duration::from_millis(200 * (attempt + 1) as u64)).await;
            }
        }

        Err(last_err.unwrap_or_else(|| kind(format!("Request to {} failed", path))))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
