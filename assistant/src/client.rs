//! Thin reqwest client for `POST /messages`

use crate::error::AssistantError;
use crate::types::{MessagesRequest, MessagesResponse};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Public Messages API base URL
pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1";

/// API version header value
const API_VERSION: &str = "2023-06-01";

/// Messages API client
#[derive(Clone)]
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    endpoint: String,
}

impl AnthropicClient {
    /// Client for the API rooted at `api_url`
    ///
    /// # Errors
    ///
    /// [`AssistantError::Transport`] if the HTTP client cannot be built
    pub fn new(
        api_key: impl Into<String>,
        api_url: impl AsRef<str>,
        timeout: Duration,
    ) -> Result<Self, AssistantError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| AssistantError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: format!("{}/messages", api_url.as_ref().trim_end_matches('/')),
        })
    }

    /// Send one non-streaming request
    ///
    /// # Errors
    ///
    /// Any [`AssistantError`]; the status code decides the variant
    pub async fn send(&self, request: &MessagesRequest) -> Result<MessagesResponse, AssistantError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|error| AssistantError::Transport(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|error| AssistantError::Decode(error.to_string()));
        }

        Err(match status {
            StatusCode::UNAUTHORIZED => AssistantError::Unauthorized,
            StatusCode::TOO_MANY_REQUESTS => AssistantError::RateLimited,
            _ => AssistantError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            },
        })
    }
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
