//! The "Coach AI" persona on top of the Messages API client

use crate::{
    client::{AnthropicClient, DEFAULT_API_URL},
    types::{DEFAULT_MODEL, Message, MessagesRequest},
};
use std::time::Duration;

/// Persona instructions sent with every request
pub const SYSTEM_PROMPT: &str = "You are 'Coach AI', the official AI assistant for WhaTheFOOTBALL. \
Your tone is energetic, sporty, and helpful. \
You help users find events, understand football rules, or get hyped for matches. \
Keep answers concise (under 100 words) and use football metaphors where appropriate. \
If asked about the app features, mention: Event Booking, Fan Clubs, Score Prediction, and Fantasy Team Creation.";

/// Reply when no API key is configured
pub const FALLBACK_MISSING_KEY: &str =
    "I'm sorry, my connection to the stadium is down (API Key missing). Please check the configuration.";

/// Reply when the model produced no text
pub const FALLBACK_EMPTY_REPLY: &str = "The referee is reviewing that play... (No response generated)";

/// Reply when the request failed
pub const FALLBACK_NETWORK_FAILURE: &str = "Foul play on the network! Please try again later.";

const MAX_TOKENS: u32 = 300;
const TEMPERATURE: f32 = 0.7;

/// Chat assistant facade
///
/// Free text in, free text out. Errors never leave this type; they are logged
/// and replaced by one of the fallback replies.
#[derive(Clone)]
pub struct Assistant {
    client: Option<AnthropicClient>,
    model: String,
}

impl Assistant {
    /// Create an assistant over an optional client
    ///
    /// `None` means the service is not configured; every reply is then
    /// [`FALLBACK_MISSING_KEY`].
    #[must_use]
    pub fn new(client: Option<AnthropicClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Create an assistant from `ANTHROPIC_API_KEY`
    ///
    /// A missing key is not an error here; it yields an unconfigured assistant.
    #[must_use]
    pub fn from_env(model: Option<String>, timeout: Duration) -> Self {
        Self::with_api_key(std::env::var("ANTHROPIC_API_KEY").ok(), model, timeout)
    }

    /// Create an assistant from an optional API key
    ///
    /// A missing or blank key yields an unconfigured assistant.
    #[must_use]
    pub fn with_api_key(api_key: Option<String>, model: Option<String>, timeout: Duration) -> Self {
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let Some(api_key) = api_key.filter(|key| !key.trim().is_empty()) else {
            return Self::new(None, model);
        };

        let client = match AnthropicClient::new(api_key, DEFAULT_API_URL, timeout) {
            Ok(client) => Some(client),
            Err(error) => {
                tracing::warn!(%error, "Failed to build assistant client");
                None
            },
        };
        Self::new(client, model)
    }

    /// Whether an API client is configured
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Ask the assistant
    pub async fn reply(&self, message: &str) -> String {
        let Some(client) = &self.client else {
            return FALLBACK_MISSING_KEY.to_string();
        };

        let request = MessagesRequest {
            model: self.model.clone(),
            system: Some(SYSTEM_PROMPT.to_string()),
            messages: vec![Message::user(message)],
            max_tokens: MAX_TOKENS,
            temperature: Some(TEMPERATURE),
        };

        match client.send(&request).await {
            Ok(response) => {
                tracing::debug!(
                    id = %response.id,
                    stop_reason = response.stop_reason.as_deref().unwrap_or("unknown"),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "Assistant replied"
                );
                let text = response.text();
                if text.is_empty() {
                    FALLBACK_EMPTY_REPLY.to_string()
                } else {
                    text
                }
            },
            Err(error) => {
                tracing::error!(%error, "Assistant request failed");
                FALLBACK_NETWORK_FAILURE.to_string()
            },
        }
    }
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("configured", &self.is_configured())
            .field("model", &self.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_assistant_uses_missing_key_reply() {
        let assistant = Assistant::new(None, DEFAULT_MODEL);
        assert!(!assistant.is_configured());
        assert_eq!(assistant.reply("Who won?").await, FALLBACK_MISSING_KEY);
    }

    #[test]
    fn test_blank_key_leaves_assistant_unconfigured() {
        let timeout = Duration::from_secs(5);
        assert!(!Assistant::with_api_key(None, None, timeout).is_configured());
        assert!(!Assistant::with_api_key(Some("  ".into()), None, timeout).is_configured());

        let assistant = Assistant::with_api_key(Some("sk-test".into()), None, timeout);
        assert!(assistant.is_configured());
        assert_eq!(assistant.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_system_prompt_sets_persona() {
        assert!(SYSTEM_PROMPT.starts_with("You are 'Coach AI'"));
        assert!(SYSTEM_PROMPT.contains("under 100 words"));
    }
}
