//! Wire types of the Messages API, limited to plain text chat

use serde::{Deserialize, Serialize};

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Who wrote a message
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The fan
    User,
    /// Coach AI
    Assistant,
}

/// One block of message content
///
/// Only text is ever sent; blocks of any other type in a response are
/// read as [`ContentBlock::Other`] and skipped.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text
    Text {
        /// The text
        text: String,
    },
    /// Anything else
    #[serde(other)]
    Other,
}

/// One turn of the conversation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Author
    pub role: Role,
    /// Content
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// A text message from the fan
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }
}

/// `POST /messages` body
#[derive(Clone, Debug, Serialize)]
pub struct MessagesRequest {
    /// Model id
    pub model: String,
    /// Persona instructions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Conversation so far
    pub messages: Vec<Message>,
    /// Generation cap
    pub max_tokens: u32,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Token accounting
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Usage {
    /// Prompt tokens
    pub input_tokens: u32,
    /// Generated tokens
    pub output_tokens: u32,
}

/// `POST /messages` response
#[derive(Clone, Debug, Deserialize)]
pub struct MessagesResponse {
    /// Message id
    pub id: String,
    /// Generated content
    pub content: Vec<ContentBlock>,
    /// `end_turn`, `max_tokens`, ...
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Token accounting
    #[serde(default)]
    pub usage: Usage,
}

impl MessagesResponse {
    /// All text blocks joined, surrounding whitespace removed
    #[must_use]
    pub fn text(&self) -> String {
        let joined: String = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect();
        joined.trim().to_string()
    }
}
