//! # Matchday Assistant
//!
//! "Coach AI", the chat assistant of the matchday client, backed by the
//! Anthropic Messages API.
//!
//! The [`Assistant`] facade never fails: missing configuration, empty
//! generations and transport errors all turn into short in-character
//! fallback replies.
//!
//! ## Example
//!
//! ```no_run
//! use matchday_assistant::Assistant;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let assistant = Assistant::from_env(None, Duration::from_secs(30));
//!     println!("{}", assistant.reply("Who plays this weekend?").await);
//! }
//! ```

pub mod assistant;
pub mod client;
pub mod error;
pub mod types;

pub use assistant::{
    Assistant, FALLBACK_EMPTY_REPLY, FALLBACK_MISSING_KEY, FALLBACK_NETWORK_FAILURE,
    SYSTEM_PROMPT,
};
pub use client::AnthropicClient;
pub use error::AssistantError;
pub use types::{ContentBlock, DEFAULT_MODEL, Message, MessagesRequest, MessagesResponse, Role, Usage};
