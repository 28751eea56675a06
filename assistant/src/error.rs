//! Failures of the Messages API client

use thiserror::Error;

/// Why a Messages API call produced no reply
#[derive(Debug, Error)]
pub enum AssistantError {
    /// The request never got an HTTP answer (connect error, timeout)
    #[error("transport failure: {0}")]
    Transport(String),

    /// The API key was rejected
    #[error("API key rejected")]
    Unauthorized,

    /// Too many requests
    #[error("rate limited")]
    RateLimited,

    /// Any other non-success status
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// A 200 whose body did not match the expected shape
    #[error("malformed response: {0}")]
    Decode(String),
}
