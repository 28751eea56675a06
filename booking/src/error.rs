//! Error taxonomy of the booking client
//!
//! Library errors (reqwest, serde_json, io) are converted into
//! [`BookingError`] at the boundary; nothing else reaches the view-models.

use thiserror::Error;

/// Errors surfaced to the booking views
///
/// Errors travel inside actions, so they are `Clone` and carry plain strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    /// Malformed user input; blocks submission
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Backend unreachable or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Backend answered with a failure or a payload we could not read
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Backend answered 401
    #[error("Unauthorized")]
    Unauthorized,

    /// The user dismissed the payment widget
    #[error("Payment cancelled")]
    PaymentCancelled,

    /// Payment went through but the booking was not confirmed
    #[error("Booking confirmation failed: {0}")]
    ConfirmationFailed(String),

    /// Durable client storage failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl BookingError {
    /// Text shown to the user
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) | Self::Fetch(message) => message.clone(),
            Self::Network(_) => "We couldn't reach the server. Please try again.".to_string(),
            Self::Unauthorized => "Your session has expired. Please log in again.".to_string(),
            Self::PaymentCancelled => "Payment cancelled.".to_string(),
            Self::ConfirmationFailed(_) => {
                "Failed to confirm booking. Please contact support.".to_string()
            },
            Self::Storage(_) => "Something went wrong saving your data on this device.".to_string(),
        }
    }

    /// Whether retrying the same request can succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Fetch(_))
    }
}

impl From<reqwest::Error> for BookingError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Fetch(format!("Unexpected response: {error}"))
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for BookingError {
    fn from(error: serde_json::Error) -> Self {
        Self::Fetch(format!("Unexpected response: {error}"))
    }
}
