//! Configuration management for the booking client.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend REST API
    pub api: ApiConfig,
    /// Booking rules that are not owned by the backend
    pub booking: BookingConfig,
    /// Durable client storage
    pub storage: StorageConfig,
    /// Payment widget
    pub payment: PaymentConfig,
    /// Chat assistant
    pub assistant: AssistantConfig,
}

/// Backend REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl ApiConfig {
    /// Request timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Booking rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Tax applied to the platform fee (default: 0.12)
    pub tax_rate: f64,
    /// Per-order ticket cap when the backend omits one (default: 15)
    pub default_max_tickets: u32,
    /// Catalog page size (default: 50)
    pub catalog_page_size: u32,
    /// Booking history page size (default: 10)
    pub history_page_size: u32,
}

/// Durable storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for file-backed storage; in-memory storage when unset
    pub dir: Option<PathBuf>,
}

/// Payment widget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Merchant key handed to the widget
    pub key: String,
    /// ISO currency code (default: INR)
    pub currency: String,
    /// Widget theme colour (default: #ff0f37)
    pub theme_color: String,
    /// Merchant name shown in the widget
    pub merchant_name: String,
    /// Purchase description shown in the widget
    pub description: String,
}

/// Chat assistant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Anthropic API key; the assistant answers with a fallback when unset
    pub api_key: Option<String>,
    /// Model override
    pub model: Option<String>,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl AssistantConfig {
    /// Request timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unparseable numbers fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            api: ApiConfig {
                base_url: text("MATCHDAY_API_BASE_URL")
                    .unwrap_or_else(|| "http://localhost:8080".to_string())
                    .trim_end_matches('/')
                    .to_string(),
                timeout_secs: text("MATCHDAY_API_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
            booking: BookingConfig {
                tax_rate: text("MATCHDAY_TAX_RATE")
                    .and_then(|s| s.parse().ok())
                    .filter(|rate: &f64| rate.is_finite() && *rate >= 0.0)
                    .unwrap_or(0.12),
                default_max_tickets: text("MATCHDAY_DEFAULT_MAX_TICKETS")
                    .and_then(|s| s.parse().ok())
                    .filter(|max: &u32| *max > 0)
                    .unwrap_or(15),
                catalog_page_size: text("MATCHDAY_CATALOG_PAGE_SIZE")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(50),
                history_page_size: text("MATCHDAY_HISTORY_PAGE_SIZE")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            },
            storage: StorageConfig {
                dir: text("MATCHDAY_STORAGE_DIR").map(PathBuf::from),
            },
            payment: PaymentConfig {
                key: text("MATCHDAY_PAYMENT_KEY").unwrap_or_default(),
                currency: text("MATCHDAY_PAYMENT_CURRENCY").unwrap_or_else(|| "INR".to_string()),
                theme_color: text("MATCHDAY_PAYMENT_THEME")
                    .unwrap_or_else(|| "#ff0f37".to_string()),
                merchant_name: text("MATCHDAY_MERCHANT_NAME")
                    .unwrap_or_else(|| "WhaTheFootball".to_string()),
                description: "Event Ticket Purchase".to_string(),
            },
            assistant: AssistantConfig {
                api_key: text("ANTHROPIC_API_KEY"),
                model: text("MATCHDAY_ASSISTANT_MODEL"),
                timeout_secs: text("MATCHDAY_ASSISTANT_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert!((config.booking.tax_rate - 0.12).abs() < f64::EPSILON);
        assert_eq!(config.booking.default_max_tickets, 15);
        assert_eq!(config.booking.catalog_page_size, 50);
        assert_eq!(config.booking.history_page_size, 10);
        assert_eq!(config.payment.currency, "INR");
        assert_eq!(config.payment.theme_color, "#ff0f37");
        assert!(config.storage.dir.is_none());
        assert!(config.assistant.api_key.is_none());
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("MATCHDAY_API_BASE_URL", "https://api.example.com/"),
            ("MATCHDAY_API_TIMEOUT_SECS", "5"),
            ("MATCHDAY_TAX_RATE", "-1"),
            ("MATCHDAY_DEFAULT_MAX_TICKETS", "not-a-number"),
            ("MATCHDAY_STORAGE_DIR", "/tmp/matchday"),
            ("ANTHROPIC_API_KEY", "  "),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.api.timeout_secs, 5);
        assert!((config.booking.tax_rate - 0.12).abs() < f64::EPSILON);
        assert_eq!(config.booking.default_max_tickets, 15);
        assert_eq!(config.storage.dir, Some(PathBuf::from("/tmp/matchday")));
        assert!(config.assistant.api_key.is_none());
    }
}
