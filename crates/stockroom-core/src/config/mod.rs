//! Engine configuration.
//!
//! `EngineConfig` carries everything the sync engine and the HTTP remote
//! catalog need to reach the backend. Front ends build it from their own
//! config sources (files, environment) and hand it to the engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

/// Collection used by the catalog backend
pub const DEFAULT_COLLECTION: &str = "productos";
/// Per-request timeout applied to every remote call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Periodic sync interval
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the catalog sync engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Backend base URL (e.g., `https://api.example.com/api`)
    pub api_base_url: String,
    /// Collection segment appended to the base URL
    pub collection: String,
    /// Bearer token sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// Bound on each remote call; expiry counts as a transient failure
    pub request_timeout: Duration,
    /// Automatic sync interval (`None` = only connectivity edges and manual syncs)
    pub sync_interval: Option<Duration>,
}

impl EngineConfig {
    /// Create a configuration for the given backend with default settings
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim().trim_end_matches('/').to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            api_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            sync_interval: Some(DEFAULT_SYNC_INTERVAL),
        }
    }

    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Set the bearer token; blank tokens are ignored
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = normalize_text_option(Some(token.into()));
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the automatic sync interval
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Disable periodic sync (connectivity edges and manual sync only)
    #[must_use]
    pub const fn without_auto_sync(mut self) -> Self {
        self.sync_interval = None;
        self
    }

    /// Check that the configuration can reach a backend
    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.api_base_url) {
            return Err(Error::InvalidInput(format!(
                "API base URL must include http:// or https://, got '{}'",
                self.api_base_url
            )));
        }
        if self.collection.trim().is_empty() || self.collection.contains('/') {
            return Err(Error::InvalidInput(format!(
                "invalid collection name '{}'",
                self.collection
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidInput(
                "request timeout must be greater than zero".into(),
            ));
        }
        if self.sync_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(Error::InvalidInput(
                "sync interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("http://localhost:3000/api")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_applies_defaults() {
        let config = EngineConfig::new("https://api.example.com/api/");
        assert_eq!(config.api_base_url, "https://api.example.com/api");
        assert_eq!(config.collection, "productos");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.sync_interval, Some(Duration::from_secs(60)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_overrides_settings() {
        let config = EngineConfig::new("https://api.example.com")
            .with_collection("products")
            .with_token("  secret ")
            .with_request_timeout(Duration::from_secs(2))
            .without_auto_sync();
        assert_eq!(config.collection, "products");
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.sync_interval, None);
    }

    #[test]
    fn blank_token_is_ignored() {
        let config = EngineConfig::default().with_token("   ");
        assert_eq!(config.api_token, None);
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(EngineConfig::new("api.example.com").validate().is_err());
        assert!(EngineConfig::default()
            .with_collection("a/b")
            .validate()
            .is_err());
        assert!(EngineConfig::default()
            .with_request_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(EngineConfig::default()
            .with_sync_interval(Duration::ZERO)
            .validate()
            .is_err());
    }
}
