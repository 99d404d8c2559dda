//! Provider adapter configuration types.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// OAuth application registered with a cloud vendor.
///
/// `base_url` and `auth_url` fall back to the vendor's production hosts
/// when unset.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct OAuthAppConfig {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: Option<String>,
    pub auth_url: Option<String>,
}

impl OAuthAppConfig {
    /// Whether an application id and secret are present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }

    pub(crate) fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
    }
}

impl fmt::Debug for OAuthAppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthAppConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("auth_url", &self.auth_url)
            .finish()
    }
}

/// On-premise NCR Aloha settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlohaConfig {
    /// URL scheme used to reach the store's Aloha server.
    pub scheme: String,
}

impl Default for AlohaConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
        }
    }
}

/// Per-vendor sections.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub square: OAuthAppConfig,
    pub clover: OAuthAppConfig,
    pub aloha: AlohaConfig,
}

/// Outbound HTTP settings shared by every adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Concurrent vendor calls allowed per adapter.
    pub max_in_flight: usize,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

impl HttpConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_in_flight: crate::rate_limiter::DEFAULT_MAX_IN_FLIGHT,
            timeout_secs: 30,
        }
    }
}
