//! Provider credentials: one validated variant per provider.
//!
//! Credentials only ever leave the process encrypted (see the vault port in
//! `tillguard-app`). The `Debug` implementations here redact every secret.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::provider::{AuthScheme, Provider};
use crate::time::Timestamp;

/// Credentials for a single provider, tagged by provider identifier.
///
/// ```json
/// {"provider": "aloha", "host": "10.0.0.5", "port": 8080, "site_id": "12", ...}
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderCredentials {
    Square(OAuthCredentials),
    Clover(OAuthCredentials),
    Aloha(OnPremCredentials),
}

/// OAuth2 token pair issued by a cloud provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthCredentials {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    /// Vendor-side account identifier (required by Clover for every call).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
}

/// Address and basic-auth pair for an on-premise back-office server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnPremCredentials {
    /// IP address of the back-office server on the store network.
    pub host: String,
    #[serde(default = "default_on_prem_port")]
    pub port: u16,
    pub site_id: String,
    pub username: String,
    pub password: String,
}

fn default_on_prem_port() -> u16 {
    8080
}

impl OAuthCredentials {
    /// Whether the access token is past its expiry timestamp.
    ///
    /// Tokens without an expiry are treated as live until the vendor says
    /// otherwise.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    fn validate(&self, provider: Provider) -> Result<(), ValidationError> {
        if self.access_token.trim().is_empty() {
            return Err(ValidationError::EmptyField("access_token"));
        }
        if provider == Provider::Clover
            && self
                .merchant_id
                .as_deref()
                .is_none_or(|id| id.trim().is_empty())
        {
            return Err(ValidationError::EmptyField("merchant_id"));
        }
        Ok(())
    }
}

impl OnPremCredentials {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.host.parse::<IpAddr>().is_err() {
            return Err(ValidationError::InvalidHost(self.host.clone()));
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if self.site_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("site_id"));
        }
        if self.username.trim().is_empty() {
            return Err(ValidationError::EmptyField("username"));
        }
        Ok(())
    }
}

impl ProviderCredentials {
    /// The provider these credentials belong to.
    #[must_use]
    pub fn provider(&self) -> Provider {
        match self {
            Self::Square(_) => Provider::Square,
            Self::Clover(_) => Provider::Clover,
            Self::Aloha(_) => Provider::Aloha,
        }
    }

    /// Check the shape of the credentials.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Square(oauth) => oauth.validate(Provider::Square),
            Self::Clover(oauth) => oauth.validate(Provider::Clover),
            Self::Aloha(on_prem) => on_prem.validate(),
        }
    }

    /// Validate and check the credentials belong to `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ProviderMismatch`] for another provider's
    /// credentials, or the shape error from [`validate`](Self::validate).
    pub fn validate_for(&self, expected: Provider) -> Result<(), ValidationError> {
        let found = self.provider();
        if found != expected {
            return Err(ValidationError::ProviderMismatch { expected, found });
        }
        self.validate()
    }

    /// The OAuth token pair, for OAuth providers.
    #[must_use]
    pub fn oauth(&self) -> Option<&OAuthCredentials> {
        match self {
            Self::Square(oauth) | Self::Clover(oauth) => Some(oauth),
            Self::Aloha(_) => None,
        }
    }

    /// Wrap a token pair into the variant for `provider`.
    ///
    /// Returns `None` for providers that do not use OAuth.
    #[must_use]
    pub fn from_oauth(provider: Provider, oauth: OAuthCredentials) -> Option<Self> {
        match provider {
            Provider::Square => Some(Self::Square(oauth)),
            Provider::Clover => Some(Self::Clover(oauth)),
            Provider::Aloha => None,
        }
    }
}

/// How the caller proves access to a provider when connecting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ConnectGrant {
    /// OAuth2 authorization code returned to the redirect URI.
    AuthorizationCode {
        code: String,
        redirect_uri: String,
        /// Clover passes the merchant id alongside the code.
        #[serde(default)]
        merchant_id: Option<String>,
    },
    /// Static credentials typed in by the store owner.
    Credentials { credentials: ProviderCredentials },
}

/// A connect request: the grant plus provider-specific settings to keep
/// on the integration row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub grant: ConnectGrant,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl ConnectGrant {
    /// Reject malformed grants before any network call.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the grant does not fit `provider`.
    pub fn validate_for(&self, provider: Provider) -> Result<(), ValidationError> {
        match self {
            Self::AuthorizationCode {
                code,
                redirect_uri,
                merchant_id,
            } => {
                if provider.auth_scheme() != AuthScheme::OAuth2 {
                    return Err(ValidationError::UnsupportedConnectMethod(provider));
                }
                if code.trim().is_empty() {
                    return Err(ValidationError::EmptyField("code"));
                }
                if redirect_uri.trim().is_empty() {
                    return Err(ValidationError::EmptyField("redirect_uri"));
                }
                if provider == Provider::Clover
                    && merchant_id.as_deref().is_none_or(|id| id.trim().is_empty())
                {
                    return Err(ValidationError::EmptyField("merchant_id"));
                }
                Ok(())
            }
            Self::Credentials { credentials } => {
                if provider.auth_scheme() != AuthScheme::Basic {
                    return Err(ValidationError::UnsupportedConnectMethod(provider));
                }
                credentials.validate_for(provider)
            }
        }
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Square(oauth) => f.debug_tuple("Square").field(oauth).finish(),
            Self::Clover(oauth) => f.debug_tuple("Clover").field(oauth).finish(),
            Self::Aloha(on_prem) => f.debug_tuple("Aloha").field(on_prem).finish(),
        }
    }
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("merchant_id", &self.merchant_id)
            .finish()
    }
}

impl fmt::Debug for OnPremCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnPremCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("site_id", &self.site_id)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
