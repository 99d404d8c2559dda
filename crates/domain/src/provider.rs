//! Provider: a third-party POS or back-office system a store can connect.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Supported providers.
///
/// Adding a variant forces every `match` on [`Provider`] (adapter registry,
/// credential validation, storage mapping) to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Square cloud POS (OAuth2, revocable tokens).
    Square,
    /// Clover cloud POS (OAuth2, per-merchant tokens).
    Clover,
    /// NCR Aloha on-premise back office (basic auth, XML).
    Aloha,
}

/// How a provider authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// OAuth2 authorization-code flow against a cloud API.
    OAuth2,
    /// Static address + username/password against an on-premise server.
    Basic,
}

impl Provider {
    /// All supported providers, in display order.
    pub const ALL: [Self; 3] = [Self::Square, Self::Clover, Self::Aloha];

    /// Wire identifier used in URLs, storage, and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "square",
            Self::Clover => "clover",
            Self::Aloha => "aloha",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Square => "Square",
            Self::Clover => "Clover",
            Self::Aloha => "NCR Aloha",
        }
    }

    #[must_use]
    pub fn auth_scheme(self) -> AuthScheme {
        match self {
            Self::Square | Self::Clover => AuthScheme::OAuth2,
            Self::Aloha => AuthScheme::Basic,
        }
    }

    /// Whether the vendor exposes a token revocation endpoint.
    #[must_use]
    pub fn revokes_tokens(self) -> bool {
        matches!(self, Self::Square)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownProvider(s.to_string()))
    }
}
