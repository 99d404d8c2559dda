//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`TillguardError`] via `#[from]` at port boundaries.

use crate::integration::IntegrationStatus;
use crate::provider::Provider;

/// Top-level error returned across port boundaries.
#[derive(Debug, thiserror::Error)]
pub enum TillguardError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("invalid status transition")]
    InvalidTransition(#[from] TransitionError),

    /// The caller's session is missing or no longer valid; the caller
    /// must re-authenticate.
    #[error("session expired")]
    SessionExpired,

    #[error("vault error")]
    Vault(#[from] VaultError),

    #[error("provider error")]
    Provider(#[from] ProviderError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A domain invariant was violated by caller-supplied data.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("`{0}` is not a valid IP address")]
    InvalidHost(String),

    #[error("port must be non-zero")]
    InvalidPort,

    #[error("credentials are for {found} but {expected} was requested")]
    ProviderMismatch { expected: Provider, found: Provider },

    #[error("{0} does not support this connection method")]
    UnsupportedConnectMethod(Provider),

    #[error("`{0}` is not a known provider")]
    UnknownProvider(String),

    #[error("`{value}` is not a valid {field}")]
    UnknownValue { field: &'static str, value: String },
}

/// A looked-up record does not exist.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{entity} `{id}` not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// An integration status change outside the allowed state machine.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("cannot move integration from {from} to {to}")]
pub struct TransitionError {
    pub from: IntegrationStatus,
    pub to: IntegrationStatus,
}

/// Credential vault failures.
///
/// Crypto, encoding, and storage failures are deliberately collapsed into
/// two opaque variants so callers never learn which step failed.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("failed to store credentials securely")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to access credentials securely")]
    Access(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("no credentials stored for {0}")]
    Missing(Provider),
}

/// Failures talking to a vendor API.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The vendor rejected the access token (HTTP 401).
    #[error("access token expired or revoked")]
    TokenExpired,

    /// A token refresh was attempted and failed.
    #[error("token refresh failed")]
    RefreshFailed(#[source] Box<ProviderError>),

    /// Non-2xx answer from the vendor.
    #[error("{provider} API returned {status}: {message}")]
    Api {
        provider: Provider,
        status: u16,
        message: String,
    },

    /// Connection, TLS, or timeout failure.
    #[error("request to {provider} failed")]
    Transport {
        provider: Provider,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The vendor answered with a body we could not decode.
    #[error("unexpected response from {provider}")]
    Decode {
        provider: Provider,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid credentials")]
    Validation(#[from] ValidationError),

    /// The adapter is missing configuration (client id, secret, …).
    #[error("{0} is not configured")]
    NotConfigured(Provider),
}

impl ProviderError {
    /// Whether retrying the same call could succeed without user action.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_treat_transport_and_server_errors_as_transient() {
        let transport = ProviderError::Transport {
            provider: Provider::Square,
            source: "connection reset".into(),
        };
        let throttled = ProviderError::Api {
            provider: Provider::Square,
            status: 429,
            message: "slow down".to_string(),
        };
        let unavailable = ProviderError::Api {
            provider: Provider::Clover,
            status: 503,
            message: "maintenance".to_string(),
        };

        assert!(transport.is_transient());
        assert!(throttled.is_transient());
        assert!(unavailable.is_transient());
    }

    #[test]
    fn should_not_retry_client_errors() {
        let bad_request = ProviderError::Api {
            provider: Provider::Square,
            status: 400,
            message: "bad".to_string(),
        };
        assert!(!bad_request.is_transient());
        assert!(!ProviderError::TokenExpired.is_transient());
    }

    #[test]
    fn should_display_vault_errors_generically() {
        let err = VaultError::Access("tag mismatch".into());
        assert_eq!(err.to_string(), "failed to access credentials securely");
    }

    #[test]
    fn should_convert_validation_into_top_level_error() {
        let err: TillguardError = ValidationError::InvalidPort.into();
        assert!(matches!(
            err,
            TillguardError::Validation(ValidationError::InvalidPort)
        ));
    }
}
