//! Integration: the persisted record of a store's connection to one provider.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TransitionError, ValidationError};
use crate::id::{IntegrationId, StoreId};
use crate::provider::Provider;
use crate::time::{Timestamp, now};

/// Connection status of an [`Integration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    /// Row exists but no successful connect has happened yet.
    Pending,
    Connected,
    /// The last test or sync failed; credentials are kept.
    Error,
    /// Disconnected by the store owner; credentials are cleared.
    Disconnected,
}

impl IntegrationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Connected => "connected",
            Self::Error => "error",
            Self::Disconnected => "disconnected",
        }
    }

    /// Whether moving from `self` to `to` is allowed.
    ///
    /// Staying in the same status is always allowed.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        use IntegrationStatus::{Connected, Disconnected, Error, Pending};

        self == to
            || matches!(
                (self, to),
                (Pending | Error | Disconnected, Connected)
                    | (Connected, Error | Disconnected)
                    | (Error, Disconnected)
            )
    }
}

impl fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrationStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "connected" => Ok(Self::Connected),
            "error" => Ok(Self::Error),
            "disconnected" => Ok(Self::Disconnected),
            other => Err(ValidationError::UnknownValue {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// A store's connection to one provider. One row per (store, provider).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: IntegrationId,
    pub store_id: StoreId,
    pub provider: Provider,
    pub status: IntegrationStatus,
    /// Vault ciphertext. Never serialized to API consumers.
    #[serde(skip)]
    pub credentials_encrypted: Option<String>,
    pub config: serde_json::Value,
    pub last_synced_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Integration {
    /// A fresh `pending` integration without credentials.
    #[must_use]
    pub fn new(store_id: StoreId, provider: Provider) -> Self {
        let created_at = now();
        Self {
            id: IntegrationId::new(),
            store_id,
            provider,
            status: IntegrationStatus::Pending,
            credentials_encrypted: None,
            config: serde_json::Value::Object(serde_json::Map::new()),
            last_synced_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// Move to `to`, enforcing the status state machine.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the move is not allowed.
    pub fn transition(&mut self, to: IntegrationStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now();
        Ok(())
    }

    /// Disconnect and drop the stored credentials.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] from a `pending` integration.
    pub fn disconnect(&mut self) -> Result<(), TransitionError> {
        self.transition(IntegrationStatus::Disconnected)?;
        self.credentials_encrypted = None;
        Ok(())
    }

    /// Record a successful sync finishing at `at`.
    ///
    /// `last_synced_at` never moves backwards.
    pub fn record_sync(&mut self, at: Timestamp) {
        self.last_synced_at = Some(self.last_synced_at.map_or(at, |prev| prev.max(at)));
        self.updated_at = now();
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == IntegrationStatus::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use IntegrationStatus::{Connected, Disconnected, Error, Pending};

    fn integration(status: IntegrationStatus) -> Integration {
        let mut integration = Integration::new(StoreId::new(), Provider::Square);
        integration.status = status;
        integration
    }

    #[test]
    fn should_start_pending_without_credentials() {
        let integration = Integration::new(StoreId::new(), Provider::Clover);
        assert_eq!(integration.status, Pending);
        assert!(integration.credentials_encrypted.is_none());
        assert!(integration.last_synced_at.is_none());
    }

    #[test]
    fn should_allow_documented_transitions() {
        assert!(Pending.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Error));
        assert!(Connected.can_transition_to(Disconnected));
        assert!(Error.can_transition_to(Connected));
        assert!(Disconnected.can_transition_to(Connected));
        assert!(Error.can_transition_to(Disconnected));
    }

    #[test]
    fn should_reject_transitions_outside_state_machine() {
        assert!(!Pending.can_transition_to(Error));
        assert!(!Pending.can_transition_to(Disconnected));
        assert!(!Disconnected.can_transition_to(Error));
        assert!(!Connected.can_transition_to(Pending));
    }

    #[test]
    fn should_report_transition_error_with_both_states() {
        let mut integration = integration(Disconnected);
        let err = integration.transition(Error).unwrap_err();
        assert_eq!(
            err,
            TransitionError {
                from: Disconnected,
                to: Error
            }
        );
        assert_eq!(integration.status, Disconnected);
    }

    #[test]
    fn should_clear_credentials_on_disconnect() {
        let mut integration = integration(Connected);
        integration.credentials_encrypted = Some("ciphertext".to_string());

        integration.disconnect().unwrap();

        assert_eq!(integration.status, Disconnected);
        assert!(integration.credentials_encrypted.is_none());
    }

    #[test]
    fn should_never_move_last_synced_at_backwards() {
        let mut integration = integration(Connected);
        let later = now();
        let earlier = later - Duration::minutes(1);

        integration.record_sync(later);
        integration.record_sync(earlier);

        assert_eq!(integration.last_synced_at, Some(later));
    }

    #[test]
    fn should_not_serialize_ciphertext() {
        let mut integration = integration(Connected);
        integration.credentials_encrypted = Some("secret-blob".to_string());
        let json = serde_json::to_string(&integration).unwrap();
        assert!(!json.contains("secret-blob"));
        assert!(json.contains("\"status\":\"connected\""));
    }

    #[test]
    fn should_parse_status_strings() {
        for status in [Pending, Connected, Error, Disconnected] {
            assert_eq!(status.as_str().parse::<IntegrationStatus>().unwrap(), status);
        }
    }
}
