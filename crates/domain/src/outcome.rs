//! Operation results returned by integration actions.
//!
//! Actions (connect, test, sync, disconnect) never fail with `Err`; they
//! report success or a categorised [`ErrorInfo`] so callers can render a
//! message either way.

use std::error::Error as StdError;

use serde::{Deserialize, Serialize};

use crate::error::TillguardError;

/// Broad failure category surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    SessionExpired,
    NotFound,
    InvalidState,
    Provider,
    Vault,
    Storage,
}

impl From<&TillguardError> for ErrorKind {
    fn from(err: &TillguardError) -> Self {
        match err {
            TillguardError::Validation(_) => Self::Validation,
            TillguardError::NotFound(_) => Self::NotFound,
            TillguardError::InvalidTransition(_) => Self::InvalidState,
            TillguardError::SessionExpired => Self::SessionExpired,
            TillguardError::Vault(_) => Self::Vault,
            TillguardError::Provider(_) => Self::Provider,
            TillguardError::Storage(_) => Self::Storage,
        }
    }
}

/// Why an action failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    /// The error and its sources, outermost first.
    pub detail: String,
}

impl From<&TillguardError> for ErrorInfo {
    fn from(err: &TillguardError) -> Self {
        Self {
            kind: ErrorKind::from(err),
            detail: error_chain(err),
        }
    }
}

/// Render an error with its source chain as `outer: inner: root`.
#[must_use]
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// Outcome of connect, test, and disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl OperationResult {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>, err: &TillguardError) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(ErrorInfo::from(err)),
        }
    }

    /// Whether the failure means the caller must sign in again.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|info| info.kind == ErrorKind::SessionExpired)
    }
}

/// Outcome of a sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub message: String,
    /// Events returned by the vendor for the window.
    pub events_count: usize,
    /// How many of them were flagged as anomalous.
    pub flagged_count: usize,
    pub details: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl SyncResult {
    #[must_use]
    pub fn ok(
        message: impl Into<String>,
        events_count: usize,
        flagged_count: usize,
        details: serde_json::Value,
    ) -> Self {
        Self {
            success: true,
            message: message.into(),
            events_count,
            flagged_count,
            details,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>, err: &TillguardError) -> Self {
        Self {
            success: false,
            message: message.into(),
            events_count: 0,
            flagged_count: 0,
            details: serde_json::Value::Null,
            error: Some(ErrorInfo::from(err)),
        }
    }

    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|info| info.kind == ErrorKind::SessionExpired)
    }
}
