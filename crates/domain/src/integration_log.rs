//! Integration log: an append-only audit row written by every integration
//! operation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::{LogId, StoreId};
use crate::provider::Provider;
use crate::time::{Timestamp, now};

/// Severity of an [`IntegrationLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(ValidationError::UnknownValue {
                field: "log level",
                value: other.to_string(),
            }),
        }
    }
}

/// One audit row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationLog {
    pub id: LogId,
    pub store_id: StoreId,
    pub provider: Provider,
    pub timestamp: Timestamp,
    pub level: LogLevel,
    pub message: String,
    pub details: serde_json::Value,
}

impl IntegrationLog {
    /// Create a log row stamped with the current time.
    #[must_use]
    pub fn new(
        store_id: StoreId,
        provider: Provider,
        level: LogLevel,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: LogId::new(),
            store_id,
            provider,
            timestamp: now(),
            level,
            message: message.into(),
            details,
        }
    }
}

/// Offset pagination for log and event listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    /// Largest page a caller may request.
    pub const MAX_LIMIT: usize = 500;

    /// Build a page, clamping `limit` to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: limit.clamp(1, Self::MAX_LIMIT),
            offset,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}
