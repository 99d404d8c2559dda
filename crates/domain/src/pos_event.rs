//! POS event: a security-relevant record pulled from a provider.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::anomaly::{AnomalyReason, Assessment};
use crate::error::ValidationError;
use crate::id::{PosEventId, StoreId};
use crate::provider::Provider;
use crate::time::Timestamp;

/// Kind of POS activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PosEventType {
    Sale,
    Void,
    Refund,
    NoSale,
    Discount,
    PriceOverride,
    DrawerOpen,
    Login,
    Other,
}

impl PosEventType {
    pub const ALL: [Self; 9] = [
        Self::Sale,
        Self::Void,
        Self::Refund,
        Self::NoSale,
        Self::Discount,
        Self::PriceOverride,
        Self::DrawerOpen,
        Self::Login,
        Self::Other,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Void => "void",
            Self::Refund => "refund",
            Self::NoSale => "no_sale",
            Self::Discount => "discount",
            Self::PriceOverride => "price_override",
            Self::DrawerOpen => "drawer_open",
            Self::Login => "login",
            Self::Other => "other",
        }
    }

    /// Severity a vendor record of this kind carries when the vendor does
    /// not report one.
    #[must_use]
    pub fn default_severity(self) -> Severity {
        match self {
            Self::Sale | Self::Login | Self::Other => Severity::Low,
            Self::Discount | Self::DrawerOpen => Severity::Medium,
            Self::Void | Self::Refund | Self::NoSale => Severity::High,
            Self::PriceOverride => Severity::Critical,
        }
    }
}

impl fmt::Display for PosEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PosEventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownValue {
                field: "event type",
                value: s.to_string(),
            })
    }
}

/// Vendor-reported or inferred severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(ValidationError::UnknownValue {
                field: "severity",
                value: other.to_string(),
            }),
        }
    }
}

/// An event as an adapter pulled it from a vendor, before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedEvent {
    /// Vendor-side identifier, unique per provider account.
    pub external_id: String,
    pub event_type: PosEventType,
    pub occurred_at: Timestamp,
    pub amount_cents: Option<i64>,
    pub employee_id: Option<String>,
    pub location_id: Option<String>,
    pub severity: Severity,
}

impl FetchedEvent {
    /// Build an event whose severity follows its type.
    #[must_use]
    pub fn new(
        external_id: impl Into<String>,
        event_type: PosEventType,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            event_type,
            occurred_at,
            amount_cents: None,
            employee_id: None,
            location_id: None,
            severity: event_type.default_severity(),
        }
    }

    #[must_use]
    pub fn amount_cents(mut self, amount_cents: i64) -> Self {
        self.amount_cents = Some(amount_cents);
        self
    }

    #[must_use]
    pub fn employee_id(mut self, employee_id: impl Into<String>) -> Self {
        self.employee_id = Some(employee_id.into());
        self
    }

    #[must_use]
    pub fn location_id(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }
}

/// A stored, scored POS event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosEvent {
    pub id: PosEventId,
    pub store_id: StoreId,
    pub provider: Provider,
    pub external_id: String,
    pub event_type: PosEventType,
    pub occurred_at: Timestamp,
    pub amount_cents: Option<i64>,
    pub employee_id: Option<String>,
    pub location_id: Option<String>,
    pub severity: Severity,
    pub anomaly_score: u8,
    pub flagged: bool,
    pub reasons: Vec<AnomalyReason>,
}

impl PosEvent {
    /// Attach identity and an anomaly assessment to a fetched event.
    #[must_use]
    pub fn from_fetched(
        store_id: StoreId,
        provider: Provider,
        fetched: FetchedEvent,
        assessment: Assessment,
    ) -> Self {
        Self {
            id: PosEventId::new(),
            store_id,
            provider,
            external_id: fetched.external_id,
            event_type: fetched.event_type,
            occurred_at: fetched.occurred_at,
            amount_cents: fetched.amount_cents,
            employee_id: fetched.employee_id,
            location_id: fetched.location_id,
            severity: fetched.severity,
            anomaly_score: assessment.score,
            flagged: assessment.flagged,
            reasons: assessment.reasons,
        }
    }
}

/// Filter for listing stored events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQuery {
    pub provider: Option<Provider>,
    pub flagged_only: bool,
    pub page: crate::integration_log::Page,
}
