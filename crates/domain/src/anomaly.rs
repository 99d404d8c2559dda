//! Anomaly scoring: independent threshold rules summed into a capped score.
//!
//! Each rule adds its weight when it fires. The total is capped at
//! [`MAX_SCORE`]; an event is flagged when the total reaches
//! [`AnomalyRules::flag_threshold`].

use chrono::{DateTime, Duration, FixedOffset, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::pos_event::{FetchedEvent, PosEvent, PosEventType, Severity};
use crate::provider::Provider;
use crate::time::Timestamp;

pub const MAX_SCORE: u8 = 100;
/// Widest real-world UTC offset (UTC+14 / UTC-12 fit within it).
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;
/// Longest frequency window accepted: one week.
pub const MAX_FREQUENCY_WINDOW_MINUTES: i64 = 7 * 24 * 60;

/// Why an event scored what it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum AnomalyReason {
    AfterHours { local_hour: u32 },
    HighFrequency { count: usize, window_minutes: i64 },
    Severity { severity: Severity },
    WatchedType { event_type: PosEventType },
    ElevatedAmount { amount_cents: i64 },
    HighAmount { amount_cents: i64 },
}

/// Result of scoring one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub score: u8,
    pub flagged: bool,
    pub reasons: Vec<AnomalyReason>,
}

/// The minimum an event in the rolling window needs to expose.
///
/// External ids are only unique per provider, so a sample is identified by
/// both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSample {
    pub provider: Provider,
    pub external_id: String,
    pub event_type: PosEventType,
    pub occurred_at: Timestamp,
}

impl EventSample {
    /// Sample of an event fetched from `provider` but not stored yet.
    #[must_use]
    pub fn fetched(provider: Provider, event: &FetchedEvent) -> Self {
        Self {
            provider,
            external_id: event.external_id.clone(),
            event_type: event.event_type,
            occurred_at: event.occurred_at,
        }
    }

    fn is(&self, provider: Provider, external_id: &str) -> bool {
        self.provider == provider && self.external_id == external_id
    }
}

impl From<&PosEvent> for EventSample {
    fn from(event: &PosEvent) -> Self {
        Self {
            provider: event.provider,
            external_id: event.external_id.clone(),
            event_type: event.event_type,
            occurred_at: event.occurred_at,
        }
    }
}

/// Weight added per [`Severity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityWeights {
    pub low: u8,
    pub medium: u8,
    pub high: u8,
    pub critical: u8,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            low: 0,
            medium: 10,
            high: 20,
            critical: 30,
        }
    }
}

impl SeverityWeights {
    #[must_use]
    pub fn weight(&self, severity: Severity) -> u8 {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }
}

/// Tunable anomaly rules. Every field has a default, so a partial
/// `[anomaly]` config section is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyRules {
    /// Store-local offset from UTC used to evaluate business hours.
    pub utc_offset_minutes: i32,
    /// First business hour (inclusive, local time).
    pub business_hours_start: u32,
    /// End of business (exclusive, local time). May be smaller than
    /// `business_hours_start` for overnight stores.
    pub business_hours_end: u32,
    pub after_hours_weight: u8,

    pub frequency_window_minutes: i64,
    /// Same-type events allowed in the window before the rule fires.
    pub frequency_threshold: usize,
    pub frequency_weight: u8,

    pub severity_weights: SeverityWeights,

    pub watched_types: Vec<PosEventType>,
    pub watched_type_weight: u8,

    pub elevated_amount_cents: i64,
    pub elevated_amount_weight: u8,
    pub high_amount_cents: i64,
    pub high_amount_weight: u8,

    pub flag_threshold: u8,
}

impl Default for AnomalyRules {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            business_hours_start: 6,
            business_hours_end: 22,
            after_hours_weight: 25,
            frequency_window_minutes: 60,
            frequency_threshold: 5,
            frequency_weight: 30,
            severity_weights: SeverityWeights::default(),
            watched_types: vec![
                PosEventType::Void,
                PosEventType::Refund,
                PosEventType::NoSale,
                PosEventType::PriceOverride,
                PosEventType::DrawerOpen,
                PosEventType::Discount,
            ],
            watched_type_weight: 20,
            elevated_amount_cents: 50_000,
            elevated_amount_weight: 15,
            high_amount_cents: 100_000,
            high_amount_weight: 25,
            flag_threshold: 50,
        }
    }
}

impl AnomalyRules {
    /// Score `event`, fetched from `provider`, against the `history` of the
    /// same store.
    ///
    /// `history` may contain `event` itself; the sample with the same
    /// provider and `external_id` is skipped.
    #[must_use]
    pub fn assess(
        &self,
        provider: Provider,
        event: &FetchedEvent,
        history: &[EventSample],
    ) -> Assessment {
        let mut score: u32 = 0;
        let mut reasons = Vec::new();

        let local_hour = self.local_hour(event.occurred_at);
        if !self.is_business_hour(local_hour) {
            score += u32::from(self.after_hours_weight);
            reasons.push(AnomalyReason::AfterHours { local_hour });
        }

        let count = self.same_type_in_window(provider, event, history);
        if count > self.frequency_threshold {
            score += u32::from(self.frequency_weight);
            reasons.push(AnomalyReason::HighFrequency {
                count,
                window_minutes: self.frequency_window_minutes,
            });
        }

        let severity_weight = self.severity_weights.weight(event.severity);
        if severity_weight > 0 {
            score += u32::from(severity_weight);
            reasons.push(AnomalyReason::Severity {
                severity: event.severity,
            });
        }

        if self.watched_types.contains(&event.event_type) {
            score += u32::from(self.watched_type_weight);
            reasons.push(AnomalyReason::WatchedType {
                event_type: event.event_type,
            });
        }

        if let Some(amount_cents) = event.amount_cents.map(i64::saturating_abs) {
            if amount_cents >= self.high_amount_cents {
                score += u32::from(self.high_amount_weight);
                reasons.push(AnomalyReason::HighAmount { amount_cents });
            } else if amount_cents >= self.elevated_amount_cents {
                score += u32::from(self.elevated_amount_weight);
                reasons.push(AnomalyReason::ElevatedAmount { amount_cents });
            }
        }

        let score = u8::try_from(score.min(u32::from(MAX_SCORE))).unwrap_or(MAX_SCORE);
        Assessment {
            score,
            flagged: score >= self.flag_threshold,
            reasons,
        }
    }

    fn local_hour(&self, at: Timestamp) -> u32 {
        let offset = self
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or(Utc.fix());
        at.with_timezone(&offset).hour()
    }

    /// Start of the frequency window ending at `at`. Saturates at the
    /// earliest representable instant.
    #[must_use]
    pub fn window_start(&self, at: Timestamp) -> Timestamp {
        Duration::try_minutes(self.frequency_window_minutes)
            .and_then(|window| at.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn is_business_hour(&self, hour: u32) -> bool {
        let (start, end) = (self.business_hours_start, self.business_hours_end);
        if start <= end {
            (start..end).contains(&hour)
        } else {
            hour >= start || hour < end
        }
    }

    /// Same-type events in `(occurred_at - window, occurred_at]`, counting
    /// `event` itself.
    fn same_type_in_window(
        &self,
        provider: Provider,
        event: &FetchedEvent,
        history: &[EventSample],
    ) -> usize {
        let window_start = self.window_start(event.occurred_at);
        let others = history
            .iter()
            .filter(|sample| !sample.is(provider, &event.external_id))
            .filter(|sample| sample.event_type == event.event_type)
            .filter(|sample| sample.occurred_at > window_start && sample.occurred_at <= event.occurred_at)
            .count();
        others + 1
    }
}
