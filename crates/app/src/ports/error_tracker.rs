//! Error tracker port: forwards integration logs to an external tracker.

use tillguard_domain::id::StoreId;
use tillguard_domain::integration_log::LogLevel;
use tillguard_domain::provider::Provider;

/// Tags attached to every tracker call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerContext {
    pub store_id: StoreId,
    pub provider: Provider,
    pub level: LogLevel,
}

/// Receives breadcrumbs and captures. Calls must not block.
pub trait ErrorTracker {
    /// Record a trail entry attached to later captures.
    fn breadcrumb(&self, message: &str, ctx: &TrackerContext, details: &serde_json::Value);

    /// Report a notable message.
    fn capture_message(&self, message: &str, ctx: &TrackerContext, details: &serde_json::Value);

    /// Report a failure.
    fn capture_exception(&self, message: &str, ctx: &TrackerContext, details: &serde_json::Value);
}

impl<T: ErrorTracker> ErrorTracker for std::sync::Arc<T> {
    fn breadcrumb(&self, message: &str, ctx: &TrackerContext, details: &serde_json::Value) {
        (**self).breadcrumb(message, ctx, details);
    }

    fn capture_message(&self, message: &str, ctx: &TrackerContext, details: &serde_json::Value) {
        (**self).capture_message(message, ctx, details);
    }

    fn capture_exception(&self, message: &str, ctx: &TrackerContext, details: &serde_json::Value) {
        (**self).capture_exception(message, ctx, details);
    }
}
