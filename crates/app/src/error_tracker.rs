//! Error tracker that forwards to `tracing`.

use tracing::{debug, error, warn};

use crate::ports::{ErrorTracker, TrackerContext};

/// [`ErrorTracker`] writing breadcrumbs at `debug`, messages at `warn` and
/// exceptions at `error`, tagged with the store, provider and level.
///
/// Used when no external tracker is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorTracker;

impl ErrorTracker for TracingErrorTracker {
    fn breadcrumb(&self, message: &str, ctx: &TrackerContext, details: &serde_json::Value) {
        debug!(
            store_id = %ctx.store_id,
            provider = %ctx.provider,
            level = %ctx.level,
            %details,
            "{message}"
        );
    }

    fn capture_message(&self, message: &str, ctx: &TrackerContext, details: &serde_json::Value) {
        warn!(
            store_id = %ctx.store_id,
            provider = %ctx.provider,
            level = %ctx.level,
            %details,
            "{message}"
        );
    }

    fn capture_exception(&self, message: &str, ctx: &TrackerContext, details: &serde_json::Value) {
        error!(
            store_id = %ctx.store_id,
            provider = %ctx.provider,
            level = %ctx.level,
            %details,
            "{message}"
        );
    }
}
