//! Integration logger: audit rows mirrored to the error tracker.

use tillguard_domain::error::TillguardError;
use tillguard_domain::id::StoreId;
use tillguard_domain::integration_log::{IntegrationLog, LogLevel, Page};
use tillguard_domain::outcome::error_chain;
use tillguard_domain::provider::Provider;

use crate::ports::{ErrorTracker, IntegrationLogRepository, TrackerContext};

/// Writes [`IntegrationLog`] rows and forwards each one to an
/// [`ErrorTracker`].
pub struct IntegrationLogger<LR, T> {
    repo: LR,
    tracker: T,
}

impl<LR, T> IntegrationLogger<LR, T>
where
    LR: IntegrationLogRepository + Send + Sync,
    T: ErrorTracker + Send + Sync,
{
    pub fn new(repo: LR, tracker: T) -> Self {
        Self { repo, tracker }
    }

    /// Record one log row.
    ///
    /// Never fails: when the row cannot be persisted the failure is
    /// reported to the tracker and the unsaved row is returned.
    pub async fn log(
        &self,
        store_id: StoreId,
        provider: Provider,
        level: LogLevel,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> IntegrationLog {
        let log = IntegrationLog::new(store_id, provider, level, message, details);
        let ctx = TrackerContext {
            store_id,
            provider,
            level,
        };
        match level {
            LogLevel::Info => self.tracker.breadcrumb(&log.message, &ctx, &log.details),
            LogLevel::Warn => self.tracker.capture_message(&log.message, &ctx, &log.details),
            LogLevel::Error => self
                .tracker
                .capture_exception(&log.message, &ctx, &log.details),
        }

        match self.repo.append(log.clone()).await {
            Ok(saved) => saved,
            Err(err) => {
                tracing::error!(
                    %store_id,
                    %provider,
                    error = %error_chain(&err),
                    "failed to persist integration log"
                );
                let ctx = TrackerContext {
                    level: LogLevel::Error,
                    ..ctx
                };
                self.tracker.capture_exception(
                    "failed to persist integration log",
                    &ctx,
                    &serde_json::json!({ "error": error_chain(&err), "message": log.message }),
                );
                log
            }
        }
    }

    /// Logs of a store, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the repository.
    pub async fn list(
        &self,
        store_id: StoreId,
        provider: Option<Provider>,
        page: Page,
    ) -> Result<Vec<IntegrationLog>, TillguardError> {
        self.repo.list(store_id, provider, page).await
    }
}
