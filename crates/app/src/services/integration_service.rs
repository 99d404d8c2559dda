//! Integration service: connect, test, sync and disconnect provider
//! integrations for a store.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tillguard_domain::anomaly::{AnomalyRules, EventSample};
use tillguard_domain::context::StoreContext;
use tillguard_domain::credentials::{ConnectRequest, ProviderCredentials};
use tillguard_domain::error::{NotFoundError, TillguardError, TransitionError};
use tillguard_domain::id::StoreId;
use tillguard_domain::integration::{Integration, IntegrationStatus};
use tillguard_domain::integration_log::{IntegrationLog, LogLevel, Page};
use tillguard_domain::outcome::{ErrorInfo, OperationResult, SyncResult, error_chain};
use tillguard_domain::pos_event::{EventQuery, FetchedEvent, PosEvent};
use tillguard_domain::provider::Provider;
use tillguard_domain::retry::RetryPolicy;
use tillguard_domain::time::{now, sync_window_start};

use crate::ports::{
    CredentialCipher, ErrorTracker, IntegrationLogRepository, IntegrationRepository,
    IntegrationUseCases, PosEventStore, ProviderAdapter, ProviderRegistry,
};
use crate::retry::with_retry;
use crate::services::credential_vault::CredentialVault;
use crate::services::integration_logger::IntegrationLogger;
use crate::services::operation_locks::OperationLocks;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counts reported by a successful sync.
struct SyncSummary {
    events: usize,
    flagged: usize,
    details: serde_json::Value,
}

/// Orchestrates the vault, provider adapters, anomaly scoring and the
/// integration logger.
///
/// Every action on a (store, provider) pair holds that pair's lock for its
/// whole duration, so two actions on the same integration never interleave.
pub struct IntegrationService<R, C, LR, T, ES, P> {
    vault: CredentialVault<R, C>,
    logger: IntegrationLogger<LR, T>,
    events: ES,
    providers: P,
    rules: AnomalyRules,
    retry: RetryPolicy,
    locks: OperationLocks,
}

impl<R, C, LR, T, ES, P> IntegrationService<R, C, LR, T, ES, P>
where
    R: IntegrationRepository + Send + Sync,
    C: CredentialCipher + Send + Sync,
    LR: IntegrationLogRepository + Send + Sync,
    T: ErrorTracker + Send + Sync,
    ES: PosEventStore + Send + Sync,
    P: ProviderRegistry + Send + Sync,
{
    /// Create a service with default anomaly rules and no retries.
    pub fn new(
        vault: CredentialVault<R, C>,
        logger: IntegrationLogger<LR, T>,
        events: ES,
        providers: P,
    ) -> Self {
        Self {
            vault,
            logger,
            events,
            providers,
            rules: AnomalyRules::default(),
            retry: RetryPolicy::none(),
            locks: OperationLocks::default(),
        }
    }

    #[must_use]
    pub fn with_anomaly_rules(mut self, rules: AnomalyRules) -> Self {
        self.rules = rules;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn repo(&self) -> &R {
        self.vault.repository()
    }

    async fn require(
        &self,
        store_id: StoreId,
        provider: Provider,
    ) -> Result<Integration, TillguardError> {
        self.repo().get(store_id, provider).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Integration",
                id: provider.as_str().to_string(),
            }
            .into()
        })
    }

    /// Move a connected integration to `error` after a failed action.
    /// Other statuses are left as they are.
    async fn mark_error(&self, store_id: StoreId, provider: Provider) {
        let mut integration = match self.repo().get(store_id, provider).await {
            Ok(Some(integration)) if integration.is_connected() => integration,
            Ok(_) => return,
            Err(err) => {
                tracing::warn!(%store_id, %provider, error = %error_chain(&err), "failed to load integration");
                return;
            }
        };
        if integration.transition(IntegrationStatus::Error).is_err() {
            return;
        }
        if let Err(err) = self.repo().upsert(integration).await {
            tracing::warn!(%store_id, %provider, error = %error_chain(&err), "failed to mark integration as errored");
        }
    }

    async fn log_failure(
        &self,
        store_id: StoreId,
        provider: Provider,
        message: &str,
        err: &TillguardError,
    ) -> IntegrationLog {
        self.logger
            .log(
                store_id,
                provider,
                LogLevel::Error,
                format!("{message}: {}", error_chain(err)),
                serde_json::json!({ "error": ErrorInfo::from(err) }),
            )
            .await
    }

    async fn try_connect(
        &self,
        ctx: &StoreContext,
        provider: Provider,
        request: ConnectRequest,
    ) -> Result<Integration, TillguardError> {
        ctx.ensure_session()?;
        request.grant.validate_for(provider)?;

        let credentials = self.providers.adapter(provider).connect(&request).await?;
        credentials.validate_for(provider)?;

        let mut integration = self
            .vault
            .store_credentials(ctx, provider, &credentials)
            .await?;
        integration.transition(IntegrationStatus::Connected)?;
        if !request.config.is_null() {
            integration.config = request.config;
        }
        self.repo().upsert(integration).await
    }

    async fn try_test(
        &self,
        ctx: &StoreContext,
        provider: Provider,
    ) -> Result<serde_json::Value, TillguardError> {
        ctx.ensure_session()?;
        let integration = self.require(ctx.store_id(), provider).await?;
        let credentials = self.vault.get_credentials(ctx, provider).await?;

        let probe = match self.providers.adapter(provider).test(&credentials).await {
            Ok(probe) => probe,
            Err(failure) => {
                if let Some(refreshed) = &failure.refreshed {
                    self.store_refreshed(ctx, provider, refreshed).await?;
                }
                return Err(failure.error.into());
            }
        };

        let mut integration = match &probe.refreshed {
            Some(refreshed) => self.store_refreshed(ctx, provider, refreshed).await?,
            None => integration,
        };
        integration.transition(IntegrationStatus::Connected)?;
        self.repo().upsert(integration).await?;
        Ok(probe.details)
    }

    async fn store_refreshed(
        &self,
        ctx: &StoreContext,
        provider: Provider,
        refreshed: &ProviderCredentials,
    ) -> Result<Integration, TillguardError> {
        tracing::info!(store_id = %ctx.store_id(), %provider, "storing refreshed credentials");
        Ok(self.vault.store_credentials(ctx, provider, refreshed).await?)
    }

    async fn try_sync(
        &self,
        ctx: &StoreContext,
        provider: Provider,
    ) -> Result<SyncSummary, TillguardError> {
        ctx.ensure_session()?;
        let store_id = ctx.store_id();
        let integration = self.require(store_id, provider).await?;
        if !integration.is_connected() {
            return Err(TransitionError {
                from: integration.status,
                to: IntegrationStatus::Connected,
            }
            .into());
        }
        let credentials = self.vault.get_credentials(ctx, provider).await?;

        let started_at = now();
        let since = sync_window_start(integration.last_synced_at, started_at);
        let adapter = self.providers.adapter(provider);
        // A token rotated by a failed attempt is reused by the next one.
        let rotated: Mutex<Option<ProviderCredentials>> = Mutex::new(None);
        let (rotated_ref, credentials_ref) = (&rotated, &credentials);
        let outcome = with_retry(&self.retry, move || async move {
            let current = lock(rotated_ref)
                .clone()
                .unwrap_or_else(|| credentials_ref.clone());
            adapter.sync(&current, since).await.map_err(|failure| {
                if failure.refreshed.is_some() {
                    *lock(rotated_ref) = failure.refreshed;
                }
                failure.error
            })
        })
        .await;

        let rotated = rotated.into_inner().unwrap_or_else(PoisonError::into_inner);
        let refreshed = match &outcome {
            Ok(batch) => batch.refreshed.clone().or(rotated),
            Err(_) => rotated,
        };
        if let Some(refreshed) = &refreshed {
            self.store_refreshed(ctx, provider, refreshed).await?;
        }
        let batch = outcome?;

        let fetched = batch.events.len();
        let scored = self.score(store_id, provider, batch.events).await?;
        let flagged = scored.iter().filter(|event| event.flagged).count();
        let stored = self.events.store_batch(scored).await?;

        let mut integration = self.require(store_id, provider).await?;
        integration.record_sync(started_at);
        integration.transition(IntegrationStatus::Connected)?;
        self.repo().upsert(integration).await?;

        Ok(SyncSummary {
            events: fetched,
            flagged,
            details: serde_json::json!({
                "since": since,
                "events": fetched,
                "flagged": flagged,
                "new_events": stored,
                "provider": batch.details,
            }),
        })
    }

    /// Score a fetched batch against the store's recent history plus the
    /// batch itself.
    async fn score(
        &self,
        store_id: StoreId,
        provider: Provider,
        fetched: Vec<FetchedEvent>,
    ) -> Result<Vec<PosEvent>, TillguardError> {
        let Some(earliest) = fetched.iter().map(|event| event.occurred_at).min() else {
            return Ok(Vec::new());
        };
        let stored = self
            .events
            .recent_for_store(store_id, self.rules.window_start(earliest))
            .await?;

        let batch_ids: HashSet<&str> = fetched
            .iter()
            .map(|event| event.external_id.as_str())
            .collect();
        let mut history: Vec<EventSample> = stored
            .iter()
            .filter(|event| {
                !(event.provider == provider && batch_ids.contains(event.external_id.as_str()))
            })
            .map(EventSample::from)
            .collect();
        history.extend(fetched.iter().map(|event| EventSample::fetched(provider, event)));

        Ok(fetched
            .into_iter()
            .map(|event| {
                let assessment = self.rules.assess(provider, &event, &history);
                PosEvent::from_fetched(store_id, provider, event, assessment)
            })
            .collect())
    }

    async fn try_disconnect(
        &self,
        ctx: &StoreContext,
        provider: Provider,
    ) -> Result<(), TillguardError> {
        ctx.ensure_session()?;
        let store_id = ctx.store_id();
        let integration = self.require(store_id, provider).await?;
        if !integration
            .status
            .can_transition_to(IntegrationStatus::Disconnected)
        {
            return Err(TransitionError {
                from: integration.status,
                to: IntegrationStatus::Disconnected,
            }
            .into());
        }

        if integration.credentials_encrypted.is_some() {
            let revoked = match self.vault.get_credentials(ctx, provider).await {
                Ok(credentials) => self
                    .providers
                    .adapter(provider)
                    .disconnect(&credentials)
                    .await
                    .map_err(TillguardError::from),
                Err(err) => Err(err.into()),
            };
            if let Err(err) = revoked {
                self.logger
                    .log(
                        store_id,
                        provider,
                        LogLevel::Warn,
                        format!("Token revocation failed: {}", error_chain(&err)),
                        serde_json::json!({ "error": ErrorInfo::from(&err) }),
                    )
                    .await;
            }
        }

        self.vault.delete_credentials(ctx, provider).await?;
        let mut integration = self.require(store_id, provider).await?;
        integration.disconnect()?;
        self.repo().upsert(integration).await?;
        Ok(())
    }
}

impl<R, C, LR, T, ES, P> IntegrationUseCases for IntegrationService<R, C, LR, T, ES, P>
where
    R: IntegrationRepository + Send + Sync,
    C: CredentialCipher + Send + Sync,
    LR: IntegrationLogRepository + Send + Sync,
    T: ErrorTracker + Send + Sync,
    ES: PosEventStore + Send + Sync,
    P: ProviderRegistry + Send + Sync,
{
    async fn get_integrations(
        &self,
        ctx: &StoreContext,
    ) -> Result<Vec<Integration>, TillguardError> {
        ctx.ensure_session()?;
        self.repo().list_for_store(ctx.store_id()).await
    }

    async fn get_integration(
        &self,
        ctx: &StoreContext,
        provider: Provider,
    ) -> Result<Integration, TillguardError> {
        ctx.ensure_session()?;
        self.require(ctx.store_id(), provider).await
    }

    fn authorization_url(
        &self,
        ctx: &StoreContext,
        provider: Provider,
        redirect_uri: &str,
    ) -> Result<String, TillguardError> {
        ctx.ensure_session()?;
        let state = ctx.store_id().to_string();
        Ok(self
            .providers
            .adapter(provider)
            .authorization_url(redirect_uri, &state)?)
    }

    async fn connect(
        &self,
        ctx: &StoreContext,
        provider: Provider,
        request: ConnectRequest,
    ) -> OperationResult {
        let store_id = ctx.store_id();
        let _guard = self.locks.acquire(store_id, provider).await;

        match self.try_connect(ctx, provider, request).await {
            Ok(integration) => {
                let message = format!("Connected to {}", provider.display_name());
                tracing::info!(%store_id, %provider, "integration connected");
                self.logger
                    .log(
                        store_id,
                        provider,
                        LogLevel::Info,
                        message.clone(),
                        serde_json::json!({ "integration_id": integration.id }),
                    )
                    .await;
                OperationResult::ok(message)
            }
            Err(err) => {
                self.mark_error(store_id, provider).await;
                let log = self
                    .log_failure(
                        store_id,
                        provider,
                        &format!("Failed to connect to {}", provider.display_name()),
                        &err,
                    )
                    .await;
                OperationResult::failed(log.message, &err)
            }
        }
    }

    async fn test_connection(&self, ctx: &StoreContext, provider: Provider) -> OperationResult {
        let store_id = ctx.store_id();
        let _guard = self.locks.acquire(store_id, provider).await;

        match self.try_test(ctx, provider).await {
            Ok(details) => {
                let message = format!("Connection to {} is working", provider.display_name());
                self.logger
                    .log(store_id, provider, LogLevel::Info, message.clone(), details)
                    .await;
                OperationResult::ok(message)
            }
            Err(err) => {
                self.mark_error(store_id, provider).await;
                let log = self
                    .log_failure(store_id, provider, "Connection test failed", &err)
                    .await;
                OperationResult::failed(log.message, &err)
            }
        }
    }

    async fn sync(&self, ctx: &StoreContext, provider: Provider) -> SyncResult {
        let store_id = ctx.store_id();
        let _guard = self.locks.acquire(store_id, provider).await;

        match self.try_sync(ctx, provider).await {
            Ok(summary) => {
                let message = format!(
                    "Synced {} events from {} ({} flagged)",
                    summary.events,
                    provider.display_name(),
                    summary.flagged
                );
                tracing::info!(
                    %store_id,
                    %provider,
                    events = summary.events,
                    flagged = summary.flagged,
                    "sync finished"
                );
                self.logger
                    .log(
                        store_id,
                        provider,
                        LogLevel::Info,
                        message.clone(),
                        summary.details.clone(),
                    )
                    .await;
                SyncResult::ok(message, summary.events, summary.flagged, summary.details)
            }
            Err(err) => {
                self.mark_error(store_id, provider).await;
                let log = self
                    .log_failure(store_id, provider, "Sync failed", &err)
                    .await;
                SyncResult::failed(log.message, &err)
            }
        }
    }

    async fn disconnect(&self, ctx: &StoreContext, provider: Provider) -> OperationResult {
        let store_id = ctx.store_id();
        let _guard = self.locks.acquire(store_id, provider).await;

        match self.try_disconnect(ctx, provider).await {
            Ok(()) => {
                let message = format!("Disconnected from {}", provider.display_name());
                self.logger
                    .log(
                        store_id,
                        provider,
                        LogLevel::Info,
                        message.clone(),
                        serde_json::json!({}),
                    )
                    .await;
                OperationResult::ok(message)
            }
            Err(err) => {
                let log = self
                    .log_failure(
                        store_id,
                        provider,
                        &format!("Failed to disconnect from {}", provider.display_name()),
                        &err,
                    )
                    .await;
                OperationResult::failed(log.message, &err)
            }
        }
    }

    async fn get_logs(
        &self,
        ctx: &StoreContext,
        provider: Option<Provider>,
        page: Page,
    ) -> Result<Vec<IntegrationLog>, TillguardError> {
        ctx.ensure_session()?;
        self.logger.list(ctx.store_id(), provider, page).await
    }

    async fn get_events(
        &self,
        ctx: &StoreContext,
        query: EventQuery,
    ) -> Result<Vec<PosEvent>, TillguardError> {
        ctx.ensure_session()?;
        self.events.list(ctx.store_id(), query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{Probe, ProviderFailure, SyncBatch};
    use crate::test_support::{
        FakeRegistry, InMemoryEventStore, InMemoryIntegrationRepo, InMemoryLogRepo, PlainCipher,
        RecordingTracker,
    };
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use std::time::Duration;
    use tillguard_domain::credentials::{
        ConnectGrant, OAuthCredentials, OnPremCredentials, ProviderCredentials,
    };
    use tillguard_domain::error::ProviderError;
    use tillguard_domain::anomaly::AnomalyReason;
    use tillguard_domain::outcome::ErrorKind;
    use tillguard_domain::pos_event::PosEventType;

    type TestService = IntegrationService<
        Arc<InMemoryIntegrationRepo>,
        PlainCipher,
        Arc<InMemoryLogRepo>,
        Arc<RecordingTracker>,
        Arc<InMemoryEventStore>,
        Arc<FakeRegistry>,
    >;

    struct Harness {
        service: TestService,
        repo: Arc<InMemoryIntegrationRepo>,
        logs: Arc<InMemoryLogRepo>,
        events: Arc<InMemoryEventStore>,
        providers: Arc<FakeRegistry>,
        ctx: StoreContext,
    }

    impl Harness {
        fn new() -> Self {
            let repo = Arc::new(InMemoryIntegrationRepo::default());
            let logs = Arc::new(InMemoryLogRepo::default());
            let events = Arc::new(InMemoryEventStore::default());
            let providers = Arc::new(FakeRegistry::default());
            let service = IntegrationService::new(
                CredentialVault::new(Arc::clone(&repo), PlainCipher),
                IntegrationLogger::new(Arc::clone(&logs), Arc::new(RecordingTracker::default())),
                Arc::clone(&events),
                Arc::clone(&providers),
            );
            Self {
                service,
                repo,
                logs,
                events,
                providers,
                ctx: StoreContext::new(StoreId::new(), "session-token"),
            }
        }

        fn vault(&self) -> CredentialVault<Arc<InMemoryIntegrationRepo>, PlainCipher> {
            CredentialVault::new(Arc::clone(&self.repo), PlainCipher)
        }

        fn row(&self, provider: Provider) -> Option<Integration> {
            self.repo.row(self.ctx.store_id(), provider)
        }

        fn last_log(&self) -> IntegrationLog {
            self.logs.all().pop().unwrap()
        }

        async fn connect(&self, provider: Provider) -> OperationResult {
            self.service
                .connect(&self.ctx, provider, request_for(provider))
                .await
        }
    }

    fn request_for(provider: Provider) -> ConnectRequest {
        let grant = match provider {
            Provider::Aloha => ConnectGrant::Credentials {
                credentials: ProviderCredentials::Aloha(OnPremCredentials {
                    host: "10.0.0.5".to_string(),
                    port: 8080,
                    site_id: "7".to_string(),
                    username: "manager".to_string(),
                    password: "secret".to_string(),
                }),
            },
            _ => ConnectGrant::AuthorizationCode {
                code: "code-123".to_string(),
                redirect_uri: "https://app.example/callback".to_string(),
                merchant_id: Some("MERCHANT".to_string()),
            },
        };
        ConnectRequest {
            grant,
            config: serde_json::Value::Null,
        }
    }

    fn api_error(status: u16) -> ProviderError {
        ProviderError::Api {
            provider: Provider::Square,
            status,
            message: "boom".to_string(),
        }
    }

    fn at(hour: u32, minute: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn should_connect_and_log_info_when_code_is_valid() {
        let h = Harness::new();

        let result = h.connect(Provider::Square).await;

        assert!(result.success, "{result:?}");
        let row = h.row(Provider::Square).unwrap();
        assert_eq!(row.status, IntegrationStatus::Connected);
        assert!(row.credentials_encrypted.is_some());
        let log = h.last_log();
        assert_eq!(log.level, LogLevel::Info);
        assert_eq!(log.message, "Connected to Square");
    }

    #[tokio::test]
    async fn should_not_create_row_when_first_connect_fails() {
        let h = Harness::new();
        h.providers
            .square
            .connect_results
            .lock()
            .unwrap()
            .push_back(Err(api_error(400)));

        let result = h.connect(Provider::Square).await;

        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind, ErrorKind::Provider);
        assert!(h.row(Provider::Square).is_none());
        let log = h.last_log();
        assert_eq!(log.level, LogLevel::Error);
        assert!(log.message.starts_with("Failed to connect to Square"));
    }

    #[tokio::test]
    async fn should_mark_error_when_reconnect_of_connected_integration_fails() {
        let h = Harness::new();
        assert!(h.connect(Provider::Clover).await.success);
        h.providers
            .clover
            .connect_results
            .lock()
            .unwrap()
            .push_back(Err(api_error(401)));

        let result = h.connect(Provider::Clover).await;

        assert!(!result.success);
        assert_eq!(h.row(Provider::Clover).unwrap().status, IntegrationStatus::Error);
    }

    #[tokio::test]
    async fn should_reject_mismatched_grant_before_calling_vendor() {
        let h = Harness::new();

        let result = h
            .service
            .connect(&h.ctx, Provider::Aloha, request_for(Provider::Square))
            .await;

        assert_eq!(result.error.unwrap().kind, ErrorKind::Validation);
        assert!(h.row(Provider::Aloha).is_none());
    }

    #[tokio::test]
    async fn should_report_session_expired_when_token_is_blank() {
        let h = Harness::new();
        let ctx = StoreContext::new(h.ctx.store_id(), "");

        let result = h
            .service
            .connect(&ctx, Provider::Square, request_for(Provider::Square))
            .await;

        assert!(result.is_session_expired());
        assert!(h.row(Provider::Square).is_none());
    }

    #[tokio::test]
    async fn should_keep_config_from_connect_request() {
        let h = Harness::new();
        let mut request = request_for(Provider::Aloha);
        request.config = serde_json::json!({"poll_terminals": ["1", "2"]});

        let result = h.service.connect(&h.ctx, Provider::Aloha, request).await;

        assert!(result.success);
        assert_eq!(
            h.row(Provider::Aloha).unwrap().config["poll_terminals"][1],
            "2"
        );
    }

    #[tokio::test]
    async fn should_store_refreshed_credentials_after_test() {
        let h = Harness::new();
        h.connect(Provider::Square).await;
        let refreshed = ProviderCredentials::Square(OAuthCredentials {
            access_token: "fresh".to_string(),
            refresh_token: Some("fresh-refresh".to_string()),
            expires_at: None,
            merchant_id: None,
        });
        h.providers
            .square
            .test_results
            .lock()
            .unwrap()
            .push_back(Ok(Probe {
                refreshed: Some(refreshed.clone()),
                details: serde_json::json!({}),
            }));

        let result = h.service.test_connection(&h.ctx, Provider::Square).await;

        assert!(result.success);
        let stored = h
            .vault()
            .get_credentials(&h.ctx, Provider::Square)
            .await
            .unwrap();
        assert_eq!(stored, refreshed);
    }

    fn rotated_square() -> ProviderCredentials {
        ProviderCredentials::Square(OAuthCredentials {
            access_token: "rotated".to_string(),
            refresh_token: Some("rotated-refresh".to_string()),
            expires_at: None,
            merchant_id: None,
        })
    }

    #[tokio::test]
    async fn should_store_rotated_credentials_when_test_fails_after_refresh() {
        let h = Harness::new();
        h.connect(Provider::Square).await;
        h.providers
            .square
            .test_results
            .lock()
            .unwrap()
            .push_back(Err(ProviderFailure {
                error: api_error(503),
                refreshed: Some(rotated_square()),
            }));

        let result = h.service.test_connection(&h.ctx, Provider::Square).await;

        assert!(!result.success);
        assert_eq!(h.row(Provider::Square).unwrap().status, IntegrationStatus::Error);
        let stored = h
            .vault()
            .get_credentials(&h.ctx, Provider::Square)
            .await
            .unwrap();
        assert_eq!(stored, rotated_square());
    }

    #[tokio::test]
    async fn should_reuse_rotated_credentials_across_retries_and_keep_them_on_failure() {
        let mut h = Harness::new();
        h.service = h.service.with_retry_policy(RetryPolicy::exponential(
            3,
            Duration::from_millis(1),
            Duration::from_millis(2),
        ));
        h.connect(Provider::Square).await;
        let original = h
            .vault()
            .get_credentials(&h.ctx, Provider::Square)
            .await
            .unwrap();
        h.providers.square.sync_results.lock().unwrap().extend([
            Err(ProviderFailure {
                error: api_error(503),
                refreshed: Some(rotated_square()),
            }),
            Err(api_error(503).into()),
            Err(api_error(503).into()),
        ]);

        let result = h.service.sync(&h.ctx, Provider::Square).await;

        assert!(!result.success);
        let used = h.providers.square.synced_with.lock().unwrap().clone();
        assert_eq!(used, vec![original, rotated_square(), rotated_square()]);
        let stored = h
            .vault()
            .get_credentials(&h.ctx, Provider::Square)
            .await
            .unwrap();
        assert_eq!(stored, rotated_square());
        assert_eq!(h.row(Provider::Square).unwrap().status, IntegrationStatus::Error);
        assert!(h.row(Provider::Square).unwrap().last_synced_at.is_none());
    }

    #[tokio::test]
    async fn should_store_credentials_rotated_by_an_earlier_attempt_when_retry_succeeds() {
        let mut h = Harness::new();
        h.service = h.service.with_retry_policy(RetryPolicy::exponential(
            2,
            Duration::from_millis(1),
            Duration::from_millis(2),
        ));
        h.connect(Provider::Square).await;
        h.providers.square.sync_results.lock().unwrap().extend([
            Err(ProviderFailure {
                error: api_error(502),
                refreshed: Some(rotated_square()),
            }),
            Ok(SyncBatch::default()),
        ]);

        let result = h.service.sync(&h.ctx, Provider::Square).await;

        assert!(result.success, "{result:?}");
        let stored = h
            .vault()
            .get_credentials(&h.ctx, Provider::Square)
            .await
            .unwrap();
        assert_eq!(stored, rotated_square());
    }

    #[tokio::test]
    async fn should_move_between_error_and_connected_on_test_results() {
        let h = Harness::new();
        h.connect(Provider::Square).await;
        h.providers
            .square
            .test_results
            .lock()
            .unwrap()
            .push_back(Err(ProviderError::RefreshFailed(Box::new(
                ProviderError::TokenExpired,
            ))
            .into()));

        let failed = h.service.test_connection(&h.ctx, Provider::Square).await;
        assert!(!failed.success);
        assert_eq!(h.row(Provider::Square).unwrap().status, IntegrationStatus::Error);

        let recovered = h.service.test_connection(&h.ctx, Provider::Square).await;
        assert!(recovered.success);
        assert_eq!(
            h.row(Provider::Square).unwrap().status,
            IntegrationStatus::Connected
        );
    }

    #[tokio::test]
    async fn should_never_sync_disconnected_integration_back_to_connected() {
        let h = Harness::new();
        h.connect(Provider::Clover).await;
        assert!(h.service.disconnect(&h.ctx, Provider::Clover).await.success);

        let result = h.service.sync(&h.ctx, Provider::Clover).await;

        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind, ErrorKind::InvalidState);
        assert_eq!(
            h.row(Provider::Clover).unwrap().status,
            IntegrationStatus::Disconnected
        );
    }

    #[tokio::test]
    async fn should_score_store_and_record_sync_when_successful() {
        let h = Harness::new();
        h.connect(Provider::Square).await;
        h.providers
            .square
            .sync_results
            .lock()
            .unwrap()
            .push_back(Ok(SyncBatch {
                events: vec![
                    FetchedEvent::new("pay-1", PosEventType::Sale, at(12, 0)).amount_cents(1_500),
                    FetchedEvent::new("void-1", PosEventType::Void, at(23, 30))
                        .amount_cents(120_000),
                ],
                refreshed: None,
                details: serde_json::json!({"locations": 1}),
            }));

        let result = h.service.sync(&h.ctx, Provider::Square).await;

        assert!(result.success, "{result:?}");
        assert_eq!(result.events_count, 2);
        assert_eq!(result.flagged_count, 1);
        let stored = h.events.all();
        assert_eq!(stored.len(), 2);
        let void = stored.iter().find(|e| e.external_id == "void-1").unwrap();
        assert!(void.flagged);
        assert_eq!(void.anomaly_score, 90);
        let row = h.row(Provider::Square).unwrap();
        assert!(row.last_synced_at.is_some());
        assert_eq!(row.status, IntegrationStatus::Connected);
    }

    #[tokio::test]
    async fn should_not_duplicate_events_when_window_is_resynced() {
        let h = Harness::new();
        h.connect(Provider::Square).await;
        for _ in 0..2 {
            h.providers
                .square
                .sync_results
                .lock()
                .unwrap()
                .push_back(Ok(SyncBatch {
                    events: vec![FetchedEvent::new("pay-1", PosEventType::Sale, at(12, 0))],
                    ..SyncBatch::default()
                }));
        }

        h.service.sync(&h.ctx, Provider::Square).await;
        let second = h.service.sync(&h.ctx, Provider::Square).await;

        assert!(second.success);
        assert_eq!(second.details["new_events"], 0);
        assert_eq!(h.events.all().len(), 1);
    }

    #[tokio::test]
    async fn should_count_other_provider_event_with_same_external_id_in_window() {
        let mut h = Harness::new();
        h.service = h.service.with_anomaly_rules(AnomalyRules {
            frequency_threshold: 1,
            ..AnomalyRules::default()
        });
        h.connect(Provider::Clover).await;
        h.connect(Provider::Square).await;
        h.providers
            .clover
            .sync_results
            .lock()
            .unwrap()
            .push_back(Ok(SyncBatch {
                events: vec![FetchedEvent::new("1001", PosEventType::Sale, at(12, 0))],
                ..SyncBatch::default()
            }));
        h.providers
            .square
            .sync_results
            .lock()
            .unwrap()
            .push_back(Ok(SyncBatch {
                events: vec![FetchedEvent::new("1001", PosEventType::Sale, at(12, 5))],
                ..SyncBatch::default()
            }));

        assert!(h.service.sync(&h.ctx, Provider::Clover).await.success);
        assert!(h.service.sync(&h.ctx, Provider::Square).await.success);

        let square = h
            .events
            .all()
            .into_iter()
            .find(|event| event.provider == Provider::Square)
            .unwrap();
        assert!(square.reasons.contains(&AnomalyReason::HighFrequency {
            count: 2,
            window_minutes: 60,
        }));
    }

    #[tokio::test]
    async fn should_mark_error_when_sync_fails() {
        let h = Harness::new();
        h.connect(Provider::Square).await;
        h.providers
            .square
            .sync_results
            .lock()
            .unwrap()
            .push_back(Err(api_error(500).into()));

        let result = h.service.sync(&h.ctx, Provider::Square).await;

        assert!(!result.success);
        assert_eq!(h.row(Provider::Square).unwrap().status, IntegrationStatus::Error);
        assert!(h.row(Provider::Square).unwrap().last_synced_at.is_none());
        assert_eq!(h.last_log().level, LogLevel::Error);
    }

    #[tokio::test]
    async fn should_retry_transient_sync_failures_with_policy() {
        let mut h = Harness::new();
        h.service = h.service.with_retry_policy(RetryPolicy::exponential(
            3,
            Duration::from_millis(1),
            Duration::from_millis(2),
        ));
        h.connect(Provider::Square).await;
        h.providers
            .square
            .sync_results
            .lock()
            .unwrap()
            .extend([Err(api_error(503).into()), Ok(SyncBatch::default())]);

        let result = h.service.sync(&h.ctx, Provider::Square).await;

        assert!(result.success, "{result:?}");
        assert_eq!(h.providers.square.sync_windows.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn should_order_logs_and_last_synced_at_when_syncs_race() {
        let h = Harness::new();
        h.connect(Provider::Square).await;
        h.providers
            .square
            .sync_delays
            .lock()
            .unwrap()
            .extend([Duration::from_millis(30), Duration::ZERO]);

        let (first, second) = tokio::join!(
            h.service.sync(&h.ctx, Provider::Square),
            h.service.sync(&h.ctx, Provider::Square)
        );
        assert!(first.success && second.success);

        let windows = h.providers.square.sync_windows.lock().unwrap().clone();
        assert_eq!(windows.len(), 2);
        assert!(windows[1] > windows[0], "second sync started from the first");

        let sync_logs: Vec<IntegrationLog> = h
            .logs
            .all()
            .into_iter()
            .filter(|log| log.message.starts_with("Synced"))
            .collect();
        assert_eq!(sync_logs.len(), 2);
        assert!(sync_logs[0].timestamp <= sync_logs[1].timestamp);
        assert!(h.row(Provider::Square).unwrap().last_synced_at.unwrap() >= windows[1]);
    }

    #[tokio::test]
    async fn should_fail_get_credentials_after_disconnect_for_every_provider() {
        let h = Harness::new();
        for provider in Provider::ALL {
            assert!(h.connect(provider).await.success);

            let result = h.service.disconnect(&h.ctx, provider).await;

            assert!(result.success, "{result:?}");
            let row = h.row(provider).unwrap();
            assert_eq!(row.status, IntegrationStatus::Disconnected);
            assert!(row.credentials_encrypted.is_none());
            assert!(h.vault().get_credentials(&h.ctx, provider).await.is_err());
        }
    }

    #[tokio::test]
    async fn should_disconnect_and_warn_when_revoke_fails() {
        let h = Harness::new();
        h.connect(Provider::Square).await;
        h.providers
            .square
            .disconnect_results
            .lock()
            .unwrap()
            .push_back(Err(api_error(503)));

        let result = h.service.disconnect(&h.ctx, Provider::Square).await;

        assert!(result.success);
        assert_eq!(h.providers.square.revoked.lock().unwrap().len(), 1);
        let levels: Vec<LogLevel> = h.logs.all().iter().map(|log| log.level).collect();
        assert_eq!(levels, vec![LogLevel::Info, LogLevel::Warn, LogLevel::Info]);
    }

    #[tokio::test]
    async fn should_refuse_to_disconnect_pending_integration() {
        let h = Harness::new();
        h.repo
            .insert(Integration::new(h.ctx.store_id(), Provider::Square));

        let result = h.service.disconnect(&h.ctx, Provider::Square).await;

        assert_eq!(result.error.unwrap().kind, ErrorKind::InvalidState);
        assert_eq!(
            h.row(Provider::Square).unwrap().status,
            IntegrationStatus::Pending
        );
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_integration() {
        let h = Harness::new();
        let err = h
            .service
            .get_integration(&h.ctx, Provider::Aloha)
            .await
            .unwrap_err();
        assert!(matches!(err, TillguardError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_list_only_flagged_events_when_requested() {
        let h = Harness::new();
        h.connect(Provider::Square).await;
        h.providers
            .square
            .sync_results
            .lock()
            .unwrap()
            .push_back(Ok(SyncBatch {
                events: vec![
                    FetchedEvent::new("a", PosEventType::Sale, at(12, 0)),
                    FetchedEvent::new("b", PosEventType::PriceOverride, at(2, 0))
                        .amount_cents(200_000),
                ],
                ..SyncBatch::default()
            }));
        h.service.sync(&h.ctx, Provider::Square).await;

        let flagged = h
            .service
            .get_events(
                &h.ctx,
                EventQuery {
                    flagged_only: true,
                    ..EventQuery::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].external_id, "b");
    }

    #[tokio::test]
    async fn should_pass_store_as_oauth_state() {
        let h = Harness::new();
        let url = h
            .service
            .authorization_url(&h.ctx, Provider::Square, "https://app.example/cb")
            .unwrap();
        assert!(url.ends_with(&format!("state={}", h.ctx.store_id())));
    }
}
