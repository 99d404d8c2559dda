//! In-memory port implementations shared by the service tests.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tillguard_domain::context::StoreContext;
use tillguard_domain::credentials::{
    ConnectGrant, ConnectRequest, OAuthCredentials, ProviderCredentials,
};
use tillguard_domain::error::{ProviderError, TillguardError, VaultError};
use tillguard_domain::id::StoreId;
use tillguard_domain::integration::Integration;
use tillguard_domain::integration_log::{IntegrationLog, Page};
use tillguard_domain::pos_event::{EventQuery, PosEvent};
use tillguard_domain::provider::Provider;
use tillguard_domain::time::Timestamp;

use crate::ports::{
    CredentialCipher, ErrorTracker, IntegrationLogRepository, IntegrationRepository,
    PosEventStore, Probe, ProviderAdapter, ProviderFailure, ProviderRegistry, SyncBatch,
    TrackerContext,
};

#[derive(Default)]
pub struct InMemoryIntegrationRepo {
    rows: Mutex<HashMap<(StoreId, Provider), Integration>>,
}

impl InMemoryIntegrationRepo {
    pub fn insert(&self, integration: Integration) {
        self.rows
            .lock()
            .unwrap()
            .insert((integration.store_id, integration.provider), integration);
    }

    pub fn row(&self, store_id: StoreId, provider: Provider) -> Option<Integration> {
        self.rows.lock().unwrap().get(&(store_id, provider)).cloned()
    }
}

impl IntegrationRepository for InMemoryIntegrationRepo {
    fn list_for_store(
        &self,
        store_id: StoreId,
    ) -> impl Future<Output = Result<Vec<Integration>, TillguardError>> + Send {
        let rows = self.rows.lock().unwrap();
        let mut result: Vec<Integration> = rows
            .values()
            .filter(|row| row.store_id == store_id)
            .cloned()
            .collect();
        result.sort_by_key(|row| row.provider);
        async { Ok(result) }
    }

    fn get(
        &self,
        store_id: StoreId,
        provider: Provider,
    ) -> impl Future<Output = Result<Option<Integration>, TillguardError>> + Send {
        let result = self.row(store_id, provider);
        async { Ok(result) }
    }

    fn upsert(
        &self,
        mut integration: Integration,
    ) -> impl Future<Output = Result<Integration, TillguardError>> + Send {
        let mut rows = self.rows.lock().unwrap();
        let key = (integration.store_id, integration.provider);
        if let Some(existing) = rows.get(&key) {
            integration.id = existing.id;
            integration.created_at = existing.created_at;
        }
        rows.insert(key, integration.clone());
        async { Ok(integration) }
    }
}

#[derive(Default)]
pub struct InMemoryLogRepo {
    rows: Mutex<Vec<IntegrationLog>>,
    pub fail_appends: AtomicBool,
}

impl InMemoryLogRepo {
    pub fn all(&self) -> Vec<IntegrationLog> {
        self.rows.lock().unwrap().clone()
    }
}

impl IntegrationLogRepository for InMemoryLogRepo {
    fn append(
        &self,
        log: IntegrationLog,
    ) -> impl Future<Output = Result<IntegrationLog, TillguardError>> + Send {
        let result = if self.fail_appends.load(Ordering::SeqCst) {
            Err(TillguardError::Storage("disk full".into()))
        } else {
            self.rows.lock().unwrap().push(log.clone());
            Ok(log)
        };
        async { result }
    }

    fn list(
        &self,
        store_id: StoreId,
        provider: Option<Provider>,
        page: Page,
    ) -> impl Future<Output = Result<Vec<IntegrationLog>, TillguardError>> + Send {
        let rows = self.rows.lock().unwrap();
        let result: Vec<IntegrationLog> = rows
            .iter()
            .rev()
            .filter(|log| log.store_id == store_id)
            .filter(|log| provider.is_none_or(|p| log.provider == p))
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect();
        async { Ok(result) }
    }
}

#[derive(Default)]
pub struct InMemoryEventStore {
    rows: Mutex<Vec<PosEvent>>,
}

impl InMemoryEventStore {
    pub fn all(&self) -> Vec<PosEvent> {
        self.rows.lock().unwrap().clone()
    }
}

impl PosEventStore for InMemoryEventStore {
    fn store_batch(
        &self,
        events: Vec<PosEvent>,
    ) -> impl Future<Output = Result<usize, TillguardError>> + Send {
        let mut rows = self.rows.lock().unwrap();
        let mut inserted = 0;
        for event in events {
            let duplicate = rows.iter().any(|row| {
                row.store_id == event.store_id
                    && row.provider == event.provider
                    && row.external_id == event.external_id
            });
            if !duplicate {
                rows.push(event);
                inserted += 1;
            }
        }
        async move { Ok(inserted) }
    }

    fn recent_for_store(
        &self,
        store_id: StoreId,
        since: Timestamp,
    ) -> impl Future<Output = Result<Vec<PosEvent>, TillguardError>> + Send {
        let rows = self.rows.lock().unwrap();
        let result: Vec<PosEvent> = rows
            .iter()
            .filter(|row| row.store_id == store_id && row.occurred_at >= since)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn list(
        &self,
        store_id: StoreId,
        query: EventQuery,
    ) -> impl Future<Output = Result<Vec<PosEvent>, TillguardError>> + Send {
        let rows = self.rows.lock().unwrap();
        let mut result: Vec<PosEvent> = rows
            .iter()
            .filter(|row| row.store_id == store_id)
            .filter(|row| query.provider.is_none_or(|p| row.provider == p))
            .filter(|row| !query.flagged_only || row.flagged)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        let result = result
            .into_iter()
            .skip(query.page.offset)
            .take(query.page.limit)
            .collect();
        async { Ok(result) }
    }
}

/// Reversible, binding-aware stand-in for a real cipher.
#[derive(Default)]
pub struct PlainCipher;

impl PlainCipher {
    fn prefix(ctx: &StoreContext, provider: Provider) -> String {
        format!("sealed:{}:{provider}:", ctx.store_id())
    }
}

impl CredentialCipher for PlainCipher {
    fn encrypt(
        &self,
        ctx: &StoreContext,
        provider: Provider,
        plaintext: &[u8],
    ) -> Result<String, VaultError> {
        let body = std::str::from_utf8(plaintext).map_err(|err| VaultError::Store(err.into()))?;
        Ok(format!("{}{body}", Self::prefix(ctx, provider)))
    }

    fn decrypt(
        &self,
        ctx: &StoreContext,
        provider: Provider,
        ciphertext: &str,
    ) -> Result<Vec<u8>, VaultError> {
        ciphertext
            .strip_prefix(&Self::prefix(ctx, provider))
            .map(|body| body.as_bytes().to_vec())
            .ok_or_else(|| VaultError::Access("blob bound to another integration".into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerCall {
    Breadcrumb,
    Message,
    Exception,
}

#[derive(Default)]
pub struct RecordingTracker {
    calls: Mutex<Vec<(TrackerCall, String, TrackerContext)>>,
}

impl RecordingTracker {
    pub fn calls(&self) -> Vec<(TrackerCall, String, TrackerContext)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: TrackerCall, message: &str, ctx: &TrackerContext) {
        self.calls
            .lock()
            .unwrap()
            .push((call, message.to_string(), *ctx));
    }
}

impl ErrorTracker for RecordingTracker {
    fn breadcrumb(&self, message: &str, ctx: &TrackerContext, _details: &serde_json::Value) {
        self.record(TrackerCall::Breadcrumb, message, ctx);
    }

    fn capture_message(&self, message: &str, ctx: &TrackerContext, _details: &serde_json::Value) {
        self.record(TrackerCall::Message, message, ctx);
    }

    fn capture_exception(&self, message: &str, ctx: &TrackerContext, _details: &serde_json::Value) {
        self.record(TrackerCall::Exception, message, ctx);
    }
}

/// Scripted adapter: queued results are consumed first, then a successful
/// default answer is returned.
pub struct FakeAdapter {
    provider: Provider,
    pub connect_results: Mutex<VecDeque<Result<ProviderCredentials, ProviderError>>>,
    pub test_results: Mutex<VecDeque<Result<Probe, ProviderFailure>>>,
    pub sync_results: Mutex<VecDeque<Result<SyncBatch, ProviderFailure>>>,
    pub disconnect_results: Mutex<VecDeque<Result<(), ProviderError>>>,
    pub sync_delays: Mutex<VecDeque<Duration>>,
    pub sync_windows: Mutex<Vec<Timestamp>>,
    pub synced_with: Mutex<Vec<ProviderCredentials>>,
    pub revoked: Mutex<Vec<ProviderCredentials>>,
}

impl FakeAdapter {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            connect_results: Mutex::default(),
            test_results: Mutex::default(),
            sync_results: Mutex::default(),
            disconnect_results: Mutex::default(),
            sync_delays: Mutex::default(),
            sync_windows: Mutex::default(),
            synced_with: Mutex::default(),
            revoked: Mutex::default(),
        }
    }

    fn credentials_for(&self, request: &ConnectRequest) -> ProviderCredentials {
        match &request.grant {
            ConnectGrant::Credentials { credentials } => credentials.clone(),
            ConnectGrant::AuthorizationCode {
                code, merchant_id, ..
            } => {
                let oauth = OAuthCredentials {
                    access_token: format!("access-{code}"),
                    refresh_token: Some(format!("refresh-{code}")),
                    expires_at: None,
                    merchant_id: merchant_id.clone(),
                };
                ProviderCredentials::from_oauth(self.provider, oauth).unwrap()
            }
        }
    }
}

impl ProviderAdapter for FakeAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, ProviderError> {
        Ok(format!(
            "https://auth.example/{}?redirect_uri={redirect_uri}&state={state}",
            self.provider
        ))
    }

    fn connect(
        &self,
        request: &ConnectRequest,
    ) -> impl Future<Output = Result<ProviderCredentials, ProviderError>> + Send {
        let result = self
            .connect_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.credentials_for(request)));
        async { result }
    }

    fn test(
        &self,
        _credentials: &ProviderCredentials,
    ) -> impl Future<Output = Result<Probe, ProviderFailure>> + Send {
        let result = self
            .test_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Probe::default()));
        async { result }
    }

    fn sync(
        &self,
        credentials: &ProviderCredentials,
        since: Timestamp,
    ) -> impl Future<Output = Result<SyncBatch, ProviderFailure>> + Send {
        self.sync_windows.lock().unwrap().push(since);
        self.synced_with.lock().unwrap().push(credentials.clone());
        let delay = self.sync_delays.lock().unwrap().pop_front();
        let result = self
            .sync_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SyncBatch::default()));
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        }
    }

    fn disconnect(
        &self,
        credentials: &ProviderCredentials,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send {
        self.revoked.lock().unwrap().push(credentials.clone());
        let result = self
            .disconnect_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()));
        async { result }
    }
}

pub struct FakeRegistry {
    pub square: FakeAdapter,
    pub clover: FakeAdapter,
    pub aloha: FakeAdapter,
}

impl Default for FakeRegistry {
    fn default() -> Self {
        Self {
            square: FakeAdapter::new(Provider::Square),
            clover: FakeAdapter::new(Provider::Clover),
            aloha: FakeAdapter::new(Provider::Aloha),
        }
    }
}

impl ProviderRegistry for FakeRegistry {
    type Adapter = FakeAdapter;

    fn adapter(&self, provider: Provider) -> &FakeAdapter {
        match provider {
            Provider::Square => &self.square,
            Provider::Clover => &self.clover,
            Provider::Aloha => &self.aloha,
        }
    }
}
