//! Provider port: the contract every vendor adapter implements.
//!
//! An adapter talks to one third-party POS API. It never touches storage:
//! credentials go in decrypted and any refreshed credentials come back out
//! for the caller to re-encrypt.

use std::future::Future;

use tillguard_domain::credentials::{ConnectRequest, ProviderCredentials};
use tillguard_domain::error::ProviderError;
use tillguard_domain::pos_event::FetchedEvent;
use tillguard_domain::provider::Provider;
use tillguard_domain::time::Timestamp;

/// Result of a connection test.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    /// New credentials when the adapter had to refresh the token.
    pub refreshed: Option<ProviderCredentials>,
    /// Vendor-specific facts worth logging (merchant name, site status, …).
    pub details: serde_json::Value,
}

/// Events pulled by one sync.
#[derive(Debug, Clone, Default)]
pub struct SyncBatch {
    pub events: Vec<FetchedEvent>,
    /// New credentials when the adapter had to refresh the token.
    pub refreshed: Option<ProviderCredentials>,
    pub details: serde_json::Value,
}

/// A failed test or sync.
///
/// The adapter may have rotated the token before the failing request; those
/// credentials are the only live ones and must still be persisted.
#[derive(Debug)]
pub struct ProviderFailure {
    pub error: ProviderError,
    pub refreshed: Option<ProviderCredentials>,
}

impl From<ProviderError> for ProviderFailure {
    fn from(error: ProviderError) -> Self {
        Self {
            error,
            refreshed: None,
        }
    }
}

/// A vendor API client.
///
/// Implementations live in `tillguard-adapter-providers`.
pub trait ProviderAdapter {
    fn provider(&self) -> Provider;

    /// Vendor consent page the store owner is sent to.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Validation`] for providers without an OAuth
    /// flow and [`ProviderError::NotConfigured`] without a client id.
    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, ProviderError>;

    /// Exchange a grant for credentials.
    fn connect(
        &self,
        request: &ConnectRequest,
    ) -> impl Future<Output = Result<ProviderCredentials, ProviderError>> + Send;

    /// One lightweight authenticated read.
    fn test(
        &self,
        credentials: &ProviderCredentials,
    ) -> impl Future<Output = Result<Probe, ProviderFailure>> + Send;

    /// Pull events that occurred at or after `since`.
    fn sync(
        &self,
        credentials: &ProviderCredentials,
        since: Timestamp,
    ) -> impl Future<Output = Result<SyncBatch, ProviderFailure>> + Send;

    /// Release vendor-side access (token revocation where supported).
    fn disconnect(
        &self,
        credentials: &ProviderCredentials,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;
}

/// Maps a [`Provider`] to its adapter.
pub trait ProviderRegistry {
    type Adapter: ProviderAdapter + Send + Sync;

    fn adapter(&self, provider: Provider) -> &Self::Adapter;
}

impl<T: ProviderRegistry> ProviderRegistry for std::sync::Arc<T> {
    type Adapter = T::Adapter;

    fn adapter(&self, provider: Provider) -> &Self::Adapter {
        (**self).adapter(provider)
    }
}
