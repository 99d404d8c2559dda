//! Provider → adapter lookup.

use tillguard_app::ports::{Probe, ProviderAdapter, ProviderFailure, ProviderRegistry, SyncBatch};
use tillguard_domain::credentials::{ConnectRequest, ProviderCredentials};
use tillguard_domain::error::ProviderError;
use tillguard_domain::provider::Provider;
use tillguard_domain::time::Timestamp;

use crate::aloha::AlohaAdapter;
use crate::client::VendorClient;
use crate::clover::CloverAdapter;
use crate::config::{HttpConfig, ProvidersConfig};
use crate::square::SquareAdapter;

/// One of the vendor adapters.
pub enum VendorAdapter {
    Square(SquareAdapter),
    Clover(CloverAdapter),
    Aloha(AlohaAdapter),
}

impl ProviderAdapter for VendorAdapter {
    fn provider(&self) -> Provider {
        match self {
            Self::Square(adapter) => adapter.provider(),
            Self::Clover(adapter) => adapter.provider(),
            Self::Aloha(adapter) => adapter.provider(),
        }
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, ProviderError> {
        match self {
            Self::Square(adapter) => adapter.authorization_url(redirect_uri, state),
            Self::Clover(adapter) => adapter.authorization_url(redirect_uri, state),
            Self::Aloha(adapter) => adapter.authorization_url(redirect_uri, state),
        }
    }

    async fn connect(&self, request: &ConnectRequest) -> Result<ProviderCredentials, ProviderError> {
        match self {
            Self::Square(adapter) => adapter.connect(request).await,
            Self::Clover(adapter) => adapter.connect(request).await,
            Self::Aloha(adapter) => adapter.connect(request).await,
        }
    }

    async fn test(&self, credentials: &ProviderCredentials) -> Result<Probe, ProviderFailure> {
        match self {
            Self::Square(adapter) => adapter.test(credentials).await,
            Self::Clover(adapter) => adapter.test(credentials).await,
            Self::Aloha(adapter) => adapter.test(credentials).await,
        }
    }

    async fn sync(
        &self,
        credentials: &ProviderCredentials,
        since: Timestamp,
    ) -> Result<SyncBatch, ProviderFailure> {
        match self {
            Self::Square(adapter) => adapter.sync(credentials, since).await,
            Self::Clover(adapter) => adapter.sync(credentials, since).await,
            Self::Aloha(adapter) => adapter.sync(credentials, since).await,
        }
    }

    async fn disconnect(&self, credentials: &ProviderCredentials) -> Result<(), ProviderError> {
        match self {
            Self::Square(adapter) => adapter.disconnect(credentials).await,
            Self::Clover(adapter) => adapter.disconnect(credentials).await,
            Self::Aloha(adapter) => adapter.disconnect(credentials).await,
        }
    }
}

/// Holds one adapter per [`Provider`], each with its own rate limiter.
pub struct VendorRegistry {
    square: VendorAdapter,
    clover: VendorAdapter,
    aloha: VendorAdapter,
}

impl VendorRegistry {
    /// Build every adapter from configuration.
    ///
    /// # Errors
    ///
    /// Returns the [`reqwest::Error`] raised when an HTTP client cannot be
    /// built.
    pub fn from_config(providers: &ProvidersConfig, http: &HttpConfig) -> Result<Self, reqwest::Error> {
        if !providers.square.is_configured() {
            tracing::warn!("square OAuth app not configured, square connections will fail");
        }
        if !providers.clover.is_configured() {
            tracing::warn!("clover OAuth app not configured, clover connections will fail");
        }
        Ok(Self {
            square: VendorAdapter::Square(SquareAdapter::new(
                VendorClient::from_config(Provider::Square, http)?,
                providers.square.clone(),
            )),
            clover: VendorAdapter::Clover(CloverAdapter::new(
                VendorClient::from_config(Provider::Clover, http)?,
                providers.clover.clone(),
            )),
            aloha: VendorAdapter::Aloha(AlohaAdapter::new(
                VendorClient::from_config(Provider::Aloha, http)?,
                providers.aloha.clone(),
            )),
        })
    }
}

impl ProviderRegistry for VendorRegistry {
    type Adapter = VendorAdapter;

    fn adapter(&self, provider: Provider) -> &VendorAdapter {
        match provider {
            Provider::Square => &self.square,
            Provider::Clover => &self.clover,
            Provider::Aloha => &self.aloha,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_resolve_every_provider_to_its_adapter() {
        let registry =
            VendorRegistry::from_config(&ProvidersConfig::default(), &HttpConfig::default())
                .unwrap();

        for provider in Provider::ALL {
            assert_eq!(registry.adapter(provider).provider(), provider);
        }
    }

    #[test]
    fn should_report_unconfigured_oauth_apps() {
        let registry =
            VendorRegistry::from_config(&ProvidersConfig::default(), &HttpConfig::default())
                .unwrap();

        let err = registry
            .adapter(Provider::Clover)
            .authorization_url("https://app.example/cb", "store")
            .unwrap_err();

        assert!(matches!(err, ProviderError::NotConfigured(Provider::Clover)));
    }
}
