//! Storage port: repository traits for integrations and their audit log.

use std::future::Future;

use tillguard_domain::error::TillguardError;
use tillguard_domain::id::StoreId;
use tillguard_domain::integration::Integration;
use tillguard_domain::integration_log::{IntegrationLog, Page};
use tillguard_domain::provider::Provider;

/// Repository for [`Integration`] rows, unique per (store, provider).
pub trait IntegrationRepository {
    /// All integrations of a store, ordered by provider.
    fn list_for_store(
        &self,
        store_id: StoreId,
    ) -> impl Future<Output = Result<Vec<Integration>, TillguardError>> + Send;

    /// The integration of `store_id` with `provider`, if any.
    fn get(
        &self,
        store_id: StoreId,
        provider: Provider,
    ) -> impl Future<Output = Result<Option<Integration>, TillguardError>> + Send;

    /// Insert the row, or replace the existing row for the same
    /// (store, provider) pair keeping its original `id` and `created_at`.
    fn upsert(
        &self,
        integration: Integration,
    ) -> impl Future<Output = Result<Integration, TillguardError>> + Send;
}

/// Append-only repository for [`IntegrationLog`] rows.
pub trait IntegrationLogRepository {
    fn append(
        &self,
        log: IntegrationLog,
    ) -> impl Future<Output = Result<IntegrationLog, TillguardError>> + Send;

    /// Logs of a store, optionally for one provider, newest first.
    fn list(
        &self,
        store_id: StoreId,
        provider: Option<Provider>,
        page: Page,
    ) -> impl Future<Output = Result<Vec<IntegrationLog>, TillguardError>> + Send;
}

impl<T: IntegrationRepository + Send + Sync> IntegrationRepository for std::sync::Arc<T> {
    fn list_for_store(
        &self,
        store_id: StoreId,
    ) -> impl Future<Output = Result<Vec<Integration>, TillguardError>> + Send {
        (**self).list_for_store(store_id)
    }

    fn get(
        &self,
        store_id: StoreId,
        provider: Provider,
    ) -> impl Future<Output = Result<Option<Integration>, TillguardError>> + Send {
        (**self).get(store_id, provider)
    }

    fn upsert(
        &self,
        integration: Integration,
    ) -> impl Future<Output = Result<Integration, TillguardError>> + Send {
        (**self).upsert(integration)
    }
}

impl<T: IntegrationLogRepository + Send + Sync> IntegrationLogRepository for std::sync::Arc<T> {
    fn append(
        &self,
        log: IntegrationLog,
    ) -> impl Future<Output = Result<IntegrationLog, TillguardError>> + Send {
        (**self).append(log)
    }

    fn list(
        &self,
        store_id: StoreId,
        provider: Option<Provider>,
        page: Page,
    ) -> impl Future<Output = Result<Vec<IntegrationLog>, TillguardError>> + Send {
        (**self).list(store_id, provider, page)
    }
}
