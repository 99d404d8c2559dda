//! POS event store port: persistence for scored POS events.

use std::future::Future;

use tillguard_domain::error::TillguardError;
use tillguard_domain::id::StoreId;
use tillguard_domain::pos_event::{EventQuery, PosEvent};
use tillguard_domain::time::Timestamp;

/// Repository for persisting and querying [`PosEvent`]s.
pub trait PosEventStore {
    /// Persist a batch, skipping events whose (store, provider,
    /// `external_id`) is already stored.
    ///
    /// Returns how many events were new.
    fn store_batch(
        &self,
        events: Vec<PosEvent>,
    ) -> impl Future<Output = Result<usize, TillguardError>> + Send;

    /// Events of a store that occurred at or after `since`, oldest first.
    fn recent_for_store(
        &self,
        store_id: StoreId,
        since: Timestamp,
    ) -> impl Future<Output = Result<Vec<PosEvent>, TillguardError>> + Send;

    /// Page through a store's events, newest first.
    fn list(
        &self,
        store_id: StoreId,
        query: EventQuery,
    ) -> impl Future<Output = Result<Vec<PosEvent>, TillguardError>> + Send;
}

impl<T: PosEventStore + Send + Sync> PosEventStore for std::sync::Arc<T> {
    fn store_batch(
        &self,
        events: Vec<PosEvent>,
    ) -> impl Future<Output = Result<usize, TillguardError>> + Send {
        (**self).store_batch(events)
    }

    fn recent_for_store(
        &self,
        store_id: StoreId,
        since: Timestamp,
    ) -> impl Future<Output = Result<Vec<PosEvent>, TillguardError>> + Send {
        (**self).recent_for_store(store_id, since)
    }

    fn list(
        &self,
        store_id: StoreId,
        query: EventQuery,
    ) -> impl Future<Output = Result<Vec<PosEvent>, TillguardError>> + Send {
        (**self).list(store_id, query)
    }
}
