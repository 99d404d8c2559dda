//! Inbound port: the integration use-cases driving adapters call.

use std::future::Future;

use tillguard_domain::context::StoreContext;
use tillguard_domain::credentials::ConnectRequest;
use tillguard_domain::error::TillguardError;
use tillguard_domain::integration::Integration;
use tillguard_domain::integration_log::{IntegrationLog, Page};
use tillguard_domain::outcome::{OperationResult, SyncResult};
use tillguard_domain::pos_event::{EventQuery, PosEvent};
use tillguard_domain::provider::Provider;

/// Everything a store owner can do with integrations.
///
/// Actions report failures inside their result; queries return `Err`.
pub trait IntegrationUseCases {
    fn get_integrations(
        &self,
        ctx: &StoreContext,
    ) -> impl Future<Output = Result<Vec<Integration>, TillguardError>> + Send;

    fn get_integration(
        &self,
        ctx: &StoreContext,
        provider: Provider,
    ) -> impl Future<Output = Result<Integration, TillguardError>> + Send;

    fn authorization_url(
        &self,
        ctx: &StoreContext,
        provider: Provider,
        redirect_uri: &str,
    ) -> Result<String, TillguardError>;

    fn connect(
        &self,
        ctx: &StoreContext,
        provider: Provider,
        request: ConnectRequest,
    ) -> impl Future<Output = OperationResult> + Send;

    fn test_connection(
        &self,
        ctx: &StoreContext,
        provider: Provider,
    ) -> impl Future<Output = OperationResult> + Send;

    fn sync(&self, ctx: &StoreContext, provider: Provider)
    -> impl Future<Output = SyncResult> + Send;

    fn disconnect(
        &self,
        ctx: &StoreContext,
        provider: Provider,
    ) -> impl Future<Output = OperationResult> + Send;

    fn get_logs(
        &self,
        ctx: &StoreContext,
        provider: Option<Provider>,
        page: Page,
    ) -> impl Future<Output = Result<Vec<IntegrationLog>, TillguardError>> + Send;

    fn get_events(
        &self,
        ctx: &StoreContext,
        query: EventQuery,
    ) -> impl Future<Output = Result<Vec<PosEvent>, TillguardError>> + Send;
}
