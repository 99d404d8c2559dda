//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod events;
#[allow(clippy::missing_errors_doc)]
pub mod integrations;

use axum::Router;
use axum::routing::{get, post};

use tillguard_app::ports::IntegrationUseCases;

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<S>() -> Router<AppState<S>>
where
    S: IntegrationUseCases + Send + Sync + 'static,
{
    Router::new()
        // Integrations
        .route("/integrations", get(integrations::list::<S>))
        .route("/integrations/logs", get(integrations::logs::<S>))
        .route("/integrations/{provider}", get(integrations::get::<S>))
        .route(
            "/integrations/{provider}/authorize",
            get(integrations::authorize::<S>),
        )
        .route(
            "/integrations/{provider}/connect",
            post(integrations::connect::<S>),
        )
        .route("/integrations/{provider}/test", post(integrations::test::<S>))
        .route("/integrations/{provider}/sync", post(integrations::sync::<S>))
        .route(
            "/integrations/{provider}/disconnect",
            post(integrations::disconnect::<S>),
        )
        // Events
        .route("/events", get(events::list::<S>))
}
