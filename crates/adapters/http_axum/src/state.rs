//! Shared application state for axum handlers.

use std::sync::Arc;

use tillguard_app::ports::IntegrationUseCases;

/// Application state shared across all axum handlers.
///
/// Generic over the use-case implementation to avoid dynamic dispatch.
/// `Clone` is implemented manually so `S` itself does not need to be
/// `Clone`, only the `Arc` is cloned.
pub struct AppState<S> {
    pub integrations: Arc<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            integrations: Arc::clone(&self.integrations),
        }
    }
}

impl<S> AppState<S>
where
    S: IntegrationUseCases + Send + Sync + 'static,
{
    pub fn new(integrations: S) -> Self {
        Self {
            integrations: Arc::new(integrations),
        }
    }

    /// Use this when the service is shared with background tasks.
    pub fn from_arc(integrations: Arc<S>) -> Self {
        Self { integrations }
    }
}
