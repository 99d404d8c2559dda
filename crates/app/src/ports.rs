//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod credential_cipher;
pub mod error_tracker;
pub mod event_store;
pub mod provider;
pub mod storage;
pub mod use_cases;

pub use credential_cipher::CredentialCipher;
pub use error_tracker::{ErrorTracker, TrackerContext};
pub use event_store::PosEventStore;
pub use provider::{Probe, ProviderAdapter, ProviderFailure, ProviderRegistry, SyncBatch};
pub use storage::{IntegrationLogRepository, IntegrationRepository};
pub use use_cases::IntegrationUseCases;
