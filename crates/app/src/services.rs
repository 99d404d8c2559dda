//! Application services: use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod credential_vault;
pub mod integration_logger;
pub mod integration_service;
pub mod operation_locks;

pub use credential_vault::CredentialVault;
pub use integration_logger::IntegrationLogger;
pub use integration_service::IntegrationService;
