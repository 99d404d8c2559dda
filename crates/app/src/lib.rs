//! # tillguard-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `IntegrationRepository`: one integration row per (store, provider)
//!   - `IntegrationLogRepository`: append & page audit rows
//!   - `PosEventStore`: store scored POS events, query them back
//!   - `CredentialCipher`: encrypt/decrypt credential blobs
//!   - `ErrorTracker`: breadcrumbs and captures for an error tracker
//!   - `ProviderAdapter` / `ProviderRegistry`: talk to vendor APIs
//! - Define the **driving/inbound port** `IntegrationUseCases`
//! - Provide the use-case services:
//!   - `CredentialVault`: encrypt and persist credentials
//!   - `IntegrationLogger`: audit rows mirrored to the error tracker
//!   - `IntegrationService`: connect, test, sync, disconnect
//! - Provide **in-process infrastructure** that doesn't need IO
//!   (tracing-backed error tracker, retry loop, per-integration locks)
//!
//! ## Dependency rule
//! Depends on `tillguard-domain` only (plus `tokio` for locks and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod error_tracker;
pub mod ports;
pub mod retry;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;
