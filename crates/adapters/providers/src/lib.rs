//! # tillguard-adapter-providers
//!
//! Vendor API adapters implementing the
//! [`ProviderAdapter`](tillguard_app::ports::ProviderAdapter) port.
//!
//! ## Responsibilities
//! - Exchange OAuth codes (Square, Clover) or validate on-premise
//!   credentials (NCR Aloha)
//! - Refresh expired OAuth tokens, at most once per call
//! - Pull vendor records and map them to
//!   [`FetchedEvent`](tillguard_domain::pos_event::FetchedEvent)s
//! - Bound in-flight vendor calls per adapter with a [`RateLimiter`]
//!
//! ## Dependency rule
//! Depends on `tillguard-app` (for port traits) and `tillguard-domain`.
//! Adapters never touch storage or the credentials vault.

pub mod aloha;
pub mod client;
pub mod clover;
pub mod config;
pub mod oauth;
pub mod rate_limiter;
pub mod registry;
pub mod square;

pub use aloha::AlohaAdapter;
pub use clover::CloverAdapter;
pub use config::{AlohaConfig, HttpConfig, OAuthAppConfig, ProvidersConfig};
pub use rate_limiter::RateLimiter;
pub use registry::{VendorAdapter, VendorRegistry};
pub use square::SquareAdapter;
