//! # tillguard-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a JSON API for the store owner's integration screens
//!   (`/api/integrations`, `/api/integrations/{provider}/sync`, …)
//! - Build a [`StoreContext`](tillguard_domain::context::StoreContext) from
//!   the `X-Store-Id` and `Authorization: Bearer` headers
//! - Map use-case results into HTTP responses
//!
//! ## Dependency rule
//! Depends on `tillguard-app` (for the use-case port) and `tillguard-domain`
//! (for request/response types). Never leaks axum types into the domain.

pub mod api;
pub mod context;
pub mod error;
pub mod router;
pub mod state;
