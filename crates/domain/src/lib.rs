//! # tillguard-domain
//!
//! Pure domain model for the tillguard POS security monitor.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Providers** (third-party POS systems a store can connect)
//! - Define **Integrations** (a store's connection to one provider) and
//!   their status state machine
//! - Define **Provider credentials** as one validated variant per provider
//! - Define **Integration logs** (append-only audit rows)
//! - Define **POS events** and the rule-based **anomaly** assessment
//! - Define operation results and the **retry policy** for vendor calls
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod anomaly;
pub mod context;
pub mod credentials;
pub mod integration;
pub mod integration_log;
pub mod outcome;
pub mod pos_event;
pub mod provider;
pub mod retry;
