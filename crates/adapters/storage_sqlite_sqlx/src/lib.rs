//! # tillguard-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `tillguard-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `tillguard-app` (for port traits) and `tillguard-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod codec;
pub mod error;
pub mod integration_repo;
pub mod log_repo;
pub mod pool;
pub mod pos_event_repo;

pub use error::StorageError;
pub use integration_repo::SqliteIntegrationRepository;
pub use log_repo::SqliteIntegrationLogRepository;
pub use pool::{Config, Database};
pub use pos_event_repo::SqlitePosEventStore;
