//! # tillguard-adapter-vault
//!
//! Credential encryption adapter.
//!
//! ## Responsibilities
//! - Implement the `CredentialCipher` port from `tillguard-app`
//! - Encrypt with XChaCha20-Poly1305, binding the (store, provider) pair as
//!   associated data
//! - Derive 32-byte keys from a configurable [`KeySource`]
//!
//! ## Blob format
//! `base64(version || nonce[24] || ciphertext || tag[16])`
//!
//! ## Dependency rule
//! Depends on `tillguard-app` (for the port trait) and `tillguard-domain`.

pub mod cipher;
pub mod error;
pub mod key_source;

pub use cipher::XChaCha20Poly1305Cipher;
pub use error::CipherError;
pub use key_source::{ConfiguredKeySource, KeySource, SessionKeySource, StoreKeySource};
