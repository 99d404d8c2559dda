//! Key sources: where the 32-byte encryption key of a request comes from.

use base64::Engine;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use tillguard_domain::context::StoreContext;

use crate::error::CipherError;

pub const KEY_LEN: usize = 32;

/// Derives the key used for one store's credentials.
pub trait KeySource {
    /// The key for `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError`] when the key cannot be derived for `ctx`.
    fn key_for(&self, ctx: &StoreContext) -> Result<Zeroizing<[u8; KEY_LEN]>, CipherError>;
}

fn sha256(parts: &[&[u8]]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&hasher.finalize());
    key
}

/// `SHA-256(master_key || store_id)`: stable per store, independent of the
/// caller's session.
pub struct StoreKeySource {
    master: Zeroizing<[u8; KEY_LEN]>,
}

impl StoreKeySource {
    #[must_use]
    pub fn new(master: [u8; KEY_LEN]) -> Self {
        Self {
            master: Zeroizing::new(master),
        }
    }

    /// Build from a standard base64 encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Base64`] or [`CipherError::InvalidKeyLength`].
    pub fn from_base64(encoded: &str) -> Result<Self, CipherError> {
        let decoded = Zeroizing::new(
            base64::engine::general_purpose::STANDARD.decode(encoded.trim())?,
        );
        let master: [u8; KEY_LEN] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| CipherError::InvalidKeyLength(decoded.len()))?;
        Ok(Self::new(master))
    }
}

impl KeySource for StoreKeySource {
    fn key_for(&self, ctx: &StoreContext) -> Result<Zeroizing<[u8; KEY_LEN]>, CipherError> {
        Ok(sha256(&[
            self.master.as_slice(),
            ctx.store_id().as_uuid().as_bytes(),
        ]))
    }
}

/// `SHA-256(session_token)`: the key changes with every session, so a blob
/// only decrypts within the session that wrote it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionKeySource;

impl KeySource for SessionKeySource {
    fn key_for(&self, ctx: &StoreContext) -> Result<Zeroizing<[u8; KEY_LEN]>, CipherError> {
        let token = ctx.session_token().map_err(|_| CipherError::NoSession)?;
        Ok(sha256(&[token.as_bytes()]))
    }
}

/// Key source picked at startup from configuration.
pub enum ConfiguredKeySource {
    Store(StoreKeySource),
    Session(SessionKeySource),
}

impl KeySource for ConfiguredKeySource {
    fn key_for(&self, ctx: &StoreContext) -> Result<Zeroizing<[u8; KEY_LEN]>, CipherError> {
        match self {
            Self::Store(source) => source.key_for(ctx),
            Self::Session(source) => source.key_for(ctx),
        }
    }
}
