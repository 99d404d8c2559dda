//! Cipher-specific errors, collapsed into `VaultError` at the port boundary.

use tillguard_domain::error::VaultError;

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    /// AEAD failure: wrong key, wrong binding, or tampered blob.
    #[error("cipher error")]
    Aead,

    #[error("base64 decode error")]
    Base64(#[from] base64::DecodeError),

    #[error("blob is too short")]
    Truncated,

    #[error("unsupported blob version {0:#04x}")]
    UnsupportedVersion(u8),

    /// The master key is not 32 bytes once decoded.
    #[error("master key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    /// The key source needs a session token and none was presented.
    #[error("no session token to derive the key from")]
    NoSession,
}

impl CipherError {
    pub(crate) fn into_store(self) -> VaultError {
        VaultError::Store(Box::new(self))
    }

    pub(crate) fn into_access(self) -> VaultError {
        VaultError::Access(Box::new(self))
    }
}
