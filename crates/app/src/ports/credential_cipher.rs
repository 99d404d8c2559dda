//! Credential cipher port: authenticated encryption of credential blobs.

use tillguard_domain::context::StoreContext;
use tillguard_domain::error::VaultError;
use tillguard_domain::provider::Provider;

/// Encrypts serialized credentials for one (store, provider) pair.
///
/// Implementations bind the store and provider to the ciphertext so a blob
/// copied onto another row fails to decrypt.
pub trait CredentialCipher {
    /// Encrypt `plaintext` into a printable blob.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Store`] when no key is available or encryption
    /// fails.
    fn encrypt(
        &self,
        ctx: &StoreContext,
        provider: Provider,
        plaintext: &[u8],
    ) -> Result<String, VaultError>;

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Access`] for a malformed blob, a wrong key, or
    /// a blob bound to another (store, provider).
    fn decrypt(
        &self,
        ctx: &StoreContext,
        provider: Provider,
        ciphertext: &str,
    ) -> Result<Vec<u8>, VaultError>;
}

impl<T: CredentialCipher> CredentialCipher for std::sync::Arc<T> {
    fn encrypt(
        &self,
        ctx: &StoreContext,
        provider: Provider,
        plaintext: &[u8],
    ) -> Result<String, VaultError> {
        (**self).encrypt(ctx, provider, plaintext)
    }

    fn decrypt(
        &self,
        ctx: &StoreContext,
        provider: Provider,
        ciphertext: &str,
    ) -> Result<Vec<u8>, VaultError> {
        (**self).decrypt(ctx, provider, ciphertext)
    }
}
