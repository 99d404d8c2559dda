//! Credential vault: encrypts provider credentials and keeps the
//! ciphertext on the integration row.

use tillguard_domain::context::StoreContext;
use tillguard_domain::credentials::ProviderCredentials;
use tillguard_domain::error::{ValidationError, VaultError};
use tillguard_domain::integration::Integration;
use tillguard_domain::provider::Provider;
use tillguard_domain::time::now;

use crate::ports::{CredentialCipher, IntegrationRepository};

/// Encrypts, stores, loads and clears credentials.
///
/// Every failure is reported as an opaque [`VaultError`]; callers learn
/// that the vault failed, not which step.
pub struct CredentialVault<R, C> {
    repo: R,
    cipher: C,
}

impl<R, C> CredentialVault<R, C>
where
    R: IntegrationRepository + Send + Sync,
    C: CredentialCipher + Send + Sync,
{
    pub fn new(repo: R, cipher: C) -> Self {
        Self { repo, cipher }
    }

    /// The integration repository the vault writes to.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Serialize and encrypt `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Store`] when serialization or encryption fails.
    pub fn encrypt(
        &self,
        ctx: &StoreContext,
        credentials: &ProviderCredentials,
    ) -> Result<String, VaultError> {
        let plaintext =
            serde_json::to_vec(credentials).map_err(|err| VaultError::Store(Box::new(err)))?;
        self.cipher
            .encrypt(ctx, credentials.provider(), &plaintext)
    }

    /// Decrypt and deserialize a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Access`] when decryption or deserialization
    /// fails, or the blob holds another provider's credentials.
    pub fn decrypt(
        &self,
        ctx: &StoreContext,
        provider: Provider,
        ciphertext: &str,
    ) -> Result<ProviderCredentials, VaultError> {
        let plaintext = self.cipher.decrypt(ctx, provider, ciphertext)?;
        let credentials: ProviderCredentials =
            serde_json::from_slice(&plaintext).map_err(|err| VaultError::Access(Box::new(err)))?;
        let found = credentials.provider();
        if found != provider {
            return Err(VaultError::Access(Box::new(
                ValidationError::ProviderMismatch {
                    expected: provider,
                    found,
                },
            )));
        }
        Ok(credentials)
    }

    /// Encrypt `credentials` onto the (store, provider) row, creating a
    /// `pending` row when none exists. The status is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Store`] when the credentials do not belong to
    /// `provider`, or encryption or persistence fails.
    pub async fn store_credentials(
        &self,
        ctx: &StoreContext,
        provider: Provider,
        credentials: &ProviderCredentials,
    ) -> Result<Integration, VaultError> {
        credentials
            .validate_for(provider)
            .map_err(|err| VaultError::Store(Box::new(err)))?;
        let ciphertext = self.encrypt(ctx, credentials)?;

        let store_id = ctx.store_id();
        let mut integration = self
            .repo
            .get(store_id, provider)
            .await
            .map_err(|err| VaultError::Store(Box::new(err)))?
            .unwrap_or_else(|| Integration::new(store_id, provider));
        integration.credentials_encrypted = Some(ciphertext);
        integration.updated_at = now();

        self.repo
            .upsert(integration)
            .await
            .map_err(|err| VaultError::Store(Box::new(err)))
    }

    /// Load and decrypt the credentials of the (store, provider) row.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Missing`] when there is no row or it holds no
    /// ciphertext, and [`VaultError::Access`] when loading or decryption
    /// fails.
    pub async fn get_credentials(
        &self,
        ctx: &StoreContext,
        provider: Provider,
    ) -> Result<ProviderCredentials, VaultError> {
        let ciphertext = self
            .repo
            .get(ctx.store_id(), provider)
            .await
            .map_err(|err| VaultError::Access(Box::new(err)))?
            .and_then(|integration| integration.credentials_encrypted)
            .ok_or(VaultError::Missing(provider))?;
        self.decrypt(ctx, provider, &ciphertext)
    }

    /// Drop the ciphertext from the (store, provider) row. Missing rows are
    /// left alone.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Store`] when persistence fails.
    pub async fn delete_credentials(
        &self,
        ctx: &StoreContext,
        provider: Provider,
    ) -> Result<(), VaultError> {
        let Some(mut integration) = self
            .repo
            .get(ctx.store_id(), provider)
            .await
            .map_err(|err| VaultError::Store(Box::new(err)))?
        else {
            return Ok(());
        };
        if integration.credentials_encrypted.take().is_none() {
            return Ok(());
        }
        integration.updated_at = now();
        self.repo
            .upsert(integration)
            .await
            .map_err(|err| VaultError::Store(Box::new(err)))?;
        Ok(())
    }
}
