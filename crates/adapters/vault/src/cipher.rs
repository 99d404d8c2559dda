//! XChaCha20-Poly1305 implementation of [`CredentialCipher`].

use base64::Engine;
#[allow(deprecated)] // upstream generic-array 0.x deprecation
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::RngCore;

use tillguard_app::ports::CredentialCipher;
use tillguard_domain::context::StoreContext;
use tillguard_domain::error::VaultError;
use tillguard_domain::provider::Provider;

use crate::error::CipherError;
use crate::key_source::{KEY_LEN, KeySource};

/// First byte of every blob.
pub const VERSION_TAG: u8 = 0x01;

const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

/// AEAD cipher keyed by a [`KeySource`].
///
/// The associated data is `"{store_id}:{provider}"`, so a blob moved to
/// another store or provider row no longer decrypts.
pub struct XChaCha20Poly1305Cipher<K> {
    keys: K,
}

impl<K: KeySource> XChaCha20Poly1305Cipher<K> {
    pub fn new(keys: K) -> Self {
        Self { keys }
    }

    fn associated_data(ctx: &StoreContext, provider: Provider) -> Vec<u8> {
        format!("{}:{provider}", ctx.store_id()).into_bytes()
    }

    #[allow(deprecated)]
    fn seal(&self, ctx: &StoreContext, provider: Provider, plaintext: &[u8]) -> Result<String, CipherError> {
        let key = self.keys.key_for(ctx)?;
        let key: &[u8; KEY_LEN] = &key;
        let cipher = XChaCha20Poly1305::new(key.into());

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let aad = Self::associated_data(ctx, provider);
        let ciphertext = cipher
            .encrypt(nonce, Payload {
                msg: plaintext,
                aad: &aad,
            })
            .map_err(|_| CipherError::Aead)?;

        let mut blob = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        blob.push(VERSION_TAG);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(base64::engine::general_purpose::STANDARD.encode(blob))
    }

    #[allow(deprecated)]
    fn open(&self, ctx: &StoreContext, provider: Provider, encoded: &str) -> Result<Vec<u8>, CipherError> {
        let blob = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        let (&version, rest) = blob.split_first().ok_or(CipherError::Truncated)?;
        if version != VERSION_TAG {
            return Err(CipherError::UnsupportedVersion(version));
        }
        if rest.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Truncated);
        }

        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);
        let nonce = XNonce::from_slice(nonce_bytes);
        let key = self.keys.key_for(ctx)?;
        let key: &[u8; KEY_LEN] = &key;
        let cipher = XChaCha20Poly1305::new(key.into());

        let aad = Self::associated_data(ctx, provider);
        cipher
            .decrypt(nonce, Payload {
                msg: ciphertext,
                aad: &aad,
            })
            .map_err(|_| CipherError::Aead)
    }
}

impl<K: KeySource> CredentialCipher for XChaCha20Poly1305Cipher<K> {
    fn encrypt(
        &self,
        ctx: &StoreContext,
        provider: Provider,
        plaintext: &[u8],
    ) -> Result<String, VaultError> {
        self.seal(ctx, provider, plaintext).map_err(|err| {
            tracing::warn!(store_id = %ctx.store_id(), %provider, error = %err, "credential encryption failed");
            err.into_store()
        })
    }

    fn decrypt(
        &self,
        ctx: &StoreContext,
        provider: Provider,
        ciphertext: &str,
    ) -> Result<Vec<u8>, VaultError> {
        self.open(ctx, provider, ciphertext).map_err(|err| {
            tracing::warn!(store_id = %ctx.store_id(), %provider, error = %err, "credential decryption failed");
            err.into_access()
        })
    }
}
