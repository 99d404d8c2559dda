//! OAuth token handling shared by the cloud adapters.

use std::future::Future;

use serde::Deserialize;

use tillguard_app::ports::ProviderFailure;
use tillguard_domain::credentials::{OAuthCredentials, ProviderCredentials};
use tillguard_domain::error::ProviderError;
use tillguard_domain::time::{Timestamp, now};

/// Trades a refresh token for a new access token.
pub trait TokenRefresher {
    /// # Errors
    ///
    /// Returns [`ProviderError::TokenExpired`] when no refresh token is
    /// available, or the vendor call's error.
    fn refresh(
        &self,
        credentials: &OAuthCredentials,
    ) -> impl Future<Output = Result<OAuthCredentials, ProviderError>> + Send;
}

/// Outcome of an authenticated call plus the credentials it ended up using,
/// when those differ from the ones passed in.
///
/// `credentials` is set whenever a refresh succeeded, even if the call then
/// failed: vendors that rotate refresh tokens invalidate the old pair.
#[derive(Debug)]
pub struct Refreshed<T> {
    pub value: Result<T, ProviderError>,
    pub credentials: Option<OAuthCredentials>,
}

impl<T> Refreshed<T> {
    /// Split into the port's shapes, tagging credentials with `wrap`.
    ///
    /// # Errors
    ///
    /// Returns the call's error together with any refreshed credentials.
    pub fn split(
        self,
        wrap: fn(OAuthCredentials) -> ProviderCredentials,
    ) -> Result<(T, Option<ProviderCredentials>), ProviderFailure> {
        let refreshed = self.credentials.map(wrap);
        match self.value {
            Ok(value) => Ok((value, refreshed)),
            Err(error) => Err(ProviderFailure { error, refreshed }),
        }
    }
}

/// Run `call` with a valid access token.
///
/// Refreshes up front when `expires_at` has passed. If the vendor then
/// reports the token as expired, refreshes once and retries once. Never
/// refreshes twice.
///
/// A failed refresh surfaces as [`ProviderError::RefreshFailed`] in
/// `value`, otherwise `value` is the result of `call`.
pub async fn call_with_refresh<R, F, Fut, T>(
    refresher: &R,
    credentials: &OAuthCredentials,
    mut call: F,
) -> Refreshed<T>
where
    R: TokenRefresher + Sync,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut current = credentials.clone();
    let mut refreshed = false;

    if current.is_expired(now()) {
        tracing::debug!("access token past expiry, refreshing before call");
        match refresh(refresher, &current).await {
            Ok(fresh) => {
                current = fresh;
                refreshed = true;
            }
            Err(err) => {
                return Refreshed {
                    value: Err(err),
                    credentials: None,
                };
            }
        }
    }

    let value = match call(current.access_token.clone()).await {
        Err(ProviderError::TokenExpired) if !refreshed => {
            tracing::debug!("vendor reported expired token, refreshing once");
            match refresh(refresher, &current).await {
                Ok(fresh) => {
                    current = fresh;
                    refreshed = true;
                    call(current.access_token.clone()).await
                }
                Err(err) => Err(err),
            }
        }
        other => other,
    };
    Refreshed {
        value,
        credentials: refreshed.then_some(current),
    }
}

async fn refresh<R: TokenRefresher + Sync>(
    refresher: &R,
    credentials: &OAuthCredentials,
) -> Result<OAuthCredentials, ProviderError> {
    refresher.refresh(credentials).await.map_err(|err| {
        tracing::warn!(error = %err, "token refresh failed");
        ProviderError::RefreshFailed(Box::new(err))
    })
}

/// Token endpoint answer, covering both Square and Clover shapes.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// RFC 3339 expiry (Square).
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
    /// Seconds until expiry (standard OAuth).
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix seconds expiry (Clover).
    #[serde(default)]
    pub access_token_expiration: Option<i64>,
    #[serde(default)]
    pub merchant_id: Option<String>,
}

impl TokenResponse {
    /// Merge into credentials, keeping `previous` values the vendor did not
    /// resend (refresh token, merchant id).
    pub(crate) fn into_credentials(
        self,
        previous: Option<&OAuthCredentials>,
        issued_at: Timestamp,
    ) -> OAuthCredentials {
        let expires_at = self
            .expires_at
            .or_else(|| {
                self.expires_in
                    .map(|secs| issued_at + chrono::Duration::seconds(secs))
            })
            .or_else(|| {
                self.access_token_expiration
                    .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            });
        OAuthCredentials {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous.and_then(|p| p.refresh_token.clone())),
            expires_at,
            merchant_id: self
                .merchant_id
                .or_else(|| previous.and_then(|p| p.merchant_id.clone())),
        }
    }
}
