//! Rate-limited HTTP client shared by the vendor adapters.
//!
//! Translates HTTP outcomes into [`ProviderError`]s:
//! 401 becomes [`ProviderError::TokenExpired`], any other non-2xx becomes
//! [`ProviderError::Api`] carrying the vendor's own message when the body
//! has one.

use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use tillguard_domain::error::ProviderError;
use tillguard_domain::provider::Provider;

use crate::config::HttpConfig;
use crate::rate_limiter::RateLimiter;

const MAX_PLAIN_ERROR_LEN: usize = 200;

/// How a request authenticates.
#[derive(Clone, Copy)]
pub enum Auth<'a> {
    None,
    Bearer(&'a str),
    Basic { username: &'a str, password: &'a str },
    /// Square's `Authorization: Client <secret>` scheme for revocation.
    ClientSecret(&'a str),
}

impl Auth<'_> {
    fn apply(self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::None => request,
            Self::Bearer(token) => request.bearer_auth(token),
            Self::Basic { username, password } => request.basic_auth(username, Some(password)),
            Self::ClientSecret(secret) => request.header(AUTHORIZATION, format!("Client {secret}")),
        }
    }
}

/// One vendor's HTTP client and rate limiter.
#[derive(Debug, Clone)]
pub struct VendorClient {
    provider: Provider,
    http: reqwest::Client,
    limiter: RateLimiter,
}

impl VendorClient {
    #[must_use]
    pub fn new(provider: Provider, http: reqwest::Client, limiter: RateLimiter) -> Self {
        Self {
            provider,
            http,
            limiter,
        }
    }

    /// Build a client with the configured timeout and limiter size.
    ///
    /// # Errors
    ///
    /// Returns the [`reqwest::Error`] raised when the TLS backend cannot be
    /// initialised.
    pub fn from_config(provider: Provider, config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("tillguard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::new(provider, http, RateLimiter::new(config.max_in_flight)))
    }

    #[must_use]
    pub fn provider(&self) -> Provider {
        self.provider
    }

    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// `GET` a JSON document.
    ///
    /// # Errors
    ///
    /// See the module documentation.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        auth: Auth<'_>,
    ) -> Result<T, ProviderError> {
        let body = self.get_text(url, query, auth).await?;
        self.decode_json(&body)
    }

    /// `GET` a raw body, for XML APIs.
    ///
    /// # Errors
    ///
    /// See the module documentation.
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, String)],
        auth: Auth<'_>,
    ) -> Result<String, ProviderError> {
        let request = auth.apply(self.http.get(url).query(query));
        self.execute(request).await
    }

    /// `POST` a JSON body and decode a JSON answer.
    ///
    /// # Errors
    ///
    /// See the module documentation.
    pub async fn post_json<B, T>(&self, url: &str, body: &B, auth: Auth<'_>) -> Result<T, ProviderError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = auth.apply(self.http.post(url).json(body));
        let body = self.execute(request).await?;
        self.decode_json(&body)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<String, ProviderError> {
        let _permit = self.limiter.acquire().await.map_err(|err| self.transport(err))?;

        let response = request.send().await.map_err(|err| self.transport(err))?;
        let status = response.status();
        let body = response.text().await.map_err(|err| self.transport(err))?;

        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!(provider = %self.provider, "vendor rejected access token");
            return Err(ProviderError::TokenExpired);
        }
        if !status.is_success() {
            let message = vendor_message(&body)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "request failed".to_string());
            tracing::debug!(provider = %self.provider, status = status.as_u16(), %message, "vendor call failed");
            return Err(ProviderError::Api {
                provider: self.provider,
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }

    pub(crate) fn decode_json<T: DeserializeOwned>(&self, body: &str) -> Result<T, ProviderError> {
        serde_json::from_str(body).map_err(|err| self.decode(err))
    }

    pub(crate) fn decode(
        &self,
        err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> ProviderError {
        ProviderError::Decode {
            provider: self.provider,
            source: err.into(),
        }
    }

    fn transport(&self, err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> ProviderError {
        ProviderError::Transport {
            provider: self.provider,
            source: err.into(),
        }
    }
}

/// Pull a human readable message out of an error body.
///
/// Understands Square (`errors[].detail`), Clover (`message`) and OAuth
/// (`error_description` / `error`) shapes, and short plain-text bodies.
fn vendor_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return (trimmed.len() <= MAX_PLAIN_ERROR_LEN).then(|| trimmed.to_string());
    };
    let candidates = [
        json.pointer("/errors/0/detail"),
        json.pointer("/errors/0/code"),
        json.get("message"),
        json.get("error_description"),
        json.get("error"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|value| value.as_str().map(str::to_string))
}
