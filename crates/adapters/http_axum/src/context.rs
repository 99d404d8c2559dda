//! Extracts the calling store and its session from request headers.

use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use tillguard_domain::context::StoreContext;
use tillguard_domain::error::ValidationError;
use tillguard_domain::id::StoreId;
use tillguard_domain::provider::Provider;

use crate::error::ApiError;

/// Header carrying the store the caller acts for.
pub const STORE_ID_HEADER: &str = "x-store-id";

/// A [`StoreContext`] built from `X-Store-Id` and `Authorization: Bearer`.
///
/// A missing or blank bearer token is rejected with `401 session expired`
/// before the handler runs.
#[derive(Debug, Clone)]
pub struct Session(pub StoreContext);

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(STORE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(ValidationError::EmptyField("X-Store-Id"))?;
        let store_id = StoreId::from_str(raw).map_err(|_| ValidationError::UnknownValue {
            field: "store id",
            value: raw.to_string(),
        })?;

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .unwrap_or_default();

        let ctx = StoreContext::new(store_id, token);
        ctx.ensure_session()?;
        Ok(Self(ctx))
    }
}

/// Token of an `Authorization` value. The scheme name is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim_start().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

/// Turn a path segment into a provider, answering 400 when unknown.
pub(crate) fn parse_provider(raw: &str) -> Result<Provider, ApiError> {
    raw.parse::<Provider>().map_err(ApiError::from)
}
