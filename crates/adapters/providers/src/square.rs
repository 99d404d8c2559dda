//! Square adapter (cloud, OAuth 2, revocable tokens).

use chrono::SecondsFormat;
use futures::future::try_join_all;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use tillguard_app::ports::{Probe, ProviderAdapter, ProviderFailure, SyncBatch};
use tillguard_domain::credentials::{
    ConnectGrant, ConnectRequest, OAuthCredentials, ProviderCredentials,
};
use tillguard_domain::error::{ProviderError, ValidationError};
use tillguard_domain::pos_event::{FetchedEvent, PosEventType};
use tillguard_domain::provider::Provider;
use tillguard_domain::time::{Timestamp, now};

use crate::client::{Auth, VendorClient};
use crate::config::OAuthAppConfig;
use crate::oauth::{TokenRefresher, TokenResponse, call_with_refresh};

pub const DEFAULT_BASE_URL: &str = "https://connect.squareup.com";
const SCOPES: &str = "MERCHANT_PROFILE_READ PAYMENTS_READ ORDERS_READ EMPLOYEES_READ";

pub struct SquareAdapter {
    client: VendorClient,
    app: OAuthAppConfig,
}

#[derive(Debug, Deserialize)]
struct LocationList {
    #[serde(default)]
    locations: Vec<Location>,
}

#[derive(Debug, Deserialize)]
struct Location {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Money {
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct Payment {
    id: String,
    created_at: Timestamp,
    #[serde(default)]
    status: String,
    #[serde(default)]
    amount_money: Option<Money>,
    #[serde(default)]
    team_member_id: Option<String>,
    #[serde(default)]
    employee_id: Option<String>,
    #[serde(default)]
    location_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Refund {
    id: String,
    created_at: Timestamp,
    #[serde(default)]
    amount_money: Option<Money>,
    #[serde(default)]
    location_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentPage {
    #[serde(default)]
    payments: Vec<Payment>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundPage {
    #[serde(default)]
    refunds: Vec<Refund>,
    #[serde(default)]
    cursor: Option<String>,
}

/// A cursor-paginated list answer.
trait CursorPage: DeserializeOwned {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

impl CursorPage for PaymentPage {
    type Item = Payment;

    fn into_parts(self) -> (Vec<Payment>, Option<String>) {
        (self.payments, self.cursor)
    }
}

impl CursorPage for RefundPage {
    type Item = Refund;

    fn into_parts(self) -> (Vec<Refund>, Option<String>) {
        (self.refunds, self.cursor)
    }
}

impl Payment {
    fn into_event(self, location_id: &str) -> FetchedEvent {
        let event_type = match self.status.as_str() {
            "CANCELED" => PosEventType::Void,
            "COMPLETED" | "APPROVED" => PosEventType::Sale,
            _ => PosEventType::Other,
        };
        let mut event = FetchedEvent::new(self.id, event_type, self.created_at)
            .location_id(self.location_id.as_deref().unwrap_or(location_id));
        if let Some(money) = self.amount_money {
            event = event.amount_cents(money.amount);
        }
        if let Some(employee) = self.team_member_id.or(self.employee_id) {
            event = event.employee_id(employee);
        }
        event
    }
}

impl Refund {
    fn into_event(self, location_id: &str) -> FetchedEvent {
        let mut event = FetchedEvent::new(self.id, PosEventType::Refund, self.created_at)
            .location_id(self.location_id.as_deref().unwrap_or(location_id));
        if let Some(money) = self.amount_money {
            event = event.amount_cents(money.amount);
        }
        event
    }
}

fn oauth(credentials: &ProviderCredentials) -> Result<&OAuthCredentials, ProviderError> {
    match credentials {
        ProviderCredentials::Square(oauth) => Ok(oauth),
        other => Err(ValidationError::ProviderMismatch {
            expected: Provider::Square,
            found: other.provider(),
        }
        .into()),
    }
}

impl SquareAdapter {
    #[must_use]
    pub fn new(client: VendorClient, app: OAuthAppConfig) -> Self {
        Self { client, app }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.app.base_url_or(DEFAULT_BASE_URL))
    }

    fn require_app(&self) -> Result<(), ProviderError> {
        if self.app.is_configured() {
            Ok(())
        } else {
            Err(ProviderError::NotConfigured(Provider::Square))
        }
    }

    async fn list_locations(&self, token: &str) -> Result<Vec<Location>, ProviderError> {
        let list: LocationList = self
            .client
            .get_json(&self.url("/v2/locations"), &[], Auth::Bearer(token))
            .await?;
        Ok(list.locations)
    }

    /// Follow `cursor` until the vendor stops returning one.
    async fn all_pages<P: CursorPage>(
        &self,
        token: &str,
        path: &str,
        location_id: &str,
        begin_time: &str,
    ) -> Result<Vec<P::Item>, ProviderError> {
        let url = self.url(path);
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![
                ("location_id", location_id.to_string()),
                ("begin_time", begin_time.to_string()),
            ];
            if let Some(cursor) = &cursor {
                query.push(("cursor", cursor.clone()));
            }
            let page: P = self.client.get_json(&url, &query, Auth::Bearer(token)).await?;
            let (page_items, next) = page.into_parts();
            items.extend(page_items);
            match next.filter(|next| !next.is_empty()) {
                Some(next) if cursor.as_ref() == Some(&next) => {
                    return Err(ProviderError::Decode {
                        provider: Provider::Square,
                        source: format!("{path} returned the same cursor twice").into(),
                    });
                }
                Some(next) => cursor = Some(next),
                None => return Ok(items),
            }
        }
    }

    async fn payments(
        &self,
        token: &str,
        location_id: &str,
        begin_time: &str,
    ) -> Result<Vec<FetchedEvent>, ProviderError> {
        let payments = self
            .all_pages::<PaymentPage>(token, "/v2/payments", location_id, begin_time)
            .await?;
        Ok(payments.into_iter().map(|p| p.into_event(location_id)).collect())
    }

    async fn refunds(
        &self,
        token: &str,
        location_id: &str,
        begin_time: &str,
    ) -> Result<Vec<FetchedEvent>, ProviderError> {
        let refunds = self
            .all_pages::<RefundPage>(token, "/v2/refunds", location_id, begin_time)
            .await?;
        Ok(refunds.into_iter().map(|r| r.into_event(location_id)).collect())
    }

    async fn fetch_since(
        &self,
        token: &str,
        since: Timestamp,
    ) -> Result<(usize, Vec<FetchedEvent>), ProviderError> {
        let begin_time = since.to_rfc3339_opts(SecondsFormat::Secs, true);
        let begin_time = begin_time.as_str();
        let locations = self.list_locations(token).await?;

        let queries = locations.iter().flat_map(move |location| {
            [
                futures::future::Either::Left(self.payments(token, &location.id, begin_time)),
                futures::future::Either::Right(self.refunds(token, &location.id, begin_time)),
            ]
        });
        let events = try_join_all(queries).await?.into_iter().flatten().collect();
        Ok((locations.len(), events))
    }
}

impl TokenRefresher for SquareAdapter {
    async fn refresh(&self, credentials: &OAuthCredentials) -> Result<OAuthCredentials, ProviderError> {
        self.require_app()?;
        let refresh_token = credentials
            .refresh_token
            .as_deref()
            .ok_or(ProviderError::TokenExpired)?;
        let body = json!({
            "client_id": self.app.client_id,
            "client_secret": self.app.client_secret,
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
        });
        let issued_at = now();
        let response: TokenResponse = self
            .client
            .post_json(&self.url("/oauth2/token"), &body, Auth::None)
            .await?;
        Ok(response.into_credentials(Some(credentials), issued_at))
    }
}

impl ProviderAdapter for SquareAdapter {
    fn provider(&self) -> Provider {
        Provider::Square
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, ProviderError> {
        if self.app.client_id.trim().is_empty() {
            return Err(ProviderError::NotConfigured(Provider::Square));
        }
        let base = match &self.app.auth_url {
            Some(url) => url.clone(),
            None => self.url("/oauth2/authorize"),
        };
        let url = url::Url::parse_with_params(&base, [
            ("client_id", self.app.client_id.as_str()),
            ("scope", SCOPES),
            ("session", "false"),
            ("state", state),
            ("redirect_uri", redirect_uri),
        ])
        .map_err(|_| ProviderError::NotConfigured(Provider::Square))?;
        Ok(url.into())
    }

    async fn connect(&self, request: &ConnectRequest) -> Result<ProviderCredentials, ProviderError> {
        request.grant.validate_for(Provider::Square)?;
        let ConnectGrant::AuthorizationCode {
            code, redirect_uri, ..
        } = &request.grant
        else {
            return Err(ValidationError::UnsupportedConnectMethod(Provider::Square).into());
        };
        self.require_app()?;

        let body = json!({
            "client_id": self.app.client_id,
            "client_secret": self.app.client_secret,
            "grant_type": "authorization_code",
            "code": code,
            "redirect_uri": redirect_uri,
        });
        let issued_at = now();
        let response: TokenResponse = self
            .client
            .post_json(&self.url("/oauth2/token"), &body, Auth::None)
            .await?;
        tracing::info!(merchant_id = ?response.merchant_id, "square authorization code exchanged");
        Ok(ProviderCredentials::Square(
            response.into_credentials(None, issued_at),
        ))
    }

    async fn test(&self, credentials: &ProviderCredentials) -> Result<Probe, ProviderFailure> {
        let oauth = oauth(credentials)?;
        let (locations, refreshed) = call_with_refresh(self, oauth, |token| async move {
            self.list_locations(&token).await
        })
        .await
        .split(ProviderCredentials::Square)?;
        let names: Vec<&str> = locations.iter().filter_map(|l| l.name.as_deref()).collect();
        Ok(Probe {
            refreshed,
            details: json!({ "locations": locations.len(), "location_names": names }),
        })
    }

    async fn sync(
        &self,
        credentials: &ProviderCredentials,
        since: Timestamp,
    ) -> Result<SyncBatch, ProviderFailure> {
        let oauth = oauth(credentials)?;
        let ((locations, events), refreshed) = call_with_refresh(self, oauth, |token| async move {
            self.fetch_since(&token, since).await
        })
        .await
        .split(ProviderCredentials::Square)?;
        tracing::debug!(locations, events = events.len(), "square sync fetched");
        Ok(SyncBatch {
            events,
            refreshed,
            details: json!({ "locations": locations }),
        })
    }

    async fn disconnect(&self, credentials: &ProviderCredentials) -> Result<(), ProviderError> {
        let oauth = oauth(credentials)?;
        self.require_app()?;
        let body = json!({
            "client_id": self.app.client_id,
            "access_token": oauth.access_token,
        });
        let _: serde_json::Value = self
            .client
            .post_json(
                &self.url("/oauth2/revoke"),
                &body,
                Auth::ClientSecret(&self.app.client_secret),
            )
            .await?;
        Ok(())
    }
}
