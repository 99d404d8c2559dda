//! Clover adapter (cloud, OAuth 2 v2 tokens, merchant scoped).

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

pub const DEFAULT_BASE_URL: &str = "https://api.clover.com";
pub const DEFAULT_AUTH_URL: &str = "https://www.clover.com/oauth/v2/authorize";
const PAGE_LIMIT: usize = 1000;

pub struct CloverAdapter {
    client: VendorClient,
    app: OAuthAppConfig,
}

#[derive(Debug, Deserialize)]
struct Elements<T> {
    #[serde(default = "Vec::new")]
    elements: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Merchant {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Device {
    id: String,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Payment {
    id: String,
    #[serde(default)]
    amount: Option<i64>,
    created_time: i64,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    employee: Option<IdRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Refund {
    id: String,
    #[serde(default)]
    amount: Option<i64>,
    created_time: i64,
    #[serde(default)]
    employee: Option<IdRef>,
    #[serde(default)]
    device: Option<IdRef>,
}

fn from_millis(millis: i64) -> Option<Timestamp> {
    chrono::DateTime::from_timestamp_millis(millis)
}

impl Payment {
    fn into_event(self, device_id: &str) -> Option<FetchedEvent> {
        let event_type = match self.result.as_deref() {
            Some("VOIDED" | "VOIDING") => PosEventType::Void,
            Some("DISCOUNT") => PosEventType::Discount,
            Some("SUCCESS" | "AUTH" | "AUTH_COMPLETED") | None => PosEventType::Sale,
            Some(_) => PosEventType::Other,
        };
        let mut event = FetchedEvent::new(self.id, event_type, from_millis(self.created_time)?)
            .location_id(device_id);
        if let Some(amount) = self.amount {
            event = event.amount_cents(amount);
        }
        if let Some(employee) = self.employee {
            event = event.employee_id(employee.id);
        }
        Some(event)
    }
}

impl Refund {
    fn into_event(self) -> Option<FetchedEvent> {
        let mut event =
            FetchedEvent::new(self.id, PosEventType::Refund, from_millis(self.created_time)?);
        if let Some(amount) = self.amount {
            event = event.amount_cents(amount);
        }
        if let Some(employee) = self.employee {
            event = event.employee_id(employee.id);
        }
        if let Some(device) = self.device {
            event = event.location_id(device.id);
        }
        Some(event)
    }
}

fn oauth(credentials: &ProviderCredentials) -> Result<&OAuthCredentials, ProviderError> {
    match credentials {
        ProviderCredentials::Clover(oauth) => Ok(oauth),
        other => Err(ValidationError::ProviderMismatch {
            expected: Provider::Clover,
            found: other.provider(),
        }
        .into()),
    }
}

fn merchant_id(oauth: &OAuthCredentials) -> Result<&str, ProviderError> {
    oauth
        .merchant_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ValidationError::EmptyField("merchant_id").into())
}

impl CloverAdapter {
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
            Err(ProviderError::NotConfigured(Provider::Clover))
        }
    }

    async fn merchant(&self, token: &str, merchant_id: &str) -> Result<Merchant, ProviderError> {
        self.client
            .get_json(
                &self.url(&format!("/v3/merchants/{merchant_id}")),
                &[],
                Auth::Bearer(token),
            )
            .await
    }

    /// Walk `offset` forward until a page comes back short.
    async fn all_pages<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        filters: &[(&'static str, String)],
    ) -> Result<Vec<T>, ProviderError> {
        let url = self.url(path);
        let mut items = Vec::new();
        loop {
            let mut query = filters.to_vec();
            query.push(("limit", PAGE_LIMIT.to_string()));
            query.push(("offset", items.len().to_string()));
            let page: Elements<T> = self.client.get_json(&url, &query, Auth::Bearer(token)).await?;
            let fetched = page.elements.len();
            items.extend(page.elements);
            if fetched < PAGE_LIMIT {
                return Ok(items);
            }
        }
    }

    async fn payments(
        &self,
        token: &str,
        merchant_id: &str,
        device_id: &str,
        since_millis: i64,
    ) -> Result<Vec<FetchedEvent>, ProviderError> {
        let filters = [
            ("filter", format!("createdTime>={since_millis}")),
            ("filter", format!("device.id={device_id}")),
            ("expand", "employee".to_string()),
        ];
        let payments: Vec<Payment> = self
            .all_pages(token, &format!("/v3/merchants/{merchant_id}/payments"), &filters)
            .await?;
        Ok(payments
            .into_iter()
            .filter_map(|payment| payment.into_event(device_id))
            .collect())
    }

    async fn refunds(
        &self,
        token: &str,
        merchant_id: &str,
        since_millis: i64,
    ) -> Result<Vec<FetchedEvent>, ProviderError> {
        let filters = [("filter", format!("createdTime>={since_millis}"))];
        let refunds: Vec<Refund> = self
            .all_pages(token, &format!("/v3/merchants/{merchant_id}/refunds"), &filters)
            .await?;
        Ok(refunds.into_iter().filter_map(Refund::into_event).collect())
    }

    async fn fetch_since(
        &self,
        token: &str,
        merchant_id: &str,
        since: Timestamp,
    ) -> Result<(usize, Vec<FetchedEvent>), ProviderError> {
        let since_millis = since.timestamp_millis();
        let devices: Vec<Device> = self
            .all_pages(token, &format!("/v3/merchants/{merchant_id}/devices"), &[])
            .await?;

        let per_device = devices
            .iter()
            .map(|device| self.payments(token, merchant_id, &device.id, since_millis));
        let (payments, refunds) = futures::try_join!(
            try_join_all(per_device),
            self.refunds(token, merchant_id, since_millis)
        )?;

        let mut events: Vec<FetchedEvent> = payments.into_iter().flatten().collect();
        events.extend(refunds);
        Ok((devices.len(), events))
    }
}

impl TokenRefresher for CloverAdapter {
    async fn refresh(&self, credentials: &OAuthCredentials) -> Result<OAuthCredentials, ProviderError> {
        self.require_app()?;
        let refresh_token = credentials
            .refresh_token
            .as_deref()
            .ok_or(ProviderError::TokenExpired)?;
        let body = json!({
            "client_id": self.app.client_id,
            "refresh_token": refresh_token,
        });
        let issued_at = now();
        let response: TokenResponse = self
            .client
            .post_json(&self.url("/oauth/v2/refresh"), &body, Auth::None)
            .await?;
        Ok(response.into_credentials(Some(credentials), issued_at))
    }
}

impl ProviderAdapter for CloverAdapter {
    fn provider(&self) -> Provider {
        Provider::Clover
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, ProviderError> {
        if self.app.client_id.trim().is_empty() {
            return Err(ProviderError::NotConfigured(Provider::Clover));
        }
        let base = self.app.auth_url.as_deref().unwrap_or(DEFAULT_AUTH_URL);
        let url = url::Url::parse_with_params(base, [
            ("client_id", self.app.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("state", state),
        ])
        .map_err(|_| ProviderError::NotConfigured(Provider::Clover))?;
        Ok(url.into())
    }

    async fn connect(&self, request: &ConnectRequest) -> Result<ProviderCredentials, ProviderError> {
        request.grant.validate_for(Provider::Clover)?;
        let ConnectGrant::AuthorizationCode {
            code, merchant_id, ..
        } = &request.grant
        else {
            return Err(ValidationError::UnsupportedConnectMethod(Provider::Clover).into());
        };
        self.require_app()?;

        let body = json!({
            "client_id": self.app.client_id,
            "client_secret": self.app.client_secret,
            "code": code,
        });
        let issued_at = now();
        let response: TokenResponse = self
            .client
            .post_json(&self.url("/oauth/v2/token"), &body, Auth::None)
            .await?;
        let mut credentials = response.into_credentials(None, issued_at);
        credentials.merchant_id.clone_from(merchant_id);
        tracing::info!(merchant_id = ?credentials.merchant_id, "clover authorization code exchanged");
        Ok(ProviderCredentials::Clover(credentials))
    }

    async fn test(&self, credentials: &ProviderCredentials) -> Result<Probe, ProviderFailure> {
        let oauth = oauth(credentials)?;
        let merchant_id = merchant_id(oauth)?;
        let (merchant, refreshed) = call_with_refresh(self, oauth, |token| async move {
            self.merchant(&token, merchant_id).await
        })
        .await
        .split(ProviderCredentials::Clover)?;
        Ok(Probe {
            refreshed,
            details: json!({ "merchant_id": merchant.id, "merchant_name": merchant.name }),
        })
    }

    async fn sync(
        &self,
        credentials: &ProviderCredentials,
        since: Timestamp,
    ) -> Result<SyncBatch, ProviderFailure> {
        let oauth = oauth(credentials)?;
        let merchant_id = merchant_id(oauth)?;
        let ((devices, events), refreshed) = call_with_refresh(self, oauth, |token| async move {
            self.fetch_since(&token, merchant_id, since).await
        })
        .await
        .split(ProviderCredentials::Clover)?;
        tracing::debug!(devices, events = events.len(), "clover sync fetched");
        Ok(SyncBatch {
            events,
            refreshed,
            details: json!({ "devices": devices }),
        })
    }

    /// Clover has no revocation endpoint; access ends when the merchant
    /// uninstalls the app.
    async fn disconnect(&self, credentials: &ProviderCredentials) -> Result<(), ProviderError> {
        oauth(credentials)?;
        Ok(())
    }
}
