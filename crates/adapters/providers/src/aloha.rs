//! NCR Aloha adapter (on-premise, basic auth, XML).
//!
//! Each store runs its own Aloha server; the adapter reaches it at
//! `{scheme}://{host}:{port}` from the stored credentials.

use chrono::SecondsFormat;
use futures::future::try_join_all;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use tillguard_app::ports::{Probe, ProviderAdapter, ProviderFailure, SyncBatch};
use tillguard_domain::credentials::{
    ConnectGrant, ConnectRequest, OnPremCredentials, ProviderCredentials,
};
use tillguard_domain::error::{ProviderError, ValidationError};
use tillguard_domain::pos_event::{FetchedEvent, PosEventType, Severity};
use tillguard_domain::provider::Provider;
use tillguard_domain::time::Timestamp;

use crate::client::{Auth, VendorClient};
use crate::config::AlohaConfig;

pub struct AlohaAdapter {
    client: VendorClient,
    config: AlohaConfig,
}

#[derive(Debug, Deserialize)]
struct SiteStatus {
    #[serde(rename = "@online")]
    online: bool,
    #[serde(rename = "@version", default)]
    version: Option<String>,
    #[serde(rename = "@name", default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TerminalList {
    #[serde(rename = "Terminal", default)]
    terminals: Vec<Terminal>,
}

#[derive(Debug, Deserialize)]
struct Terminal {
    #[serde(rename = "@id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(rename = "Event", default)]
    events: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "@time")]
    time: String,
    #[serde(rename = "@amount", default)]
    amount: Option<i64>,
    #[serde(rename = "@employee", default)]
    employee: Option<String>,
    #[serde(rename = "@severity", default)]
    severity: Option<String>,
}

/// Aloha activity codes.
fn event_type(kind: &str) -> PosEventType {
    match kind.to_ascii_uppercase().as_str() {
        "SALE" | "CLOSE_CHECK" => PosEventType::Sale,
        "VOID" | "DELETE_ITEM" => PosEventType::Void,
        "REFUND" | "RETURN" => PosEventType::Refund,
        "NOSALE" | "NO_SALE" => PosEventType::NoSale,
        "COMP" | "PROMO" | "DISCOUNT" => PosEventType::Discount,
        "PRICE_OVERRIDE" | "PRICE_CHANGE" => PosEventType::PriceOverride,
        "DRAWER_OPEN" | "OPEN_DRAWER" => PosEventType::DrawerOpen,
        "LOGIN" | "CLOCK_IN" => PosEventType::Login,
        _ => PosEventType::Other,
    }
}

fn on_prem(credentials: &ProviderCredentials) -> Result<&OnPremCredentials, ProviderError> {
    match credentials {
        ProviderCredentials::Aloha(on_prem) => Ok(on_prem),
        other => Err(ValidationError::ProviderMismatch {
            expected: Provider::Aloha,
            found: other.provider(),
        }
        .into()),
    }
}

fn basic(credentials: &OnPremCredentials) -> Auth<'_> {
    Auth::Basic {
        username: &credentials.username,
        password: &credentials.password,
    }
}

impl AlohaAdapter {
    #[must_use]
    pub fn new(client: VendorClient, config: AlohaConfig) -> Self {
        Self { client, config }
    }

    /// Site URL with `segments` appended, each percent-encoded so ids
    /// cannot alter the path.
    fn url(
        &self,
        credentials: &OnPremCredentials,
        segments: &[&str],
    ) -> Result<url::Url, ProviderError> {
        let host = match credentials.host.parse::<std::net::IpAddr>() {
            Ok(std::net::IpAddr::V6(ip)) => format!("[{ip}]"),
            _ => credentials.host.clone(),
        };
        let invalid = || ValidationError::InvalidHost(credentials.host.clone());
        let mut url = url::Url::parse(&format!(
            "{}://{host}:{}/",
            self.config.scheme, credentials.port
        ))
        .map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .clear()
            .extend(["api", "sites", credentials.site_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    async fn get_xml<T: DeserializeOwned>(
        &self,
        credentials: &OnPremCredentials,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = self.url(credentials, segments)?;
        let body = self
            .client
            .get_text(url.as_str(), query, basic(credentials))
            .await?;
        quick_xml::de::from_str(&body).map_err(|err| self.client.decode(err))
    }

    async fn status(&self, credentials: &OnPremCredentials) -> Result<SiteStatus, ProviderError> {
        let status: SiteStatus = self.get_xml(credentials, &["status"], &[]).await?;
        if !status.online {
            return Err(ProviderError::Api {
                provider: Provider::Aloha,
                status: 503,
                message: format!("site {} is offline", credentials.site_id),
            });
        }
        Ok(status)
    }

    async fn terminal_events(
        &self,
        credentials: &OnPremCredentials,
        terminal_id: &str,
        since: &str,
    ) -> Result<Vec<FetchedEvent>, ProviderError> {
        let list: EventList = self
            .get_xml(
                credentials,
                &["terminals", terminal_id, "events"],
                &[("since", since.to_string())],
            )
            .await?;
        list.events
            .into_iter()
            .map(|record| self.to_event(record, terminal_id))
            .collect()
    }

    fn to_event(&self, record: EventRecord, terminal_id: &str) -> Result<FetchedEvent, ProviderError> {
        let occurred_at = chrono::DateTime::parse_from_rfc3339(&record.time)
            .map_err(|err| self.client.decode(err))?
            .to_utc();
        let mut event = FetchedEvent::new(record.id, event_type(&record.kind), occurred_at)
            .location_id(terminal_id);
        if let Some(amount) = record.amount {
            event = event.amount_cents(amount);
        }
        if let Some(employee) = record.employee {
            event = event.employee_id(employee);
        }
        if let Some(severity) = record
            .severity
            .as_deref()
            .and_then(|s| s.to_ascii_lowercase().parse::<Severity>().ok())
        {
            event.severity = severity;
        }
        Ok(event)
    }
}

impl ProviderAdapter for AlohaAdapter {
    fn provider(&self) -> Provider {
        Provider::Aloha
    }

    fn authorization_url(&self, _redirect_uri: &str, _state: &str) -> Result<String, ProviderError> {
        Err(ValidationError::UnsupportedConnectMethod(Provider::Aloha).into())
    }

    async fn connect(&self, request: &ConnectRequest) -> Result<ProviderCredentials, ProviderError> {
        request.grant.validate_for(Provider::Aloha)?;
        let ConnectGrant::Credentials { credentials } = &request.grant else {
            return Err(ValidationError::UnsupportedConnectMethod(Provider::Aloha).into());
        };
        let status = self.status(on_prem(credentials)?).await?;
        tracing::info!(version = ?status.version, "aloha site reachable");
        Ok(credentials.clone())
    }

    async fn test(&self, credentials: &ProviderCredentials) -> Result<Probe, ProviderFailure> {
        let on_prem = on_prem(credentials)?;
        let status = self.status(on_prem).await?;
        Ok(Probe {
            refreshed: None,
            details: json!({
                "site_id": on_prem.site_id,
                "site_name": status.name,
                "version": status.version,
            }),
        })
    }

    async fn sync(
        &self,
        credentials: &ProviderCredentials,
        since: Timestamp,
    ) -> Result<SyncBatch, ProviderFailure> {
        let on_prem = on_prem(credentials)?;
        let since = since.to_rfc3339_opts(SecondsFormat::Secs, true);
        let terminals: TerminalList = self.get_xml(on_prem, &["terminals"], &[]).await?;

        let per_terminal = terminals
            .terminals
            .iter()
            .map(|terminal| self.terminal_events(on_prem, &terminal.id, &since));
        let events: Vec<FetchedEvent> = try_join_all(per_terminal)
            .await?
            .into_iter()
            .flatten()
            .collect();
        tracing::debug!(terminals = terminals.terminals.len(), events = events.len(), "aloha sync fetched");

        Ok(SyncBatch {
            events,
            refreshed: None,
            details: json!({ "terminals": terminals.terminals.len() }),
        })
    }

    /// Basic-auth credentials have nothing to revoke.
    async fn disconnect(&self, credentials: &ProviderCredentials) -> Result<(), ProviderError> {
        on_prem(credentials)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::RateLimiter;
    use mockito::Matcher;

    fn adapter() -> AlohaAdapter {
        AlohaAdapter::new(
            VendorClient::new(Provider::Aloha, reqwest::Client::new(), RateLimiter::default()),
            AlohaConfig::default(),
        )
    }

    fn creds_for(server: &mockito::ServerGuard) -> OnPremCredentials {
        let address = server.socket_address();
        OnPremCredentials {
            host: address.ip().to_string(),
            port: address.port(),
            site_id: "site-7".to_string(),
            username: "manager".to_string(),
            password: "pa55".to_string(),
        }
    }

    fn connect_request(credentials: OnPremCredentials) -> ConnectRequest {
        ConnectRequest {
            grant: ConnectGrant::Credentials {
                credentials: ProviderCredentials::Aloha(credentials),
            },
            config: serde_json::Value::Null,
        }
    }

    #[test]
    fn should_map_aloha_activity_codes() {
        assert_eq!(event_type("void"), PosEventType::Void);
        assert_eq!(event_type("NOSALE"), PosEventType::NoSale);
        assert_eq!(event_type("Comp"), PosEventType::Discount);
        assert_eq!(event_type("PRICE_OVERRIDE"), PosEventType::PriceOverride);
        assert_eq!(event_type("TIP_ADJUST"), PosEventType::Other);
    }

    #[test]
    fn should_refuse_oauth_authorization_url() {
        let err = adapter().authorization_url("https://x", "s").unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Validation(ValidationError::UnsupportedConnectMethod(Provider::Aloha))
        ));
    }

    #[tokio::test]
    async fn should_probe_status_with_basic_auth_when_connecting() {
        let mut server = mockito::Server::new_async().await;
        let status = server
            .mock("GET", "/api/sites/site-7/status")
            .match_header("authorization", "Basic bWFuYWdlcjpwYTU1")
            .with_header("content-type", "application/xml")
            .with_body(r#"<SiteStatus online="true" version="19.3" name="Harbor Grill"/>"#)
            .expect(1)
            .create_async()
            .await;
        let credentials = creds_for(&server);

        let stored = adapter()
            .connect(&connect_request(credentials.clone()))
            .await
            .unwrap();

        assert_eq!(stored, ProviderCredentials::Aloha(credentials));
        status.assert_async().await;
    }

    #[tokio::test]
    async fn should_reject_hostname_before_any_network_call() {
        let credentials = OnPremCredentials {
            host: "aloha.local".to_string(),
            port: 8080,
            site_id: "site-7".to_string(),
            username: "manager".to_string(),
            password: "pa55".to_string(),
        };

        let err = adapter().connect(&connect_request(credentials)).await.unwrap_err();

        assert!(matches!(
            err,
            ProviderError::Validation(ValidationError::InvalidHost(_))
        ));
    }

    #[tokio::test]
    async fn should_fail_test_when_site_is_offline() {
        let mut server = mockito::Server::new_async().await;
        let _status = server
            .mock("GET", "/api/sites/site-7/status")
            .with_body(r#"<SiteStatus online="false"/>"#)
            .create_async()
            .await;
        let credentials = ProviderCredentials::Aloha(creds_for(&server));

        let err = adapter().test(&credentials).await.unwrap_err().error;

        assert_eq!(err.to_string(), "aloha API returned 503: site site-7 is offline");
    }

    #[tokio::test]
    async fn should_report_token_expired_when_password_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _status = server
            .mock("GET", "/api/sites/site-7/status")
            .with_status(401)
            .create_async()
            .await;
        let credentials = ProviderCredentials::Aloha(creds_for(&server));

        let err = adapter().test(&credentials).await.unwrap_err().error;

        assert!(matches!(err, ProviderError::TokenExpired));
    }

    #[tokio::test]
    async fn should_read_events_of_every_terminal() {
        let mut server = mockito::Server::new_async().await;
        let _terminals = server
            .mock("GET", "/api/sites/site-7/terminals")
            .with_body(r#"<Terminals><Terminal id="T1" name="Bar"/><Terminal id="T2"/></Terminals>"#)
            .create_async()
            .await;
        let t1 = server
            .mock("GET", "/api/sites/site-7/terminals/T1/events")
            .match_query(Matcher::UrlEncoded("since".into(), "2024-05-01T00:00:00Z".into()))
            .with_body(
                r#"<Events>
                    <Event id="E1" type="VOID" time="2024-05-01T23:30:00-04:00" amount="4500" employee="EMP9"/>
                    <Event id="E2" type="NOSALE" time="2024-05-01T23:31:00-04:00" severity="CRITICAL"/>
                </Events>"#,
            )
            .expect(1)
            .create_async()
            .await;
        let t2 = server
            .mock("GET", "/api/sites/site-7/terminals/T2/events")
            .match_query(Matcher::Any)
            .with_body("<Events/>")
            .expect(1)
            .create_async()
            .await;
        let credentials = ProviderCredentials::Aloha(creds_for(&server));
        let since = chrono::DateTime::parse_from_rfc3339("2024-05-01T00:00:00Z")
            .unwrap()
            .to_utc();

        let batch = adapter().sync(&credentials, since).await.unwrap();

        assert_eq!(batch.events.len(), 2);
        let void = &batch.events[0];
        assert_eq!(void.event_type, PosEventType::Void);
        assert_eq!(void.amount_cents, Some(4500));
        assert_eq!(void.employee_id.as_deref(), Some("EMP9"));
        assert_eq!(void.location_id.as_deref(), Some("T1"));
        assert_eq!(void.occurred_at.to_rfc3339(), "2024-05-02T03:30:00+00:00");
        assert_eq!(batch.events[1].severity, Severity::Critical);
        assert_eq!(batch.details["terminals"], 2);
        t1.assert_async().await;
        t2.assert_async().await;
    }

    #[tokio::test]
    async fn should_percent_encode_site_and_terminal_ids_in_path() {
        let mut server = mockito::Server::new_async().await;
        let terminals = server
            .mock("GET", "/api/sites/north%2F7%20east/terminals")
            .with_body(r#"<Terminals><Terminal id="../T1"/></Terminals>"#)
            .expect(1)
            .create_async()
            .await;
        let events = server
            .mock("GET", "/api/sites/north%2F7%20east/terminals/..%2FT1/events")
            .match_query(Matcher::Any)
            .with_body(r#"<Events><Event id="E1" type="SALE" time="2024-05-01T12:00:00Z"/></Events>"#)
            .expect(1)
            .create_async()
            .await;
        let credentials = ProviderCredentials::Aloha(OnPremCredentials {
            site_id: "north/7 east".to_string(),
            ..creds_for(&server)
        });

        let batch = adapter()
            .sync(&credentials, tillguard_domain::time::now())
            .await
            .unwrap();

        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].location_id.as_deref(), Some("../T1"));
        terminals.assert_async().await;
        events.assert_async().await;
    }

    #[tokio::test]
    async fn should_report_decode_error_for_malformed_xml() {
        let mut server = mockito::Server::new_async().await;
        let _terminals = server
            .mock("GET", "/api/sites/site-7/terminals")
            .with_body("<Terminals><Terminal></Terminals>")
            .create_async()
            .await;
        let credentials = ProviderCredentials::Aloha(creds_for(&server));

        let err = adapter()
            .sync(&credentials, tillguard_domain::time::now())
            .await
            .unwrap_err()
            .error;

        assert!(matches!(err, ProviderError::Decode { .. }));
    }
}
