//! JSON REST handlers for store integrations.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use tillguard_app::ports::IntegrationUseCases;
use tillguard_domain::credentials::ConnectRequest;
use tillguard_domain::error::ValidationError;
use tillguard_domain::integration::Integration;
use tillguard_domain::integration_log::{IntegrationLog, Page};
use tillguard_domain::outcome::{OperationResult, SyncResult};

use crate::context::{Session, parse_provider};
use crate::error::ApiError;
use crate::state::AppState;

/// Query string of the authorize endpoint.
#[derive(Deserialize)]
pub struct AuthorizeParams {
    pub redirect_uri: Option<String>,
}

/// Body of the authorize endpoint.
#[derive(Serialize)]
pub struct AuthorizeBody {
    pub url: String,
}

/// Query string of the logs endpoint.
#[derive(Deserialize)]
pub struct LogParams {
    pub provider: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<Integration>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the get endpoint.
pub enum GetResponse {
    Ok(Json<Integration>),
}

impl IntoResponse for GetResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the authorize endpoint.
pub enum AuthorizeResponse {
    Ok(Json<AuthorizeBody>),
}

impl IntoResponse for AuthorizeResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the connect, test, sync and disconnect endpoints.
///
/// Failed actions still answer `200` with `success: false`, except an
/// expired session which answers `401` with the same body.
pub enum ActionResponse<T> {
    Ok(Json<T>),
    SessionExpired(Json<T>),
}

impl<T: Serialize> IntoResponse for ActionResponse<T> {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
            Self::SessionExpired(json) => (StatusCode::UNAUTHORIZED, json).into_response(),
        }
    }
}

impl From<OperationResult> for ActionResponse<OperationResult> {
    fn from(result: OperationResult) -> Self {
        if result.is_session_expired() {
            Self::SessionExpired(Json(result))
        } else {
            Self::Ok(Json(result))
        }
    }
}

impl From<SyncResult> for ActionResponse<SyncResult> {
    fn from(result: SyncResult) -> Self {
        if result.is_session_expired() {
            Self::SessionExpired(Json(result))
        } else {
            Self::Ok(Json(result))
        }
    }
}

/// Possible responses from the logs endpoint.
pub enum LogsResponse {
    Ok(Json<Vec<IntegrationLog>>),
}

impl IntoResponse for LogsResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/integrations`
pub async fn list<S>(
    State(state): State<AppState<S>>,
    Session(ctx): Session,
) -> Result<ListResponse, ApiError>
where
    S: IntegrationUseCases + Send + Sync + 'static,
{
    let integrations = state.integrations.get_integrations(&ctx).await?;
    Ok(ListResponse::Ok(Json(integrations)))
}

/// `GET /api/integrations/{provider}`
pub async fn get<S>(
    State(state): State<AppState<S>>,
    Session(ctx): Session,
    Path(provider): Path<String>,
) -> Result<GetResponse, ApiError>
where
    S: IntegrationUseCases + Send + Sync + 'static,
{
    let provider = parse_provider(&provider)?;
    let integration = state.integrations.get_integration(&ctx, provider).await?;
    Ok(GetResponse::Ok(Json(integration)))
}

/// `GET /api/integrations/{provider}/authorize?redirect_uri=`
pub async fn authorize<S>(
    State(state): State<AppState<S>>,
    Session(ctx): Session,
    Path(provider): Path<String>,
    Query(params): Query<AuthorizeParams>,
) -> Result<AuthorizeResponse, ApiError>
where
    S: IntegrationUseCases + Send + Sync + 'static,
{
    let provider = parse_provider(&provider)?;
    let redirect_uri = params
        .redirect_uri
        .filter(|uri| !uri.trim().is_empty())
        .ok_or(ValidationError::EmptyField("redirect_uri"))?;
    let url = state
        .integrations
        .authorization_url(&ctx, provider, &redirect_uri)?;
    Ok(AuthorizeResponse::Ok(Json(AuthorizeBody { url })))
}

/// `POST /api/integrations/{provider}/connect`
pub async fn connect<S>(
    State(state): State<AppState<S>>,
    Session(ctx): Session,
    Path(provider): Path<String>,
    Json(request): Json<ConnectRequest>,
) -> Result<ActionResponse<OperationResult>, ApiError>
where
    S: IntegrationUseCases + Send + Sync + 'static,
{
    let provider = parse_provider(&provider)?;
    let result = state.integrations.connect(&ctx, provider, request).await;
    Ok(result.into())
}

/// `POST /api/integrations/{provider}/test`
pub async fn test<S>(
    State(state): State<AppState<S>>,
    Session(ctx): Session,
    Path(provider): Path<String>,
) -> Result<ActionResponse<OperationResult>, ApiError>
where
    S: IntegrationUseCases + Send + Sync + 'static,
{
    let provider = parse_provider(&provider)?;
    let result = state.integrations.test_connection(&ctx, provider).await;
    Ok(result.into())
}

/// `POST /api/integrations/{provider}/sync`
pub async fn sync<S>(
    State(state): State<AppState<S>>,
    Session(ctx): Session,
    Path(provider): Path<String>,
) -> Result<ActionResponse<SyncResult>, ApiError>
where
    S: IntegrationUseCases + Send + Sync + 'static,
{
    let provider = parse_provider(&provider)?;
    let result = state.integrations.sync(&ctx, provider).await;
    Ok(result.into())
}

/// `POST /api/integrations/{provider}/disconnect`
pub async fn disconnect<S>(
    State(state): State<AppState<S>>,
    Session(ctx): Session,
    Path(provider): Path<String>,
) -> Result<ActionResponse<OperationResult>, ApiError>
where
    S: IntegrationUseCases + Send + Sync + 'static,
{
    let provider = parse_provider(&provider)?;
    let result = state.integrations.disconnect(&ctx, provider).await;
    Ok(result.into())
}

/// `GET /api/integrations/logs?provider=&limit=&offset=`
pub async fn logs<S>(
    State(state): State<AppState<S>>,
    Session(ctx): Session,
    Query(params): Query<LogParams>,
) -> Result<LogsResponse, ApiError>
where
    S: IntegrationUseCases + Send + Sync + 'static,
{
    let provider = params.provider.as_deref().map(parse_provider).transpose()?;
    let defaults = Page::default();
    let page = Page::new(
        params.limit.unwrap_or(defaults.limit),
        params.offset.unwrap_or(defaults.offset),
    );
    let logs = state.integrations.get_logs(&ctx, provider, page).await?;
    Ok(LogsResponse::Ok(Json(logs)))
}
