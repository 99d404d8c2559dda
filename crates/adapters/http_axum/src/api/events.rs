//! JSON REST handlers for scored POS events.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use tillguard_app::ports::IntegrationUseCases;
use tillguard_domain::integration_log::Page;
use tillguard_domain::pos_event::{EventQuery, PosEvent};

use crate::context::{Session, parse_provider};
use crate::error::ApiError;
use crate::state::AppState;

/// Query string of the events endpoint.
#[derive(Deserialize)]
pub struct EventParams {
    pub provider: Option<String>,
    #[serde(default)]
    pub flagged_only: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<PosEvent>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/events?provider=&flagged_only=&limit=&offset=`
pub async fn list<S>(
    State(state): State<AppState<S>>,
    Session(ctx): Session,
    Query(params): Query<EventParams>,
) -> Result<ListResponse, ApiError>
where
    S: IntegrationUseCases + Send + Sync + 'static,
{
    let defaults = Page::default();
    let query = EventQuery {
        provider: params.provider.as_deref().map(parse_provider).transpose()?,
        flagged_only: params.flagged_only,
        page: Page::new(
            params.limit.unwrap_or(defaults.limit),
            params.offset.unwrap_or(defaults.offset),
        ),
    };
    let events = state.integrations.get_events(&ctx, query).await?;
    Ok(ListResponse::Ok(Json(events)))
}
