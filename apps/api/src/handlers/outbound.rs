use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use tidewire_core::UserIdentity;
use tidewire_domain::OutboundEventId;

use crate::dto::{OutboundEventListQueryRequest, OutboundEventResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_outbound_events_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<OutboundEventListQueryRequest>,
) -> ApiResult<Json<Vec<OutboundEventResponse>>> {
    let events = state
        .outbound_dispatch_service
        .list_outbound_events(&user, query.into_query()?)
        .await?
        .into_iter()
        .map(OutboundEventResponse::from)
        .collect();

    Ok(Json(events))
}

pub async fn get_outbound_event_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(outbound_event_id): Path<String>,
) -> ApiResult<Json<OutboundEventResponse>> {
    let event = state
        .outbound_dispatch_service
        .find_outbound_event(&user, OutboundEventId::from_str(outbound_event_id.as_str())?)
        .await?;

    Ok(Json(OutboundEventResponse::from(event)))
}
