use std::convert::Infallible;

use axum::Json;
use axum::extract::{Extension, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use futures::{Stream, StreamExt};
use tidewire_core::UserIdentity;

use crate::dto::{HistoryPageResponse, HistoryQuery, StreamQuery};
use crate::error::ApiResult;
use crate::state::AppState;

mod stream;

pub(crate) use stream::LiveStream;

const LAST_EVENT_ID_HEADER: &str = "last-event-id";

pub async fn list_history_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryPageResponse>> {
    let page = state
        .audit_ledger_service
        .list_history(&user, query.cursor.as_deref(), query.limit)
        .await?;

    Ok(Json(HistoryPageResponse::from(page)))
}

/// Server-sent event stream of live ledger changes for the viewer's
/// effective tenant.
pub async fn stream_events_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    headers: HeaderMap,
    Query(query): Query<StreamQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let last_event_id = headers
        .get(LAST_EVENT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
        .or(query.last_event_id);

    let live = LiveStream::open(
        state.event_broker.as_ref(),
        user.effective_tenant_id(),
        last_event_id.as_deref(),
        state.stream_keepalive,
    )?;

    tracing::info!(
        subject = %user.subject(),
        tenant_id = %user.effective_tenant_id(),
        resumed = last_event_id.is_some(),
        "live event stream opened"
    );

    Ok(Sse::new(live.frames().map(|frame| Ok::<_, Infallible>(frame.into_event()))))
}
