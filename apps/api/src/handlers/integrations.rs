use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::{HeaderMap, StatusCode};
use tidewire_core::{AppError, UserIdentity};
use tidewire_domain::IntegrationId;

use crate::dto::{
    EnqueueOutboundEventRequest, IntegrationResponse, OutboundEventResponse,
    RegisterIntegrationRequest, RegisteredIntegrationResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

use super::idempotency_key;

pub async fn list_integrations_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<IntegrationResponse>>> {
    let integrations = state
        .integration_service
        .list_integrations(&user)
        .await?
        .into_iter()
        .map(IntegrationResponse::from)
        .collect();

    Ok(Json(integrations))
}

pub async fn register_integration_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<RegisterIntegrationRequest>,
) -> ApiResult<(StatusCode, Json<RegisteredIntegrationResponse>)> {
    let registered = state
        .integration_service
        .register_integration(&user, payload.into())
        .await?;

    Ok((StatusCode::CREATED, Json(RegisteredIntegrationResponse::from(registered))))
}

pub async fn enqueue_outbound_event_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(integration_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<EnqueueOutboundEventRequest>,
) -> ApiResult<(StatusCode, Json<OutboundEventResponse>)> {
    let integration_id = IntegrationId::from_str(integration_id.as_str())?;
    let idempotency_key = idempotency_key(&headers).ok_or_else(|| {
        AppError::Validation("Idempotency-Key header is required".to_owned())
    })?;

    let event = state
        .outbound_dispatch_service
        .enqueue_for_viewer(
            &user,
            integration_id,
            payload.event_type.as_str(),
            payload.payload,
            idempotency_key.as_str(),
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(OutboundEventResponse::from(event))))
}
