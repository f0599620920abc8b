use std::net::SocketAddr;
use std::str::FromStr;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use tidewire_application::{InboundDisposition, InboundReceipt, IngestInboundInput};
use tidewire_core::{AppError, TenantId};
use tidewire_domain::IntegrationId;
use tidewire_infrastructure::SIGNATURE_HEADER;

use crate::dto::InboundReceiptResponse;
use crate::error::ApiResult;
use crate::state::AppState;

use super::idempotency_key;

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Public callback endpoint for external systems.
///
/// Authenticity comes from the body signature, not from a viewer token.
pub async fn ingest_inbound_handler(
    State(state): State<AppState>,
    Path((tenant_id, integration_id)): Path<(String, String)>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<InboundReceiptResponse>)> {
    let input = IngestInboundInput {
        tenant_id: TenantId::from_str(tenant_id.as_str())?,
        integration_id: IntegrationId::from_str(integration_id.as_str())?,
        raw_body: body.to_vec(),
        idempotency_key: idempotency_key(&headers).unwrap_or_default(),
        signature: headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned),
        source_ip: Some(source_ip(&headers, peer)),
    };

    let receipt = state.inbound_ingestion_service.ingest(input).await?;
    let status = receipt_status(&receipt)?;

    Ok((status, Json(InboundReceiptResponse::from(&receipt))))
}

fn receipt_status(receipt: &InboundReceipt) -> Result<StatusCode, AppError> {
    if let Some(rejection) = receipt.rejection() {
        return Err(rejection);
    }

    Ok(match receipt.disposition {
        InboundDisposition::Accepted => StatusCode::ACCEPTED,
        _ => StatusCode::OK,
    })
}

fn source_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| peer.ip().to_string())
}

#[cfg(test)]
mod tests;
