use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tidewire_application::OutboundEventListQuery;
use tidewire_core::AppResult;
use tidewire_domain::{IntegrationId, OutboundEvent, OutboundStatus};
use ts_rs::TS;

const DEFAULT_OUTBOUND_LIST_LIMIT: usize = 50;

/// Query parameters of the outbound status listing.
#[derive(Debug, Default, Deserialize)]
pub struct OutboundEventListQueryRequest {
    pub status: Option<String>,
    pub integration_id: Option<String>,
    pub limit: Option<usize>,
}

impl OutboundEventListQueryRequest {
    pub fn into_query(self) -> AppResult<OutboundEventListQuery> {
        let status = non_blank(self.status)
            .map(|value| OutboundStatus::from_str(value.as_str()))
            .transpose()?;
        let integration_id = non_blank(self.integration_id)
            .map(|value| IntegrationId::from_str(value.as_str()))
            .transpose()?;

        Ok(OutboundEventListQuery {
            status,
            integration_id,
            limit: self.limit.unwrap_or(DEFAULT_OUTBOUND_LIST_LIMIT),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// API representation of one outbound delivery.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export_to = "outbound-event-response.ts")]
pub struct OutboundEventResponse {
    pub id: String,
    pub tenant_id: String,
    pub integration_id: String,
    pub event_type: String,
    #[ts(type = "unknown")]
    pub payload: Value,
    pub status: String,
    pub attempt_count: u32,
    pub next_attempt_at: Option<String>,
    pub last_error: Option<String>,
    pub idempotency_key: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<OutboundEvent> for OutboundEventResponse {
    fn from(value: OutboundEvent) -> Self {
        Self {
            id: value.id.to_string(),
            tenant_id: value.tenant_id.to_string(),
            integration_id: value.integration_id.to_string(),
            event_type: value.event_type,
            payload: value.payload,
            status: value.status.as_str().to_owned(),
            attempt_count: value.attempt_count,
            next_attempt_at: value.next_attempt_at.map(|value| value.to_rfc3339()),
            last_error: value.last_error,
            idempotency_key: value.idempotency_key,
            created_at: value.created_at.to_rfc3339(),
            updated_at: value.updated_at.to_rfc3339(),
        }
    }
}
