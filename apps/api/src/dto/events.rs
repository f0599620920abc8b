use serde::{Deserialize, Serialize};
use serde_json::Value;
use tidewire_application::HistoryPage;
use tidewire_domain::AuditEvent;
use ts_rs::TS;

/// Query parameters of the history endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

/// Query parameters of the live stream endpoint besides the access token.
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub last_event_id: Option<String>,
}

/// API representation of one ledger record.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export_to = "audit-event-response.ts")]
pub struct AuditEventResponse {
    pub id: String,
    pub tenant_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub actor: Option<String>,
    pub occurred_at: String,
    #[ts(type = "unknown | null")]
    pub before: Option<Value>,
    #[ts(type = "unknown | null")]
    pub after: Option<Value>,
    #[ts(type = "Record<string, unknown>")]
    pub metadata: Value,
}

impl From<AuditEvent> for AuditEventResponse {
    fn from(value: AuditEvent) -> Self {
        Self {
            id: value.id.to_string(),
            tenant_id: value.tenant_id.to_string(),
            entity_type: value.entity_type,
            entity_id: value.entity_id,
            action: value.action,
            actor: value.actor,
            occurred_at: value.occurred_at.to_rfc3339(),
            before: value.before,
            after: value.after,
            metadata: value.metadata.to_value(),
        }
    }
}

/// One page of tenant history.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export_to = "history-page-response.ts")]
pub struct HistoryPageResponse {
    pub items: Vec<AuditEventResponse>,
    /// Opaque token for the next page; `null` once history is exhausted.
    pub next_cursor: Option<String>,
}

impl From<HistoryPage> for HistoryPageResponse {
    fn from(value: HistoryPage) -> Self {
        Self {
            items: value
                .items
                .into_iter()
                .map(AuditEventResponse::from)
                .collect(),
            next_cursor: value.next_cursor.map(|cursor| cursor.encode()),
        }
    }
}
