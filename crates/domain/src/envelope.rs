use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tidewire_core::{AppError, AppResult, TenantId};

use crate::AuditEventId;

/// Metadata key that scopes an envelope to one tenant.
pub const TENANT_ID_METADATA_KEY: &str = "tenantId";

/// Ledger entity type used for accepted inbound integration callbacks.
pub const INBOUND_EVENT_ENTITY_TYPE: &str = "integration_inbound_event";

/// Known kinds of broker events plus an open fallback for custom actions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// A record was created.
    RecordCreated,
    /// A record was updated.
    RecordUpdated,
    /// A record was deleted or archived.
    RecordDeleted,
    /// A record moved to another workflow status.
    RecordStatusChanged,
    /// A record was published.
    RecordPublished,
    /// An external system delivered an accepted callback.
    InboundReceived,
    /// Any other action, rendered as `entity_type.action`.
    Other(String),
}

impl EventKind {
    /// Classifies a ledger change into an event kind.
    #[must_use]
    pub fn classify(entity_type: &str, action: &str) -> Self {
        if entity_type == INBOUND_EVENT_ENTITY_TYPE {
            return Self::InboundReceived;
        }

        match action.trim().to_ascii_lowercase().as_str() {
            "create" | "created" => Self::RecordCreated,
            "update" | "updated" => Self::RecordUpdated,
            "delete" | "deleted" | "archive" | "archived" => Self::RecordDeleted,
            "status_change" | "status_changed" => Self::RecordStatusChanged,
            "publish" | "published" => Self::RecordPublished,
            other => Self::Other(format!("{entity_type}.{other}")),
        }
    }

    /// Returns the stable wire name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::RecordCreated => "record.created",
            Self::RecordUpdated => "record.updated",
            Self::RecordDeleted => "record.deleted",
            Self::RecordStatusChanged => "record.status_changed",
            Self::RecordPublished => "record.published",
            Self::InboundReceived => "integration.inbound_received",
            Self::Other(value) => value.as_str(),
        }
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "record.created" => Self::RecordCreated,
            "record.updated" => Self::RecordUpdated,
            "record.deleted" => Self::RecordDeleted,
            "record.status_changed" => Self::RecordStatusChanged,
            "record.published" => Self::RecordPublished,
            "integration.inbound_received" => Self::InboundReceived,
            _ => Self::Other(value),
        }
    }
}

impl From<EventKind> for String {
    fn from(value: EventKind) -> Self {
        match value {
            EventKind::Other(value) => value,
            known => known.as_str().to_owned(),
        }
    }
}

/// Open, JSON-object shaped metadata attached to ledger records and envelopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventMetadata(Map<String, Value>);

impl EventMetadata {
    /// Creates empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds metadata from a JSON value; `null` yields empty metadata.
    pub fn from_value(value: Value) -> AppResult<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Ok(Self(map)),
            other => Err(AppError::Validation(format!(
                "event metadata must be a JSON object, got {other}"
            ))),
        }
    }

    /// Returns one metadata value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Inserts or replaces one metadata value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the metadata as a JSON object value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Returns whether a viewer scoped to `tenant_id` may see this metadata.
    ///
    /// Entries without a tenant scope are global. A scope that is present but
    /// unreadable is never visible.
    #[must_use]
    pub fn is_visible_to(&self, tenant_id: TenantId) -> bool {
        match self.0.get(TENANT_ID_METADATA_KEY) {
            None | Some(Value::Null) => true,
            Some(Value::String(value)) => {
                TenantId::from_str(value).is_ok_and(|scoped| scoped == tenant_id)
            }
            Some(_) => false,
        }
    }
}

/// In-memory broker representation of one ledger event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Identifier of the ledger record this envelope was derived from.
    pub id: AuditEventId,
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Changed entity type.
    pub entity_type: String,
    /// Changed entity identifier.
    pub entity_id: String,
    /// Raw action label from the ledger.
    pub action: String,
    /// Ledger timestamp.
    pub timestamp: DateTime<Utc>,
    /// Subject that performed the change, when known.
    pub actor: Option<String>,
    /// Open metadata; carries the tenant scope.
    pub metadata: EventMetadata,
}

impl EventEnvelope {
    /// Returns whether a viewer scoped to `tenant_id` may receive this envelope.
    #[must_use]
    pub fn is_visible_to(&self, tenant_id: TenantId) -> bool {
        self.metadata.is_visible_to(tenant_id)
    }
}
