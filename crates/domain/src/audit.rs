use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tidewire_core::{AppResult, NonEmptyString, TenantId};

use crate::{
    AuditEventId, EventEnvelope, EventKind, EventMetadata, LedgerPosition,
    TENANT_ID_METADATA_KEY,
};

/// Immutable ledger record of one domain change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Monotonic-sortable record identifier.
    pub id: AuditEventId,
    /// Tenant scope.
    pub tenant_id: TenantId,
    /// Changed entity type.
    pub entity_type: String,
    /// Changed entity identifier.
    pub entity_id: String,
    /// Action label.
    pub action: String,
    /// Subject that performed the change, when known.
    pub actor: Option<String>,
    /// Server-assigned commit timestamp.
    pub occurred_at: DateTime<Utc>,
    /// Snapshot before the change.
    pub before: Option<Value>,
    /// Snapshot after the change.
    pub after: Option<Value>,
    /// Open metadata, e.g. `{ "module": "documents" }`.
    pub metadata: EventMetadata,
}

impl AuditEvent {
    /// Returns the record's position in the ledger total order.
    #[must_use]
    pub fn position(&self) -> LedgerPosition {
        LedgerPosition {
            occurred_at: self.occurred_at,
            id: self.id,
        }
    }

    /// Derives the broker envelope for live fan-out.
    #[must_use]
    pub fn to_envelope(&self) -> EventEnvelope {
        let mut metadata = self.metadata.clone();
        metadata.insert(TENANT_ID_METADATA_KEY, self.tenant_id.to_string());

        EventEnvelope {
            id: self.id,
            kind: EventKind::classify(self.entity_type.as_str(), self.action.as_str()),
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id.clone(),
            action: self.action.clone(),
            timestamp: self.occurred_at,
            actor: self.actor.clone(),
            metadata,
        }
    }
}

/// Validated input for one ledger append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEvent {
    tenant_id: TenantId,
    entity_type: NonEmptyString,
    entity_id: NonEmptyString,
    action: NonEmptyString,
    actor: Option<String>,
    before: Option<Value>,
    after: Option<Value>,
    metadata: EventMetadata,
}

impl NewAuditEvent {
    /// Creates a ledger append input.
    pub fn new(
        tenant_id: TenantId,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        action: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            tenant_id,
            entity_type: NonEmptyString::for_field("entity_type", entity_type)?,
            entity_id: NonEmptyString::for_field("entity_id", entity_id)?,
            action: NonEmptyString::for_field("action", action)?,
            actor: None,
            before: None,
            after: None,
            metadata: EventMetadata::new(),
        })
    }

    /// Records the subject that performed the change.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Attaches before/after snapshots.
    #[must_use]
    pub fn with_snapshots(mut self, before: Option<Value>, after: Option<Value>) -> Self {
        self.before = before;
        self.after = after;
        self
    }

    /// Attaches open metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the tenant scope.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the entity type.
    #[must_use]
    pub fn entity_type(&self) -> &NonEmptyString {
        &self.entity_type
    }

    /// Returns the entity identifier.
    #[must_use]
    pub fn entity_id(&self) -> &NonEmptyString {
        &self.entity_id
    }

    /// Returns the action label.
    #[must_use]
    pub fn action(&self) -> &NonEmptyString {
        &self.action
    }

    /// Returns the acting subject.
    #[must_use]
    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    /// Returns the snapshot before the change.
    #[must_use]
    pub fn before(&self) -> Option<&Value> {
        self.before.as_ref()
    }

    /// Returns the snapshot after the change.
    #[must_use]
    pub fn after(&self) -> Option<&Value> {
        self.after.as_ref()
    }

    /// Returns the metadata.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    /// Materializes the stored record once the store assigned id and timestamp.
    #[must_use]
    pub fn into_event(self, id: AuditEventId, occurred_at: DateTime<Utc>) -> AuditEvent {
        AuditEvent {
            id,
            tenant_id: self.tenant_id,
            entity_type: self.entity_type.into(),
            entity_id: self.entity_id.into(),
            action: self.action.into(),
            actor: self.actor,
            occurred_at,
            before: self.before,
            after: self.after,
            metadata: self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use tidewire_core::TenantId;

    use super::NewAuditEvent;
    use crate::{AuditEventId, EventKind, EventMetadata};

    #[test]
    fn new_audit_event_rejects_blank_fields() {
        let tenant_id = TenantId::new();
        assert!(NewAuditEvent::new(tenant_id, " ", "doc-1", "created").is_err());
        assert!(NewAuditEvent::new(tenant_id, "document", "", "created").is_err());
        assert!(NewAuditEvent::new(tenant_id, "document", "doc-1", "\t").is_err());
    }

    #[test]
    fn envelope_carries_tenant_scope_and_metadata() {
        let tenant_id = TenantId::new();
        let mut metadata = EventMetadata::new();
        metadata.insert("module", "documents");

        let Ok(input) = NewAuditEvent::new(tenant_id, "document", "doc-1", "published") else {
            panic!("valid audit input was rejected");
        };
        let event = input
            .with_actor("alice")
            .with_snapshots(None, Some(json!({"title": "Plan"})))
            .with_metadata(metadata)
            .into_event(AuditEventId::new(), Utc::now());

        let envelope = event.to_envelope();
        assert_eq!(envelope.id, event.id);
        assert_eq!(envelope.kind, EventKind::RecordPublished);
        assert_eq!(envelope.actor.as_deref(), Some("alice"));
        assert_eq!(envelope.metadata.get("module"), Some(&json!("documents")));
        assert!(envelope.is_visible_to(tenant_id));
        assert!(!envelope.is_visible_to(TenantId::new()));
    }
}
