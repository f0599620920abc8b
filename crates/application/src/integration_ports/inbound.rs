use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tidewire_core::{AppResult, TenantId};
use tidewire_domain::{InboundEvent, InboundEventId, IntegrationId, NewInboundEvent};

/// Result of an insert guarded by the inbound idempotency key.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundInsertOutcome {
    /// The key was new and the record was stored.
    Inserted(InboundEvent),
    /// A concurrent request stored the key first; this is that record.
    Existing(InboundEvent),
}

/// Repository port for inbound callbacks.
#[async_trait]
pub trait InboundEventRepository: Send + Sync {
    /// Returns the record stored for an idempotency key.
    async fn find_by_idempotency_key(
        &self,
        tenant_id: TenantId,
        integration_id: IntegrationId,
        idempotency_key: &str,
    ) -> AppResult<Option<InboundEvent>>;

    /// Inserts a record unless its idempotency key already exists.
    async fn insert_if_absent(&self, event: NewInboundEvent) -> AppResult<InboundInsertOutcome>;

    /// Records that an accepted callback was handed downstream.
    async fn mark_processed(
        &self,
        event_id: InboundEventId,
        processed_at: DateTime<Utc>,
    ) -> AppResult<()>;
}

/// Downstream consumer of accepted inbound callbacks.
#[async_trait]
pub trait InboundEventSink: Send + Sync {
    /// Handles one verified, parsed callback.
    async fn handle_inbound(&self, event: &InboundEvent) -> AppResult<()>;
}
