use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tidewire_core::{AppResult, TenantId};
use tidewire_domain::{
    IntegrationId, NewOutboundEvent, OutboundEvent, OutboundEventId, OutboundStatus,
    OutboundTransition,
};

/// Query parameters for outbound status inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEventListQuery {
    /// Optional status filter.
    pub status: Option<OutboundStatus>,
    /// Optional integration filter.
    pub integration_id: Option<IntegrationId>,
    /// Maximum rows returned.
    pub limit: usize,
}

/// Repository port for outbound deliveries.
#[async_trait]
pub trait OutboundEventRepository: Send + Sync {
    /// Inserts a `PENDING` row unless one exists for
    /// `(tenant_id, integration_id, idempotency_key)`; returns the stored row
    /// either way, unchanged when it already existed.
    async fn enqueue(&self, event: NewOutboundEvent) -> AppResult<OutboundEvent>;

    /// Lists up to `limit` rows that are `PENDING`, or `FAILED` with
    /// `next_attempt_at <= now`, oldest first.
    async fn list_due(&self, now: DateTime<Utc>, limit: usize) -> AppResult<Vec<OutboundEvent>>;

    /// Applies a transition as one conditional update keyed by id, prior
    /// status and prior attempt count. Returns `None` when the row no longer
    /// matches, i.e. a concurrent dispatcher already moved it.
    async fn apply_transition(
        &self,
        transition: &OutboundTransition,
    ) -> AppResult<Option<OutboundEvent>>;

    /// Returns one outbound event of a tenant.
    async fn find_event(
        &self,
        tenant_id: TenantId,
        event_id: OutboundEventId,
    ) -> AppResult<Option<OutboundEvent>>;

    /// Lists outbound events of a tenant, newest first.
    async fn list_events(
        &self,
        tenant_id: TenantId,
        query: OutboundEventListQuery,
    ) -> AppResult<Vec<OutboundEvent>>;
}
