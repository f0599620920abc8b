use async_trait::async_trait;
use tidewire_core::{AppResult, TenantId};
use tidewire_domain::{AuditEvent, EventEnvelope, HistoryCursor, LedgerPosition, NewAuditEvent};

/// Port for the append-only audit ledger.
///
/// The contract deliberately has no update or delete operations.
#[async_trait]
pub trait AuditLedgerRepository: Send + Sync {
    /// Appends one record in a single atomic insert. The store assigns the
    /// commit timestamp.
    async fn append(&self, event: NewAuditEvent) -> AppResult<AuditEvent>;

    /// Lists up to `limit` tenant records strictly older than `before`
    /// (or the newest records when `before` is `None`), ordered
    /// `(occurred_at desc, id desc)`.
    async fn list_before(
        &self,
        tenant_id: TenantId,
        before: Option<LedgerPosition>,
        limit: usize,
    ) -> AppResult<Vec<AuditEvent>>;
}

/// Port for live fan-out of ledger changes.
///
/// Implementations must neither block nor fail because a consumer is slow.
pub trait EventPublisher: Send + Sync {
    /// Publishes one envelope to every current subscriber.
    fn publish(&self, envelope: EventEnvelope);
}

/// One page of ledger history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    /// Records, newest first.
    pub items: Vec<AuditEvent>,
    /// Cursor for the next page; `None` once history is exhausted.
    pub next_cursor: Option<HistoryCursor>,
}
