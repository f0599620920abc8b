use std::sync::Arc;

use tidewire_core::{AppError, AppResult, TenantId, UserIdentity};
use tidewire_domain::{AuditEvent, HistoryCursor, IntegrationId, NewAuditEvent};

use crate::audit_ports::{AuditLedgerRepository, EventPublisher, HistoryPage};
use crate::integration_ports::IntegrationRepository;
use crate::outbound_dispatch_service::OutboundDispatchService;

mod fanout;
mod history;
mod inbound_sink;

/// Default history page size when the caller does not ask for one.
pub const DEFAULT_HISTORY_PAGE_SIZE: usize = 50;

/// Metadata key naming the integration a change originated from.
///
/// Fan-out never echoes a change back to its source integration.
pub const SOURCE_INTEGRATION_METADATA_KEY: &str = "sourceIntegrationId";

/// A stored ledger change and the outcome of its outbound fan-out.
///
/// The change is durable and published even when fan-out is incomplete;
/// retry the missing deliveries with [`AuditLedgerService::fan_out`], never
/// by recording the change again.
#[derive(Debug)]
pub struct RecordedChange {
    /// The appended ledger record.
    pub event: AuditEvent,
    /// Per-integration enqueue outcome.
    pub fanout: FanoutReport,
}

/// Outcome of enqueueing one ledger change for every eligible integration.
#[derive(Debug, Default)]
pub struct FanoutReport {
    /// Integrations with an outbound row for the change.
    pub enqueued: usize,
    /// Enqueues that failed.
    pub failures: Vec<FanoutFailure>,
}

impl FanoutReport {
    /// Returns whether every eligible integration got an outbound row.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One failed fan-out step.
#[derive(Debug)]
pub struct FanoutFailure {
    /// Integration whose enqueue failed; `None` when the integrations could
    /// not be listed at all.
    pub integration_id: Option<IntegrationId>,
    /// Underlying error.
    pub error: AppError,
}

#[derive(Clone)]
struct OutboundFanout {
    integration_repository: Arc<dyn IntegrationRepository>,
    dispatch_service: OutboundDispatchService,
}

/// Audit ledger service: durable appends, live publish, outbound fan-out and
/// cursor-paginated history.
#[derive(Clone)]
pub struct AuditLedgerService {
    repository: Arc<dyn AuditLedgerRepository>,
    publisher: Option<Arc<dyn EventPublisher>>,
    outbound_fanout: Option<OutboundFanout>,
    max_page_size: usize,
}

impl AuditLedgerService {
    /// Creates a ledger service without live publish or fan-out.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditLedgerRepository>) -> Self {
        Self {
            repository,
            publisher: None,
            outbound_fanout: None,
            max_page_size: 200,
        }
    }

    /// Adds live fan-out of recorded changes.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Adds outbound enqueue for every integration accepting traffic.
    #[must_use]
    pub fn with_outbound_fanout(
        mut self,
        integration_repository: Arc<dyn IntegrationRepository>,
        dispatch_service: OutboundDispatchService,
    ) -> Self {
        self.outbound_fanout = Some(OutboundFanout {
            integration_repository,
            dispatch_service,
        });
        self
    }

    /// Overrides the upper bound for history page sizes.
    #[must_use]
    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    /// Appends one record to the ledger without publishing it.
    pub async fn append(&self, event: NewAuditEvent) -> AppResult<AuditEvent> {
        self.repository.append(event).await
    }

    /// Records one domain change: ledger append, live publish and outbound
    /// enqueue.
    ///
    /// Only a failed append is an error. Once the record is stored it is
    /// published and every eligible integration is attempted; enqueue
    /// failures come back in [`RecordedChange::fanout`].
    pub async fn record_change(&self, event: NewAuditEvent) -> AppResult<RecordedChange> {
        let event = self.repository.append(event).await?;

        if let Some(publisher) = &self.publisher {
            publisher.publish(event.to_envelope());
        }

        let fanout = self.fan_out(&event).await;
        if !fanout.is_complete() {
            tracing::warn!(
                tenant_id = %event.tenant_id,
                event_id = %event.id,
                enqueued = fanout.enqueued,
                failed = fanout.failures.len(),
                "outbound fan-out incomplete"
            );
        }

        tracing::debug!(
            tenant_id = %event.tenant_id,
            event_id = %event.id,
            entity_type = %event.entity_type,
            action = %event.action,
            "recorded ledger change"
        );

        Ok(RecordedChange { event, fanout })
    }

    /// Returns one page of tenant history after `cursor`.
    pub async fn query(
        &self,
        tenant_id: TenantId,
        cursor: Option<HistoryCursor>,
        limit: usize,
    ) -> AppResult<HistoryPage> {
        self.history_page(tenant_id, cursor, limit).await
    }

    /// Returns one page of history for the viewer's effective tenant.
    ///
    /// `cursor` is the opaque token returned with the previous page.
    pub async fn list_history(
        &self,
        actor: &UserIdentity,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> AppResult<HistoryPage> {
        let cursor = cursor
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(HistoryCursor::decode)
            .transpose()?;

        self.history_page(
            actor.effective_tenant_id(),
            cursor,
            limit.unwrap_or(DEFAULT_HISTORY_PAGE_SIZE),
        )
        .await
    }
}
