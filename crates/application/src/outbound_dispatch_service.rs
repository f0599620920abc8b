use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tidewire_core::{AppError, AppResult, TenantId, UserIdentity};
use tidewire_domain::{
    IntegrationConfig, IntegrationId, NewOutboundEvent, OutboundEvent, OutboundEventId,
    OutboundStatus, RetryPolicy,
};

use crate::integration_ports::{
    IntegrationRepository, OutboundDeliveryClient, OutboundDeliveryRequest,
    OutboundEventListQuery, OutboundEventRepository,
};
use crate::signature::sign_payload;

mod dispatch;
mod enqueue;

/// Upper bound for one dispatch batch.
pub const MAX_DISPATCH_BATCH_SIZE: usize = 500;

/// Aggregate result of one `dispatch_due` batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Rows selected as due.
    pub selected: usize,
    /// Rows moved to `SENT`.
    pub sent: usize,
    /// Rows moved to `FAILED` and scheduled for retry.
    pub failed: usize,
    /// Rows moved to `DEAD_LETTER`.
    pub dead_lettered: usize,
    /// Rows left untouched because another dispatcher moved them first.
    pub skipped: usize,
    /// Rows whose transition could not be stored.
    pub errored: usize,
}

/// Outbound delivery service: idempotent enqueue and batch dispatch.
#[derive(Clone)]
pub struct OutboundDispatchService {
    integration_repository: Arc<dyn IntegrationRepository>,
    outbound_repository: Arc<dyn OutboundEventRepository>,
    delivery_client: Arc<dyn OutboundDeliveryClient>,
    retry_policy: RetryPolicy,
}

impl OutboundDispatchService {
    /// Creates an outbound dispatch service.
    #[must_use]
    pub fn new(
        integration_repository: Arc<dyn IntegrationRepository>,
        outbound_repository: Arc<dyn OutboundEventRepository>,
        delivery_client: Arc<dyn OutboundDeliveryClient>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            integration_repository,
            outbound_repository,
            delivery_client,
            retry_policy,
        }
    }

    /// Returns the retry policy in effect.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Lists outbound events of the viewer's effective tenant.
    pub async fn list_outbound_events(
        &self,
        actor: &UserIdentity,
        query: OutboundEventListQuery,
    ) -> AppResult<Vec<OutboundEvent>> {
        self.outbound_repository
            .list_events(
                actor.effective_tenant_id(),
                OutboundEventListQuery {
                    limit: query.limit.clamp(1, MAX_DISPATCH_BATCH_SIZE),
                    ..query
                },
            )
            .await
    }

    /// Returns one outbound event of the viewer's effective tenant.
    pub async fn find_outbound_event(
        &self,
        actor: &UserIdentity,
        event_id: OutboundEventId,
    ) -> AppResult<OutboundEvent> {
        self.outbound_repository
            .find_event(actor.effective_tenant_id(), event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("outbound event '{event_id}' not found")))
    }
}
