use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use tidewire_core::{AppError, AppResult, TenantId};
use tidewire_domain::{
    AuditEvent, AuditEventId, EventEnvelope, InboundEvent, InboundEventId, IntegrationConfig,
    IntegrationConfigInput, IntegrationId, IntegrationStatus, LedgerPosition, NewAuditEvent,
    NewInboundEvent, NewOutboundEvent, OutboundEvent, OutboundEventId, OutboundStatus,
    OutboundTransition,
};

use crate::audit_ports::{AuditLedgerRepository, EventPublisher};
use crate::integration_ports::{
    DeliveryResponse, InboundEventRepository, InboundEventSink, InboundInsertOutcome,
    IntegrationRepository, OutboundDeliveryClient, OutboundDeliveryRequest,
    OutboundEventListQuery, OutboundEventRepository,
};

pub(crate) fn integration(tenant_id: TenantId, key: &str, secret: &str) -> IntegrationConfig {
    integration_with_state(tenant_id, key, secret, true, IntegrationStatus::Active)
}

pub(crate) fn integration_with_state(
    tenant_id: TenantId,
    key: &str,
    secret: &str,
    enabled: bool,
    status: IntegrationStatus,
) -> IntegrationConfig {
    let input = IntegrationConfigInput {
        id: IntegrationId::new(),
        tenant_id,
        integration_key: key.to_owned(),
        base_url: format!("https://{key}.example.test/hooks"),
        signing_secret: secret.to_owned(),
        enabled,
        status,
    };

    match IntegrationConfig::new(input) {
        Ok(integration) => integration,
        Err(error) => panic!("invalid test integration: {error}"),
    }
}

#[derive(Default)]
pub(crate) struct FakeAuditLedgerRepository {
    pub(crate) events: Mutex<Vec<AuditEvent>>,
    pub(crate) fixed_clock: Option<DateTime<Utc>>,
}

impl FakeAuditLedgerRepository {
    pub(crate) fn with_fixed_clock(occurred_at: DateTime<Utc>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fixed_clock: Some(occurred_at),
        }
    }
}

#[async_trait]
impl AuditLedgerRepository for FakeAuditLedgerRepository {
    async fn append(&self, event: NewAuditEvent) -> AppResult<AuditEvent> {
        let stored =
            event.into_event(AuditEventId::new(), self.fixed_clock.unwrap_or_else(Utc::now));
        self.events.lock().await.push(stored.clone());
        Ok(stored)
    }

    async fn list_before(
        &self,
        tenant_id: TenantId,
        before: Option<LedgerPosition>,
        limit: usize,
    ) -> AppResult<Vec<AuditEvent>> {
        let mut events: Vec<AuditEvent> = self
            .events
            .lock()
            .await
            .iter()
            .filter(|event| event.tenant_id == tenant_id)
            .filter(|event| before.is_none_or(|before| event.position() < before))
            .cloned()
            .collect();

        events.sort_by_key(|event| std::cmp::Reverse(event.position()));
        events.truncate(limit);

        Ok(events)
    }
}

#[derive(Default)]
pub(crate) struct RecordingPublisher {
    pub(crate) published: std::sync::Mutex<Vec<EventEnvelope>>,
}

impl RecordingPublisher {
    pub(crate) fn published_ids(&self) -> Vec<AuditEventId> {
        self.published
            .lock()
            .map(|published| published.iter().map(|envelope| envelope.id).collect())
            .unwrap_or_default()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, envelope: EventEnvelope) {
        if let Ok(mut published) = self.published.lock() {
            published.push(envelope);
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeIntegrationRepository {
    pub(crate) integrations: Mutex<Vec<IntegrationConfig>>,
}

impl FakeIntegrationRepository {
    pub(crate) fn with(integrations: Vec<IntegrationConfig>) -> Self {
        Self {
            integrations: Mutex::new(integrations),
        }
    }
}

#[async_trait]
impl IntegrationRepository for FakeIntegrationRepository {
    async fn save_integration(&self, integration: IntegrationConfig) -> AppResult<()> {
        let mut integrations = self.integrations.lock().await;
        if integrations.iter().any(|existing| {
            existing.tenant_id() == integration.tenant_id()
                && existing.integration_key() == integration.integration_key()
        }) {
            return Err(AppError::Conflict(format!(
                "integration '{}' already exists",
                integration.integration_key()
            )));
        }

        integrations.push(integration);
        Ok(())
    }

    async fn find_integration(
        &self,
        tenant_id: TenantId,
        integration_id: IntegrationId,
    ) -> AppResult<Option<IntegrationConfig>> {
        Ok(self
            .integrations
            .lock()
            .await
            .iter()
            .find(|integration| {
                integration.tenant_id() == tenant_id && integration.id() == integration_id
            })
            .cloned())
    }

    async fn list_integrations(&self, tenant_id: TenantId) -> AppResult<Vec<IntegrationConfig>> {
        let mut integrations: Vec<IntegrationConfig> = self
            .integrations
            .lock()
            .await
            .iter()
            .filter(|integration| integration.tenant_id() == tenant_id)
            .cloned()
            .collect();
        integrations.sort_by(|left, right| {
            left.integration_key()
                .as_str()
                .cmp(right.integration_key().as_str())
        });

        Ok(integrations)
    }
}

#[derive(Default)]
pub(crate) struct FakeOutboundEventRepository {
    pub(crate) events: Mutex<Vec<OutboundEvent>>,
    /// Events a concurrent dispatcher delivers right before our update lands.
    pub(crate) raced: Mutex<HashSet<OutboundEventId>>,
    /// Integrations whose enqueue fails with a storage error.
    pub(crate) unavailable: Mutex<HashSet<IntegrationId>>,
}

impl FakeOutboundEventRepository {
    pub(crate) async fn get(&self, event_id: OutboundEventId) -> Option<OutboundEvent> {
        self.events
            .lock()
            .await
            .iter()
            .find(|event| event.id == event_id)
            .cloned()
    }
}

#[async_trait]
impl OutboundEventRepository for FakeOutboundEventRepository {
    async fn enqueue(&self, event: NewOutboundEvent) -> AppResult<OutboundEvent> {
        if self.unavailable.lock().await.contains(&event.integration_id) {
            return Err(AppError::Internal(format!(
                "outbound store unavailable for integration '{}'",
                event.integration_id
            )));
        }

        let mut events = self.events.lock().await;
        if let Some(existing) = events.iter().find(|stored| {
            stored.tenant_id == event.tenant_id
                && stored.integration_id == event.integration_id
                && stored.idempotency_key == event.idempotency_key.as_str()
        }) {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let stored = OutboundEvent {
            id: OutboundEventId::new(),
            tenant_id: event.tenant_id,
            integration_id: event.integration_id,
            event_type: event.event_type.as_str().to_owned(),
            payload: event.payload,
            status: OutboundStatus::Pending,
            attempt_count: 0,
            next_attempt_at: None,
            last_error: None,
            idempotency_key: event.idempotency_key.as_str().to_owned(),
            created_at: now,
            updated_at: now,
        };
        events.push(stored.clone());

        Ok(stored)
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: usize) -> AppResult<Vec<OutboundEvent>> {
        let mut due: Vec<OutboundEvent> = self
            .events
            .lock()
            .await
            .iter()
            .filter(|event| event.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|event| {
            (
                event.next_attempt_at.is_some(),
                event.next_attempt_at,
                event.created_at,
            )
        });
        due.truncate(limit);

        Ok(due)
    }

    async fn apply_transition(
        &self,
        transition: &OutboundTransition,
    ) -> AppResult<Option<OutboundEvent>> {
        let raced = self.raced.lock().await.remove(&transition.event_id);
        let mut events = self.events.lock().await;
        let Some(stored) = events.iter_mut().find(|event| {
            event.id == transition.event_id && event.tenant_id == transition.tenant_id
        }) else {
            return Ok(None);
        };

        if raced {
            stored.status = OutboundStatus::Sent;
            stored.attempt_count = stored.attempt_count.saturating_add(1);
        }

        if stored.status != transition.prior_status
            || stored.attempt_count != transition.prior_attempt_count
        {
            return Ok(None);
        }

        transition.apply_to(stored, Utc::now());
        Ok(Some(stored.clone()))
    }

    async fn find_event(
        &self,
        tenant_id: TenantId,
        event_id: OutboundEventId,
    ) -> AppResult<Option<OutboundEvent>> {
        Ok(self
            .events
            .lock()
            .await
            .iter()
            .find(|event| event.tenant_id == tenant_id && event.id == event_id)
            .cloned())
    }

    async fn list_events(
        &self,
        tenant_id: TenantId,
        query: OutboundEventListQuery,
    ) -> AppResult<Vec<OutboundEvent>> {
        let mut events: Vec<OutboundEvent> = self
            .events
            .lock()
            .await
            .iter()
            .filter(|event| event.tenant_id == tenant_id)
            .filter(|event| query.status.is_none_or(|status| event.status == status))
            .filter(|event| {
                query
                    .integration_id
                    .is_none_or(|integration_id| event.integration_id == integration_id)
            })
            .cloned()
            .collect();
        events.sort_by_key(|event| std::cmp::Reverse(event.created_at));
        events.truncate(query.limit);

        Ok(events)
    }
}

/// Delivery client answering with scripted status codes, `200` once the
/// script runs out. A scripted `0` is a transport failure.
#[derive(Default)]
pub(crate) struct ScriptedDeliveryClient {
    pub(crate) script: Mutex<VecDeque<u16>>,
    pub(crate) requests: Mutex<Vec<OutboundDeliveryRequest>>,
}

impl ScriptedDeliveryClient {
    pub(crate) fn answering(status_codes: &[u16]) -> Self {
        Self {
            script: Mutex::new(status_codes.iter().copied().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl OutboundDeliveryClient for ScriptedDeliveryClient {
    async fn deliver(&self, request: OutboundDeliveryRequest) -> AppResult<DeliveryResponse> {
        self.requests.lock().await.push(request);
        let status_code = self.script.lock().await.pop_front().unwrap_or(200);

        if status_code == 0 {
            return Err(AppError::Internal("connection refused".to_owned()));
        }

        Ok(DeliveryResponse {
            status_code,
            body_excerpt: (status_code >= 300).then(|| "upstream unavailable".to_owned()),
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeInboundEventRepository {
    pub(crate) events: Mutex<Vec<InboundEvent>>,
}

#[async_trait]
impl InboundEventRepository for FakeInboundEventRepository {
    async fn find_by_idempotency_key(
        &self,
        tenant_id: TenantId,
        integration_id: IntegrationId,
        idempotency_key: &str,
    ) -> AppResult<Option<InboundEvent>> {
        Ok(self
            .events
            .lock()
            .await
            .iter()
            .find(|event| {
                event.tenant_id == tenant_id
                    && event.integration_id == integration_id
                    && event.idempotency_key == idempotency_key
            })
            .cloned())
    }

    async fn insert_if_absent(&self, event: NewInboundEvent) -> AppResult<InboundInsertOutcome> {
        let mut events = self.events.lock().await;
        if let Some(existing) = events.iter().find(|stored| {
            stored.tenant_id == event.tenant_id
                && stored.integration_id == event.integration_id
                && stored.idempotency_key == event.idempotency_key
        }) {
            return Ok(InboundInsertOutcome::Existing(existing.clone()));
        }

        let stored = InboundEvent {
            id: InboundEventId::new(),
            tenant_id: event.tenant_id,
            integration_id: event.integration_id,
            event_type: event.event_type,
            payload: event.payload,
            received_at: Utc::now(),
            idempotency_key: event.idempotency_key,
            signature_valid: event.signature_valid,
            payload_hash: event.payload_hash,
            source_ip: event.source_ip,
            error: event.error,
            processed_at: None,
        };
        events.push(stored.clone());

        Ok(InboundInsertOutcome::Inserted(stored))
    }

    async fn mark_processed(
        &self,
        event_id: InboundEventId,
        processed_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut events = self.events.lock().await;
        let stored = events
            .iter_mut()
            .find(|event| event.id == event_id)
            .ok_or_else(|| AppError::NotFound(format!("inbound event '{event_id}' not found")))?;
        stored.processed_at = Some(processed_at);

        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pub(crate) handled: Mutex<Vec<InboundEvent>>,
    pub(crate) attempts: Mutex<usize>,
    failures_remaining: Mutex<usize>,
}

impl RecordingSink {
    /// A sink whose first `failures` handoffs fail with a storage error.
    pub(crate) fn failing(failures: usize) -> Self {
        Self {
            failures_remaining: Mutex::new(failures),
            ..Self::default()
        }
    }
}

#[async_trait]
impl InboundEventSink for RecordingSink {
    async fn handle_inbound(&self, event: &InboundEvent) -> AppResult<()> {
        *self.attempts.lock().await += 1;

        let mut failures_remaining = self.failures_remaining.lock().await;
        if *failures_remaining > 0 {
            *failures_remaining -= 1;
            return Err(AppError::Internal("ledger unavailable".to_owned()));
        }

        self.handled.lock().await.push(event.clone());
        Ok(())
    }
}
