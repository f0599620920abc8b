use async_trait::async_trait;
use serde_json::json;
use tidewire_domain::{EventMetadata, INBOUND_EVENT_ENTITY_TYPE, InboundEvent};

use crate::integration_ports::InboundEventSink;

use super::*;

#[async_trait]
impl InboundEventSink for AuditLedgerService {
    async fn handle_inbound(&self, event: &InboundEvent) -> AppResult<()> {
        let mut metadata = EventMetadata::new();
        metadata.insert("module", "integrations");
        metadata.insert(SOURCE_INTEGRATION_METADATA_KEY, event.integration_id.to_string());
        metadata.insert("inboundEventType", event.event_type.as_str());

        let change = NewAuditEvent::new(
            event.tenant_id,
            INBOUND_EVENT_ENTITY_TYPE,
            event.id.to_string(),
            "received",
        )?
        .with_actor(format!("integration:{}", event.integration_id))
        .with_snapshots(
            None,
            Some(json!({
                "eventType": event.event_type,
                "payload": event.payload,
                "idempotencyKey": event.idempotency_key,
            })),
        )
        .with_metadata(metadata);

        // The ledger row is durable once this returns, so an incomplete
        // fan-out must not fail the handoff: a retry would append it again.
        let recorded = self.record_change(change).await?;
        for failure in &recorded.fanout.failures {
            tracing::warn!(
                inbound_event_id = %event.id,
                event_id = %recorded.event.id,
                integration_id = ?failure.integration_id,
                error = %failure.error,
                "inbound change not fanned out to integration"
            );
        }

        Ok(())
    }
}
