use serde_json::Value;
use tidewire_domain::NewOutboundEvent;

use super::*;

impl AuditLedgerService {
    /// Enqueues `event` for every integration accepting traffic, except the
    /// one it originated from.
    ///
    /// Every integration is attempted even when an earlier one fails. The
    /// idempotency key is the ledger id, so calling this again for the same
    /// record only fills in the missing rows.
    pub async fn fan_out(&self, event: &AuditEvent) -> FanoutReport {
        let mut report = FanoutReport::default();
        let Some(fanout) = &self.outbound_fanout else {
            return report;
        };

        let integrations = match fanout
            .integration_repository
            .list_integrations(event.tenant_id)
            .await
        {
            Ok(integrations) => integrations,
            Err(error) => {
                report.failures.push(FanoutFailure {
                    integration_id: None,
                    error,
                });
                return report;
            }
        };

        let source_integration = event
            .metadata
            .get(SOURCE_INTEGRATION_METADATA_KEY)
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);

        let envelope = event.to_envelope();
        let payload = match serde_json::to_value(&envelope) {
            Ok(payload) => payload,
            Err(error) => {
                report.failures.push(FanoutFailure {
                    integration_id: None,
                    error: AppError::Internal(format!(
                        "failed to serialize envelope for ledger event '{}': {error}",
                        event.id
                    )),
                });
                return report;
            }
        };

        for integration in integrations {
            if !integration.accepts_traffic() {
                continue;
            }

            if source_integration.as_deref() == Some(integration.id().to_string().as_str()) {
                continue;
            }

            let enqueued = match NewOutboundEvent::new(
                event.tenant_id,
                integration.id(),
                envelope.kind.as_str(),
                payload.clone(),
                event.id.to_string(),
            ) {
                Ok(outbound) => fanout.dispatch_service.enqueue(outbound).await,
                Err(error) => Err(error),
            };

            match enqueued {
                Ok(_) => report.enqueued += 1,
                Err(error) => {
                    tracing::warn!(
                        tenant_id = %event.tenant_id,
                        event_id = %event.id,
                        integration_id = %integration.id(),
                        error = %error,
                        "failed to enqueue outbound event"
                    );
                    report.failures.push(FanoutFailure {
                        integration_id: Some(integration.id()),
                        error,
                    });
                }
            }
        }

        report
    }
}
