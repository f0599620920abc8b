use super::*;

impl OutboundDispatchService {
    /// Enqueues one outbound delivery.
    ///
    /// A repeated `(tenant, integration, idempotency key)` returns the stored
    /// row unchanged, whatever the new payload is.
    pub async fn enqueue(&self, event: NewOutboundEvent) -> AppResult<OutboundEvent> {
        self.integration_repository
            .find_integration(event.tenant_id, event.integration_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "integration '{}' does not exist for tenant '{}'",
                    event.integration_id, event.tenant_id
                ))
            })?;

        let stored = self.outbound_repository.enqueue(event).await?;

        tracing::debug!(
            tenant_id = %stored.tenant_id,
            integration_id = %stored.integration_id,
            outbound_event_id = %stored.id,
            status = stored.status.as_str(),
            "enqueued outbound event"
        );

        Ok(stored)
    }

    /// Enqueues one outbound delivery for the viewer's effective tenant.
    pub async fn enqueue_for_viewer(
        &self,
        actor: &UserIdentity,
        integration_id: IntegrationId,
        event_type: &str,
        payload: Value,
        idempotency_key: &str,
    ) -> AppResult<OutboundEvent> {
        let event = NewOutboundEvent::new(
            actor.effective_tenant_id(),
            integration_id,
            event_type,
            payload,
            idempotency_key,
        )?;

        self.enqueue(event).await
    }
}
