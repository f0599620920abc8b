use super::*;

enum AttemptOutcome {
    Delivered,
    Failed(String),
}

type IntegrationCache = HashMap<(TenantId, IntegrationId), Option<IntegrationConfig>>;

impl OutboundDispatchService {
    /// Attempts every due outbound event once.
    ///
    /// Per-event failures are logged and counted; only a failure to select
    /// the batch is returned as an error.
    pub async fn dispatch_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<DispatchSummary> {
        let limit = limit.clamp(1, MAX_DISPATCH_BATCH_SIZE);
        let due = self.outbound_repository.list_due(now, limit).await?;

        let mut summary = DispatchSummary {
            selected: due.len(),
            ..DispatchSummary::default()
        };
        let mut integrations = IntegrationCache::new();

        for event in due {
            if !event.is_due(now) {
                summary.skipped += 1;
                continue;
            }

            let integration = match self.resolve_integration(&mut integrations, &event).await {
                Ok(integration) => integration,
                Err(error) => {
                    tracing::error!(
                        tenant_id = %event.tenant_id,
                        outbound_event_id = %event.id,
                        error = %error,
                        "failed to load integration for outbound event"
                    );
                    summary.errored += 1;
                    continue;
                }
            };

            let transition = match self.attempt(&event, integration.as_ref()).await {
                AttemptOutcome::Delivered => event.delivered(),
                AttemptOutcome::Failed(error) => {
                    event.delivery_failed(now, error.as_str(), &self.retry_policy)
                }
            };
            let transition = match transition {
                Ok(transition) => transition,
                Err(error) => {
                    tracing::debug!(
                        outbound_event_id = %event.id,
                        error = %error,
                        "outbound event no longer dispatchable"
                    );
                    summary.skipped += 1;
                    continue;
                }
            };

            match self.outbound_repository.apply_transition(&transition).await {
                Ok(Some(updated)) => record_transition(&mut summary, &updated),
                Ok(None) => {
                    tracing::debug!(
                        outbound_event_id = %event.id,
                        "outbound event moved by a concurrent dispatcher"
                    );
                    summary.skipped += 1;
                }
                Err(error) => {
                    tracing::error!(
                        tenant_id = %event.tenant_id,
                        outbound_event_id = %event.id,
                        error = %error,
                        "failed to store outbound transition"
                    );
                    summary.errored += 1;
                }
            }
        }

        if summary.selected > 0 {
            tracing::info!(
                selected = summary.selected,
                sent = summary.sent,
                failed = summary.failed,
                dead_lettered = summary.dead_lettered,
                skipped = summary.skipped,
                errored = summary.errored,
                "outbound dispatch batch finished"
            );
        }

        Ok(summary)
    }

    async fn resolve_integration(
        &self,
        cache: &mut IntegrationCache,
        event: &OutboundEvent,
    ) -> AppResult<Option<IntegrationConfig>> {
        let key = (event.tenant_id, event.integration_id);
        if let Some(cached) = cache.get(&key) {
            return Ok(cached.clone());
        }

        let integration = self
            .integration_repository
            .find_integration(event.tenant_id, event.integration_id)
            .await?;
        cache.insert(key, integration.clone());

        Ok(integration)
    }

    async fn attempt(
        &self,
        event: &OutboundEvent,
        integration: Option<&IntegrationConfig>,
    ) -> AttemptOutcome {
        let Some(integration) = integration else {
            return AttemptOutcome::Failed(format!(
                "integration '{}' does not exist",
                event.integration_id
            ));
        };

        if !integration.accepts_traffic() {
            return AttemptOutcome::Failed(format!(
                "integration '{}' is not accepting traffic (enabled={}, status={})",
                integration.integration_key(),
                integration.enabled(),
                integration.status().as_str()
            ));
        }

        // The signature covers these exact bytes.
        let body = match serde_json::to_vec(&event.payload) {
            Ok(body) => body,
            Err(error) => {
                return AttemptOutcome::Failed(format!("failed to serialize payload: {error}"));
            }
        };
        let signature = match sign_payload(integration.signing_secret(), body.as_slice()) {
            Ok(signature) => signature,
            Err(error) => return AttemptOutcome::Failed(error.to_string()),
        };

        let request = OutboundDeliveryRequest {
            event_id: event.id,
            url: integration.base_url().to_string(),
            event_type: event.event_type.clone(),
            idempotency_key: event.idempotency_key.clone(),
            body,
            signature,
        };

        match self.delivery_client.deliver(request).await {
            Ok(response) if response.is_success() => AttemptOutcome::Delivered,
            Ok(response) => AttemptOutcome::Failed(match response.body_excerpt {
                Some(excerpt) if !excerpt.trim().is_empty() => {
                    format!("HTTP {}: {}", response.status_code, excerpt.trim())
                }
                _ => format!("HTTP {}", response.status_code),
            }),
            Err(error) => AttemptOutcome::Failed(error.to_string()),
        }
    }
}

fn record_transition(summary: &mut DispatchSummary, event: &OutboundEvent) {
    match event.status {
        OutboundStatus::Sent => {
            summary.sent += 1;
            tracing::info!(
                tenant_id = %event.tenant_id,
                integration_id = %event.integration_id,
                outbound_event_id = %event.id,
                attempt_count = event.attempt_count,
                "outbound event sent"
            );
        }
        OutboundStatus::Failed => {
            summary.failed += 1;
            tracing::warn!(
                tenant_id = %event.tenant_id,
                integration_id = %event.integration_id,
                outbound_event_id = %event.id,
                attempt_count = event.attempt_count,
                next_attempt_at = ?event.next_attempt_at,
                last_error = event.last_error.as_deref().unwrap_or_default(),
                "outbound delivery failed"
            );
        }
        OutboundStatus::DeadLetter => {
            summary.dead_lettered += 1;
            tracing::warn!(
                tenant_id = %event.tenant_id,
                integration_id = %event.integration_id,
                outbound_event_id = %event.id,
                attempt_count = event.attempt_count,
                last_error = event.last_error.as_deref().unwrap_or_default(),
                "outbound event dead-lettered"
            );
        }
        OutboundStatus::Pending => {}
    }
}
