use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tidewire_core::{AppError, AppResult, TenantId};
use tidewire_domain::{
    InboundCallback, InboundEvent, IntegrationId, NewInboundEvent, UNPARSED_INBOUND_EVENT_TYPE,
};

use crate::integration_ports::{
    InboundEventRepository, InboundEventSink, InboundInsertOutcome, IntegrationRepository,
};
use crate::signature::{payload_hash, verify_signature};

/// Raw inbound callback as received at the HTTP boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestInboundInput {
    /// Tenant named in the callback path.
    pub tenant_id: TenantId,
    /// Integration named in the callback path.
    pub integration_id: IntegrationId,
    /// Exact request body bytes.
    pub raw_body: Vec<u8>,
    /// `Idempotency-Key` header.
    pub idempotency_key: String,
    /// Signature header, if any.
    pub signature: Option<String>,
    /// Remote address of the sender.
    pub source_ip: Option<String>,
}

/// How an inbound callback was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundDisposition {
    /// Stored and handed downstream.
    Accepted,
    /// Key seen before; the stored record is returned unchanged.
    Duplicate,
    /// Stored for forensics, never handed downstream.
    InvalidSignature,
    /// Stored with its parse error, never handed downstream.
    MalformedPayload,
}

/// Result of one ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundReceipt {
    /// Stored record for the idempotency key.
    pub event: InboundEvent,
    /// How this call was handled.
    pub disposition: InboundDisposition,
}

impl InboundReceipt {
    /// Returns the error the stored record maps to at the boundary, if any.
    ///
    /// Duplicates mirror the outcome of the original request.
    #[must_use]
    pub fn rejection(&self) -> Option<AppError> {
        if !self.event.signature_valid {
            return Some(AppError::Unauthorized(
                "inbound signature verification failed".to_owned(),
            ));
        }

        self.event
            .error
            .as_ref()
            .map(|error| AppError::Validation(error.clone()))
    }
}

/// Verifies, deduplicates and stores inbound integration callbacks.
#[derive(Clone)]
pub struct InboundIngestionService {
    integration_repository: Arc<dyn IntegrationRepository>,
    inbound_repository: Arc<dyn InboundEventRepository>,
    sink: Option<Arc<dyn InboundEventSink>>,
}

impl InboundIngestionService {
    /// Creates an ingestion service without a downstream sink.
    #[must_use]
    pub fn new(
        integration_repository: Arc<dyn IntegrationRepository>,
        inbound_repository: Arc<dyn InboundEventRepository>,
    ) -> Self {
        Self {
            integration_repository,
            inbound_repository,
            sink: None,
        }
    }

    /// Hands accepted callbacks to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn InboundEventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Ingests one callback.
    pub async fn ingest(&self, input: IngestInboundInput) -> AppResult<InboundReceipt> {
        let idempotency_key = input.idempotency_key.trim();
        if idempotency_key.is_empty() {
            return Err(AppError::Validation(
                "Idempotency-Key header must not be empty".to_owned(),
            ));
        }

        let integration = self
            .integration_repository
            .find_integration(input.tenant_id, input.integration_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "integration '{}' does not exist for tenant '{}'",
                    input.integration_id, input.tenant_id
                ))
            })?;

        if !integration.accepts_traffic() {
            return Err(AppError::Forbidden(format!(
                "integration '{}' is not accepting inbound traffic",
                integration.integration_key()
            )));
        }

        if let Some(existing) = self
            .inbound_repository
            .find_by_idempotency_key(input.tenant_id, input.integration_id, idempotency_key)
            .await?
        {
            tracing::debug!(
                tenant_id = %input.tenant_id,
                integration_id = %input.integration_id,
                inbound_event_id = %existing.id,
                "duplicate inbound callback"
            );

            // A previous attempt stored the callback but never confirmed the
            // downstream handoff; the retry finishes it.
            let existing = if existing.awaits_handoff() {
                self.hand_off(existing).await?
            } else {
                existing
            };

            return Ok(InboundReceipt {
                event: existing,
                disposition: InboundDisposition::Duplicate,
            });
        }

        let signature_valid = input.signature.as_deref().is_some_and(|signature| {
            verify_signature(
                integration.signing_secret(),
                input.raw_body.as_slice(),
                signature,
            )
        });

        let (event_type, payload, error) = match InboundCallback::parse(&input.raw_body) {
            Ok(callback) => (callback.event_type, callback.payload, None),
            Err(error) => (
                UNPARSED_INBOUND_EVENT_TYPE.to_owned(),
                Value::Null,
                Some(error.to_string()),
            ),
        };

        let outcome = self
            .inbound_repository
            .insert_if_absent(NewInboundEvent {
                tenant_id: input.tenant_id,
                integration_id: input.integration_id,
                event_type,
                payload,
                idempotency_key: idempotency_key.to_owned(),
                signature_valid,
                payload_hash: payload_hash(input.raw_body.as_slice()),
                source_ip: input.source_ip,
                error,
            })
            .await?;

        let event = match outcome {
            InboundInsertOutcome::Inserted(event) => event,
            InboundInsertOutcome::Existing(event) => {
                return Ok(InboundReceipt {
                    event,
                    disposition: InboundDisposition::Duplicate,
                });
            }
        };

        let disposition = if !event.signature_valid {
            InboundDisposition::InvalidSignature
        } else if event.error.is_some() {
            InboundDisposition::MalformedPayload
        } else {
            InboundDisposition::Accepted
        };

        let event = match disposition {
            InboundDisposition::Accepted => {
                tracing::info!(
                    tenant_id = %event.tenant_id,
                    integration_id = %event.integration_id,
                    inbound_event_id = %event.id,
                    event_type = %event.event_type,
                    "accepted inbound callback"
                );

                self.hand_off(event).await?
            }
            _ => {
                tracing::warn!(
                    tenant_id = %event.tenant_id,
                    integration_id = %event.integration_id,
                    inbound_event_id = %event.id,
                    signature_valid = event.signature_valid,
                    error = event.error.as_deref().unwrap_or_default(),
                    "rejected inbound callback"
                );
                event
            }
        };

        Ok(InboundReceipt { event, disposition })
    }

    /// Hands an accepted callback to the sink, then marks it processed.
    ///
    /// A sink failure leaves `processed_at` unset so a sender retry with the
    /// same idempotency key hands it off again.
    async fn hand_off(&self, mut event: InboundEvent) -> AppResult<InboundEvent> {
        if let Some(sink) = &self.sink
            && let Err(error) = sink.handle_inbound(&event).await
        {
            tracing::warn!(
                tenant_id = %event.tenant_id,
                integration_id = %event.integration_id,
                inbound_event_id = %event.id,
                error = %error,
                "inbound handoff failed; awaiting sender retry"
            );
            return Err(error);
        }

        let processed_at = Utc::now();
        self.inbound_repository
            .mark_processed(event.id, processed_at)
            .await?;
        event.processed_at = Some(processed_at);

        Ok(event)
    }
}

#[cfg(test)]
mod tests;
