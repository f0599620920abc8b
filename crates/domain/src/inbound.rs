use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tidewire_core::{AppError, AppResult, TenantId};

use crate::{InboundEventId, IntegrationId};

/// Event type recorded for callbacks whose body could not be parsed.
pub const UNPARSED_INBOUND_EVENT_TYPE: &str = "unparsed";

/// Persisted inbound callback, including rejected ones kept for forensics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    /// Record identifier.
    pub id: InboundEventId,
    /// Tenant scope.
    pub tenant_id: TenantId,
    /// Source integration.
    pub integration_id: IntegrationId,
    /// Event type declared by the sender.
    pub event_type: String,
    /// Parsed payload, `null` when the body was malformed.
    pub payload: Value,
    /// Receipt timestamp.
    pub received_at: DateTime<Utc>,
    /// Sender-supplied deduplication key.
    pub idempotency_key: String,
    /// Whether the signature header matched the body.
    pub signature_valid: bool,
    /// Hex SHA-256 of the raw body.
    pub payload_hash: String,
    /// Remote address of the sender, when known.
    pub source_ip: Option<String>,
    /// Parse error for malformed bodies.
    pub error: Option<String>,
    /// When downstream handoff completed; `None` until it has.
    pub processed_at: Option<DateTime<Utc>>,
}

impl InboundEvent {
    /// Returns whether the callback may be handed to downstream logic.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.signature_valid && self.error.is_none()
    }

    /// Returns whether the callback was accepted but never confirmed as
    /// handed downstream.
    #[must_use]
    pub fn awaits_handoff(&self) -> bool {
        self.is_accepted() && self.processed_at.is_none()
    }
}

/// Record to insert for a first-seen idempotency key.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInboundEvent {
    /// Tenant scope.
    pub tenant_id: TenantId,
    /// Source integration.
    pub integration_id: IntegrationId,
    /// Event type declared by the sender.
    pub event_type: String,
    /// Parsed payload.
    pub payload: Value,
    /// Sender-supplied deduplication key.
    pub idempotency_key: String,
    /// Whether the signature header matched the body.
    pub signature_valid: bool,
    /// Hex SHA-256 of the raw body.
    pub payload_hash: String,
    /// Remote address of the sender.
    pub source_ip: Option<String>,
    /// Parse error for malformed bodies.
    pub error: Option<String>,
}

/// Parsed body of an inbound callback.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundCallback {
    /// Event type declared by the sender.
    pub event_type: String,
    /// Opaque payload.
    #[serde(default)]
    pub payload: Value,
}

impl InboundCallback {
    /// Parses a raw callback body.
    pub fn parse(raw_body: &[u8]) -> AppResult<Self> {
        let callback = serde_json::from_slice::<Self>(raw_body).map_err(|error| {
            AppError::Validation(format!("malformed inbound payload: {error}"))
        })?;

        if callback.event_type.trim().is_empty() {
            return Err(AppError::Validation(
                "malformed inbound payload: eventType must not be empty".to_owned(),
            ));
        }

        Ok(callback)
    }
}
