//! Domain records and invariants for event and integration delivery.

#![forbid(unsafe_code)]

mod audit;
mod cursor;
mod envelope;
mod ids;
mod inbound;
mod integration;
mod outbound;

pub use audit::{AuditEvent, NewAuditEvent};
pub use cursor::{HistoryCursor, LedgerPosition};
pub use envelope::{
    EventEnvelope, EventKind, EventMetadata, INBOUND_EVENT_ENTITY_TYPE, TENANT_ID_METADATA_KEY,
};
pub use ids::{AuditEventId, InboundEventId, IntegrationId, OutboundEventId};
pub use inbound::{InboundCallback, InboundEvent, NewInboundEvent, UNPARSED_INBOUND_EVENT_TYPE};
pub use integration::{IntegrationConfig, IntegrationConfigInput, IntegrationStatus};
pub use outbound::{
    NewOutboundEvent, OutboundEvent, OutboundStatus, OutboundTransition, RetryPolicy,
};
