mod common;
mod events;
mod inbound;
mod integrations;
mod outbound;

pub use common::HealthResponse;
pub use events::{AuditEventResponse, HistoryPageResponse, HistoryQuery, StreamQuery};
pub use inbound::InboundReceiptResponse;
pub use integrations::{
    EnqueueOutboundEventRequest, IntegrationResponse, RegisterIntegrationRequest,
    RegisteredIntegrationResponse,
};
pub use outbound::{OutboundEventListQueryRequest, OutboundEventResponse};
