//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_outbound_delivery_client;
mod in_memory_event_broker;
mod postgres_audit_ledger_repository;
mod postgres_inbound_event_repository;
mod postgres_integration_repository;
mod postgres_outbound_event_repository;
mod postgres_viewer_token_repository;

#[cfg(test)]
mod test_support;

pub use http_outbound_delivery_client::{
    DEFAULT_DELIVERY_TIMEOUT, EVENT_TYPE_HEADER, HttpOutboundDeliveryClient,
    IDEMPOTENCY_KEY_HEADER, SIGNATURE_HEADER,
};
pub use in_memory_event_broker::{
    EventBrokerConfig, InMemoryEventBroker, ReplayResult, Subscription, SubscriptionId,
};
pub use postgres_audit_ledger_repository::PostgresAuditLedgerRepository;
pub use postgres_inbound_event_repository::PostgresInboundEventRepository;
pub use postgres_integration_repository::PostgresIntegrationRepository;
pub use postgres_outbound_event_repository::PostgresOutboundEventRepository;
pub use postgres_viewer_token_repository::PostgresViewerTokenRepository;
