//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_ports;
mod integration_ports;
mod viewer_auth_ports;

mod audit_ledger_service;
mod inbound_ingestion_service;
mod integration_service;
mod outbound_dispatch_service;
mod signature;
mod viewer_auth_service;

#[cfg(test)]
mod test_fakes;

pub use audit_ledger_service::{
    AuditLedgerService, DEFAULT_HISTORY_PAGE_SIZE, FanoutFailure, FanoutReport, RecordedChange,
    SOURCE_INTEGRATION_METADATA_KEY,
};
pub use audit_ports::{AuditLedgerRepository, EventPublisher, HistoryPage};
pub use inbound_ingestion_service::{
    InboundDisposition, InboundIngestionService, InboundReceipt, IngestInboundInput,
};
pub use integration_ports::{
    DeliveryResponse, InboundEventRepository, InboundEventSink, InboundInsertOutcome,
    IntegrationRepository, OutboundDeliveryClient, OutboundDeliveryRequest,
    OutboundEventListQuery, OutboundEventRepository,
};
pub use integration_service::{
    IntegrationService, RegisterIntegrationInput, RegisteredIntegration,
};
pub use outbound_dispatch_service::{
    DispatchSummary, MAX_DISPATCH_BATCH_SIZE, OutboundDispatchService,
};
pub use signature::{payload_hash, sign_payload, verify_signature};
pub use viewer_auth_ports::{ViewerTokenRecord, ViewerTokenRepository};
pub use viewer_auth_service::{IssueViewerTokenInput, ViewerAuthService, hash_token};
