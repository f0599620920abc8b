use std::sync::Arc;
use std::time::Duration;

use tidewire_application::{
    AuditLedgerService, InboundIngestionService, IntegrationService, OutboundDispatchService,
    ViewerAuthService,
};
use tidewire_infrastructure::InMemoryEventBroker;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub audit_ledger_service: AuditLedgerService,
    pub integration_service: IntegrationService,
    pub outbound_dispatch_service: OutboundDispatchService,
    pub inbound_ingestion_service: InboundIngestionService,
    pub viewer_auth_service: ViewerAuthService,
    pub event_broker: Arc<InMemoryEventBroker>,
    pub stream_keepalive: Duration,
}
