use std::sync::Arc;

use sqlx::PgPool;
use tidewire_application::{
    AuditLedgerService, InboundIngestionService, IntegrationRepository, IntegrationService,
    OutboundDispatchService, ViewerAuthService,
};
use tidewire_core::AppResult;
use tidewire_infrastructure::{
    DEFAULT_DELIVERY_TIMEOUT, HttpOutboundDeliveryClient, InMemoryEventBroker,
    PostgresAuditLedgerRepository, PostgresInboundEventRepository, PostgresIntegrationRepository,
    PostgresOutboundEventRepository, PostgresViewerTokenRepository,
};

use crate::api_config::ApiConfig;
use crate::state::AppState;

/// Wires repositories, services and a started event broker.
pub fn build_app_state(pool: PgPool, config: &ApiConfig) -> AppResult<AppState> {
    let integration_repository: Arc<dyn IntegrationRepository> =
        Arc::new(PostgresIntegrationRepository::new(pool.clone()));

    // Deliveries run in the worker; the API only enqueues and inspects.
    let outbound_dispatch_service = OutboundDispatchService::new(
        integration_repository.clone(),
        Arc::new(PostgresOutboundEventRepository::new(pool.clone())),
        Arc::new(HttpOutboundDeliveryClient::with_timeout(DEFAULT_DELIVERY_TIMEOUT)?),
        config.retry_policy,
    );

    let event_broker = Arc::new(InMemoryEventBroker::new(config.event_broker));
    event_broker.start();

    let audit_ledger_service =
        AuditLedgerService::new(Arc::new(PostgresAuditLedgerRepository::new(pool.clone())))
            .with_publisher(event_broker.clone())
            .with_outbound_fanout(
                integration_repository.clone(),
                outbound_dispatch_service.clone(),
            )
            .with_max_page_size(config.history_max_page_size);

    let inbound_ingestion_service = InboundIngestionService::new(
        integration_repository.clone(),
        Arc::new(PostgresInboundEventRepository::new(pool.clone())),
    )
    .with_sink(Arc::new(audit_ledger_service.clone()));

    Ok(AppState {
        audit_ledger_service,
        integration_service: IntegrationService::new(integration_repository),
        outbound_dispatch_service,
        inbound_ingestion_service,
        viewer_auth_service: ViewerAuthService::new(Arc::new(
            PostgresViewerTokenRepository::new(pool),
        )),
        event_broker,
        stream_keepalive: config.stream_keepalive,
    })
}
