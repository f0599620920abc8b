mod delivery;
mod inbound;
mod outbound;

use async_trait::async_trait;
use tidewire_core::{AppResult, TenantId};
use tidewire_domain::{IntegrationConfig, IntegrationId};

pub use delivery::{DeliveryResponse, OutboundDeliveryClient, OutboundDeliveryRequest};
pub use inbound::{InboundEventRepository, InboundEventSink, InboundInsertOutcome};
pub use outbound::{OutboundEventListQuery, OutboundEventRepository};

/// Repository port for tenant integration configurations.
#[async_trait]
pub trait IntegrationRepository: Send + Sync {
    /// Stores a new integration; a duplicate key for the tenant is a conflict.
    async fn save_integration(&self, integration: IntegrationConfig) -> AppResult<()>;

    /// Returns one integration of a tenant.
    async fn find_integration(
        &self,
        tenant_id: TenantId,
        integration_id: IntegrationId,
    ) -> AppResult<Option<IntegrationConfig>>;

    /// Lists every integration of a tenant ordered by key.
    async fn list_integrations(&self, tenant_id: TenantId) -> AppResult<Vec<IntegrationConfig>>;
}
