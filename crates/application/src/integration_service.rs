use std::sync::Arc;

use tidewire_core::{AppError, AppResult, UserIdentity};
use tidewire_domain::{IntegrationConfig, IntegrationConfigInput, IntegrationId, IntegrationStatus};

use crate::integration_ports::IntegrationRepository;

/// Input for registering one integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterIntegrationInput {
    /// Key unique within the tenant.
    pub integration_key: String,
    /// Delivery URL.
    pub base_url: String,
}

/// Newly registered integration and its signing secret.
///
/// The secret is only ever returned here.
pub struct RegisteredIntegration {
    /// Stored configuration.
    pub integration: IntegrationConfig,
    /// Hex signing secret shared with the external system.
    pub signing_secret: String,
}

/// Tenant integration registration and lookup.
#[derive(Clone)]
pub struct IntegrationService {
    repository: Arc<dyn IntegrationRepository>,
}

impl IntegrationService {
    /// Creates an integration service.
    #[must_use]
    pub fn new(repository: Arc<dyn IntegrationRepository>) -> Self {
        Self { repository }
    }

    /// Lists integrations of the viewer's effective tenant.
    pub async fn list_integrations(&self, actor: &UserIdentity) -> AppResult<Vec<IntegrationConfig>> {
        self.repository
            .list_integrations(actor.effective_tenant_id())
            .await
    }

    /// Returns one integration of the viewer's effective tenant.
    pub async fn find_integration(
        &self,
        actor: &UserIdentity,
        integration_id: IntegrationId,
    ) -> AppResult<IntegrationConfig> {
        self.repository
            .find_integration(actor.effective_tenant_id(), integration_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("integration '{integration_id}' not found"))
            })
    }

    /// Registers an enabled, active integration with a fresh signing secret.
    pub async fn register_integration(
        &self,
        actor: &UserIdentity,
        input: RegisterIntegrationInput,
    ) -> AppResult<RegisteredIntegration> {
        let signing_secret = generate_signing_secret()?;
        let integration = IntegrationConfig::new(IntegrationConfigInput {
            id: IntegrationId::new(),
            tenant_id: actor.effective_tenant_id(),
            integration_key: input.integration_key,
            base_url: input.base_url,
            signing_secret: signing_secret.clone(),
            enabled: true,
            status: IntegrationStatus::Active,
        })?;

        self.repository.save_integration(integration.clone()).await?;

        tracing::info!(
            tenant_id = %integration.tenant_id(),
            integration_id = %integration.id(),
            integration_key = %integration.integration_key(),
            subject = %actor.subject(),
            "registered integration"
        );

        Ok(RegisteredIntegration {
            integration,
            signing_secret,
        })
    }
}

fn generate_signing_secret() -> AppResult<String> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).map_err(|error| {
        AppError::Internal(format!("failed to generate signing secret: {error}"))
    })?;

    Ok(hex::encode(bytes))
}
