use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use tidewire_application::IntegrationRepository;
use tidewire_core::{AppError, AppResult, TenantId};
use tidewire_domain::{IntegrationConfig, IntegrationConfigInput, IntegrationId};

/// PostgreSQL-backed repository for tenant integration configurations.
#[derive(Clone)]
pub struct PostgresIntegrationRepository {
    pool: PgPool,
}

impl PostgresIntegrationRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct IntegrationRow {
    id: Uuid,
    tenant_id: Uuid,
    integration_key: String,
    base_url: String,
    signing_secret: String,
    enabled: bool,
    status: String,
}

impl TryFrom<IntegrationRow> for IntegrationConfig {
    type Error = AppError;

    fn try_from(row: IntegrationRow) -> Result<Self, Self::Error> {
        IntegrationConfig::new(IntegrationConfigInput {
            id: IntegrationId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            integration_key: row.integration_key,
            base_url: row.base_url,
            signing_secret: row.signing_secret,
            enabled: row.enabled,
            status: row.status.parse()?,
        })
    }
}

#[async_trait]
impl IntegrationRepository for PostgresIntegrationRepository {
    async fn save_integration(&self, integration: IntegrationConfig) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO integration_configs (
                id,
                tenant_id,
                integration_key,
                base_url,
                signing_secret,
                enabled,
                status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(integration.id().as_uuid())
        .bind(integration.tenant_id().as_uuid())
        .bind(integration.integration_key().as_str())
        .bind(integration.base_url().as_str())
        .bind(integration.signing_secret())
        .bind(integration.enabled())
        .bind(integration.status().as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) => {
                if let sqlx::Error::Database(database_error) = &error
                    && database_error.code().as_deref() == Some("23505")
                {
                    return Err(AppError::Conflict(format!(
                        "integration '{}' already exists for tenant '{}'",
                        integration.integration_key(),
                        integration.tenant_id()
                    )));
                }

                Err(AppError::Internal(format!(
                    "failed to save integration: {error}"
                )))
            }
        }
    }

    async fn find_integration(
        &self,
        tenant_id: TenantId,
        integration_id: IntegrationId,
    ) -> AppResult<Option<IntegrationConfig>> {
        let row = sqlx::query_as::<_, IntegrationRow>(
            r#"
            SELECT id, tenant_id, integration_key, base_url, signing_secret, enabled, status
            FROM integration_configs
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(integration_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find integration '{integration_id}' for tenant '{tenant_id}': {error}"
            ))
        })?;

        row.map(IntegrationConfig::try_from).transpose()
    }

    async fn list_integrations(&self, tenant_id: TenantId) -> AppResult<Vec<IntegrationConfig>> {
        let rows = sqlx::query_as::<_, IntegrationRow>(
            r#"
            SELECT id, tenant_id, integration_key, base_url, signing_secret, enabled, status
            FROM integration_configs
            WHERE tenant_id = $1
            ORDER BY integration_key
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list integrations for tenant '{tenant_id}': {error}"
            ))
        })?;

        rows.into_iter().map(IntegrationConfig::try_from).collect()
    }
}
