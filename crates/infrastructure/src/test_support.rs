use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use tidewire_application::IntegrationRepository;
use tidewire_core::TenantId;
use tidewire_domain::{IntegrationConfig, IntegrationConfigInput, IntegrationId, IntegrationStatus};

use crate::PostgresIntegrationRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Returns a migrated pool, or `None` when `DATABASE_URL` is not set.
pub(crate) async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres tests: {error}");
    }

    Some(pool)
}

pub(crate) async fn saved_integration(
    pool: &PgPool,
    tenant_id: TenantId,
    key: &str,
) -> IntegrationConfig {
    let integration = match IntegrationConfig::new(IntegrationConfigInput {
        id: IntegrationId::new(),
        tenant_id,
        integration_key: key.to_owned(),
        base_url: format!("https://{key}.example.test/hooks"),
        signing_secret: "secret".to_owned(),
        enabled: true,
        status: IntegrationStatus::Active,
    }) {
        Ok(integration) => integration,
        Err(error) => panic!("invalid test integration: {error}"),
    };

    let repository = PostgresIntegrationRepository::new(pool.clone());
    if let Err(error) = repository.save_integration(integration.clone()).await {
        panic!("failed to save test integration: {error}");
    }

    integration
}
