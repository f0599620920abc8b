use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use tidewire_application::{ViewerTokenRecord, ViewerTokenRepository};
use tidewire_core::{AppError, AppResult, TenantId};

/// PostgreSQL-backed repository for hashed viewer tokens.
#[derive(Clone)]
pub struct PostgresViewerTokenRepository {
    pool: PgPool,
}

impl PostgresViewerTokenRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ViewerTokenRow {
    token_hash: String,
    tenant_id: Uuid,
    subject: String,
    display_name: String,
    acting_tenant_id: Option<Uuid>,
    expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl ViewerTokenRepository for PostgresViewerTokenRepository {
    async fn save_token(&self, record: ViewerTokenRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO viewer_tokens (
                token_hash,
                tenant_id,
                subject,
                display_name,
                acting_tenant_id,
                expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (token_hash) DO UPDATE
            SET
                tenant_id = EXCLUDED.tenant_id,
                subject = EXCLUDED.subject,
                display_name = EXCLUDED.display_name,
                acting_tenant_id = EXCLUDED.acting_tenant_id,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(record.token_hash.as_str())
        .bind(record.tenant_id.as_uuid())
        .bind(record.subject.as_str())
        .bind(record.display_name.as_str())
        .bind(record.acting_tenant_id.map(|tenant_id| tenant_id.as_uuid()))
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save viewer token for subject '{}': {error}",
                record.subject
            ))
        })?;

        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<ViewerTokenRecord>> {
        let row = sqlx::query_as::<_, ViewerTokenRow>(
            r#"
            SELECT token_hash, tenant_id, subject, display_name, acting_tenant_id, expires_at
            FROM viewer_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find viewer token: {error}")))?;

        Ok(row.map(|row| ViewerTokenRecord {
            token_hash: row.token_hash,
            tenant_id: TenantId::from_uuid(row.tenant_id),
            subject: row.subject,
            display_name: row.display_name,
            acting_tenant_id: row.acting_tenant_id.map(TenantId::from_uuid),
            expires_at: row.expires_at,
        }))
    }
}
