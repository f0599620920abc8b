use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use tidewire_application::{InboundEventRepository, InboundInsertOutcome};
use tidewire_core::{AppError, AppResult, TenantId};
use tidewire_domain::{InboundEvent, InboundEventId, IntegrationId, NewInboundEvent};

/// PostgreSQL-backed repository for inbound callbacks.
#[derive(Clone)]
pub struct PostgresInboundEventRepository {
    pool: PgPool,
}

impl PostgresInboundEventRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct InboundEventRow {
    id: Uuid,
    tenant_id: Uuid,
    integration_id: Uuid,
    event_type: String,
    payload: Value,
    received_at: DateTime<Utc>,
    idempotency_key: String,
    signature_valid: bool,
    payload_hash: String,
    source_ip: Option<String>,
    error: Option<String>,
    processed_at: Option<DateTime<Utc>>,
}

impl From<InboundEventRow> for InboundEvent {
    fn from(row: InboundEventRow) -> Self {
        Self {
            id: InboundEventId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            integration_id: IntegrationId::from_uuid(row.integration_id),
            event_type: row.event_type,
            payload: row.payload,
            received_at: row.received_at,
            idempotency_key: row.idempotency_key,
            signature_valid: row.signature_valid,
            payload_hash: row.payload_hash,
            source_ip: row.source_ip,
            error: row.error,
            processed_at: row.processed_at,
        }
    }
}

#[async_trait]
impl InboundEventRepository for PostgresInboundEventRepository {
    async fn find_by_idempotency_key(
        &self,
        tenant_id: TenantId,
        integration_id: IntegrationId,
        idempotency_key: &str,
    ) -> AppResult<Option<InboundEvent>> {
        let row = sqlx::query_as::<_, InboundEventRow>(
            r#"
            SELECT
                id,
                tenant_id,
                integration_id,
                event_type,
                payload,
                received_at,
                idempotency_key,
                signature_valid,
                payload_hash,
                source_ip,
                error,
                processed_at
            FROM inbound_events
            WHERE tenant_id = $1 AND integration_id = $2 AND idempotency_key = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(integration_id.as_uuid())
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find inbound event '{idempotency_key}' for integration '{integration_id}': {error}"
            ))
        })?;

        Ok(row.map(InboundEvent::from))
    }

    async fn insert_if_absent(&self, event: NewInboundEvent) -> AppResult<InboundInsertOutcome> {
        let inserted = sqlx::query_as::<_, InboundEventRow>(
            r#"
            INSERT INTO inbound_events (
                id,
                tenant_id,
                integration_id,
                event_type,
                payload,
                idempotency_key,
                signature_valid,
                payload_hash,
                source_ip,
                error
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (tenant_id, integration_id, idempotency_key) DO NOTHING
            RETURNING
                id,
                tenant_id,
                integration_id,
                event_type,
                payload,
                received_at,
                idempotency_key,
                signature_valid,
                payload_hash,
                source_ip,
                error,
                processed_at
            "#,
        )
        .bind(InboundEventId::new().as_uuid())
        .bind(event.tenant_id.as_uuid())
        .bind(event.integration_id.as_uuid())
        .bind(event.event_type.as_str())
        .bind(&event.payload)
        .bind(event.idempotency_key.as_str())
        .bind(event.signature_valid)
        .bind(event.payload_hash.as_str())
        .bind(event.source_ip.as_deref())
        .bind(event.error.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to store inbound event '{}' for integration '{}': {error}",
                event.idempotency_key, event.integration_id
            ))
        })?;

        if let Some(row) = inserted {
            return Ok(InboundInsertOutcome::Inserted(row.into()));
        }

        // A concurrent request won the unique key.
        self.find_by_idempotency_key(
            event.tenant_id,
            event.integration_id,
            event.idempotency_key.as_str(),
        )
        .await?
        .map(InboundInsertOutcome::Existing)
        .ok_or_else(|| {
            AppError::Internal(format!(
                "inbound event '{}' conflicted but could not be loaded",
                event.idempotency_key
            ))
        })
    }

    async fn mark_processed(
        &self,
        event_id: InboundEventId,
        processed_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE inbound_events
            SET processed_at = COALESCE(processed_at, $2)
            WHERE id = $1
            "#,
        )
        .bind(event_id.as_uuid())
        .bind(processed_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to mark inbound event '{event_id}' processed: {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "inbound event '{event_id}' not found"
            )));
        }

        Ok(())
    }
}
