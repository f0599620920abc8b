use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use tidewire_application::AuditLedgerRepository;
use tidewire_core::{AppError, AppResult, TenantId};
use tidewire_domain::{AuditEvent, AuditEventId, EventMetadata, LedgerPosition, NewAuditEvent};

/// PostgreSQL-backed append-only audit ledger.
#[derive(Clone)]
pub struct PostgresAuditLedgerRepository {
    pool: PgPool,
}

impl PostgresAuditLedgerRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditEventRow {
    id: Uuid,
    tenant_id: Uuid,
    entity_type: String,
    entity_id: String,
    action: String,
    actor: Option<String>,
    occurred_at: DateTime<Utc>,
    before_snapshot: Option<Value>,
    after_snapshot: Option<Value>,
    metadata: Value,
}

impl TryFrom<AuditEventRow> for AuditEvent {
    type Error = AppError;

    fn try_from(row: AuditEventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: AuditEventId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            action: row.action,
            actor: row.actor,
            occurred_at: row.occurred_at,
            before: row.before_snapshot,
            after: row.after_snapshot,
            metadata: EventMetadata::from_value(row.metadata)?,
        })
    }
}

#[async_trait]
impl AuditLedgerRepository for PostgresAuditLedgerRepository {
    async fn append(&self, event: NewAuditEvent) -> AppResult<AuditEvent> {
        let event_id = AuditEventId::new();
        let row = sqlx::query_as::<_, AuditEventRow>(
            r#"
            INSERT INTO audit_events (
                id,
                tenant_id,
                entity_type,
                entity_id,
                action,
                actor,
                before_snapshot,
                after_snapshot,
                metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING
                id,
                tenant_id,
                entity_type,
                entity_id,
                action,
                actor,
                occurred_at,
                before_snapshot,
                after_snapshot,
                metadata
            "#,
        )
        .bind(event_id.as_uuid())
        .bind(event.tenant_id().as_uuid())
        .bind(event.entity_type().as_str())
        .bind(event.entity_id().as_str())
        .bind(event.action().as_str())
        .bind(event.actor())
        .bind(event.before())
        .bind(event.after())
        .bind(event.metadata().to_value())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to append audit event for tenant '{}': {error}",
                event.tenant_id()
            ))
        })?;

        AuditEvent::try_from(row)
    }

    async fn list_before(
        &self,
        tenant_id: TenantId,
        before: Option<LedgerPosition>,
        limit: usize,
    ) -> AppResult<Vec<AuditEvent>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, AuditEventRow>(
            r#"
            SELECT
                id,
                tenant_id,
                entity_type,
                entity_id,
                action,
                actor,
                occurred_at,
                before_snapshot,
                after_snapshot,
                metadata
            FROM audit_events
            WHERE tenant_id = $1
                AND ($2::TIMESTAMPTZ IS NULL OR (occurred_at, id) < ($2::TIMESTAMPTZ, $3::UUID))
            ORDER BY occurred_at DESC, id DESC
            LIMIT $4
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(before.map(|position| position.occurred_at))
        .bind(before.map(|position| position.id.as_uuid()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list audit events for tenant '{tenant_id}': {error}"
            ))
        })?;

        rows.into_iter().map(AuditEvent::try_from).collect()
    }
}
