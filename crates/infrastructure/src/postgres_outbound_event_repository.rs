use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use tidewire_application::{OutboundEventListQuery, OutboundEventRepository};
use tidewire_core::{AppError, AppResult, TenantId};
use tidewire_domain::{
    IntegrationId, NewOutboundEvent, OutboundEvent, OutboundEventId, OutboundTransition,
};

/// PostgreSQL-backed repository for outbound deliveries.
#[derive(Clone)]
pub struct PostgresOutboundEventRepository {
    pool: PgPool,
}

impl PostgresOutboundEventRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct OutboundEventRow {
    id: Uuid,
    tenant_id: Uuid,
    integration_id: Uuid,
    event_type: String,
    payload: Value,
    status: String,
    attempt_count: i32,
    next_attempt_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    idempotency_key: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OutboundEventRow> for OutboundEvent {
    type Error = AppError;

    fn try_from(row: OutboundEventRow) -> Result<Self, Self::Error> {
        let attempt_count = u32::try_from(row.attempt_count).map_err(|error| {
            AppError::Internal(format!(
                "outbound event '{}' has invalid attempt_count {}: {error}",
                row.id, row.attempt_count
            ))
        })?;

        Ok(Self {
            id: OutboundEventId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            integration_id: IntegrationId::from_uuid(row.integration_id),
            event_type: row.event_type,
            payload: row.payload,
            status: row.status.parse()?,
            attempt_count,
            next_attempt_at: row.next_attempt_at,
            last_error: row.last_error,
            idempotency_key: row.idempotency_key,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn to_sql_count(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_sql_limit(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl OutboundEventRepository for PostgresOutboundEventRepository {
    async fn enqueue(&self, event: NewOutboundEvent) -> AppResult<OutboundEvent> {
        sqlx::query(
            r#"
            INSERT INTO outbound_events (
                id,
                tenant_id,
                integration_id,
                event_type,
                payload,
                idempotency_key
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tenant_id, integration_id, idempotency_key) DO NOTHING
            "#,
        )
        .bind(OutboundEventId::new().as_uuid())
        .bind(event.tenant_id.as_uuid())
        .bind(event.integration_id.as_uuid())
        .bind(event.event_type.as_str())
        .bind(&event.payload)
        .bind(event.idempotency_key.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to enqueue outbound event '{}' for integration '{}': {error}",
                event.idempotency_key, event.integration_id
            ))
        })?;

        let row = sqlx::query_as::<_, OutboundEventRow>(
            r#"
            SELECT
                id,
                tenant_id,
                integration_id,
                event_type,
                payload,
                status,
                attempt_count,
                next_attempt_at,
                last_error,
                idempotency_key,
                created_at,
                updated_at
            FROM outbound_events
            WHERE tenant_id = $1 AND integration_id = $2 AND idempotency_key = $3
            "#,
        )
        .bind(event.tenant_id.as_uuid())
        .bind(event.integration_id.as_uuid())
        .bind(event.idempotency_key.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load outbound event '{}' after enqueue: {error}",
                event.idempotency_key
            ))
        })?;

        OutboundEvent::try_from(row)
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: usize) -> AppResult<Vec<OutboundEvent>> {
        let rows = sqlx::query_as::<_, OutboundEventRow>(
            r#"
            SELECT
                id,
                tenant_id,
                integration_id,
                event_type,
                payload,
                status,
                attempt_count,
                next_attempt_at,
                last_error,
                idempotency_key,
                created_at,
                updated_at
            FROM outbound_events
            WHERE status = 'PENDING'
                OR (status = 'FAILED' AND (next_attempt_at IS NULL OR next_attempt_at <= $1))
            ORDER BY next_attempt_at NULLS FIRST, created_at
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(to_sql_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list due outbound events: {error}"))
        })?;

        rows.into_iter().map(OutboundEvent::try_from).collect()
    }

    async fn apply_transition(
        &self,
        transition: &OutboundTransition,
    ) -> AppResult<Option<OutboundEvent>> {
        let row = sqlx::query_as::<_, OutboundEventRow>(
            r#"
            UPDATE outbound_events
            SET
                status = $5,
                attempt_count = $6,
                next_attempt_at = $7,
                last_error = $8,
                updated_at = now()
            WHERE tenant_id = $1
              AND id = $2
              AND status = $3
              AND attempt_count = $4
            RETURNING
                id,
                tenant_id,
                integration_id,
                event_type,
                payload,
                status,
                attempt_count,
                next_attempt_at,
                last_error,
                idempotency_key,
                created_at,
                updated_at
            "#,
        )
        .bind(transition.tenant_id.as_uuid())
        .bind(transition.event_id.as_uuid())
        .bind(transition.prior_status.as_str())
        .bind(to_sql_count(transition.prior_attempt_count))
        .bind(transition.status.as_str())
        .bind(to_sql_count(transition.attempt_count))
        .bind(transition.next_attempt_at)
        .bind(transition.last_error.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to transition outbound event '{}' to {}: {error}",
                transition.event_id,
                transition.status.as_str()
            ))
        })?;

        row.map(OutboundEvent::try_from).transpose()
    }

    async fn find_event(
        &self,
        tenant_id: TenantId,
        event_id: OutboundEventId,
    ) -> AppResult<Option<OutboundEvent>> {
        let row = sqlx::query_as::<_, OutboundEventRow>(
            r#"
            SELECT
                id,
                tenant_id,
                integration_id,
                event_type,
                payload,
                status,
                attempt_count,
                next_attempt_at,
                last_error,
                idempotency_key,
                created_at,
                updated_at
            FROM outbound_events
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(event_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find outbound event '{event_id}' for tenant '{tenant_id}': {error}"
            ))
        })?;

        row.map(OutboundEvent::try_from).transpose()
    }

    async fn list_events(
        &self,
        tenant_id: TenantId,
        query: OutboundEventListQuery,
    ) -> AppResult<Vec<OutboundEvent>> {
        let rows = sqlx::query_as::<_, OutboundEventRow>(
            r#"
            SELECT
                id,
                tenant_id,
                integration_id,
                event_type,
                payload,
                status,
                attempt_count,
                next_attempt_at,
                last_error,
                idempotency_key,
                created_at,
                updated_at
            FROM outbound_events
            WHERE tenant_id = $1
                AND ($2::TEXT IS NULL OR status = $2)
                AND ($3::UUID IS NULL OR integration_id = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(query.status.map(|status| status.as_str()))
        .bind(query.integration_id.map(|integration_id| integration_id.as_uuid()))
        .bind(to_sql_limit(query.limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list outbound events for tenant '{tenant_id}': {error}"
            ))
        })?;

        rows.into_iter().map(OutboundEvent::try_from).collect()
    }
}
