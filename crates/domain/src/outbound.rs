use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tidewire_core::{AppError, AppResult, NonEmptyString, TenantId};

use crate::{IntegrationId, OutboundEventId};

const LAST_ERROR_MAX_CHARS: usize = 2_000;

/// Delivery status of one outbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundStatus {
    /// Waiting for its first attempt.
    Pending,
    /// Delivered; terminal.
    Sent,
    /// Last attempt failed; retried once `next_attempt_at` passes.
    Failed,
    /// Retry budget exhausted; terminal.
    DeadLetter,
}

impl OutboundStatus {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Sent => "SENT",
            Self::Failed => "FAILED",
            Self::DeadLetter => "DEAD_LETTER",
        }
    }

    /// Returns whether no further transitions are allowed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::DeadLetter)
    }
}

impl FromStr for OutboundStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "SENT" => Ok(Self::Sent),
            "FAILED" => Ok(Self::Failed),
            "DEAD_LETTER" => Ok(Self::DeadLetter),
            _ => Err(AppError::Validation(format!(
                "unknown outbound status '{value}'"
            ))),
        }
    }
}

/// Retry ceiling and capped exponential backoff for outbound delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_seconds: u32,
    max_delay_seconds: u32,
}

impl RetryPolicy {
    /// Creates a validated retry policy.
    pub fn new(
        max_attempts: u32,
        base_delay_seconds: u32,
        max_delay_seconds: u32,
    ) -> AppResult<Self> {
        if max_attempts == 0 {
            return Err(AppError::Validation(
                "retry max_attempts must be greater than zero".to_owned(),
            ));
        }

        if base_delay_seconds == 0 {
            return Err(AppError::Validation(
                "retry base delay must be greater than zero".to_owned(),
            ));
        }

        if max_delay_seconds < base_delay_seconds {
            return Err(AppError::Validation(
                "retry max delay must not be lower than the base delay".to_owned(),
            ));
        }

        Ok(Self {
            max_attempts,
            base_delay_seconds,
            max_delay_seconds,
        })
    }

    /// Returns the attempt ceiling.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay before the attempt following `attempt_count` failures.
    ///
    /// `base * 2^(attempt_count - 1)`, capped at the configured maximum.
    #[must_use]
    pub fn backoff(&self, attempt_count: u32) -> TimeDelta {
        let exponent = attempt_count.saturating_sub(1).min(31);
        let seconds = u64::from(self.base_delay_seconds)
            .saturating_mul(1_u64 << exponent)
            .min(u64::from(self.max_delay_seconds));

        TimeDelta::seconds(i64::try_from(seconds).unwrap_or(i64::from(self.max_delay_seconds)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay_seconds: 30,
            max_delay_seconds: 3_600,
        }
    }
}

/// Validated request to enqueue one outbound delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOutboundEvent {
    /// Tenant scope.
    pub tenant_id: TenantId,
    /// Target integration.
    pub integration_id: IntegrationId,
    /// Event type label sent to the integration.
    pub event_type: NonEmptyString,
    /// JSON body.
    pub payload: Value,
    /// Caller-supplied deduplication key.
    pub idempotency_key: NonEmptyString,
}

impl NewOutboundEvent {
    /// Creates a validated enqueue request.
    pub fn new(
        tenant_id: TenantId,
        integration_id: IntegrationId,
        event_type: impl Into<String>,
        payload: Value,
        idempotency_key: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            tenant_id,
            integration_id,
            event_type: NonEmptyString::for_field("event_type", event_type)?,
            payload,
            idempotency_key: NonEmptyString::for_field("idempotency_key", idempotency_key)?,
        })
    }
}

/// Persisted outbound delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEvent {
    /// Record identifier.
    pub id: OutboundEventId,
    /// Tenant scope.
    pub tenant_id: TenantId,
    /// Target integration.
    pub integration_id: IntegrationId,
    /// Event type label.
    pub event_type: String,
    /// JSON body.
    pub payload: Value,
    /// Delivery status.
    pub status: OutboundStatus,
    /// Attempts performed so far.
    pub attempt_count: u32,
    /// Earliest time of the next retry while `FAILED`.
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// Error of the most recent failed attempt.
    pub last_error: Option<String>,
    /// Caller-supplied deduplication key.
    pub idempotency_key: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last transition timestamp.
    pub updated_at: DateTime<Utc>,
}

impl OutboundEvent {
    /// Returns whether the dispatcher should attempt this event at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            OutboundStatus::Pending => true,
            OutboundStatus::Failed => self.next_attempt_at.is_none_or(|at| at <= now),
            OutboundStatus::Sent | OutboundStatus::DeadLetter => false,
        }
    }

    /// Computes the transition for a successful delivery attempt.
    pub fn delivered(&self) -> AppResult<OutboundTransition> {
        self.ensure_not_terminal()?;

        Ok(OutboundTransition {
            event_id: self.id,
            tenant_id: self.tenant_id,
            prior_status: self.status,
            prior_attempt_count: self.attempt_count,
            status: OutboundStatus::Sent,
            attempt_count: self.attempt_count.saturating_add(1),
            next_attempt_at: None,
            last_error: None,
        })
    }

    /// Computes the transition for a failed delivery attempt.
    pub fn delivery_failed(
        &self,
        now: DateTime<Utc>,
        error: &str,
        policy: &RetryPolicy,
    ) -> AppResult<OutboundTransition> {
        self.ensure_not_terminal()?;

        let attempt_count = self.attempt_count.saturating_add(1);
        let (status, next_attempt_at) = if attempt_count >= policy.max_attempts() {
            (OutboundStatus::DeadLetter, None)
        } else {
            (
                OutboundStatus::Failed,
                Some(now + policy.backoff(attempt_count)),
            )
        };

        Ok(OutboundTransition {
            event_id: self.id,
            tenant_id: self.tenant_id,
            prior_status: self.status,
            prior_attempt_count: self.attempt_count,
            status,
            attempt_count,
            next_attempt_at,
            last_error: Some(truncate_error(error)),
        })
    }

    fn ensure_not_terminal(&self) -> AppResult<()> {
        if self.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "outbound event '{}' is already {}",
                self.id,
                self.status.as_str()
            )));
        }

        Ok(())
    }
}

/// One atomic status change, applied only while the stored row still has the
/// prior status and attempt count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundTransition {
    /// Target event.
    pub event_id: OutboundEventId,
    /// Tenant scope.
    pub tenant_id: TenantId,
    /// Status the stored row must still have.
    pub prior_status: OutboundStatus,
    /// Attempt count the stored row must still have.
    pub prior_attempt_count: u32,
    /// New status.
    pub status: OutboundStatus,
    /// New attempt count.
    pub attempt_count: u32,
    /// New retry time.
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// New last error.
    pub last_error: Option<String>,
}

impl OutboundTransition {
    /// Applies the transition to an in-memory copy of the event.
    pub fn apply_to(&self, event: &mut OutboundEvent, updated_at: DateTime<Utc>) {
        event.status = self.status;
        event.attempt_count = self.attempt_count;
        event.next_attempt_at = self.next_attempt_at;
        event.last_error = self.last_error.clone();
        event.updated_at = updated_at;
    }
}

fn truncate_error(error: &str) -> String {
    match error.char_indices().nth(LAST_ERROR_MAX_CHARS) {
        Some((index, _)) => error[..index].to_owned(),
        None => error.to_owned(),
    }
}
