use std::fmt::{Debug, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tidewire_core::{AppError, AppResult, NonEmptyString, TenantId};
use url::Url;

use crate::IntegrationId;

/// Operational status of an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationStatus {
    /// Exchanging events normally.
    Active,
    /// Temporarily paused by an operator.
    Paused,
    /// Disabled after a configuration or delivery problem.
    Error,
}

impl IntegrationStatus {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
            Self::Error => "ERROR",
        }
    }
}

impl FromStr for IntegrationStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ACTIVE" => Ok(Self::Active),
            "PAUSED" => Ok(Self::Paused),
            "ERROR" => Ok(Self::Error),
            _ => Err(AppError::Validation(format!(
                "unknown integration status '{value}'"
            ))),
        }
    }
}

/// Input payload used to construct an [`IntegrationConfig`].
#[derive(Clone)]
pub struct IntegrationConfigInput {
    /// Identifier, generated by the caller for new integrations.
    pub id: IntegrationId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Tenant-unique integration key.
    pub integration_key: String,
    /// Absolute delivery URL.
    pub base_url: String,
    /// Shared HMAC secret.
    pub signing_secret: String,
    /// Whether the integration is switched on.
    pub enabled: bool,
    /// Operational status.
    pub status: IntegrationStatus,
}

/// Tenant-owned configuration of one external system.
#[derive(Clone, PartialEq, Eq)]
pub struct IntegrationConfig {
    id: IntegrationId,
    tenant_id: TenantId,
    integration_key: NonEmptyString,
    base_url: Url,
    signing_secret: NonEmptyString,
    enabled: bool,
    status: IntegrationStatus,
}

impl IntegrationConfig {
    /// Creates a validated integration configuration.
    pub fn new(input: IntegrationConfigInput) -> AppResult<Self> {
        let base_url = Url::parse(input.base_url.trim()).map_err(|error| {
            AppError::Validation(format!(
                "invalid integration base_url '{}': {error}",
                input.base_url
            ))
        })?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(AppError::Validation(format!(
                "integration base_url must use http or https, got '{}'",
                base_url.scheme()
            )));
        }

        Ok(Self {
            id: input.id,
            tenant_id: input.tenant_id,
            integration_key: NonEmptyString::for_field("integration_key", input.integration_key)?,
            base_url,
            signing_secret: NonEmptyString::for_field("signing_secret", input.signing_secret)?,
            enabled: input.enabled,
            status: input.status,
        })
    }

    /// Returns the integration identifier.
    #[must_use]
    pub fn id(&self) -> IntegrationId {
        self.id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the tenant-unique key.
    #[must_use]
    pub fn integration_key(&self) -> &NonEmptyString {
        &self.integration_key
    }

    /// Returns the delivery URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the shared signing secret.
    #[must_use]
    pub fn signing_secret(&self) -> &str {
        self.signing_secret.as_str()
    }

    /// Returns whether the integration is switched on.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the operational status.
    #[must_use]
    pub fn status(&self) -> IntegrationStatus {
        self.status
    }

    /// Returns whether events may flow to and from this integration.
    #[must_use]
    pub fn accepts_traffic(&self) -> bool {
        self.enabled && self.status == IntegrationStatus::Active
    }
}

impl Debug for IntegrationConfig {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("IntegrationConfig")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("integration_key", &self.integration_key)
            .field("base_url", &self.base_url.as_str())
            .field("signing_secret", &"<redacted>")
            .field("enabled", &self.enabled)
            .field("status", &self.status)
            .finish()
    }
}
