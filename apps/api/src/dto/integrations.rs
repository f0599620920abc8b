use serde::{Deserialize, Serialize};
use serde_json::Value;
use tidewire_application::{RegisterIntegrationInput, RegisteredIntegration};
use tidewire_domain::IntegrationConfig;
use ts_rs::TS;

/// Incoming payload for integration registration.
#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export_to = "register-integration-request.ts")]
pub struct RegisterIntegrationRequest {
    pub integration_key: String,
    pub base_url: String,
}

impl From<RegisterIntegrationRequest> for RegisterIntegrationInput {
    fn from(value: RegisterIntegrationRequest) -> Self {
        Self {
            integration_key: value.integration_key,
            base_url: value.base_url,
        }
    }
}

/// Incoming payload for a manual outbound enqueue.
#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export_to = "enqueue-outbound-event-request.ts")]
pub struct EnqueueOutboundEventRequest {
    pub event_type: String,
    #[ts(type = "unknown")]
    pub payload: Value,
}

/// API representation of an integration. The signing secret is never listed.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export_to = "integration-response.ts")]
pub struct IntegrationResponse {
    pub id: String,
    pub tenant_id: String,
    pub integration_key: String,
    pub base_url: String,
    pub enabled: bool,
    pub status: String,
}

impl From<IntegrationConfig> for IntegrationResponse {
    fn from(value: IntegrationConfig) -> Self {
        Self {
            id: value.id().to_string(),
            tenant_id: value.tenant_id().to_string(),
            integration_key: value.integration_key().as_str().to_owned(),
            base_url: value.base_url().to_string(),
            enabled: value.enabled(),
            status: value.status().as_str().to_owned(),
        }
    }
}

/// Registration result; the only response that carries the signing secret.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export_to = "registered-integration-response.ts")]
pub struct RegisteredIntegrationResponse {
    pub integration: IntegrationResponse,
    pub signing_secret: String,
}

impl From<RegisteredIntegration> for RegisteredIntegrationResponse {
    fn from(value: RegisteredIntegration) -> Self {
        Self {
            integration: IntegrationResponse::from(value.integration),
            signing_secret: value.signing_secret,
        }
    }
}
