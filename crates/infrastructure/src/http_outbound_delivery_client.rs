use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use tidewire_application::{DeliveryResponse, OutboundDeliveryClient, OutboundDeliveryRequest};
use tidewire_core::{AppError, AppResult};

/// Header carrying the hex HMAC-SHA256 of the request body.
pub const SIGNATURE_HEADER: &str = "X-Tidewire-Signature";
/// Header carrying the outbound event type.
pub const EVENT_TYPE_HEADER: &str = "X-Tidewire-Event-Type";
/// Header carrying the delivery idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Per-call timeout used when no override is configured.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

const RESPONSE_EXCERPT_MAX_CHARS: usize = 512;

/// HTTP implementation of outbound delivery.
///
/// Posts the already-signed body once; retries are scheduled by the
/// dispatcher through the outbound event status.
#[derive(Clone)]
pub struct HttpOutboundDeliveryClient {
    http_client: reqwest::Client,
}

impl HttpOutboundDeliveryClient {
    /// Creates a client whose requests time out after `timeout`.
    ///
    /// Redirects are not followed: a 3xx answer is reported as is and
    /// counts as a failed attempt, so the signed POST is never replayed as
    /// a GET elsewhere.
    pub fn with_timeout(timeout: Duration) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|error| {
                AppError::Internal(format!("failed to build outbound HTTP client: {error}"))
            })?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl OutboundDeliveryClient for HttpOutboundDeliveryClient {
    async fn deliver(&self, request: OutboundDeliveryRequest) -> AppResult<DeliveryResponse> {
        let response = self
            .http_client
            .post(request.url.as_str())
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, request.signature.as_str())
            .header(EVENT_TYPE_HEADER, request.event_type.as_str())
            .header(IDEMPOTENCY_KEY_HEADER, request.idempotency_key.as_str())
            .body(request.body)
            .send()
            .await
            .map_err(|error| {
                let kind = if error.is_timeout() {
                    "timed out"
                } else {
                    "transport error"
                };
                AppError::Internal(format!(
                    "outbound delivery '{}' {kind}: {error}",
                    request.event_id
                ))
            })?;

        let status_code = response.status().as_u16();
        let body_excerpt = if response.status().is_success() {
            None
        } else {
            response
                .text()
                .await
                .ok()
                .map(|body| body.chars().take(RESPONSE_EXCERPT_MAX_CHARS).collect())
        };

        tracing::debug!(
            outbound_event_id = %request.event_id,
            status_code,
            "outbound delivery answered"
        );

        Ok(DeliveryResponse {
            status_code,
            body_excerpt,
        })
    }
}
