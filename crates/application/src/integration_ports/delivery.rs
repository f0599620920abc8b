use async_trait::async_trait;
use tidewire_core::AppResult;
use tidewire_domain::OutboundEventId;

/// Signed HTTP delivery of one outbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundDeliveryRequest {
    /// Outbound event identifier.
    pub event_id: OutboundEventId,
    /// Destination URL.
    pub url: String,
    /// Event type label.
    pub event_type: String,
    /// Idempotency key forwarded to the receiver.
    pub idempotency_key: String,
    /// Exact JSON body bytes that were signed.
    pub body: Vec<u8>,
    /// Hex HMAC-SHA256 of `body`.
    pub signature: String,
}

/// Response returned by the receiving system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Leading part of the response body, for error reporting.
    pub body_excerpt: Option<String>,
}

impl DeliveryResponse {
    /// Returns whether the receiver acknowledged the delivery.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Port for posting outbound deliveries.
#[async_trait]
pub trait OutboundDeliveryClient: Send + Sync {
    /// Sends one delivery. Transport failures and timeouts are errors; any
    /// HTTP response, successful or not, is returned.
    async fn deliver(&self, request: OutboundDeliveryRequest) -> AppResult<DeliveryResponse>;
}
