use axum::http::HeaderMap;
use tidewire_infrastructure::IDEMPOTENCY_KEY_HEADER;

pub mod events;
pub mod health;
pub mod inbound;
pub mod integrations;
pub mod outbound;

fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
