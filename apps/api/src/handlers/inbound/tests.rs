use std::net::SocketAddr;

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use chrono::Utc;
use serde_json::Value;
use tidewire_application::{InboundDisposition, InboundReceipt};
use tidewire_core::{AppError, TenantId};
use tidewire_domain::{InboundEvent, InboundEventId, IntegrationId};

use super::{receipt_status, source_ip};

fn receipt(
    disposition: InboundDisposition,
    signature_valid: bool,
    error: Option<&str>,
) -> InboundReceipt {
    InboundReceipt {
        event: InboundEvent {
            id: InboundEventId::new(),
            tenant_id: TenantId::new(),
            integration_id: IntegrationId::new(),
            event_type: "invoice.paid".to_owned(),
            payload: Value::Null,
            received_at: Utc::now(),
            idempotency_key: "evt-1".to_owned(),
            signature_valid,
            payload_hash: "00".to_owned(),
            source_ip: None,
            error: error.map(ToOwned::to_owned),
            processed_at: None,
        },
        disposition,
    }
}

#[test]
fn accepted_callbacks_answer_202_and_duplicates_200() {
    assert!(
        receipt_status(&receipt(InboundDisposition::Accepted, true, None))
            .is_ok_and(|status| status == StatusCode::ACCEPTED)
    );
    assert!(
        receipt_status(&receipt(InboundDisposition::Duplicate, true, None))
            .is_ok_and(|status| status == StatusCode::OK)
    );
}

#[test]
fn rejected_records_map_to_client_errors_even_when_duplicated() {
    assert!(matches!(
        receipt_status(&receipt(InboundDisposition::InvalidSignature, false, None)),
        Err(AppError::Unauthorized(_))
    ));
    assert!(matches!(
        receipt_status(&receipt(InboundDisposition::Duplicate, false, None)),
        Err(AppError::Unauthorized(_))
    ));
    assert!(matches!(
        receipt_status(&receipt(
            InboundDisposition::Duplicate,
            true,
            Some("malformed inbound payload")
        )),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn source_ip_prefers_first_forwarded_address() {
    let peer = SocketAddr::from(([10, 0, 0, 7], 40_000));
    let mut headers = HeaderMap::new();
    assert_eq!(source_ip(&headers, peer), "10.0.0.7");

    headers.insert(
        "x-forwarded-for",
        HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
    );
    assert_eq!(source_ip(&headers, peer), "203.0.113.9");
}
