use std::sync::Arc;

use serde_json::json;

use tidewire_core::{AppError, TenantId};
use tidewire_domain::{IntegrationConfig, IntegrationId, IntegrationStatus};

use crate::signature::{payload_hash, sign_payload};
use crate::test_fakes::{
    FakeInboundEventRepository, FakeIntegrationRepository, RecordingSink, integration,
    integration_with_state,
};

use super::{InboundDisposition, InboundIngestionService, IngestInboundInput};

const SECRET: &str = "whsec-inbound";

struct Harness {
    service: InboundIngestionService,
    inbound: Arc<FakeInboundEventRepository>,
    sink: Arc<RecordingSink>,
}

fn harness(integrations: Vec<IntegrationConfig>) -> Harness {
    harness_with_sink(integrations, RecordingSink::default())
}

fn harness_with_sink(integrations: Vec<IntegrationConfig>, sink: RecordingSink) -> Harness {
    let inbound = Arc::new(FakeInboundEventRepository::default());
    let sink = Arc::new(sink);
    let service = InboundIngestionService::new(
        Arc::new(FakeIntegrationRepository::with(integrations)),
        inbound.clone(),
    )
    .with_sink(sink.clone());

    Harness {
        service,
        inbound,
        sink,
    }
}

fn signed_input(integration: &IntegrationConfig, body: &[u8], key: &str) -> IngestInboundInput {
    let Ok(signature) = sign_payload(SECRET, body) else {
        panic!("signing should succeed");
    };

    IngestInboundInput {
        tenant_id: integration.tenant_id(),
        integration_id: integration.id(),
        raw_body: body.to_vec(),
        idempotency_key: key.to_owned(),
        signature: Some(signature),
        source_ip: Some("203.0.113.7".to_owned()),
    }
}

#[tokio::test]
async fn valid_callback_is_stored_and_handed_downstream() {
    let crm = integration(TenantId::new(), "crm", SECRET);
    let harness = harness(vec![crm.clone()]);
    let body = br#"{"eventType":"invoice.paid","payload":{"amount":10}}"#;

    let receipt = harness.service.ingest(signed_input(&crm, body, "K1")).await;

    let Ok(receipt) = receipt else {
        panic!("ingest should succeed");
    };
    assert_eq!(receipt.disposition, InboundDisposition::Accepted);
    assert!(receipt.rejection().is_none());
    assert_eq!(receipt.event.event_type, "invoice.paid");
    assert_eq!(receipt.event.payload, json!({"amount": 10}));
    assert_eq!(receipt.event.payload_hash, payload_hash(body));
    assert_eq!(receipt.event.source_ip.as_deref(), Some("203.0.113.7"));
    assert_eq!(harness.sink.handled.lock().await.len(), 1);
}

#[tokio::test]
async fn repeated_key_returns_original_record_once() {
    let crm = integration(TenantId::new(), "crm", SECRET);
    let harness = harness(vec![crm.clone()]);

    let first = harness
        .service
        .ingest(signed_input(
            &crm,
            br#"{"eventType":"invoice.paid","payload":{"amount":10}}"#,
            "K1",
        ))
        .await;
    let second = harness
        .service
        .ingest(signed_input(
            &crm,
            br#"{"eventType":"invoice.voided","payload":{}}"#,
            "K1",
        ))
        .await;

    let (Ok(first), Ok(second)) = (first, second) else {
        panic!("ingest should succeed");
    };
    assert_eq!(second.disposition, InboundDisposition::Duplicate);
    assert_eq!(second.event, first.event);
    assert_eq!(harness.inbound.events.lock().await.len(), 1);
    assert_eq!(harness.sink.handled.lock().await.len(), 1);
    assert!(second.event.processed_at.is_some());
}

#[tokio::test]
async fn failed_handoff_is_retried_on_the_next_delivery_of_the_key() {
    let crm = integration(TenantId::new(), "crm", SECRET);
    let harness = harness_with_sink(vec![crm.clone()], RecordingSink::failing(1));
    let body = br#"{"eventType":"invoice.paid","payload":{"amount":10}}"#;

    let first = harness.service.ingest(signed_input(&crm, body, "K1")).await;
    assert!(matches!(first, Err(AppError::Internal(_))));
    assert!(
        harness
            .inbound
            .events
            .lock()
            .await
            .first()
            .is_some_and(|stored| stored.awaits_handoff())
    );

    let retried = harness.service.ingest(signed_input(&crm, body, "K1")).await;
    let Ok(retried) = retried else {
        panic!("retry should complete the handoff");
    };
    assert_eq!(retried.disposition, InboundDisposition::Duplicate);
    assert!(retried.rejection().is_none());
    assert!(retried.event.processed_at.is_some());
    assert_eq!(*harness.sink.attempts.lock().await, 2);
    assert_eq!(harness.sink.handled.lock().await.len(), 1);

    let settled = harness.service.ingest(signed_input(&crm, body, "K1")).await;
    assert!(settled.is_ok_and(|receipt| receipt.disposition == InboundDisposition::Duplicate));
    assert_eq!(*harness.sink.attempts.lock().await, 2);
    assert_eq!(harness.inbound.events.lock().await.len(), 1);
}

#[tokio::test]
async fn invalid_signature_is_persisted_but_not_handed_downstream() {
    let crm = integration(TenantId::new(), "crm", SECRET);
    let harness = harness(vec![crm.clone()]);
    let mut input = signed_input(&crm, br#"{"eventType":"invoice.paid"}"#, "K1");
    input.signature = Some("00".repeat(32));

    let receipt = harness.service.ingest(input).await;

    let Ok(receipt) = receipt else {
        panic!("ingest should succeed");
    };
    assert_eq!(receipt.disposition, InboundDisposition::InvalidSignature);
    assert!(!receipt.event.signature_valid);
    assert!(matches!(receipt.rejection(), Some(AppError::Unauthorized(_))));
    assert_eq!(harness.inbound.events.lock().await.len(), 1);
    assert!(harness.sink.handled.lock().await.is_empty());
}

#[tokio::test]
async fn missing_signature_header_is_invalid() {
    let crm = integration(TenantId::new(), "crm", SECRET);
    let harness = harness(vec![crm.clone()]);
    let mut input = signed_input(&crm, br#"{"eventType":"invoice.paid"}"#, "K1");
    input.signature = None;

    let receipt = harness.service.ingest(input).await;
    assert!(
        receipt.is_ok_and(|receipt| receipt.disposition == InboundDisposition::InvalidSignature)
    );
}

#[tokio::test]
async fn malformed_body_is_persisted_with_error() {
    let crm = integration(TenantId::new(), "crm", SECRET);
    let harness = harness(vec![crm.clone()]);

    let receipt = harness
        .service
        .ingest(signed_input(&crm, b"{not json", "K1"))
        .await;

    let Ok(receipt) = receipt else {
        panic!("ingest should succeed");
    };
    assert_eq!(receipt.disposition, InboundDisposition::MalformedPayload);
    assert!(receipt.event.signature_valid);
    assert_eq!(receipt.event.event_type, "unparsed");
    assert!(receipt.event.error.is_some());
    assert!(matches!(receipt.rejection(), Some(AppError::Validation(_))));
    assert!(harness.sink.handled.lock().await.is_empty());
}

#[tokio::test]
async fn duplicate_of_rejected_callback_mirrors_original_rejection() {
    let crm = integration(TenantId::new(), "crm", SECRET);
    let harness = harness(vec![crm.clone()]);
    let body = br#"{"eventType":"invoice.paid"}"#;
    let mut forged = signed_input(&crm, body, "K1");
    forged.signature = Some("deadbeef".to_owned());

    let first = harness.service.ingest(forged).await;
    assert!(first.is_ok());

    let retry = harness.service.ingest(signed_input(&crm, body, "K1")).await;

    let Ok(retry) = retry else {
        panic!("ingest should succeed");
    };
    assert_eq!(retry.disposition, InboundDisposition::Duplicate);
    assert!(matches!(retry.rejection(), Some(AppError::Unauthorized(_))));
    assert!(harness.sink.handled.lock().await.is_empty());
}

#[tokio::test]
async fn unknown_or_inactive_integration_is_refused_without_persisting() {
    let tenant_id = TenantId::new();
    let paused = integration_with_state(tenant_id, "crm", SECRET, true, IntegrationStatus::Paused);
    let harness = harness(vec![paused.clone()]);
    let body = br#"{"eventType":"invoice.paid"}"#;

    let mut unknown = signed_input(&paused, body, "K1");
    unknown.integration_id = IntegrationId::new();
    let unknown = harness.service.ingest(unknown).await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));

    let inactive = harness.service.ingest(signed_input(&paused, body, "K1")).await;
    assert!(matches!(inactive, Err(AppError::Forbidden(_))));

    assert!(harness.inbound.events.lock().await.is_empty());
}

#[tokio::test]
async fn blank_idempotency_key_is_rejected() {
    let crm = integration(TenantId::new(), "crm", SECRET);
    let harness = harness(vec![crm.clone()]);

    let result = harness
        .service
        .ingest(signed_input(&crm, br#"{"eventType":"invoice.paid"}"#, "  "))
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}
