use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tidewire_application::EventPublisher;
use tidewire_core::TenantId;
use tidewire_domain::{AuditEventId, EventEnvelope, EventKind, EventMetadata};
use tidewire_infrastructure::{EventBrokerConfig, InMemoryEventBroker};

use super::{LiveStream, StreamFrame};

const IDLE_KEEPALIVE: Duration = Duration::from_millis(25);

fn envelope(tenant_id: Option<TenantId>) -> EventEnvelope {
    let mut metadata = EventMetadata::new();
    if let Some(tenant_id) = tenant_id {
        metadata.insert("tenantId", tenant_id.to_string());
    }

    EventEnvelope {
        id: AuditEventId::new(),
        kind: EventKind::RecordStatusChanged,
        entity_type: "finding".to_owned(),
        entity_id: "f-12".to_owned(),
        action: "status_changed".to_owned(),
        timestamp: Utc::now(),
        actor: None,
        metadata,
    }
}

fn started_broker() -> InMemoryEventBroker {
    let broker = InMemoryEventBroker::new(EventBrokerConfig {
        queue_capacity: 16,
        replay_capacity: 16,
    });
    broker.start();
    broker
}

async fn next(live: &mut LiveStream) -> Option<StreamFrame> {
    tokio::time::timeout(Duration::from_secs(2), live.next_frame())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn replayed_envelopes_are_not_delivered_twice() {
    let broker = started_broker();
    let tenant_id = TenantId::new();
    let anchor = envelope(Some(tenant_id));
    broker.publish(anchor.clone());

    let Ok(subscription) = broker.subscribe() else {
        panic!("subscribe should succeed");
    };
    let raced = envelope(Some(tenant_id));
    broker.publish(raced.clone());

    let anchor_id = anchor.id.to_string();
    let mut live = LiveStream::resume(
        subscription,
        tenant_id,
        IDLE_KEEPALIVE,
        Some(anchor_id.as_str()),
        |event_id| broker.replay_since(event_id, tenant_id),
    );

    let later = envelope(Some(tenant_id));
    broker.publish(later.clone());

    assert_eq!(next(&mut live).await, Some(StreamFrame::Envelope(raced)));
    assert_eq!(next(&mut live).await, Some(StreamFrame::Envelope(later)));
}

#[tokio::test]
async fn other_tenant_envelopes_are_filtered_and_global_ones_kept() {
    let broker = started_broker();
    let tenant_id = TenantId::new();
    let Ok(mut live) = LiveStream::open(&broker, tenant_id, None, IDLE_KEEPALIVE) else {
        panic!("stream should open");
    };

    let global = envelope(None);
    broker.publish(envelope(Some(TenantId::new())));
    broker.publish(global.clone());

    assert_eq!(next(&mut live).await, Some(StreamFrame::Envelope(global)));
}

#[tokio::test]
async fn idle_stream_emits_heartbeat() {
    let broker = started_broker();
    let Ok(mut live) = LiveStream::open(&broker, TenantId::new(), None, IDLE_KEEPALIVE) else {
        panic!("stream should open");
    };

    assert!(matches!(
        next(&mut live).await,
        Some(StreamFrame::Heartbeat(_))
    ));
}

#[tokio::test]
async fn other_tenant_traffic_does_not_postpone_heartbeat() {
    let broker = started_broker();
    let Ok(mut live) = LiveStream::open(&broker, TenantId::new(), None, IDLE_KEEPALIVE) else {
        panic!("stream should open");
    };

    let other_tenant_traffic = async {
        for _ in 0..80 {
            broker.publish(envelope(Some(TenantId::new())));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };

    tokio::select! {
        frame = live.next_frame() => {
            assert!(matches!(frame, Some(StreamFrame::Heartbeat(_))));
        }
        () = other_tenant_traffic => panic!("heartbeat should arrive while traffic continues"),
    }
}

#[tokio::test]
async fn evicted_or_malformed_resume_point_emits_reset_first() {
    let broker = started_broker();
    let tenant_id = TenantId::new();
    let unknown = AuditEventId::new().to_string();

    let Ok(mut evicted) =
        LiveStream::open(&broker, tenant_id, Some(unknown.as_str()), IDLE_KEEPALIVE)
    else {
        panic!("stream should open");
    };
    assert_eq!(
        next(&mut evicted).await,
        Some(StreamFrame::Reset {
            last_event_id: unknown
        })
    );

    let Ok(mut malformed) =
        LiveStream::open(&broker, tenant_id, Some("not-an-id"), IDLE_KEEPALIVE)
    else {
        panic!("stream should open");
    };
    assert_eq!(
        next(&mut malformed).await,
        Some(StreamFrame::Reset {
            last_event_id: "not-an-id".to_owned()
        })
    );
}

#[tokio::test]
async fn stopped_broker_ends_stream_and_drop_unsubscribes() {
    let broker = started_broker();
    let Ok(live) = LiveStream::open(&broker, TenantId::new(), None, Duration::from_secs(30)) else {
        panic!("stream should open");
    };
    assert_eq!(broker.subscriber_count(), 1);

    let mut frames = Box::pin(live.frames());
    broker.stop();
    let ended = tokio::time::timeout(Duration::from_secs(2), frames.next()).await;
    assert!(ended.is_ok_and(|frame| frame.is_none()));

    let other = started_broker();
    let Ok(live) = LiveStream::open(&other, TenantId::new(), None, IDLE_KEEPALIVE) else {
        panic!("stream should open");
    };
    assert_eq!(other.subscriber_count(), 1);
    drop(live);
    assert_eq!(other.subscriber_count(), 0);
}

#[test]
fn heartbeat_frame_renders_typed_json() {
    let event = StreamFrame::Heartbeat(Utc::now()).into_event();
    let rendered = format!("{event:?}");
    assert!(rendered.contains("heartbeat"));
}
