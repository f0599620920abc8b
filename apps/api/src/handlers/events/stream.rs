use std::collections::{HashSet, VecDeque};
use std::str::FromStr;
use std::time::Duration;

use axum::response::sse::Event;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde_json::json;
use tidewire_core::{AppResult, TenantId};
use tidewire_domain::{AuditEventId, EventEnvelope};
use tidewire_infrastructure::{InMemoryEventBroker, ReplayResult, Subscription};
use tokio::time::Instant;

/// One frame of the live stream before SSE encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// A ledger change visible to the viewer.
    Envelope(EventEnvelope),
    /// Keep-alive emitted after an idle interval.
    Heartbeat(DateTime<Utc>),
    /// The resume point is no longer buffered; resynchronize from history.
    Reset { last_event_id: String },
}

impl StreamFrame {
    pub fn into_event(self) -> Event {
        match self {
            Self::Envelope(envelope) => {
                let base = Event::default()
                    .event(envelope.kind.as_str())
                    .id(envelope.id.to_string());
                match base.json_data(&envelope) {
                    Ok(event) => event,
                    Err(error) => {
                        tracing::warn!(
                            event_id = %envelope.id,
                            error = %error,
                            "failed to encode stream envelope"
                        );
                        Event::default().comment("envelope skipped")
                    }
                }
            }
            Self::Heartbeat(at) => Event::default()
                .data(json!({ "type": "heartbeat", "ts": at.to_rfc3339() }).to_string()),
            Self::Reset { last_event_id } => Event::default().event("reset").data(
                json!({ "type": "reset", "lastEventId": last_event_id }).to_string(),
            ),
        }
    }
}

/// Per-connection stream state: a broker subscription, pending replay
/// frames and the ids already delivered by replay.
///
/// Dropping it drops the subscription, which unsubscribes from the broker.
pub struct LiveStream {
    tenant_id: TenantId,
    keepalive: Duration,
    subscription: Subscription,
    backlog: VecDeque<StreamFrame>,
    replayed: HashSet<AuditEventId>,
}

impl LiveStream {
    /// Subscribes first, then replays from `last_event_id`, so nothing
    /// published in between is lost.
    pub fn open(
        broker: &InMemoryEventBroker,
        tenant_id: TenantId,
        last_event_id: Option<&str>,
        keepalive: Duration,
    ) -> AppResult<Self> {
        let subscription = broker.subscribe()?;

        Ok(Self::resume(
            subscription,
            tenant_id,
            keepalive,
            last_event_id,
            |event_id| broker.replay_since(event_id, tenant_id),
        ))
    }

    pub(crate) fn resume(
        subscription: Subscription,
        tenant_id: TenantId,
        keepalive: Duration,
        last_event_id: Option<&str>,
        replay_since: impl FnOnce(AuditEventId) -> ReplayResult,
    ) -> Self {
        let mut backlog = VecDeque::new();
        let mut replayed = HashSet::new();

        if let Some(last_event_id) = last_event_id
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            let replay = match AuditEventId::from_str(last_event_id) {
                Ok(event_id) => replay_since(event_id),
                Err(_) => ReplayResult {
                    events: Vec::new(),
                    reset_needed: true,
                },
            };

            if replay.reset_needed {
                backlog.push_back(StreamFrame::Reset {
                    last_event_id: last_event_id.to_owned(),
                });
            }

            for envelope in replay.events {
                replayed.insert(envelope.id);
                backlog.push_back(StreamFrame::Envelope(envelope));
            }
        }

        Self {
            tenant_id,
            keepalive,
            subscription,
            backlog,
            replayed,
        }
    }

    /// Returns the next frame, or `None` once the broker closed the
    /// subscription.
    ///
    /// Envelopes filtered out for this viewer do not push the heartbeat
    /// deadline back.
    pub async fn next_frame(&mut self) -> Option<StreamFrame> {
        if let Some(frame) = self.backlog.pop_front() {
            return Some(frame);
        }

        let deadline = Instant::now() + self.keepalive;
        loop {
            match tokio::time::timeout_at(deadline, self.subscription.recv()).await {
                Ok(Some(envelope)) => {
                    if self.replayed.remove(&envelope.id) || !envelope.is_visible_to(self.tenant_id)
                    {
                        continue;
                    }

                    return Some(StreamFrame::Envelope(envelope));
                }
                Ok(None) => {
                    tracing::debug!(tenant_id = %self.tenant_id, "event broker closed stream");
                    return None;
                }
                Err(_) => return Some(StreamFrame::Heartbeat(Utc::now())),
            }
        }
    }

    pub fn frames(self) -> impl Stream<Item = StreamFrame> {
        futures::stream::unfold(self, |mut live| async move {
            live.next_frame().await.map(|frame| (frame, live))
        })
    }
}

#[cfg(test)]
mod tests;
