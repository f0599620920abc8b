use std::fmt::{Display, Formatter};
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

use super::*;

/// Identifier of one broker subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(super) u64);

impl Display for SubscriptionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

pub(super) struct SubscriberQueue {
    buffer: Mutex<VecDeque<EventEnvelope>>,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
    capacity: usize,
}

impl SubscriberQueue {
    pub(super) fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            capacity,
        }
    }

    /// Appends an envelope, evicting the oldest one when full.
    pub(super) fn push(&self, envelope: EventEnvelope) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let evicted = {
            let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            let evicted = if buffer.len() >= self.capacity {
                buffer.pop_front()
            } else {
                None
            };
            buffer.push_back(envelope);
            evicted
        };

        if let Some(evicted) = evicted {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(
                evicted_event_id = %evicted.id,
                dropped,
                "subscriber queue full, dropped oldest event"
            );
        }

        self.notify.notify_one();
    }

    fn pop(&self) -> Option<EventEnvelope> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub(super) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(super) fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Handle to one subscriber queue.
///
/// Dropping the handle unsubscribes it, so a cancelled stream task releases
/// its queue.
pub struct Subscription {
    id: SubscriptionId,
    queue: Arc<SubscriberQueue>,
    broker: Weak<Mutex<BrokerState>>,
}

impl Subscription {
    pub(super) fn new(
        id: SubscriptionId,
        queue: Arc<SubscriberQueue>,
        broker: Weak<Mutex<BrokerState>>,
    ) -> Self {
        Self { id, queue, broker }
    }

    /// Returns the subscription identifier.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next envelope. Returns `None` once the subscription is
    /// closed and drained.
    ///
    /// Cancel safe: no envelope is lost when the future is dropped.
    pub async fn recv(&self) -> Option<EventEnvelope> {
        loop {
            if let Some(envelope) = self.queue.pop() {
                return Some(envelope);
            }

            if self.queue.is_closed() {
                return None;
            }

            self.queue.notify.notified().await;
        }
    }

    /// Returns the next buffered envelope without waiting.
    #[must_use]
    pub fn try_recv(&self) -> Option<EventEnvelope> {
        self.queue.pop()
    }

    /// Returns how many envelopes were evicted from this queue.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.queue.dropped_count()
    }

    /// Returns whether the broker closed this subscription.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(state) = self.broker.upgrade() {
            remove_subscriber(&state, self.id);
        }
    }
}
