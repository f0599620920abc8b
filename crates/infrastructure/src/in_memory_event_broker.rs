use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tidewire_application::EventPublisher;
use tidewire_core::{AppError, AppResult, TenantId};
use tidewire_domain::{AuditEventId, EventEnvelope};

mod subscription;

pub use subscription::{Subscription, SubscriptionId};

use subscription::SubscriberQueue;

/// Sizing for [`InMemoryEventBroker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventBrokerConfig {
    /// Envelopes buffered per subscriber before the oldest is dropped.
    pub queue_capacity: usize,
    /// Most recent envelopes kept for reconnect replay, across tenants.
    pub replay_capacity: usize,
}

impl Default for EventBrokerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 200,
            replay_capacity: 500,
        }
    }
}

/// Outcome of a reconnect replay request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayResult {
    /// Envelopes published after the requested id that the tenant may see.
    pub events: Vec<EventEnvelope>,
    /// The requested id is no longer buffered; the client must resynchronize
    /// from history.
    pub reset_needed: bool,
}

#[derive(Default)]
struct BrokerState {
    running: bool,
    next_subscription_id: u64,
    subscribers: HashMap<SubscriptionId, Arc<SubscriberQueue>>,
    ring: VecDeque<EventEnvelope>,
}

type SharedState = Arc<Mutex<BrokerState>>;

fn lock_state(state: &Mutex<BrokerState>) -> MutexGuard<'_, BrokerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process publish/subscribe hub for live ledger changes.
///
/// Each subscriber owns a bounded queue with drop-oldest backpressure, and a
/// bounded ring of recent envelopes serves reconnect replay. The state lock
/// is only held for in-memory bookkeeping; queue pushes happen on a snapshot
/// of subscribers taken under the lock.
pub struct InMemoryEventBroker {
    config: EventBrokerConfig,
    state: SharedState,
}

impl InMemoryEventBroker {
    /// Creates a stopped broker.
    #[must_use]
    pub fn new(config: EventBrokerConfig) -> Self {
        Self {
            config: EventBrokerConfig {
                queue_capacity: config.queue_capacity.max(1),
                replay_capacity: config.replay_capacity,
            },
            state: Arc::new(Mutex::new(BrokerState::default())),
        }
    }

    /// Returns the effective sizing.
    #[must_use]
    pub fn config(&self) -> EventBrokerConfig {
        self.config
    }

    /// Starts accepting subscriptions and publishes.
    pub fn start(&self) {
        lock_state(&self.state).running = true;
        tracing::info!(
            queue_capacity = self.config.queue_capacity,
            replay_capacity = self.config.replay_capacity,
            "event broker started"
        );
    }

    /// Stops the broker: publishes are ignored, new subscriptions refused and
    /// every open subscription is closed.
    pub fn stop(&self) {
        let closed: Vec<Arc<SubscriberQueue>> = {
            let mut state = lock_state(&self.state);
            state.running = false;
            state.ring.clear();
            state.subscribers.drain().map(|(_, queue)| queue).collect()
        };

        for queue in &closed {
            queue.close();
        }

        tracing::info!(closed_subscriptions = closed.len(), "event broker stopped");
    }

    /// Returns whether the broker is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock_state(&self.state).running
    }

    /// Registers a new subscriber queue.
    ///
    /// Dropping the returned handle unsubscribes it.
    pub fn subscribe(&self) -> AppResult<Subscription> {
        let mut state = lock_state(&self.state);
        if !state.running {
            return Err(AppError::Internal("event broker is not running".to_owned()));
        }

        state.next_subscription_id = state.next_subscription_id.wrapping_add(1);
        let id = SubscriptionId(state.next_subscription_id);
        let queue = Arc::new(SubscriberQueue::new(self.config.queue_capacity));
        state.subscribers.insert(id, queue.clone());

        tracing::debug!(
            subscription_id = %id,
            subscribers = state.subscribers.len(),
            "event subscription opened"
        );

        Ok(Subscription::new(id, queue, Arc::downgrade(&self.state)))
    }

    /// Removes a subscriber queue. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        remove_subscriber(&self.state, id)
    }

    /// Returns the number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock_state(&self.state).subscribers.len()
    }

    /// Returns the envelopes published after `last_event_id` that `tenant_id`
    /// may see, or a reset marker when that id is no longer buffered.
    #[must_use]
    pub fn replay_since(&self, last_event_id: AuditEventId, tenant_id: TenantId) -> ReplayResult {
        let state = lock_state(&self.state);
        let Some(position) = state
            .ring
            .iter()
            .position(|envelope| envelope.id == last_event_id)
        else {
            return ReplayResult {
                events: Vec::new(),
                reset_needed: true,
            };
        };

        ReplayResult {
            events: state
                .ring
                .iter()
                .skip(position + 1)
                .filter(|envelope| envelope.is_visible_to(tenant_id))
                .cloned()
                .collect(),
            reset_needed: false,
        }
    }
}

impl EventPublisher for InMemoryEventBroker {
    fn publish(&self, envelope: EventEnvelope) {
        let targets: Vec<Arc<SubscriberQueue>> = {
            let mut state = lock_state(&self.state);
            if !state.running {
                return;
            }

            if self.config.replay_capacity > 0 {
                state.ring.push_back(envelope.clone());
                while state.ring.len() > self.config.replay_capacity {
                    state.ring.pop_front();
                }
            }

            state.subscribers.values().cloned().collect()
        };

        for queue in targets {
            queue.push(envelope.clone());
        }
    }
}

fn remove_subscriber(state: &Mutex<BrokerState>, id: SubscriptionId) -> bool {
    let removed = lock_state(state).subscribers.remove(&id);
    match removed {
        Some(queue) => {
            queue.close();
            tracing::debug!(
                subscription_id = %id,
                dropped = queue.dropped_count(),
                "event subscription closed"
            );
            true
        }
        None => false,
    }
}
