//! Subscriber registry fanning change events out to per-subscription channels

use super::{ChangeEvent, ChangeSubscription, SubscriptionId};
use crate::store::{AccountScope, Collection};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Default per-subscription channel capacity
const DEFAULT_CAPACITY: usize = 256;

struct Subscriber {
    collection: Collection,
    scope: AccountScope,
    sender: mpsc::Sender<ChangeEvent>,
}

/// Registry of change subscriptions, keyed by handle.
///
/// Fire-and-forget: emitting never blocks, never panics. A full channel drops
/// the event (the subscriber already has a pending wake-up); a closed channel
/// removes the subscriber.
pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<SubscriptionId, Subscriber>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl SubscriberRegistry {
    /// Create a registry whose channels hold `capacity` pending events
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// Register a subscription for one collection of one account
    pub fn register(&self, collection: Collection, scope: AccountScope) -> ChangeSubscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.lock().insert(
            id,
            Subscriber {
                collection,
                scope,
                sender,
            },
        );
        debug!(subscription = id.0, %collection, %scope, "Subscription registered");
        ChangeSubscription {
            id,
            collection,
            receiver,
        }
    }

    /// Release a subscription. Returns false if the handle was unknown.
    pub fn release(&self, id: SubscriptionId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!(subscription = id.0, "Subscription released");
        }
        removed
    }

    /// Drop every subscriber at once, closing their receivers.
    /// Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let mut subscribers = self.lock();
        let closed = subscribers.len();
        subscribers.clear();
        if closed > 0 {
            debug!(closed, "All subscriptions closed");
        }
        closed
    }

    /// Deliver an event to every matching subscriber
    pub fn emit(&self, event: &ChangeEvent) {
        let mut subscribers = self.lock();
        let mut closed = Vec::new();
        let mut delivered = 0usize;

        for (id, sub) in subscribers.iter() {
            if sub.collection != event.collection || sub.scope.account_id != event.account_id {
                continue;
            }
            match sub.sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {}
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            subscribers.remove(&id);
        }

        debug!(
            collection = %event.collection,
            kind = ?event.kind,
            subscribers = delivered,
            "ChangeEvent emitted"
        );
    }

    /// Number of live subscriptions
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriptionId, Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeKind;
    use uuid::Uuid;

    fn event_for(collection: Collection, account_id: Uuid) -> ChangeEvent {
        ChangeEvent::new(collection, ChangeKind::Insert, Uuid::new_v4(), account_id)
    }

    #[test]
    fn test_emit_without_subscriber_no_panic() {
        let registry = SubscriberRegistry::default();
        registry.emit(&event_for(Collection::Projects, Uuid::new_v4()));
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_emit_reaches_matching_subscriber_only() {
        let registry = SubscriberRegistry::default();
        let account = Uuid::new_v4();
        let scope = AccountScope::new(account);
        let mut projects = registry.register(Collection::Projects, scope);
        let mut clients = registry.register(Collection::Clients, scope);
        let mut other = registry.register(Collection::Projects, AccountScope::new(Uuid::new_v4()));

        registry.emit(&event_for(Collection::Projects, account));

        assert!(projects.receiver.try_recv().is_ok());
        assert!(clients.receiver.try_recv().is_err());
        assert!(other.receiver.try_recv().is_err());
    }

    #[test]
    fn test_release_closes_receiver() {
        let registry = SubscriberRegistry::default();
        let mut sub = registry.register(Collection::Chatbots, AccountScope::new(Uuid::new_v4()));
        assert_eq!(registry.active_count(), 1);

        assert!(registry.release(sub.id));
        assert!(!registry.release(sub.id));
        assert_eq!(registry.active_count(), 0);
        assert!(matches!(
            sub.receiver.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_close_all_disconnects_every_receiver() {
        let registry = SubscriberRegistry::default();
        let scope = AccountScope::new(Uuid::new_v4());
        let mut clients = registry.register(Collection::Clients, scope);
        let mut projects = registry.register(Collection::Projects, scope);

        assert_eq!(registry.close_all(), 2);
        assert_eq!(registry.active_count(), 0);
        for receiver in [&mut clients.receiver, &mut projects.receiver] {
            assert!(matches!(
                receiver.try_recv(),
                Err(mpsc::error::TryRecvError::Disconnected)
            ));
        }
    }

    #[test]
    fn test_dropped_receiver_is_pruned_on_emit() {
        let registry = SubscriberRegistry::default();
        let account = Uuid::new_v4();
        let sub = registry.register(Collection::Analytics, AccountScope::new(account));
        drop(sub);

        registry.emit(&event_for(Collection::Analytics, account));
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_full_channel_drops_without_blocking() {
        let registry = SubscriberRegistry::new(1);
        let account = Uuid::new_v4();
        let mut sub = registry.register(Collection::Clients, AccountScope::new(account));

        registry.emit(&event_for(Collection::Clients, account));
        registry.emit(&event_for(Collection::Clients, account));

        assert!(sub.receiver.try_recv().is_ok());
        assert!(sub.receiver.try_recv().is_err());
        assert_eq!(registry.active_count(), 1);
    }
}
