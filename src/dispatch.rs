//! Subscriber registry and envelope fan-out.
//!
//! The dispatcher holds the most recent envelope and hands every inbound
//! envelope to each registered subscriber, synchronously and in
//! registration order. It does not queue or coalesce; ordering comes from
//! the single mpsc channel the connection manager feeds.

use crate::entity::Subscriber;
use crate::events::Envelope;
use log::{debug, info};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

#[derive(Default)]
pub struct Dispatcher {
    subscribers: RwLock<Vec<Arc<dyn Subscriber>>>,
    current: RwLock<Option<Arc<Envelope>>>,
    published: AtomicU64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subscriber: Arc<dyn Subscriber>) {
        debug!("[Dispatch] Registered {}", subscriber.unique_id());
        self.subscribers.write().push(subscriber);
    }

    pub fn register_all(&self, subscribers: impl IntoIterator<Item = Arc<dyn Subscriber>>) {
        for subscriber in subscribers {
            self.register(subscriber);
        }
    }

    /// Remove a subscriber by unique id. Returns whether one was removed.
    pub fn unregister(&self, unique_id: &str) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.unique_id() != unique_id);
        subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    pub fn subscribers(&self) -> Vec<Arc<dyn Subscriber>> {
        self.subscribers.read().clone()
    }

    /// The most recently published envelope.
    pub fn current(&self) -> Option<Arc<Envelope>> {
        self.current.read().clone()
    }

    /// Number of envelopes published so far.
    pub fn version(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    /// Store `envelope` as current and notify every subscriber once, in
    /// registration order. Returns how many subscribers handled it.
    pub fn publish(&self, envelope: Envelope) -> usize {
        let envelope = Arc::new(envelope);
        *self.current.write() = Some(envelope.clone());
        self.published.fetch_add(1, Ordering::SeqCst);

        // Snapshot the list so subscribers may (un)register during delivery.
        let subscribers = self.subscribers();
        let handled = subscribers
            .iter()
            .filter(|subscriber| subscriber.on_update(&envelope))
            .count();

        debug!(
            "[Dispatch] {}{} handled by {}/{} subscribers",
            envelope.event_type,
            envelope
                .entity_id
                .map(|id| format!(" #{}", id))
                .unwrap_or_default(),
            handled,
            subscribers.len()
        );
        handled
    }

    /// Drain the connection manager's channel until it closes.
    pub async fn run(&self, mut rx: mpsc::Receiver<Envelope>) {
        info!("[Dispatch] Started with {} subscribers", self.len());
        while let Some(envelope) = rx.recv().await {
            self.publish(envelope);
        }
        info!("[Dispatch] Envelope channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityCore, EquipmentClass, EquipmentId, MatchRule, Route};
    use crate::events::EventType;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    /// Records the order in which it saw envelopes.
    struct Probe {
        core: EntityCore,
        log: Arc<Mutex<Vec<(String, Option<u32>)>>>,
    }

    impl Probe {
        fn new(name: &str, id: u32, log: Arc<Mutex<Vec<(String, Option<u32>)>>>) -> Arc<Self> {
            Arc::new(Self {
                core: EntityCore::new(
                    EquipmentId::new(EquipmentClass::Pump, id),
                    MatchRule::id(EventType::Pump, id),
                    name,
                    name,
                ),
                log,
            })
        }
    }

    impl Subscriber for Probe {
        fn core(&self) -> &EntityCore {
            &self.core
        }

        fn on_update(&self, envelope: &Envelope) -> bool {
            self.log
                .lock()
                .push((self.core.unique_id().to_string(), envelope.entity_id));
            match self.core.route(envelope) {
                Route::Availability(available) => {
                    self.core.set_available(available);
                    true
                }
                Route::Matched(_) => {
                    self.core.signal();
                    true
                }
                Route::Ignored => false,
            }
        }

        fn state(&self) -> Value {
            Value::Null
        }
    }

    #[test]
    fn test_publish_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new();
        dispatcher.register(Probe::new("b", 2, log.clone()));
        dispatcher.register(Probe::new("a", 1, log.clone()));

        let handled = dispatcher.publish(Envelope::decode("pump", json!({"id": 1})).unwrap());
        assert_eq!(handled, 1);
        assert_eq!(
            *log.lock(),
            vec![("b".to_string(), Some(1)), ("a".to_string(), Some(1))]
        );
        assert_eq!(dispatcher.version(), 1);
        assert_eq!(dispatcher.current().unwrap().entity_id, Some(1));
    }

    #[test]
    fn test_availability_reaches_everyone() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new();
        let a = Probe::new("a", 1, log.clone());
        let b = Probe::new("b", 2, log.clone());
        dispatcher.register(a.clone());
        dispatcher.register(b.clone());

        assert_eq!(dispatcher.publish(Envelope::availability(false)), 2);
        assert!(!a.is_available());
        assert!(!b.is_available());
    }

    #[test]
    fn test_unregister() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new();
        dispatcher.register(Probe::new("a", 1, log.clone()));
        assert!(dispatcher.unregister("a"));
        assert!(!dispatcher.unregister("a"));
        assert!(dispatcher.is_empty());
        assert_eq!(dispatcher.publish(Envelope::availability(true)), 0);
    }

    #[tokio::test]
    async fn test_run_drains_channel_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new();
        dispatcher.register(Probe::new("a", 1, log.clone()));

        let (tx, rx) = mpsc::channel(8);
        for id in [3, 1, 2] {
            tx.send(Envelope::decode("pump", json!({"id": id})).unwrap())
                .await
                .unwrap();
        }
        drop(tx);
        dispatcher.run(rx).await;

        let seen: Vec<_> = log.lock().iter().map(|(_, id)| *id).collect();
        assert_eq!(seen, vec![Some(3), Some(1), Some(2)]);
        assert_eq!(dispatcher.version(), 3);
    }
}
