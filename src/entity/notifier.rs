//! State change notifier for live entity updates.
//!
//! When an entity merges an update or its availability flips, it publishes a
//! [`StateChange`] so the presentation side (logging, a UI bridge) can
//! re-read the entity without polling.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// One "state changed" signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub unique_id: String,
    pub version: u32,
    pub available: bool,
    pub at: DateTime<Utc>,
}

/// Fan-out handle shared by every entity.
///
/// Sending never blocks; slow receivers observe `Lagged` and skip ahead.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<StateChange>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.tx.subscribe()
    }

    /// Publish a change. Dropped silently when nobody is listening.
    pub fn notify(&self, unique_id: &str, version: u32, available: bool) {
        let _ = self.tx.send(StateChange {
            unique_id: unique_id.to_string(),
            version,
            available,
            at: Utc::now(),
        });
    }
}
