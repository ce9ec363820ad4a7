use super::base::{EntityCore, EquipmentId};
use super::notifier::ChangeNotifier;
use crate::events::Envelope;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// A per-equipment state holder registered with the dispatcher.
///
/// `on_update` runs synchronously on the dispatch task for every envelope,
/// so implementations only filter and merge; they never do I/O.
pub trait Subscriber: Send + Sync {
    fn core(&self) -> &EntityCore;

    /// Apply an envelope. Returns `true` when the entity changed state and
    /// signalled, `false` when the envelope was not for it.
    fn on_update(&self, envelope: &Envelope) -> bool;

    /// Current local state for presentation.
    fn state(&self) -> Value;

    fn identity(&self) -> EquipmentId {
        self.core().identity()
    }

    fn unique_id(&self) -> &str {
        self.core().unique_id()
    }

    fn name(&self) -> &str {
        self.core().name()
    }

    fn is_available(&self) -> bool {
        self.core().is_available()
    }

    fn version(&self) -> u32 {
        self.core().version()
    }

    fn set_notifier(&self, notifier: ChangeNotifier) {
        self.core().set_notifier(notifier);
    }
}

/// Outbound side of the controller API: a fire-and-forget REST write.
///
/// Implementations log failures; callers learn the outcome only through
/// later push events.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn command(&self, path: &str, payload: Value);
}

/// What every entity constructor needs besides its own data.
#[derive(Clone)]
pub struct EntityContext {
    pub controller_id: String,
    pub sink: Arc<dyn CommandSink>,
}

impl EntityContext {
    pub fn new(controller_id: impl Into<String>, sink: Arc<dyn CommandSink>) -> Self {
        Self {
            controller_id: controller_id.into(),
            sink,
        }
    }

    /// `{controller}_{class}_{id}` with an optional facet suffix.
    pub fn unique_id(&self, identity: EquipmentId, suffix: Option<&str>) -> String {
        match suffix {
            Some(suffix) => format!("{}_{}_{}", self.controller_id, identity, suffix),
            None => format!("{}_{}", self.controller_id, identity),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Command sink that records every call instead of sending it.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub calls: Mutex<Vec<(String, Value)>>,
    }

    impl RecordingSink {
        pub(crate) fn take(&self) -> Vec<(String, Value)> {
            std::mem::take(&mut *self.calls.lock())
        }
    }

    #[async_trait]
    impl CommandSink for RecordingSink {
        async fn command(&self, path: &str, payload: Value) {
            self.calls.lock().push((path.to_string(), payload));
        }
    }

    pub(crate) fn context() -> (EntityContext, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (EntityContext::new("1270014200", sink.clone()), sink)
    }

    #[test]
    fn test_unique_id() {
        let (ctx, _) = context();
        let pump = EquipmentId::new(crate::entity::EquipmentClass::Pump, 2);
        assert_eq!(ctx.unique_id(pump, None), "1270014200_pump_2");
        assert_eq!(ctx.unique_id(pump, Some("rpm")), "1270014200_pump_2_rpm");
    }
}
