//! Pump entity: speed, power, flow, running state and status.

use crate::entity::{
    EntityContext, EntityCore, EquipmentClass, EquipmentId, MatchRule, Route, SparseMerge,
    Subscriber,
};
use crate::events::payload::PumpUpdate;
use crate::events::{Envelope, EventType, Payload};
use parking_lot::RwLock;
use serde_json::{Value, json};

/// `command` value a pump reports while running on older controllers that
/// have no relay field.
const COMMAND_RUNNING: i64 = 10;

pub struct Pump {
    core: EntityCore,
    state: RwLock<PumpUpdate>,
    /// Running state from the most recent update that carried one.
    running: RwLock<Option<bool>>,
}

impl Pump {
    pub fn new(ctx: &EntityContext, id: u32, initial: &PumpUpdate) -> Self {
        let identity = EquipmentId::new(EquipmentClass::Pump, id);
        let name = initial
            .name
            .clone()
            .unwrap_or_else(|| format!("Pump {}", id));
        Self {
            core: EntityCore::new(
                identity,
                MatchRule::id(EventType::Pump, id),
                ctx.unique_id(identity, None),
                name,
            ),
            state: RwLock::new(initial.clone()),
            running: RwLock::new(running(initial)),
        }
    }

    pub fn rpm(&self) -> Option<f64> {
        self.state.read().rpm
    }

    pub fn watts(&self) -> Option<f64> {
        self.state.read().watts
    }

    pub fn flow(&self) -> Option<f64> {
        self.state.read().flow
    }

    pub fn is_running(&self) -> Option<bool> {
        *self.running.read()
    }

    pub fn status(&self) -> Option<String> {
        self.state.read().status.as_ref().and_then(|s| s.desc.clone())
    }
}

impl Subscriber for Pump {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn on_update(&self, envelope: &Envelope) -> bool {
        match self.core.route(envelope) {
            Route::Availability(available) => {
                self.core.set_available(available);
                true
            }
            Route::Matched(Payload::Pump(update)) => {
                self.state.write().merge_from(update);
                if let Some(now) = running(update) {
                    *self.running.write() = Some(now);
                }
                self.core.signal();
                true
            }
            _ => false,
        }
    }

    fn state(&self) -> Value {
        let state = self.state.read();
        json!({
            "rpm": state.rpm,
            "watts": state.watts,
            "flow": state.flow,
            "running": *self.running.read(),
            "status": state.status.as_ref().and_then(|s| s.desc.clone()),
            "min_speed": state.min_speed,
            "max_speed": state.max_speed,
            "min_flow": state.min_flow,
            "max_flow": state.max_flow,
        })
    }
}

/// Relay state wins over the legacy command code when one update carries both.
fn running(state: &PumpUpdate) -> Option<bool> {
    match (state.relay, state.command) {
        (Some(relay), _) => Some(relay > 0),
        (None, Some(command)) => Some(command == COMMAND_RUNNING),
        (None, None) => None,
    }
}
