use crate::entity::{
    CommandSink, EntityContext, EntityCore, EquipmentClass, EquipmentId, MatchRule, Route,
    SparseMerge, Subscriber,
};
use crate::events::payload::ScheduleUpdate;
use crate::events::{Envelope, EventType, Payload};
use parking_lot::RwLock;
use serde_json::{Value, json};
use std::sync::Arc;

pub const CONFIG_SCHEDULE: &str = "config/schedule";

/// Enable switch for a schedule. Schedules belong to the circuit they run,
/// so the identity is that circuit's.
pub struct Schedule {
    core: EntityCore,
    id: u32,
    state: RwLock<ScheduleUpdate>,
    sink: Arc<dyn CommandSink>,
}

impl Schedule {
    pub fn new(ctx: &EntityContext, id: u32, initial: &ScheduleUpdate) -> Self {
        let circuit = initial.circuit.as_ref();
        let identity = EquipmentId::new(
            EquipmentClass::AuxCircuit,
            circuit.and_then(|c| c.id).unwrap_or(0),
        );
        let name = match circuit.and_then(|c| c.name.as_deref()) {
            Some(circuit) => format!("{} Schedule", circuit),
            None => format!("Schedule {}", id),
        };
        Self {
            core: EntityCore::new(
                identity,
                MatchRule::id(EventType::Schedule, id),
                format!("{}_schedule_{}_disabled", ctx.controller_id, id),
                name,
            ),
            id,
            state: RwLock::new(initial.clone()),
            sink: ctx.sink.clone(),
        }
    }

    /// `None` until the controller has reported the flag.
    pub fn is_enabled(&self) -> Option<bool> {
        self.state.read().disabled.map(|disabled| !disabled)
    }

    pub fn circuit_name(&self) -> Option<String> {
        self.state
            .read()
            .circuit
            .as_ref()
            .and_then(|c| c.name.clone())
    }

    pub async fn set_enabled(&self, enabled: bool) {
        self.sink
            .command(
                CONFIG_SCHEDULE,
                json!({"id": self.id, "disabled": !enabled}),
            )
            .await;
    }
}

impl Subscriber for Schedule {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn on_update(&self, envelope: &Envelope) -> bool {
        match self.core.route(envelope) {
            Route::Availability(available) => {
                self.core.set_available(available);
                true
            }
            Route::Matched(Payload::Schedule(update)) => {
                self.state.write().merge_from(update);
                self.core.signal();
                true
            }
            _ => false,
        }
    }

    fn state(&self) -> Value {
        json!({
            "enabled": self.is_enabled(),
            "circuit": self.circuit_name(),
        })
    }
}
