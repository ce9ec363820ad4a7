//! On/off switches for auxiliary circuits, features and circuit groups.

use crate::entity::{
    CommandSink, EntityContext, EntityCore, EquipmentClass, EquipmentId, MatchRule, Route,
    SparseMerge, Subscriber,
};
use crate::events::payload::CircuitUpdate;
use crate::events::{Envelope, EventType, Payload};
use parking_lot::RwLock;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    AuxCircuit,
    Feature,
    CircuitGroup,
}

impl SwitchKind {
    pub fn class(self) -> EquipmentClass {
        match self {
            Self::AuxCircuit => EquipmentClass::AuxCircuit,
            Self::Feature => EquipmentClass::Feature,
            Self::CircuitGroup => EquipmentClass::CircuitGroup,
        }
    }

    pub fn event_type(self) -> EventType {
        match self {
            Self::AuxCircuit => EventType::Circuit,
            Self::Feature => EventType::Feature,
            Self::CircuitGroup => EventType::CircuitGroup,
        }
    }

    pub fn set_state_path(self) -> &'static str {
        match self {
            Self::AuxCircuit => "state/circuit/setState",
            Self::Feature => "state/feature/setState",
            Self::CircuitGroup => "state/circuitGroup/setState",
        }
    }
}

pub struct CircuitSwitch {
    core: EntityCore,
    kind: SwitchKind,
    id: u32,
    state: RwLock<CircuitUpdate>,
    sink: Arc<dyn CommandSink>,
}

impl CircuitSwitch {
    pub fn new(ctx: &EntityContext, kind: SwitchKind, id: u32, initial: &CircuitUpdate) -> Self {
        let identity = EquipmentId::new(kind.class(), id);
        let name = initial
            .name
            .clone()
            .unwrap_or_else(|| format!("Circuit {}", id));
        Self {
            core: EntityCore::new(
                identity,
                MatchRule::id(kind.event_type(), id),
                ctx.unique_id(identity, None),
                name,
            ),
            kind,
            id,
            state: RwLock::new(initial.clone()),
            sink: ctx.sink.clone(),
        }
    }

    pub fn kind(&self) -> SwitchKind {
        self.kind
    }

    pub fn is_on(&self) -> Option<bool> {
        self.state.read().is_on
    }

    /// Ask the controller to switch. Local state only changes when the
    /// resulting push event arrives.
    pub async fn set_state(&self, on: bool) {
        self.sink
            .command(
                self.kind.set_state_path(),
                json!({"id": self.id, "state": on}),
            )
            .await;
    }

    pub async fn turn_on(&self) {
        self.set_state(true).await;
    }

    pub async fn turn_off(&self) {
        self.set_state(false).await;
    }
}

impl Subscriber for CircuitSwitch {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn on_update(&self, envelope: &Envelope) -> bool {
        match self.core.route(envelope) {
            Route::Availability(available) => {
                self.core.set_available(available);
                true
            }
            Route::Matched(Payload::Circuit(update)) => {
                self.state.write().merge_from(update);
                self.core.signal();
                true
            }
            _ => false,
        }
    }

    fn state(&self) -> Value {
        let state = self.state.read();
        json!({
            "is_on": state.is_on,
            "name": state.name,
        })
    }
}
