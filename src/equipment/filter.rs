use crate::entity::{
    EntityContext, EntityCore, EquipmentClass, EquipmentId, MatchRule, Route, SparseMerge,
    Subscriber,
};
use crate::events::payload::FilterUpdate;
use crate::events::{Envelope, EventType, Payload};
use parking_lot::RwLock;
use serde_json::{Value, json};

/// Filter: running state, clean percentage and pressure.
pub struct Filter {
    core: EntityCore,
    state: RwLock<FilterUpdate>,
}

impl Filter {
    pub fn new(ctx: &EntityContext, id: u32, initial: &FilterUpdate) -> Self {
        let identity = EquipmentId::new(EquipmentClass::Filter, id);
        let name = initial
            .name
            .clone()
            .unwrap_or_else(|| format!("Filter {}", id));
        Self {
            core: EntityCore::new(
                identity,
                MatchRule::id(EventType::Filter, id),
                ctx.unique_id(identity, None),
                name,
            ),
            state: RwLock::new(initial.clone()),
        }
    }

    pub fn is_on(&self) -> Option<bool> {
        self.state.read().is_on
    }

    pub fn clean_percentage(&self) -> Option<f64> {
        self.state.read().clean_percentage
    }

    pub fn pressure(&self) -> Option<f64> {
        self.state.read().pressure
    }

    pub fn pressure_units(&self) -> Option<String> {
        self.state
            .read()
            .pressure_units
            .as_ref()
            .and_then(|u| u.name.clone())
    }
}

impl Subscriber for Filter {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn on_update(&self, envelope: &Envelope) -> bool {
        match self.core.route(envelope) {
            Route::Availability(available) => {
                self.core.set_available(available);
                true
            }
            Route::Matched(Payload::Filter(update)) => {
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
            "clean_percentage": state.clean_percentage,
            "pressure": state.pressure,
            "pressure_units": state.pressure_units.as_ref().and_then(|u| u.name.clone()),
        })
    }
}
