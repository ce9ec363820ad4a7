//! Panel-wide entities fed by the `controller` and `temps` broadcasts.

use crate::entity::{
    EntityContext, EntityCore, EquipmentId, MatchRule, Route, SparseMerge, Subscriber,
};
use crate::entity::merge::merge;
use crate::events::payload::{ControllerUpdate, TempsUpdate};
use crate::events::{Envelope, EventType, Payload};
use parking_lot::RwLock;
use serde_json::{Value, json};

/// Freeze protection, panel mode and model of the control panel.
pub struct ControlPanel {
    core: EntityCore,
    state: RwLock<ControllerUpdate>,
}

impl ControlPanel {
    pub fn new(ctx: &EntityContext, initial: &ControllerUpdate) -> Self {
        let identity = EquipmentId::control_panel();
        let name = initial
            .model
            .clone()
            .unwrap_or_else(|| "Control Panel".to_string());
        Self {
            core: EntityCore::new(
                identity,
                MatchRule::broadcast(EventType::Controller),
                ctx.unique_id(identity, None),
                name,
            ),
            state: RwLock::new(initial.clone()),
        }
    }

    pub fn freeze_protection(&self) -> Option<bool> {
        self.state.read().freeze
    }

    pub fn mode(&self) -> Option<String> {
        self.state.read().mode.as_ref().and_then(|m| m.desc.clone())
    }

    pub fn model(&self) -> Option<String> {
        self.state.read().model.clone()
    }
}

impl Subscriber for ControlPanel {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn on_update(&self, envelope: &Envelope) -> bool {
        match self.core.route(envelope) {
            Route::Availability(available) => {
                self.core.set_available(available);
                true
            }
            Route::Matched(Payload::Controller(update)) => {
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
            "freeze_protection": state.freeze,
            "mode": state.mode.as_ref().and_then(|m| m.desc.clone()),
            "model": state.model,
        })
    }
}

/// `waterSensor1` -> `Water Sensor 1`, `air` -> `Air`.
pub fn probe_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + 4);
    let mut prev: Option<char> = None;
    for c in key.chars() {
        let boundary = match prev {
            None => false,
            Some(p) => {
                (c.is_ascii_uppercase() && !p.is_ascii_uppercase())
                    || (c.is_ascii_digit() && !p.is_ascii_digit())
            }
        };
        if boundary {
            name.push(' ');
        }
        if prev.is_none() || boundary {
            name.extend(c.to_uppercase());
        } else {
            name.push(c);
        }
        prev = Some(c);
    }
    name
}

fn round_1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Default)]
struct Reading {
    value: Option<f64>,
    units: Option<String>,
}

/// One named reading of the `temps` broadcast (`air`, `solar`,
/// `waterSensor1`, ...).
pub struct TempProbe {
    core: EntityCore,
    key: String,
    state: RwLock<Reading>,
}

impl TempProbe {
    pub fn new(ctx: &EntityContext, key: &str, initial: &TempsUpdate) -> Self {
        let identity = EquipmentId::control_panel();
        Self {
            core: EntityCore::new(
                identity,
                MatchRule::broadcast(EventType::Temps),
                ctx.unique_id(identity, Some(&format!("temp_{}", key))),
                probe_name(key),
            ),
            key: key.to_string(),
            state: RwLock::new(Reading {
                value: initial.reading(key).map(round_1),
                units: initial.units.as_ref().and_then(|u| u.name.clone()),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> Option<f64> {
        self.state.read().value
    }

    pub fn units(&self) -> Option<String> {
        self.state.read().units.clone()
    }
}

impl Subscriber for TempProbe {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn on_update(&self, envelope: &Envelope) -> bool {
        match self.core.route(envelope) {
            Route::Availability(available) => {
                self.core.set_available(available);
                true
            }
            Route::Matched(Payload::Temps(temps)) => {
                let Some(value) = temps.reading(&self.key) else {
                    return false;
                };
                {
                    let mut state = self.state.write();
                    state.value = Some(round_1(value));
                    merge(
                        &mut state.units,
                        &temps.units.as_ref().and_then(|u| u.name.clone()),
                    );
                }
                self.core.signal();
                true
            }
            _ => false,
        }
    }

    fn state(&self) -> Value {
        let state = self.state.read();
        json!({"value": state.value, "units": state.units})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::test_context;

    #[test]
    fn test_probe_name() {
        assert_eq!(probe_name("waterSensor1"), "Water Sensor 1");
        assert_eq!(probe_name("air"), "Air");
        assert_eq!(probe_name("solarSensor12"), "Solar Sensor 12");
    }

    #[test]
    fn test_control_panel_sparse() {
        let (ctx, _) = test_context();
        let initial: ControllerUpdate = serde_json::from_value(json!({
            "model": "IntelliCenter i5PS", "freeze": false,
            "mode": {"val": 0, "name": "auto", "desc": "Auto"}
        }))
        .unwrap();
        let panel = ControlPanel::new(&ctx, &initial);
        assert_eq!(panel.unique_id(), "1270014200_control_panel_0");

        let freeze = Envelope::decode("controller", json!({"freeze": true})).unwrap();
        assert!(panel.on_update(&freeze));
        assert_eq!(panel.freeze_protection(), Some(true));
        assert_eq!(panel.mode().as_deref(), Some("Auto"));
        assert_eq!(panel.model().as_deref(), Some("IntelliCenter i5PS"));
    }

    #[test]
    fn test_temp_probe_only_reacts_to_own_key() {
        let (ctx, _) = test_context();
        let initial: TempsUpdate = serde_json::from_value(json!({
            "units": {"val": 0, "name": "F"}, "air": 70.04, "waterSensor1": 81
        }))
        .unwrap();
        let air = TempProbe::new(&ctx, "air", &initial);
        assert_eq!(air.value(), Some(70.0));
        assert_eq!(air.units().as_deref(), Some("F"));
        assert_eq!(air.unique_id(), "1270014200_control_panel_0_temp_air");

        let water_only = Envelope::decode("temps", json!({"waterSensor1": 82})).unwrap();
        assert!(!air.on_update(&water_only));
        assert_eq!(air.version(), 0);

        let air_update = Envelope::decode("temps", json!({"air": 68.26})).unwrap();
        assert!(air.on_update(&air_update));
        assert_eq!(air.value(), Some(68.3));
        assert_eq!(air.units().as_deref(), Some("F"));
    }
}
