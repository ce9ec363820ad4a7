//! Body-linked entities.
//!
//! A body (pool or spa) fans out into several entities that present the body
//! but listen to different events:
//!
//! | entity                | class  | listens to                                 |
//! |-----------------------|--------|--------------------------------------------|
//! | [`BodyHeater`]        | heater | `body` events for the body id              |
//! | [`BodyTemperature`]   | body   | `temps` broadcast, body in list            |
//! | [`BodyCover`]         | body   | `body` events for the body id              |
//! | [`BodyCircuitSwitch`] | body   | `circuit` events for the body's circuit id |

use crate::entity::{
    CommandSink, EntityContext, EntityCore, EquipmentClass, EquipmentId, MatchRule, Route,
    SparseMerge, Subscriber,
};
use crate::entity::merge::merge;
use crate::events::payload::{BodyUpdate, CircuitUpdate, ValDesc};
use crate::events::{Envelope, EventType, Payload};
use log::{error, warn};
use parking_lot::RwLock;
use serde_json::{Map, Value, json};
use std::sync::Arc;

pub const SET_POINT: &str = "state/body/setPoint";
pub const SET_HEAT_MODE: &str = "state/body/heatMode";

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn body_name(initial: &BodyUpdate, id: u32) -> String {
    initial
        .name
        .clone()
        .unwrap_or_else(|| format!("Body {}", id))
}

/// Newer controllers report `heatSetpoint`; older ones only `setPoint`.
fn reported_setpoint(update: &BodyUpdate) -> Option<f64> {
    update.heat_setpoint.or(update.set_point)
}

/// Heater control for one body: setpoints, heat mode and heat status.
pub struct BodyHeater {
    core: EntityCore,
    body_id: u32,
    state: RwLock<BodyUpdate>,
    /// Heat setpoint from the most recent update that carried one.
    setpoint: RwLock<Option<f64>>,
    heat_modes: Vec<ValDesc>,
    has_cooling: bool,
    sink: Arc<dyn CommandSink>,
}

impl BodyHeater {
    pub fn new(
        ctx: &EntityContext,
        body_id: u32,
        initial: &BodyUpdate,
        heat_modes: Vec<ValDesc>,
        has_cooling: bool,
    ) -> Self {
        let identity = EquipmentId::new(EquipmentClass::Heater, body_id);
        Self {
            core: EntityCore::new(
                identity,
                MatchRule::id(EventType::Body, body_id),
                ctx.unique_id(identity, None),
                format!("{} Heater", body_name(initial, body_id)),
            ),
            body_id,
            state: RwLock::new(initial.clone()),
            setpoint: RwLock::new(reported_setpoint(initial)),
            heat_modes,
            has_cooling,
            sink: ctx.sink.clone(),
        }
    }

    pub fn has_cooling(&self) -> bool {
        self.has_cooling
    }

    /// Two or fewer modes means a plain on/off heater; more means presets.
    pub fn is_simple(&self) -> bool {
        self.heat_modes.len() <= 2
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.state.read().temp
    }

    pub fn heat_setpoint(&self) -> Option<f64> {
        *self.setpoint.read()
    }

    pub fn cool_setpoint(&self) -> Option<f64> {
        self.state.read().cool_setpoint
    }

    pub fn heat_mode(&self) -> Option<ValDesc> {
        self.state.read().heat_mode.clone()
    }

    pub fn heat_status(&self) -> Option<ValDesc> {
        self.state.read().heat_status.clone()
    }

    /// Whether the heater is switched on, `None` while the mode is unknown.
    pub fn is_heating_enabled(&self) -> Option<bool> {
        let state = self.state.read();
        let mode = state.heat_mode.as_ref()?;
        Some(mode.name.as_deref() != Some("off"))
    }

    pub fn preset_modes(&self) -> Vec<&str> {
        if self.is_simple() {
            return Vec::new();
        }
        self.heat_modes
            .iter()
            .filter_map(|m| m.desc.as_deref())
            .collect()
    }

    /// Active preset description. `Off` when the mode is not in the table.
    pub fn preset_mode(&self) -> Option<String> {
        if self.is_simple() {
            return None;
        }
        let val = self.state.read().heat_mode.as_ref().and_then(|m| m.val);
        Some(
            self.heat_modes
                .iter()
                .find(|m| m.val.is_some() && m.val == val)
                .and_then(|m| m.desc.clone())
                .unwrap_or_else(|| "Off".to_string()),
        )
    }

    /// Change the heat and/or cool setpoint.
    pub async fn set_temperature(&self, heat: Option<f64>, cool: Option<f64>) {
        if heat.is_none() && cool.is_none() {
            warn!("No setpoint given for {}", self.core.name());
            return;
        }
        let mut payload = Map::new();
        payload.insert("id".to_string(), json!(self.body_id));
        if let Some(heat) = heat {
            payload.insert("heatSetpoint".to_string(), json!(heat));
        }
        if let Some(cool) = cool {
            payload.insert("coolSetpoint".to_string(), json!(cool));
        }
        self.sink.command(SET_POINT, Value::Object(payload)).await;
    }

    /// On/off control for simple heaters. Picks the `off` mode or the first
    /// mode that is not `off`.
    pub async fn set_heating(&self, on: bool) {
        if !self.is_simple() {
            warn!("{} uses presets; set a heat mode instead", self.core.name());
            return;
        }
        let mode = self.heat_modes.iter().find(|m| {
            let is_off = m
                .desc
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case("off"));
            is_off != on
        });
        match mode.and_then(|m| m.val) {
            Some(val) => self.send_heat_mode(val).await,
            None => error!("Invalid mode for {}: on={}", self.core.name(), on),
        }
    }

    /// Select a preset by description on multi-mode heaters.
    pub async fn set_preset_mode(&self, desc: &str) {
        if self.is_simple() {
            warn!("{} has no presets", self.core.name());
            return;
        }
        let val = self
            .heat_modes
            .iter()
            .find(|m| m.desc.as_deref() == Some(desc))
            .and_then(|m| m.val);
        match val {
            Some(val) => self.send_heat_mode(val).await,
            None => error!("Invalid mode for {}: {}", self.core.name(), desc),
        }
    }

    async fn send_heat_mode(&self, mode: i64) {
        self.sink
            .command(SET_HEAT_MODE, json!({"id": self.body_id, "mode": mode}))
            .await;
    }
}

impl Subscriber for BodyHeater {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn on_update(&self, envelope: &Envelope) -> bool {
        match self.core.route(envelope) {
            Route::Availability(available) => {
                self.core.set_available(available);
                true
            }
            Route::Matched(Payload::Body(update)) => {
                self.state.write().merge_from(update);
                if let Some(setpoint) = reported_setpoint(update) {
                    *self.setpoint.write() = Some(setpoint);
                }
                self.core.signal();
                true
            }
            _ => false,
        }
    }

    fn state(&self) -> Value {
        json!({
            "current_temperature": self.current_temperature(),
            "heat_setpoint": self.heat_setpoint(),
            "cool_setpoint": self.cool_setpoint(),
            "heat_mode": self.heat_mode().and_then(|m| m.desc),
            "heat_status": self.heat_status().and_then(|s| s.desc),
            "has_cooling": self.has_cooling,
            "preset_mode": self.preset_mode(),
        })
    }
}

#[derive(Debug, Default)]
struct Reading {
    temp: Option<f64>,
    units: Option<String>,
}

/// Water temperature of one body, fed by the `temps` broadcast.
pub struct BodyTemperature {
    core: EntityCore,
    body_id: u32,
    state: RwLock<Reading>,
}

impl BodyTemperature {
    pub fn new(
        ctx: &EntityContext,
        body_id: u32,
        initial: &BodyUpdate,
        units: Option<String>,
    ) -> Self {
        let identity = EquipmentId::new(EquipmentClass::Body, body_id);
        Self {
            core: EntityCore::new(
                identity,
                MatchRule::broadcast(EventType::Temps),
                ctx.unique_id(identity, Some("temperature")),
                format!("{} Temperature", body_name(initial, body_id)),
            ),
            body_id,
            state: RwLock::new(Reading {
                temp: initial.temp.map(|t| round_to(t, 2)),
                units,
            }),
        }
    }

    pub fn temperature(&self) -> Option<f64> {
        self.state.read().temp
    }

    pub fn units(&self) -> Option<String> {
        self.state.read().units.clone()
    }
}

impl Subscriber for BodyTemperature {
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
                let Some(body) = temps.body(self.body_id) else {
                    return false;
                };
                {
                    let mut state = self.state.write();
                    merge(&mut state.temp, &body.temp.map(|t| round_to(t, 2)));
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
        json!({"temperature": state.temp, "units": state.units})
    }
}

/// Whether a body's cover is on.
pub struct BodyCover {
    core: EntityCore,
    covered: RwLock<Option<bool>>,
}

impl BodyCover {
    pub fn new(ctx: &EntityContext, body_id: u32, initial: &BodyUpdate) -> Self {
        let identity = EquipmentId::new(EquipmentClass::Body, body_id);
        Self {
            core: EntityCore::new(
                identity,
                MatchRule::id(EventType::Body, body_id),
                ctx.unique_id(identity, Some("cover")),
                format!("{} Cover", body_name(initial, body_id)),
            ),
            covered: RwLock::new(initial.is_covered),
        }
    }

    pub fn is_covered(&self) -> Option<bool> {
        *self.covered.read()
    }
}

impl Subscriber for BodyCover {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn on_update(&self, envelope: &Envelope) -> bool {
        match self.core.route(envelope) {
            Route::Availability(available) => {
                self.core.set_available(available);
                true
            }
            Route::Matched(Payload::Body(update)) => {
                merge(&mut *self.covered.write(), &update.is_covered);
                self.core.signal();
                true
            }
            _ => false,
        }
    }

    fn state(&self) -> Value {
        json!({"is_covered": self.is_covered()})
    }
}

/// The circuit that runs a body (the pool or spa pump circuit), presented as
/// part of the body.
pub struct BodyCircuitSwitch {
    core: EntityCore,
    circuit_id: u32,
    state: RwLock<CircuitUpdate>,
    sink: Arc<dyn CommandSink>,
}

impl BodyCircuitSwitch {
    pub fn new(
        ctx: &EntityContext,
        body_id: u32,
        circuit_id: u32,
        body: &BodyUpdate,
        circuit: &CircuitUpdate,
    ) -> Self {
        let identity = EquipmentId::new(EquipmentClass::Body, body_id);
        Self {
            core: EntityCore::new(
                identity,
                MatchRule::id(EventType::Circuit, circuit_id),
                ctx.unique_id(identity, Some("circuit")),
                body_name(body, body_id),
            ),
            circuit_id,
            state: RwLock::new(circuit.clone()),
            sink: ctx.sink.clone(),
        }
    }

    pub fn circuit_id(&self) -> u32 {
        self.circuit_id
    }

    pub fn is_on(&self) -> Option<bool> {
        self.state.read().is_on
    }

    pub async fn set_state(&self, on: bool) {
        self.sink
            .command(
                "state/circuit/setState",
                json!({"id": self.circuit_id, "state": on}),
            )
            .await;
    }
}

impl Subscriber for BodyCircuitSwitch {
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
        json!({"is_on": self.is_on(), "circuit": self.circuit_id})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::test_context;

    fn body(value: Value) -> BodyUpdate {
        serde_json::from_value(value).unwrap()
    }

    fn modes(descs: &[(i64, &str)]) -> Vec<ValDesc> {
        descs
            .iter()
            .map(|(val, desc)| ValDesc {
                val: Some(*val),
                name: Some(desc.to_lowercase()),
                desc: Some(desc.to_string()),
            })
            .collect()
    }

    #[test]
    fn test_heater_matches_body_event_on_body_id() {
        let (ctx, _) = test_context();
        let heater = BodyHeater::new(
            &ctx,
            1,
            &body(json!({"id": 1, "name": "Pool", "setPoint": 80})),
            modes(&[(0, "Off"), (3, "Heater")]),
            false,
        );
        assert_eq!(heater.identity().class, EquipmentClass::Heater);
        assert_eq!(heater.name(), "Pool Heater");

        let spa = Envelope::decode("body", json!({"id": 2, "setPoint": 100})).unwrap();
        assert!(!heater.on_update(&spa));
        let pool = Envelope::decode("body", json!({"id": 1, "heatSetpoint": 84, "temp": 79.5})).unwrap();
        assert!(heater.on_update(&pool));
        assert_eq!(heater.heat_setpoint(), Some(84.0));
        assert_eq!(heater.current_temperature(), Some(79.5));
    }

    #[test]
    fn test_heater_setpoint_follows_latest_report() {
        let (ctx, _) = test_context();
        let heater = BodyHeater::new(
            &ctx,
            1,
            &body(json!({"id": 1, "heatSetpoint": 84, "setPoint": 80})),
            modes(&[(0, "Off"), (3, "Heater")]),
            false,
        );
        assert_eq!(heater.heat_setpoint(), Some(84.0));

        let legacy = Envelope::decode("body", json!({"id": 1, "setPoint": 86})).unwrap();
        assert!(heater.on_update(&legacy));
        assert_eq!(heater.heat_setpoint(), Some(86.0));
        assert_eq!(heater.state()["heat_setpoint"], json!(86.0));

        let temp_only = Envelope::decode("body", json!({"id": 1, "temp": 78})).unwrap();
        assert!(heater.on_update(&temp_only));
        assert_eq!(heater.heat_setpoint(), Some(86.0));
    }

    #[tokio::test]
    async fn test_simple_heater_on_off() {
        let (ctx, sink) = test_context();
        let heater = BodyHeater::new(&ctx, 1, &body(json!({"id": 1})), modes(&[(1, "Off"), (3, "Heater")]), false);
        assert!(heater.is_simple());
        heater.set_heating(true).await;
        heater.set_heating(false).await;
        heater.set_preset_mode("Heater").await;
        assert_eq!(
            sink.take(),
            vec![
                (SET_HEAT_MODE.to_string(), json!({"id": 1, "mode": 3})),
                (SET_HEAT_MODE.to_string(), json!({"id": 1, "mode": 1})),
            ]
        );
    }

    #[tokio::test]
    async fn test_preset_heater() {
        let (ctx, sink) = test_context();
        let heater = BodyHeater::new(
            &ctx,
            2,
            &body(json!({"id": 2, "heatMode": {"val": 5, "name": "solar", "desc": "Solar Only"}})),
            modes(&[(0, "Off"), (3, "Heater"), (5, "Solar Only"), (21, "Solar Preferred")]),
            true,
        );
        assert_eq!(heater.preset_mode().as_deref(), Some("Solar Only"));
        assert_eq!(heater.preset_modes().len(), 4);
        assert_eq!(heater.is_heating_enabled(), Some(true));

        heater.set_preset_mode("Solar Preferred").await;
        heater.set_preset_mode("Geothermal").await;
        heater.set_temperature(Some(90.0), Some(98.0)).await;
        heater.set_temperature(None, None).await;
        assert_eq!(
            sink.take(),
            vec![
                (SET_HEAT_MODE.to_string(), json!({"id": 2, "mode": 21})),
                (SET_POINT.to_string(), json!({"id": 2, "heatSetpoint": 90.0, "coolSetpoint": 98.0})),
            ]
        );

        let unknown = Envelope::decode("body", json!({"id": 2, "heatMode": {"val": 99}})).unwrap();
        heater.on_update(&unknown);
        assert_eq!(heater.preset_mode().as_deref(), Some("Off"));
    }

    #[test]
    fn test_body_temperature_from_temps_broadcast() {
        let (ctx, _) = test_context();
        let temp = BodyTemperature::new(&ctx, 1, &body(json!({"id": 1, "temp": 80.0})), Some("F".into()));

        let without_body = Envelope::decode("temps", json!({"air": 70})).unwrap();
        assert!(!temp.on_update(&without_body));
        assert_eq!(temp.temperature(), Some(80.0));

        let with_body = Envelope::decode(
            "temps",
            json!({"bodies": [{"id": 2, "temp": 99}, {"id": 1, "temp": 81.456}], "units": {"name": "F"}}),
        )
        .unwrap();
        assert!(temp.on_update(&with_body));
        assert_eq!(temp.temperature(), Some(81.46));
        assert_eq!(temp.units().as_deref(), Some("F"));
    }

    #[test]
    fn test_cover_sparse() {
        let (ctx, _) = test_context();
        let cover = BodyCover::new(&ctx, 1, &body(json!({"id": 1, "isCovered": true})));
        let update = Envelope::decode("body", json!({"id": 1, "temp": 80})).unwrap();
        assert!(cover.on_update(&update));
        assert_eq!(cover.is_covered(), Some(true));
        let uncovered = Envelope::decode("body", json!({"id": 1, "isCovered": false})).unwrap();
        cover.on_update(&uncovered);
        assert_eq!(cover.is_covered(), Some(false));
    }

    #[tokio::test]
    async fn test_body_circuit_matches_circuit_id() {
        let (ctx, sink) = test_context();
        let switch = BodyCircuitSwitch::new(
            &ctx,
            1,
            6,
            &body(json!({"id": 1, "name": "Pool"})),
            &CircuitUpdate::default(),
        );
        assert_eq!(switch.identity(), EquipmentId::new(EquipmentClass::Body, 1));

        let body_event = Envelope::decode("circuit", json!({"id": 1, "isOn": true})).unwrap();
        assert!(!switch.on_update(&body_event));
        let circuit_event = Envelope::decode("circuit", json!({"id": 6, "isOn": true})).unwrap();
        assert!(switch.on_update(&circuit_event));
        assert_eq!(switch.is_on(), Some(true));

        switch.set_state(false).await;
        assert_eq!(
            sink.take(),
            vec![("state/circuit/setState".to_string(), json!({"id": 6, "state": false}))]
        );
    }
}
