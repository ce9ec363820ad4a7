//! Typed payloads carried by push events.
//!
//! Every field is optional: the controller sends sparse updates, so an absent
//! key decodes to `None` and must never overwrite known state.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Decode an optional field, reading a value of the wrong shape as absent.
///
/// One malformed field must not cost the rest of the update.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// The `{val, name, desc}` triple the controller uses for every enumerated value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValDesc {
    #[serde(default, deserialize_with = "lenient")]
    pub val: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub desc: Option<String>,
}

/// Reference to another piece of equipment (e.g. a schedule's circuit).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRef {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

/// `body` events: a pool or spa.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyUpdate {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub temp: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub set_point: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub heat_setpoint: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub cool_setpoint: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub heat_mode: Option<ValDesc>,
    #[serde(default, deserialize_with = "lenient")]
    pub heat_status: Option<ValDesc>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_on: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_covered: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub circuit: Option<u32>,
    #[serde(default, rename = "type", deserialize_with = "lenient")]
    pub body_type: Option<ValDesc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitType {
    #[serde(default, deserialize_with = "lenient")]
    pub val: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub desc: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_light: Option<bool>,
}

/// `circuit`, `circuitGroup`, `lightGroup` and `feature` events share this shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitUpdate {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_on: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub lighting_theme: Option<ValDesc>,
    #[serde(default, rename = "type", deserialize_with = "lenient")]
    pub circuit_type: Option<CircuitType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpUpdate {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub rpm: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub watts: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub flow: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub relay: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub command: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<ValDesc>,
    #[serde(default, deserialize_with = "lenient")]
    pub min_speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub max_speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub min_flow: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub max_flow: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterUpdate {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_on: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub clean_percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub pressure: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub pressure_units: Option<ValDesc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChlorinatorUpdate {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub salt_level: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub salt_target: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub salt_required: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub current_output: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub target_output: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub pool_setpoint: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub spa_setpoint: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub super_chlor: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub super_chlor_hours: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<ValDesc>,
    #[serde(default, deserialize_with = "lenient")]
    pub body: Option<ValDesc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    #[serde(default, deserialize_with = "lenient")]
    pub capacity: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub level: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub units: Option<ValDesc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    #[serde(default, deserialize_with = "lenient")]
    pub level: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub temp_units: Option<ValDesc>,
}

/// One chemical (`ph` or `orp`) inside a chem controller update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chemical {
    #[serde(default, deserialize_with = "lenient")]
    pub level: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub setpoint: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub enabled: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub dosing_status: Option<ValDesc>,
    #[serde(default, deserialize_with = "lenient")]
    pub demand: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub daily_volume_dosed: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub tank: Option<Tank>,
    #[serde(default, deserialize_with = "lenient")]
    pub probe: Option<Probe>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChemControllerUpdate {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub ph: Option<Chemical>,
    #[serde(default, deserialize_with = "lenient")]
    pub orp: Option<Chemical>,
    #[serde(default, deserialize_with = "lenient")]
    pub lsi: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub csi: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub calcium_hardness: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub cyanuric_acid: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub alkalinity: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub borates: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVersionState {
    #[serde(default, deserialize_with = "lenient")]
    pub installed: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub git_local_branch: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub git_local_commit: Option<String>,
}

/// `controller` events: panel-wide state, no id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerUpdate {
    #[serde(default, deserialize_with = "lenient")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub freeze: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub mode: Option<ValDesc>,
    #[serde(default, deserialize_with = "lenient")]
    pub app_version_state: Option<AppVersionState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleUpdate {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub disabled: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub circuit: Option<EquipmentRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyTemp {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub temp: Option<f64>,
}

/// `temps` broadcast: units, per-body temperatures and named probe readings
/// (`air`, `solar`, `waterSensor1`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TempsUpdate {
    #[serde(default, deserialize_with = "lenient")]
    pub units: Option<ValDesc>,
    #[serde(default, deserialize_with = "lenient")]
    pub bodies: Option<Vec<BodyTemp>>,
    #[serde(flatten)]
    pub readings: BTreeMap<String, Value>,
}

impl TempsUpdate {
    /// Numeric reading for a probe key, if this update carries one.
    pub fn reading(&self, key: &str) -> Option<f64> {
        self.readings.get(key).and_then(Value::as_f64)
    }

    /// Keys of every numeric probe reading in this update.
    pub fn probe_keys(&self) -> impl Iterator<Item = &str> {
        self.readings
            .iter()
            .filter(|(_, v)| v.is_number())
            .map(|(k, _)| k.as_str())
    }

    pub fn body(&self, id: u32) -> Option<&BodyTemp> {
        self.bodies
            .as_deref()
            .and_then(|bodies| bodies.iter().find(|b| b.id == Some(id)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityUpdate {
    pub available: bool,
}

/// Event payloads, one variant per wire shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Body(BodyUpdate),
    Circuit(CircuitUpdate),
    Pump(PumpUpdate),
    Filter(FilterUpdate),
    Chlorinator(ChlorinatorUpdate),
    ChemController(ChemControllerUpdate),
    Controller(ControllerUpdate),
    Schedule(ScheduleUpdate),
    Temps(TempsUpdate),
    Availability(AvailabilityUpdate),
}
