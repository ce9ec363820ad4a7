//! Chemistry controller entities.
//!
//! A chem controller reports two dosing chemicals (`ph`, `orp`) as nested
//! objects plus a set of water-balance indices at the top level. Each chemical
//! gets its own [`ChemicalProbe`]; the indices share one [`ChemIndices`].
//!
//! Updates are sparse at both levels: an `orp`-only event must not touch the
//! pH probe, and a tank-level-only event must not clear the chemical level.

use crate::entity::{
    CommandSink, EntityContext, EntityCore, EquipmentClass, EquipmentId, MatchRule, Route,
    SparseMerge, Subscriber,
};
use crate::events::payload::{ChemControllerUpdate, Chemical};
use crate::events::{Envelope, EventType, Payload};
use parking_lot::RwLock;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use strum::{AsRefStr, Display, EnumIter, EnumString};

pub const CHEM_CONTROLLER: &str = "config/chemController";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ChemType {
    Ph,
    Orp,
}

impl ChemType {
    fn select(self, update: &ChemControllerUpdate) -> Option<&Chemical> {
        match self {
            Self::Ph => update.ph.as_ref(),
            Self::Orp => update.orp.as_ref(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Ph => "pH",
            Self::Orp => "ORP",
        }
    }
}

/// Tank fill level in percent, `round(level / capacity, 2) * 100`.
///
/// A tank without a usable capacity reads as empty.
pub fn tank_percent(level: Option<f64>, capacity: Option<f64>) -> f64 {
    match (level, capacity) {
        (Some(level), Some(capacity)) if capacity != 0.0 => {
            ((level / capacity) * 100.0).round()
        }
        _ => 0.0,
    }
}

pub struct ChemicalProbe {
    core: EntityCore,
    id: u32,
    chem_type: ChemType,
    state: RwLock<Chemical>,
    sink: Arc<dyn CommandSink>,
}

impl ChemicalProbe {
    pub fn new(
        ctx: &EntityContext,
        id: u32,
        chem_type: ChemType,
        controller: &ChemControllerUpdate,
    ) -> Self {
        let identity = EquipmentId::new(EquipmentClass::ChemController, id);
        let base = controller
            .name
            .clone()
            .unwrap_or_else(|| format!("Chem Controller {}", id));
        Self {
            core: EntityCore::new(
                identity,
                MatchRule::id(EventType::ChemController, id),
                ctx.unique_id(identity, Some(chem_type.as_ref())),
                format!("{} {}", base, chem_type.label()),
            ),
            id,
            chem_type,
            state: RwLock::new(chem_type.select(controller).cloned().unwrap_or_default()),
            sink: ctx.sink.clone(),
        }
    }

    pub fn chem_type(&self) -> ChemType {
        self.chem_type
    }

    pub fn level(&self) -> Option<f64> {
        self.state.read().level
    }

    pub fn setpoint(&self) -> Option<f64> {
        self.state.read().setpoint
    }

    pub fn tank_percent(&self) -> f64 {
        let state = self.state.read();
        let tank = state.tank.as_ref();
        tank_percent(tank.and_then(|t| t.level), tank.and_then(|t| t.capacity))
    }

    pub fn probe_temperature(&self) -> Option<f64> {
        self.state.read().probe.as_ref().and_then(|p| p.temperature)
    }

    /// ORP setpoints are whole millivolts; pH keeps its decimals.
    pub async fn set_setpoint(&self, value: f64) {
        let setpoint = match self.chem_type {
            ChemType::Ph => json!(value),
            ChemType::Orp => json!(value as i64),
        };
        let mut payload = Map::new();
        payload.insert("id".to_string(), json!(self.id));
        payload.insert(
            self.chem_type.to_string(),
            json!({"setpoint": setpoint}),
        );
        self.sink
            .command(CHEM_CONTROLLER, Value::Object(payload))
            .await;
    }
}

impl Subscriber for ChemicalProbe {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn on_update(&self, envelope: &Envelope) -> bool {
        match self.core.route(envelope) {
            Route::Availability(available) => {
                self.core.set_available(available);
                true
            }
            Route::Matched(Payload::ChemController(update)) => {
                let Some(chemical) = self.chem_type.select(update) else {
                    return false;
                };
                self.state.write().merge_from(chemical);
                self.core.signal();
                true
            }
            _ => false,
        }
    }

    fn state(&self) -> Value {
        let state = self.state.read();
        let tank = state.tank.as_ref();
        json!({
            "level": state.level,
            "setpoint": state.setpoint,
            "dosing_status": state.dosing_status.as_ref().and_then(|s| s.desc.clone()),
            "demand": state.demand,
            "tank_level": tank.and_then(|t| t.level),
            "tank_capacity": tank.and_then(|t| t.capacity),
            "tank_percent": tank_percent(tank.and_then(|t| t.level), tank.and_then(|t| t.capacity)),
            "probe_temperature": state.probe.as_ref().and_then(|p| p.temperature),
        })
    }
}

/// Writable water-balance indices. LSI and CSI are computed by the
/// controller and only read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum ChemIndex {
    CalciumHardness,
    CyanuricAcid,
    Alkalinity,
    Borates,
}

fn has_index(update: &ChemControllerUpdate) -> bool {
    update.lsi.is_some()
        || update.csi.is_some()
        || update.calcium_hardness.is_some()
        || update.cyanuric_acid.is_some()
        || update.alkalinity.is_some()
        || update.borates.is_some()
}

pub struct ChemIndices {
    core: EntityCore,
    id: u32,
    state: RwLock<ChemControllerUpdate>,
    sink: Arc<dyn CommandSink>,
}

impl ChemIndices {
    pub fn new(ctx: &EntityContext, id: u32, controller: &ChemControllerUpdate) -> Self {
        let identity = EquipmentId::new(EquipmentClass::ChemController, id);
        let base = controller
            .name
            .clone()
            .unwrap_or_else(|| format!("Chem Controller {}", id));
        Self {
            core: EntityCore::new(
                identity,
                MatchRule::id(EventType::ChemController, id),
                ctx.unique_id(identity, Some("indices")),
                format!("{} Indices", base),
            ),
            id,
            state: RwLock::new(ChemControllerUpdate {
                ph: None,
                orp: None,
                ..controller.clone()
            }),
            sink: ctx.sink.clone(),
        }
    }

    pub fn lsi(&self) -> Option<f64> {
        self.state.read().lsi
    }

    pub fn csi(&self) -> Option<f64> {
        self.state.read().csi
    }

    pub fn index(&self, index: ChemIndex) -> Option<f64> {
        let state = self.state.read();
        match index {
            ChemIndex::CalciumHardness => state.calcium_hardness,
            ChemIndex::CyanuricAcid => state.cyanuric_acid,
            ChemIndex::Alkalinity => state.alkalinity,
            ChemIndex::Borates => state.borates,
        }
    }

    /// Indices are whole ppm on the wire.
    pub async fn set_index(&self, index: ChemIndex, value: f64) {
        let mut payload = Map::new();
        payload.insert("id".to_string(), json!(self.id));
        payload.insert(index.to_string(), json!(value as i64));
        self.sink
            .command(CHEM_CONTROLLER, Value::Object(payload))
            .await;
    }
}

impl Subscriber for ChemIndices {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn on_update(&self, envelope: &Envelope) -> bool {
        match self.core.route(envelope) {
            Route::Availability(available) => {
                self.core.set_available(available);
                true
            }
            Route::Matched(Payload::ChemController(update)) if has_index(update) => {
                self.state.write().merge_from(&ChemControllerUpdate {
                    ph: None,
                    orp: None,
                    ..update.clone()
                });
                self.core.signal();
                true
            }
            _ => false,
        }
    }

    fn state(&self) -> Value {
        let state = self.state.read();
        json!({
            "lsi": state.lsi,
            "csi": state.csi,
            "calcium_hardness": state.calcium_hardness,
            "cyanuric_acid": state.cyanuric_acid,
            "alkalinity": state.alkalinity,
            "borates": state.borates,
        })
    }
}
