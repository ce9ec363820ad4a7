//! Builds the entity set from the startup snapshot.
//!
//! Construction needs a few per-equipment lookups the snapshot does not carry
//! (heat modes, light themes and commands, cooling capability). They are
//! behind [`EquipmentLookup`] so setup can run against canned data in tests.

use crate::connection::RestClient;
use crate::entity::{EntityContext, Subscriber};
use crate::equipment::{
    BodyCircuitSwitch, BodyCover, BodyHeater, BodyTemperature, ChemIndices, ChemType,
    ChemicalProbe, Chlorinator, CircuitSwitch, ControlPanel, Filter, Light, LightKind, Pump,
    Schedule, SwitchKind, TempProbe,
};
use crate::events::payload::{ChemControllerUpdate, CircuitUpdate, ValDesc};
use crate::snapshot::Snapshot;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use strum::IntoEnumIterator;

#[async_trait]
pub trait EquipmentLookup: Send + Sync {
    async fn heat_modes(&self, body_id: u32) -> Vec<ValDesc>;
    async fn light_themes(&self, circuit_id: u32) -> Vec<ValDesc>;
    async fn light_commands(&self, circuit_id: u32) -> Vec<ValDesc>;
    async fn has_cooling(&self, body_id: u32) -> bool;
}

#[async_trait]
impl EquipmentLookup for RestClient {
    async fn heat_modes(&self, body_id: u32) -> Vec<ValDesc> {
        RestClient::heat_modes(self, body_id).await
    }

    async fn light_themes(&self, circuit_id: u32) -> Vec<ValDesc> {
        RestClient::light_themes(self, circuit_id).await
    }

    async fn light_commands(&self, circuit_id: u32) -> Vec<ValDesc> {
        RestClient::light_commands(self, circuit_id).await
    }

    async fn has_cooling(&self, body_id: u32) -> bool {
        RestClient::has_cooling(self, body_id).await
    }
}

fn is_light(circuit: &CircuitUpdate) -> bool {
    circuit
        .circuit_type
        .as_ref()
        .and_then(|t| t.is_light)
        .unwrap_or(false)
}

fn chemical_enabled(controller: &ChemControllerUpdate, chem_type: ChemType) -> bool {
    let chemical = match chem_type {
        ChemType::Ph => controller.ph.as_ref(),
        ChemType::Orp => controller.orp.as_ref(),
    };
    chemical.is_some_and(|c| c.enabled == Some(true))
}

/// Entries without an id cannot be matched against events and are skipped.
fn with_id<'a, T>(
    items: &'a [T],
    id: impl Fn(&T) -> Option<u32> + 'a,
    what: &'a str,
) -> impl Iterator<Item = (u32, &'a T)> + 'a {
    items.iter().filter_map(move |item| match id(item) {
        Some(id) => Some((id, item)),
        None => {
            warn!("[Setup] Skipping {} without id", what);
            None
        }
    })
}

/// Create one subscriber per equipment facet in the snapshot.
pub async fn build_entities(
    snapshot: &Snapshot,
    lookup: &dyn EquipmentLookup,
    ctx: &EntityContext,
) -> Vec<Arc<dyn Subscriber>> {
    let mut entities: Vec<Arc<dyn Subscriber>> = Vec::new();

    for (id, circuit) in with_id(&snapshot.circuits, |c| c.id, "circuit") {
        if is_light(circuit) {
            let themes = lookup.light_themes(id).await;
            let commands = lookup.light_commands(id).await;
            entities.push(Arc::new(Light::new(
                ctx,
                LightKind::Circuit,
                id,
                circuit,
                themes,
                commands,
            )));
        } else {
            entities.push(Arc::new(CircuitSwitch::new(
                ctx,
                SwitchKind::AuxCircuit,
                id,
                circuit,
            )));
        }
    }
    for (id, feature) in with_id(&snapshot.features, |c| c.id, "feature") {
        entities.push(Arc::new(CircuitSwitch::new(
            ctx,
            SwitchKind::Feature,
            id,
            feature,
        )));
    }
    for (id, group) in with_id(&snapshot.circuit_groups, |c| c.id, "circuit group") {
        entities.push(Arc::new(CircuitSwitch::new(
            ctx,
            SwitchKind::CircuitGroup,
            id,
            group,
        )));
    }
    for (id, group) in with_id(&snapshot.light_groups, |c| c.id, "light group") {
        let themes = lookup.light_themes(id).await;
        let commands = lookup.light_commands(id).await;
        entities.push(Arc::new(Light::new(
            ctx,
            LightKind::Group,
            id,
            group,
            themes,
            commands,
        )));
    }

    for (id, pump) in with_id(&snapshot.pumps, |p| p.id, "pump") {
        entities.push(Arc::new(Pump::new(ctx, id, pump)));
    }
    for (id, filter) in with_id(&snapshot.filters, |f| f.id, "filter") {
        entities.push(Arc::new(Filter::new(ctx, id, filter)));
    }

    let units = snapshot.temps.unit_name().map(str::to_string);
    for (id, body) in with_id(&snapshot.temps.bodies, |b| b.id, "body") {
        let heat_modes = lookup.heat_modes(id).await;
        let has_cooling = lookup.has_cooling(id).await;
        entities.push(Arc::new(BodyHeater::new(
            ctx,
            id,
            body,
            heat_modes,
            has_cooling,
        )));
        entities.push(Arc::new(BodyTemperature::new(
            ctx,
            id,
            body,
            units.clone(),
        )));
        if body.is_covered.is_some() {
            entities.push(Arc::new(BodyCover::new(ctx, id, body)));
        }
        if let Some(circuit_id) = body.circuit
            && let Some(circuit) = snapshot.circuit(circuit_id)
        {
            entities.push(Arc::new(BodyCircuitSwitch::new(
                ctx, id, circuit_id, body, circuit,
            )));
        }
    }

    for (id, chlorinator) in with_id(&snapshot.chlorinators, |c| c.id, "chlorinator") {
        entities.push(Arc::new(Chlorinator::new(ctx, id, chlorinator)));
    }
    for (id, controller) in with_id(&snapshot.chem_controllers, |c| c.id, "chem controller") {
        for chem_type in ChemType::iter() {
            if chemical_enabled(controller, chem_type) {
                entities.push(Arc::new(ChemicalProbe::new(ctx, id, chem_type, controller)));
            }
        }
        entities.push(Arc::new(ChemIndices::new(ctx, id, controller)));
    }

    entities.push(Arc::new(ControlPanel::new(ctx, &snapshot.controller)));
    let temps = snapshot.temps.as_update();
    for key in temps.probe_keys() {
        entities.push(Arc::new(TempProbe::new(ctx, key, &temps)));
    }

    for (id, schedule) in with_id(&snapshot.schedules, |s| s.id, "schedule") {
        entities.push(Arc::new(Schedule::new(ctx, id, schedule)));
    }

    for entity in &entities {
        debug!("[Setup] {} ({})", entity.name(), entity.unique_id());
    }
    info!("[Setup] Created {} entities", entities.len());
    entities
}
