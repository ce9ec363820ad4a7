//! Salt chlorinator: salt readings, output and per-body setpoints.

use crate::entity::{
    CommandSink, EntityContext, EntityCore, EquipmentClass, EquipmentId, MatchRule, Route,
    SparseMerge, Subscriber,
};
use crate::events::payload::ChlorinatorUpdate;
use crate::events::{Envelope, EventType, Payload};
use parking_lot::RwLock;
use serde_json::{Value, json};
use std::sync::Arc;

pub const POOL_SETPOINT: &str = "state/chlorinator/poolSetpoint";
pub const SPA_SETPOINT: &str = "state/chlorinator/spaSetpoint";
pub const SUPER_CHLORINATE: &str = "state/chlorinator/superChlorinate";
pub const CONFIG: &str = "config/chlorinator";

/// Body codes: 0 pool, 1 spa, 32 pool and spa.
const BODY_POOL: i64 = 0;
const BODY_SPA: i64 = 1;
const BODY_SHARED: i64 = 32;

pub struct Chlorinator {
    core: EntityCore,
    id: u32,
    state: RwLock<ChlorinatorUpdate>,
    sink: Arc<dyn CommandSink>,
}

impl Chlorinator {
    pub fn new(ctx: &EntityContext, id: u32, initial: &ChlorinatorUpdate) -> Self {
        let identity = EquipmentId::new(EquipmentClass::Chlorinator, id);
        let name = initial
            .name
            .clone()
            .unwrap_or_else(|| format!("Chlorinator {}", id));
        Self {
            core: EntityCore::new(
                identity,
                MatchRule::id(EventType::Chlorinator, id),
                ctx.unique_id(identity, None),
                name,
            ),
            id,
            state: RwLock::new(initial.clone()),
            sink: ctx.sink.clone(),
        }
    }

    fn body_code(&self) -> Option<i64> {
        self.state.read().body.as_ref().and_then(|b| b.val)
    }

    pub fn serves_pool(&self) -> bool {
        matches!(self.body_code(), Some(BODY_POOL | BODY_SHARED))
    }

    pub fn serves_spa(&self) -> bool {
        matches!(self.body_code(), Some(BODY_SPA | BODY_SHARED))
    }

    pub fn salt_level(&self) -> Option<f64> {
        self.state.read().salt_level
    }

    pub fn current_output(&self) -> Option<f64> {
        self.state.read().current_output
    }

    pub fn pool_setpoint(&self) -> Option<f64> {
        self.state.read().pool_setpoint
    }

    pub fn spa_setpoint(&self) -> Option<f64> {
        self.state.read().spa_setpoint
    }

    pub fn super_chlor(&self) -> Option<bool> {
        self.state.read().super_chlor
    }

    pub fn status(&self) -> Option<String> {
        self.state.read().status.as_ref().and_then(|s| s.desc.clone())
    }

    /// Output percentage while the pool is running.
    pub async fn set_pool_setpoint(&self, percent: u8) {
        self.sink
            .command(POOL_SETPOINT, json!({"id": self.id, "setPoint": percent}))
            .await;
    }

    pub async fn set_spa_setpoint(&self, percent: u8) {
        self.sink
            .command(SPA_SETPOINT, json!({"id": self.id, "setPoint": percent}))
            .await;
    }

    pub async fn set_super_chlor(&self, on: bool) {
        self.sink
            .command(
                SUPER_CHLORINATE,
                json!({"id": self.id, "superChlorinate": on}),
            )
            .await;
    }

    pub async fn set_super_chlor_hours(&self, hours: u8) {
        self.sink
            .command(CONFIG, json!({"id": self.id, "superChlorHours": hours}))
            .await;
    }
}

impl Subscriber for Chlorinator {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn on_update(&self, envelope: &Envelope) -> bool {
        match self.core.route(envelope) {
            Route::Availability(available) => {
                self.core.set_available(available);
                true
            }
            Route::Matched(Payload::Chlorinator(update)) => {
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
            "salt_level": state.salt_level,
            "salt_target": state.salt_target,
            "salt_required": state.salt_required,
            "current_output": state.current_output,
            "target_output": state.target_output,
            "pool_setpoint": state.pool_setpoint,
            "spa_setpoint": state.spa_setpoint,
            "super_chlor": state.super_chlor,
            "super_chlor_hours": state.super_chlor_hours,
            "status": state.status.as_ref().and_then(|s| s.desc.clone()),
        })
    }
}
