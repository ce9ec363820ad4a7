//! Identity, matching rule and availability shared by every entity.

use super::ChangeNotifier;
use crate::events::{Envelope, EventType, Payload};
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use strum::{AsRefStr, Display, EnumString};

/// Kinds of pool equipment an entity can represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EquipmentClass {
    Body,
    AuxCircuit,
    Feature,
    CircuitGroup,
    Light,
    LightGroup,
    Pump,
    Heater,
    Valve,
    Chlorinator,
    ChemController,
    Filter,
    ControlPanel,
}

/// Identity of a piece of equipment. `id` 0 stands for equipment without a
/// discrete id (the control panel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EquipmentId {
    pub class: EquipmentClass,
    pub id: u32,
}

impl EquipmentId {
    pub fn new(class: EquipmentClass, id: u32) -> Self {
        Self { class, id }
    }

    pub fn control_panel() -> Self {
        Self::new(EquipmentClass::ControlPanel, 0)
    }
}

impl fmt::Display for EquipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.class, self.id)
    }
}

/// Which envelopes an entity listens to. `id: None` is a broadcast listener
/// (`temps`, `controller`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRule {
    pub event_type: EventType,
    pub id: Option<u32>,
}

impl MatchRule {
    pub fn id(event_type: EventType, id: u32) -> Self {
        Self {
            event_type,
            id: Some(id),
        }
    }

    pub fn broadcast(event_type: EventType) -> Self {
        Self {
            event_type,
            id: None,
        }
    }
}

/// Outcome of matching an envelope against a rule.
#[derive(Debug, PartialEq)]
pub enum Route<'e> {
    Availability(bool),
    Matched(&'e Payload),
    Ignored,
}

pub struct EntityCore {
    identity: EquipmentId,
    rule: MatchRule,
    unique_id: String,
    name: String,
    available: AtomicBool,
    version: AtomicU32,
    notifier: RwLock<Option<ChangeNotifier>>,
}

impl EntityCore {
    /// New entities start available; the first `availability` envelope
    /// settles the real value.
    pub fn new(
        identity: EquipmentId,
        rule: MatchRule,
        unique_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            rule,
            unique_id: unique_id.into(),
            name: name.into(),
            available: AtomicBool::new(true),
            version: AtomicU32::new(0),
            notifier: RwLock::new(None),
        }
    }

    pub fn identity(&self) -> EquipmentId {
        self.identity
    }

    pub fn rule(&self) -> MatchRule {
        self.rule
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn set_notifier(&self, notifier: ChangeNotifier) {
        *self.notifier.write() = Some(notifier);
    }

    /// Classify an envelope for this entity. Availability bypasses the rule.
    pub fn route<'e>(&self, envelope: &'e Envelope) -> Route<'e> {
        if let Payload::Availability(update) = &envelope.payload {
            return Route::Availability(update.available);
        }
        if envelope.event_type != self.rule.event_type {
            return Route::Ignored;
        }
        match self.rule.id {
            None => Route::Matched(&envelope.payload),
            Some(id) if envelope.entity_id == Some(id) => Route::Matched(&envelope.payload),
            Some(_) => Route::Ignored,
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        self.signal();
    }

    /// Bump the version and push a state change to the notifier, if any.
    pub fn signal(&self) {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(notifier) = self.notifier.read().as_ref() {
            notifier.notify(&self.unique_id, version, self.is_available());
        }
    }
}
