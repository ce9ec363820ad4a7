//! Lights and light groups, with theme selection and light commands.

use crate::entity::{
    CommandSink, EntityContext, EntityCore, EquipmentClass, EquipmentId, MatchRule, Route,
    SparseMerge, Subscriber,
};
use crate::events::payload::{CircuitUpdate, ValDesc};
use crate::events::{Envelope, EventType, Payload};
use log::error;
use parking_lot::RwLock;
use serde_json::{Value, json};
use std::sync::Arc;

pub const SET_THEME: &str = "state/circuit/setTheme";
pub const RUN_COMMAND: &str = "state/light/runCommand";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Circuit,
    Group,
}

impl LightKind {
    fn class(self) -> EquipmentClass {
        match self {
            Self::Circuit => EquipmentClass::Light,
            Self::Group => EquipmentClass::LightGroup,
        }
    }

    fn event_type(self) -> EventType {
        match self {
            Self::Circuit => EventType::Circuit,
            Self::Group => EventType::LightGroup,
        }
    }

    fn set_state_path(self) -> &'static str {
        match self {
            Self::Circuit => "state/circuit/setState",
            Self::Group => "state/lightGroup/setState",
        }
    }
}

pub struct Light {
    core: EntityCore,
    kind: LightKind,
    id: u32,
    state: RwLock<CircuitUpdate>,
    themes: Vec<ValDesc>,
    commands: Vec<ValDesc>,
    sink: Arc<dyn CommandSink>,
}

impl Light {
    pub fn new(
        ctx: &EntityContext,
        kind: LightKind,
        id: u32,
        initial: &CircuitUpdate,
        themes: Vec<ValDesc>,
        commands: Vec<ValDesc>,
    ) -> Self {
        let identity = EquipmentId::new(kind.class(), id);
        let name = initial
            .name
            .clone()
            .unwrap_or_else(|| format!("Light {}", id));
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
            themes,
            commands,
            sink: ctx.sink.clone(),
        }
    }

    pub fn is_on(&self) -> Option<bool> {
        self.state.read().is_on
    }

    /// Description of the active theme, e.g. `Caribbean`.
    pub fn theme(&self) -> Option<String> {
        self.state
            .read()
            .lighting_theme
            .as_ref()
            .and_then(|t| t.desc.clone())
    }

    /// Theme descriptions the controller offers for this light.
    pub fn theme_list(&self) -> Vec<&str> {
        self.themes.iter().filter_map(|t| t.desc.as_deref()).collect()
    }

    pub fn command_list(&self) -> Vec<&str> {
        self.commands.iter().filter_map(|c| c.name.as_deref()).collect()
    }

    pub async fn set_state(&self, on: bool) {
        self.sink
            .command(
                self.kind.set_state_path(),
                json!({"id": self.id, "state": on}),
            )
            .await;
    }

    /// Select a theme by its description. Unknown themes are logged and no
    /// request is sent.
    pub async fn set_theme(&self, desc: &str) {
        let Some(val) = self
            .themes
            .iter()
            .find(|t| t.desc.as_deref() == Some(desc))
            .and_then(|t| t.val)
        else {
            error!("Invalid theme for {}: {}", self.core.name(), desc);
            return;
        };
        self.sink
            .command(SET_THEME, json!({"id": self.id, "theme": val}))
            .await;
    }

    /// Run a light command (`colorSync`, `colorSet`, ...) by name.
    pub async fn run_command(&self, name: &str) {
        if !self.commands.iter().any(|c| c.name.as_deref() == Some(name)) {
            error!("Invalid light command for {}: {}", self.core.name(), name);
            return;
        }
        self.sink
            .command(RUN_COMMAND, json!({"id": self.id, "command": name}))
            .await;
    }
}

impl Subscriber for Light {
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
            "theme": state.lighting_theme.as_ref().and_then(|t| t.desc.clone()),
            "themes": self.theme_list(),
        })
    }
}
