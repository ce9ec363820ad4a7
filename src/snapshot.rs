//! Startup snapshot returned by `GET state/all`.
//!
//! Fetched once, before the push session opens, and shared read-only with
//! entity setup. Equipment lists reuse the push payload types so the same
//! sparse merge seeds entities and later applies live updates.

use crate::events::payload::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(flatten)]
    pub controller: ControllerUpdate,
    #[serde(default)]
    pub temps: SnapshotTemps,
    #[serde(default)]
    pub pumps: Vec<PumpUpdate>,
    #[serde(default)]
    pub circuits: Vec<CircuitUpdate>,
    #[serde(default)]
    pub features: Vec<CircuitUpdate>,
    #[serde(default)]
    pub circuit_groups: Vec<CircuitUpdate>,
    #[serde(default)]
    pub light_groups: Vec<CircuitUpdate>,
    #[serde(default)]
    pub chlorinators: Vec<ChlorinatorUpdate>,
    #[serde(default)]
    pub chem_controllers: Vec<ChemControllerUpdate>,
    #[serde(default)]
    pub filters: Vec<FilterUpdate>,
    #[serde(default)]
    pub schedules: Vec<ScheduleUpdate>,
}

/// The `temps` section of the snapshot. Unlike the `temps` push event, its
/// bodies carry full body state (setpoints, heat mode, cover).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotTemps {
    #[serde(default)]
    pub units: Option<ValDesc>,
    #[serde(default)]
    pub bodies: Vec<BodyUpdate>,
    #[serde(flatten)]
    pub readings: BTreeMap<String, Value>,
}

impl SnapshotTemps {
    /// View this section as a `temps` update for seeding temperature entities.
    pub fn as_update(&self) -> TempsUpdate {
        TempsUpdate {
            units: self.units.clone(),
            bodies: Some(
                self.bodies
                    .iter()
                    .map(|b| BodyTemp {
                        id: b.id,
                        name: b.name.clone(),
                        temp: b.temp,
                    })
                    .collect(),
            ),
            readings: self.readings.clone(),
        }
    }

    /// Unit name (`F` or `C`) reported by the controller.
    pub fn unit_name(&self) -> Option<&str> {
        self.units.as_ref().and_then(|u| u.name.as_deref())
    }
}

impl Snapshot {
    pub fn body(&self, id: u32) -> Option<&BodyUpdate> {
        self.temps.bodies.iter().find(|b| b.id == Some(id))
    }

    pub fn circuit(&self, id: u32) -> Option<&CircuitUpdate> {
        self.circuits.iter().find(|c| c.id == Some(id))
    }

    /// Firmware description in the form `installed (branch-commit7)`.
    pub fn version_string(&self) -> Option<String> {
        let app = self.controller.app_version_state.as_ref()?;
        let installed = app.installed.as_deref()?;
        let branch = app.git_local_branch.as_deref().unwrap_or("unknown");
        let commit = app.git_local_commit.as_deref().unwrap_or("");
        let start = commit.char_indices().rev().nth(6).map_or(0, |(i, _)| i);
        let short = &commit[start..];
        Some(format!("{} ({}-{})", installed, branch, short))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Snapshot {
        serde_json::from_value(json!({
            "model": "IntelliCenter",
            "freeze": false,
            "mode": {"val": 0, "name": "auto", "desc": "Auto"},
            "appVersionState": {
                "installed": "8.0.1",
                "gitLocalBranch": "master",
                "gitLocalCommit": "0123456789abcdef"
            },
            "temps": {
                "units": {"val": 0, "name": "F", "desc": "Fahrenheit"},
                "air": 72.5,
                "waterSensor1": 80,
                "bodies": [
                    {"id": 1, "name": "Pool", "temp": 80.0, "circuit": 6,
                     "heatMode": {"val": 0, "name": "off", "desc": "Off"}}
                ]
            },
            "pumps": [{"id": 1, "name": "Pool Pump", "rpm": 1800}],
            "circuits": [{"id": 6, "name": "Pool", "isOn": true}],
            "valves": [{"id": 1}]
        }))
        .unwrap()
    }

    #[test]
    fn test_decode_snapshot_sections() {
        let snapshot = sample();
        assert_eq!(snapshot.controller.model.as_deref(), Some("IntelliCenter"));
        assert_eq!(snapshot.temps.unit_name(), Some("F"));
        assert_eq!(snapshot.pumps.len(), 1);
        assert!(snapshot.features.is_empty());
        assert_eq!(snapshot.body(1).and_then(|b| b.circuit), Some(6));
        assert_eq!(snapshot.circuit(6).and_then(|c| c.is_on), Some(true));
    }

    #[test]
    fn test_temps_as_update() {
        let update = sample().temps.as_update();
        assert_eq!(update.reading("air"), Some(72.5));
        assert_eq!(update.body(1).and_then(|b| b.temp), Some(80.0));
    }

    #[test]
    fn test_version_string() {
        assert_eq!(
            sample().version_string().as_deref(),
            Some("8.0.1 (master-9abcdef)")
        );
    }

    #[test]
    fn test_version_string_short_commit_on_char_boundary() {
        let mut snapshot = sample();
        if let Some(app) = snapshot.controller.app_version_state.as_mut() {
            app.git_local_commit = Some("abcdéfghï".to_string());
        }
        assert_eq!(
            snapshot.version_string().as_deref(),
            Some("8.0.1 (master-cdéfghï)")
        );

        if let Some(app) = snapshot.controller.app_version_state.as_mut() {
            app.git_local_commit = Some("éé".to_string());
        }
        assert_eq!(snapshot.version_string().as_deref(), Some("8.0.1 (master-éé)"));
    }
}
