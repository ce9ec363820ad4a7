//! Per-equipment subscribers.

pub mod body;
pub mod chemistry;
pub mod chlorinator;
pub mod circuit;
pub mod controller;
pub mod filter;
pub mod light;
pub mod pump;
pub mod schedule;

pub use body::{BodyCircuitSwitch, BodyCover, BodyHeater, BodyTemperature};
pub use chemistry::{ChemIndex, ChemIndices, ChemType, ChemicalProbe};
pub use chlorinator::Chlorinator;
pub use circuit::{CircuitSwitch, SwitchKind};
pub use controller::{ControlPanel, TempProbe};
pub use filter::Filter;
pub use light::{Light, LightKind};
pub use pump::Pump;
pub use schedule::Schedule;
