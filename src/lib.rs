//! Pool Controller Bridge library.
//!
//! Keeps a live, per-equipment view of a nodejs-PoolController instance: a
//! reconnecting push session feeds typed event envelopes to a dispatcher,
//! which hands them to one subscriber per piece of equipment. Commands go
//! back to the controller over its REST API.

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod entity;
pub mod equipment;
pub mod error;
pub mod events;
pub mod setup;
pub mod snapshot;
