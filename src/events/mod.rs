//! Push event vocabulary: event types, the envelope and typed payloads.

mod envelope;
pub mod payload;

pub use envelope::{Envelope, EventType};
pub use payload::Payload;
