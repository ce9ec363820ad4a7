use super::payload::*;
use crate::error::{BridgeError, Result};
use serde_json::Value;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Push event vocabulary. Wire names are camelCase.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "camelCase")]
pub enum EventType {
    Body,
    Circuit,
    CircuitGroup,
    LightGroup,
    Feature,
    Pump,
    Filter,
    Chlorinator,
    ChemController,
    Controller,
    Schedule,
    Temps,
    Availability,
}

/// One normalized inbound push event.
///
/// Immutable once built; the dispatcher shares it behind an `Arc` for the
/// duration of one notification cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub event_type: EventType,
    pub entity_id: Option<u32>,
    pub payload: Payload,
}

impl Envelope {
    pub fn availability(available: bool) -> Self {
        Self {
            event_type: EventType::Availability,
            entity_id: None,
            payload: Payload::Availability(AvailabilityUpdate { available }),
        }
    }

    /// Decode a named push event into an envelope.
    ///
    /// The reserved `event` key is stripped before decoding; it is routing
    /// metadata and never an equipment field. `availability` is not accepted
    /// from the wire: only the connection manager reports availability.
    pub fn decode(name: &str, mut body: Value) -> Result<Self> {
        let event_type =
            EventType::from_str(name).map_err(|_| BridgeError::UnknownEvent(name.to_string()))?;

        if let Some(obj) = body.as_object_mut() {
            obj.remove("event");
        }

        let entity_id = match event_type {
            EventType::Temps | EventType::Controller | EventType::Availability => None,
            _ => body
                .get("id")
                .and_then(Value::as_u64)
                .and_then(|id| u32::try_from(id).ok()),
        };

        let payload = match event_type {
            EventType::Body => Payload::Body(serde_json::from_value(body)?),
            EventType::Circuit
            | EventType::CircuitGroup
            | EventType::LightGroup
            | EventType::Feature => Payload::Circuit(serde_json::from_value(body)?),
            EventType::Pump => Payload::Pump(serde_json::from_value(body)?),
            EventType::Filter => Payload::Filter(serde_json::from_value(body)?),
            EventType::Chlorinator => Payload::Chlorinator(serde_json::from_value(body)?),
            EventType::ChemController => Payload::ChemController(serde_json::from_value(body)?),
            EventType::Controller => Payload::Controller(serde_json::from_value(body)?),
            EventType::Schedule => Payload::Schedule(serde_json::from_value(body)?),
            EventType::Temps => Payload::Temps(serde_json::from_value(body)?),
            EventType::Availability => return Err(BridgeError::UnknownEvent(name.to_string())),
        };

        Ok(Self {
            event_type,
            entity_id,
            payload,
        })
    }

    pub fn is_availability(&self) -> bool {
        self.event_type == EventType::Availability
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    #[test]
    fn test_event_type_wire_names() {
        assert_eq!(EventType::ChemController.to_string(), "chemController");
        assert_eq!(EventType::from_str("lightGroup").unwrap(), EventType::LightGroup);
        assert_eq!(EventType::iter().count(), 13);
        assert!(EventType::from_str("valve").is_err());
    }

    #[test]
    fn test_decode_pump_with_id() {
        let env = Envelope::decode("pump", json!({"id": 5, "rpm": 2400})).unwrap();
        assert_eq!(env.event_type, EventType::Pump);
        assert_eq!(env.entity_id, Some(5));
        match env.payload {
            Payload::Pump(p) => assert_eq!(p.rpm, Some(2400.0)),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_decode_strips_reserved_event_key() {
        let env = Envelope::decode("temps", json!({"event": "temps", "air": 70.0})).unwrap();
        assert_eq!(env.entity_id, None);
        match env.payload {
            Payload::Temps(t) => {
                assert!(!t.readings.contains_key("event"));
                assert_eq!(t.reading("air"), Some(70.0));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_decode_feature_shares_circuit_shape() {
        let env = Envelope::decode("feature", json!({"id": 129, "isOn": true})).unwrap();
        assert_eq!(env.event_type, EventType::Feature);
        assert!(matches!(env.payload, Payload::Circuit(ref c) if c.is_on == Some(true)));
    }

    #[test]
    fn test_decode_unknown_event() {
        let err = Envelope::decode("valve", json!({"id": 1})).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownEvent(name) if name == "valve"));
    }

    #[test]
    fn test_decode_rejects_wire_availability() {
        let err = Envelope::decode("availability", json!({"available": false})).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownEvent(name) if name == "availability"));
    }

    #[test]
    fn test_decode_keeps_valid_fields_next_to_malformed_one() {
        let env = Envelope::decode("pump", json!({"id": 5, "rpm": 2400, "status": "fault"})).unwrap();
        assert_eq!(env.entity_id, Some(5));
        match env.payload {
            Payload::Pump(p) => {
                assert_eq!(p.rpm, Some(2400.0));
                assert_eq!(p.status, None);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_decode_without_id() {
        let env = Envelope::decode("circuit", json!({"isOn": false})).unwrap();
        assert_eq!(env.entity_id, None);
    }
}
