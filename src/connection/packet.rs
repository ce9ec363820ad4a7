//! Engine.IO v4 / Socket.IO v4 text packet codec.
//!
//! Only the subset the controller speaks over a websocket transport is
//! handled: no binary attachments and no polling upgrade.

use crate::error::{BridgeError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Handshake sent by the server in the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

impl OpenHandshake {
    /// How long the session may stay silent before it is considered dead.
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn parse(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| BridgeError::Protocol("empty Engine.IO packet".to_string()))?;
        let data = chars.as_str();

        match kind {
            '0' => Ok(Self::Open(serde_json::from_str(data)?)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(data.to_string())),
            '3' => Ok(Self::Pong(data.to_string())),
            '4' => Ok(Self::Message(data.to_string())),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(BridgeError::Protocol(format!(
                "unknown Engine.IO packet type '{}'",
                other
            ))),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Open(_) => "0".to_string(),
            Self::Close => "1".to_string(),
            Self::Ping(data) => format!("2{}", data),
            Self::Pong(data) => format!("3{}", data),
            Self::Message(data) => format!("4{}", data),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Value),
    Disconnect,
    Event { name: String, data: Value },
    Ack,
    ConnectError(Value),
}

impl SocketPacket {
    /// Parse the body of an Engine.IO `message` packet.
    pub fn parse(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| BridgeError::Protocol("empty Socket.IO packet".to_string()))?;
        let mut rest = chars.as_str();

        // Optional namespace: "/admin,"
        if rest.starts_with('/') {
            rest = match rest.find(',') {
                Some(idx) => &rest[idx + 1..],
                None => "",
            };
        }

        // Optional ack id
        let ack_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        rest = &rest[ack_len..];

        let body = || -> Result<Value> {
            if rest.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(serde_json::from_str(rest)?)
            }
        };

        match kind {
            '0' => Ok(Self::Connect(body()?)),
            '1' => Ok(Self::Disconnect),
            '2' => {
                let Value::Array(mut args) = body()? else {
                    return Err(BridgeError::Protocol(format!(
                        "event packet is not an array: {}",
                        rest
                    )));
                };
                if args.is_empty() {
                    return Err(BridgeError::Protocol("event packet without name".to_string()));
                }
                let name = match args.remove(0) {
                    Value::String(name) => name,
                    other => {
                        return Err(BridgeError::Protocol(format!(
                            "event name is not a string: {}",
                            other
                        )));
                    }
                };
                let data = if args.is_empty() {
                    Value::Null
                } else {
                    args.remove(0)
                };
                Ok(Self::Event { name, data })
            }
            '3' => Ok(Self::Ack),
            '4' => Ok(Self::ConnectError(body()?)),
            other => Err(BridgeError::Protocol(format!(
                "unsupported Socket.IO packet type '{}'",
                other
            ))),
        }
    }
}

/// Socket.IO connect request for the default namespace, wrapped in an
/// Engine.IO message.
pub fn connect_request() -> String {
    EnginePacket::Message("0".to_string()).encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_open() {
        let packet =
            EnginePacket::parse(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":5000}"#)
                .unwrap();
        let EnginePacket::Open(handshake) = packet else {
            panic!("expected open packet");
        };
        assert_eq!(handshake.sid, "abc");
        assert_eq!(handshake.liveness_window(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_ping_pong_echo() {
        let ping = EnginePacket::parse("2probe").unwrap();
        assert_eq!(ping, EnginePacket::Ping("probe".to_string()));
        let EnginePacket::Ping(data) = ping else {
            unreachable!()
        };
        assert_eq!(EnginePacket::Pong(data).encode(), "3probe");
        assert_eq!(EnginePacket::parse("2").unwrap(), EnginePacket::Ping(String::new()));
    }

    #[test]
    fn test_parse_event() {
        let packet = SocketPacket::parse(r#"2["pump",{"id":5,"rpm":2400}]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                name: "pump".to_string(),
                data: json!({"id": 5, "rpm": 2400})
            }
        );
    }

    #[test]
    fn test_parse_event_with_namespace_and_ack() {
        let packet = SocketPacket::parse(r#"2/,12["temps",{"air":70}]"#).unwrap();
        assert!(matches!(packet, SocketPacket::Event { ref name, .. } if name == "temps"));
    }

    #[test]
    fn test_parse_connect_and_errors() {
        assert_eq!(
            SocketPacket::parse(r#"0{"sid":"xyz"}"#).unwrap(),
            SocketPacket::Connect(json!({"sid": "xyz"}))
        );
        assert_eq!(
            SocketPacket::parse(r#"4{"message":"Not authorized"}"#).unwrap(),
            SocketPacket::ConnectError(json!({"message": "Not authorized"}))
        );
        assert_eq!(SocketPacket::parse("1").unwrap(), SocketPacket::Disconnect);
        assert!(SocketPacket::parse(r#"2{"not":"array"}"#).is_err());
        assert!(SocketPacket::parse("").is_err());
        assert!(EnginePacket::parse("9").is_err());
    }

    #[test]
    fn test_connect_request() {
        assert_eq!(connect_request(), "40");
    }
}
