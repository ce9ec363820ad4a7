use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Controller returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Socket.IO protocol error: {0}")]
    Protocol(String),

    #[error("Socket.IO connect rejected: {0}")]
    ConnectRejected(String),

    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(std::time::Duration),

    #[error("No traffic from controller for {0:?}")]
    PingTimeout(std::time::Duration),

    #[error("Connection closed by controller")]
    ConnectionClosed,

    #[error("Unknown event type: {0}")]
    UnknownEvent(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
