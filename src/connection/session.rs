//! One Socket.IO session over a websocket, from handshake to disconnect.

use super::packet::{EnginePacket, OpenHandshake, SocketPacket, connect_request};
use crate::error::{BridgeError, Result};
use crate::events::Envelope;
use futures_util::{SinkExt, Stream, StreamExt};
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

/// Time allowed between opening the socket and the Engine.IO handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Session<'a> {
    url: &'a str,
    tx: &'a mpsc::Sender<Envelope>,
    cancel: &'a CancellationToken,
    connected: bool,
}

impl<'a> Session<'a> {
    pub fn new(url: &'a str, tx: &'a mpsc::Sender<Envelope>, cancel: &'a CancellationToken) -> Self {
        Self {
            url,
            tx,
            cancel,
            connected: false,
        }
    }

    /// Whether the server acknowledged the Socket.IO connect during this session.
    pub fn was_connected(&self) -> bool {
        self.connected
    }

    /// Run until cancelled (`Ok`) or until the transport fails (`Err`).
    ///
    /// Publishes `availability: true` once the server accepts the connect
    /// request; the caller owns the `false` side.
    pub async fn run(&mut self) -> Result<()> {
        debug!("[Socket] Connecting to {}", self.url);
        let (ws_stream, _) = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            result = connect_async(self.url) => result?,
        };
        let (mut write, mut read) = ws_stream.split();

        let handshake = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            result = tokio::time::timeout(HANDSHAKE_TIMEOUT, Self::await_open(&mut read)) => {
                result.map_err(|_| BridgeError::HandshakeTimeout(HANDSHAKE_TIMEOUT))??
            }
        };
        debug!(
            "[Socket] Engine.IO open sid={} ping={}ms/{}ms",
            handshake.sid, handshake.ping_interval, handshake.ping_timeout
        );
        write.send(Message::Text(connect_request().into())).await?;

        let window = handshake.liveness_window();
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = write.send(Message::Text(EnginePacket::Message("1".to_string()).encode().into())).await;
                    let _ = write.close().await;
                    return Ok(());
                }
                next = tokio::time::timeout(window, read.next()) => next,
            };

            let msg = match next {
                Err(_) => return Err(BridgeError::PingTimeout(window)),
                Ok(None) => return Err(BridgeError::ConnectionClosed),
                Ok(Some(msg)) => msg?,
            };

            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => return Err(BridgeError::ConnectionClosed),
                _ => continue,
            };

            match EnginePacket::parse(text.as_str()) {
                Ok(EnginePacket::Ping(data)) => {
                    write
                        .send(Message::Text(EnginePacket::Pong(data).encode().into()))
                        .await?;
                }
                Ok(EnginePacket::Message(body)) => {
                    if !self.handle_message(&body).await? {
                        return Ok(());
                    }
                }
                Ok(EnginePacket::Close) => return Err(BridgeError::ConnectionClosed),
                Ok(_) => {}
                Err(e) => warn!("[Socket] Ignoring malformed packet: {}", e),
            }
        }
    }

    async fn await_open<S>(read: &mut S) -> Result<OpenHandshake>
    where
        S: Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        while let Some(msg) = read.next().await {
            if let Message::Text(text) = msg?
                && let EnginePacket::Open(handshake) = EnginePacket::parse(text.as_str())?
            {
                return Ok(handshake);
            }
        }
        Err(BridgeError::ConnectionClosed)
    }

    /// Handle one Socket.IO packet. Returns `false` when the envelope channel
    /// is gone and the session should stop.
    async fn handle_message(&mut self, body: &str) -> Result<bool> {
        let packet = match SocketPacket::parse(body) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("[Socket] Ignoring malformed Socket.IO packet: {}", e);
                return Ok(true);
            }
        };

        let envelope = match packet {
            SocketPacket::Connect(_) => {
                info!("[Socket] Connected to {}", self.url);
                self.connected = true;
                Envelope::availability(true)
            }
            SocketPacket::ConnectError(data) => {
                return Err(BridgeError::ConnectRejected(data.to_string()));
            }
            SocketPacket::Disconnect => return Err(BridgeError::ConnectionClosed),
            SocketPacket::Ack => return Ok(true),
            SocketPacket::Event { name, data } => match Envelope::decode(&name, data) {
                Ok(envelope) => envelope,
                Err(BridgeError::UnknownEvent(name)) => {
                    debug!("[Socket] Ignoring event '{}'", name);
                    return Ok(true);
                }
                Err(e) => {
                    warn!("[Socket] Dropping undecodable '{}' event: {}", name, e);
                    return Ok(true);
                }
            },
        };

        if self.tx.send(envelope).await.is_err() {
            error!("[Socket] Envelope channel closed");
            return Ok(false);
        }
        Ok(true)
    }
}
