//! Connection manager for a nodejs-PoolController instance.
//!
//! Owns the reconnecting push session (Socket.IO over websocket) and the
//! REST client used for commands and configuration lookups. Inbound events
//! are normalized into [`Envelope`]s and sent over an mpsc channel to the
//! dispatcher.

mod backoff;
pub mod packet;
pub mod rest;
mod session;

pub use backoff::ExponentialBackoff;
pub use rest::RestClient;

use crate::config::Config;
use crate::entity::CommandSink;
use crate::error::Result;
use crate::events::Envelope;
use log::{info, warn};
use parking_lot::Mutex;
use serde_json::Value;
use session::Session;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Persistent, auto-reconnecting link to one controller.
pub struct ConnectionManager {
    config: Config,
    rest: Arc<RestClient>,
    tx: mpsc::Sender<Envelope>,
    running: Mutex<Option<Running>>,
    attempts: Arc<AtomicU64>,
}

impl ConnectionManager {
    /// Create a manager that delivers envelopes to `tx`.
    pub fn new(config: Config, tx: mpsc::Sender<Envelope>) -> Result<Self> {
        let rest = Arc::new(RestClient::new(&config.controller)?);
        Ok(Self {
            config,
            rest,
            tx,
            running: Mutex::new(None),
            attempts: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Shared REST client, handed to entities as their command sink.
    pub fn rest(&self) -> Arc<RestClient> {
        self.rest.clone()
    }

    /// Number of connection attempts made so far, successful or not.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Start the push session in the background. Reconnects forever until
    /// [`disconnect`](Self::disconnect) is called.
    pub fn connect(&self) {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            info!("[Socket] Session already running");
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_session_loop(
            self.config.clone(),
            self.tx.clone(),
            cancel.clone(),
            self.attempts.clone(),
        ));
        *running = Some(Running { cancel, handle });
    }

    /// Stop the push session and wait for it to wind down. Safe to call
    /// repeatedly.
    pub async fn disconnect(&self) {
        let running = self.running.lock().take();
        let Some(running) = running else {
            return;
        };
        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            warn!("[Socket] Session task ended abnormally: {}", e);
        }
        info!("[Socket] Disconnected");
    }

    /// Fire-and-forget REST write. Failures are logged, never returned.
    pub async fn command(&self, path: &str, payload: Value) {
        self.rest.command(path, payload).await;
    }

    /// REST read. `None` after logging on any failure.
    pub async fn fetch_snapshot(&self, path: &str) -> Option<Value> {
        self.rest.fetch(path).await
    }
}

async fn run_session_loop(
    config: Config,
    tx: mpsc::Sender<Envelope>,
    cancel: CancellationToken,
    attempts: Arc<AtomicU64>,
) {
    let url = config.controller.socket_url();
    let mut backoff = ExponentialBackoff::new(
        config.reconnect.min_delay(),
        config.reconnect.max_delay(),
    )
    .with_jitter(config.reconnect.jitter);

    info!("[Socket] Starting push session for {}", url);

    loop {
        attempts.fetch_add(1, Ordering::SeqCst);
        let mut session = Session::new(&url, &tx, &cancel);
        let result = session.run().await;
        if session.was_connected() {
            backoff.reset();
        }

        match result {
            Ok(()) => {
                if session.was_connected() {
                    let _ = tx.send(Envelope::availability(false)).await;
                }
                break;
            }
            Err(e) => {
                warn!("[Socket] Session to {} ended: {}", url, e);
                if tx.send(Envelope::availability(false)).await.is_err() {
                    break;
                }
            }
        }

        let delay = backoff.next_delay();
        backoff.bump();
        info!(
            "[Socket] Reconnecting in {:?} (attempt {})",
            delay,
            backoff.attempts()
        );
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    info!("[Socket] Push session stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventType, Payload};
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    fn test_config(port: u16) -> Config {
        let mut config = Config::default();
        config.controller.port = port;
        config.reconnect.min_delay_ms = 1;
        config.reconnect.max_delay_ms = 5;
        config
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_reconnects_without_giving_up() {
        let port = closed_port().await;
        let (tx, mut rx) = mpsc::channel(64);
        let manager = ConnectionManager::new(test_config(port), tx).unwrap();

        manager.connect();
        // Second call is a no-op
        manager.connect();

        let mut unavailable = 0;
        while unavailable < 5 {
            let envelope = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("no availability envelope")
                .expect("channel closed");
            assert_eq!(envelope, Envelope::availability(false));
            unavailable += 1;
        }
        assert!(manager.attempts() >= 5);
        assert!(manager.is_running());

        manager.disconnect().await;
        manager.disconnect().await;
        assert!(!manager.is_running());
    }

    async fn recv(rx: &mut mpsc::Receiver<Envelope>) -> Envelope {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no envelope")
            .expect("channel closed")
    }

    fn text(s: &str) -> Message {
        Message::Text(s.to_string().into())
    }

    /// Minimal Socket.IO server: handshake, one ping, one event, then close.
    async fn fake_controller() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(text(
                r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#,
            ))
            .await
            .unwrap();

            let connect = ws.next().await.unwrap().unwrap();
            assert_eq!(connect.to_text().unwrap(), "40");
            ws.send(text(r#"40{"sid":"n1"}"#)).await.unwrap();

            ws.send(text("2")).await.unwrap();
            let pong = ws.next().await.unwrap().unwrap();
            assert_eq!(pong.to_text().unwrap(), "3");

            ws.send(text(r#"42["unknownThing",{"id":1}]"#)).await.unwrap();
            ws.send(text(r#"42["pump",{"id":5,"rpm":2400}]"#)).await.unwrap();
            let _ = ws.close(None).await;
        });
        port
    }

    #[tokio::test]
    async fn test_session_delivers_events_and_availability() {
        let port = fake_controller().await;
        let (tx, mut rx) = mpsc::channel(64);
        let manager = ConnectionManager::new(test_config(port), tx).unwrap();
        manager.connect();

        assert_eq!(recv(&mut rx).await, Envelope::availability(true));
        let pump = recv(&mut rx).await;
        assert_eq!(pump.event_type, EventType::Pump);
        assert_eq!(pump.entity_id, Some(5));
        assert!(matches!(pump.payload, Payload::Pump(ref p) if p.rpm == Some(2400.0)));
        // Server hung up
        assert_eq!(recv(&mut rx).await, Envelope::availability(false));

        manager.disconnect().await;
    }

    async fn handshake(
        listener: &TcpListener,
        ping_interval: u64,
        ping_timeout: u64,
    ) -> tokio_tungstenite::WebSocketStream<tokio::net::TcpStream> {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(text(&format!(
            r#"0{{"sid":"s1","upgrades":[],"pingInterval":{},"pingTimeout":{}}}"#,
            ping_interval, ping_timeout
        )))
        .await
        .unwrap();
        let connect = ws.next().await.unwrap().unwrap();
        assert_eq!(connect.to_text().unwrap(), "40");
        ws.send(text(r#"40{"sid":"n1"}"#)).await.unwrap();
        ws
    }

    /// Refused upgrade, then a silent server, then an engine close.
    async fn flaky_controller() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);

            // Never pings, so the client's liveness window runs out
            let silent = handshake(&listener, 100, 100).await;
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                drop(silent);
            });

            let mut ws = handshake(&listener, 25000, 20000).await;
            ws.send(text("1")).await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        port
    }

    #[tokio::test]
    async fn test_availability_across_reconnects() {
        let port = flaky_controller().await;
        let mut config = test_config(port);
        config.reconnect.min_delay_ms = 300;
        config.reconnect.max_delay_ms = 10_000;
        config.reconnect.jitter = false;
        let (tx, mut rx) = mpsc::channel(64);
        let manager = ConnectionManager::new(config, tx).unwrap();
        manager.connect();

        // Upgrade refused
        assert_eq!(recv(&mut rx).await, Envelope::availability(false));
        assert_eq!(recv(&mut rx).await, Envelope::availability(true));
        // Liveness window expired
        assert_eq!(recv(&mut rx).await, Envelope::availability(false));
        let dropped = tokio::time::Instant::now();

        assert_eq!(recv(&mut rx).await, Envelope::availability(true));
        // A connected session resets the delay to the minimum instead of doubling it
        let waited = dropped.elapsed();
        assert!(waited >= Duration::from_millis(250), "reconnected after {:?}", waited);
        assert!(waited < Duration::from_millis(550), "reconnected after {:?}", waited);

        // Engine close packet
        assert_eq!(recv(&mut rx).await, Envelope::availability(false));
        assert!(manager.attempts() >= 3);

        manager.disconnect().await;
    }
}
