//! REST side of the controller API: fire-and-forget commands and read-only
//! configuration fetches.

use crate::config::ControllerConfig;
use crate::entity::CommandSink;
use crate::error::{BridgeError, Result};
use crate::events::payload::ValDesc;
use crate::snapshot::Snapshot;
use async_trait::async_trait;
use log::{debug, error};
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

pub const STATE_ALL: &str = "state/all";
pub const CONFIG_HEATERS: &str = "config/options/heaters";

/// HTTP client for one controller.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    failures: AtomicU64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeaterConfig {
    #[serde(default)]
    body: Option<i64>,
    #[serde(default)]
    cooling_enabled: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct HeaterOptions {
    #[serde(default)]
    heaters: Vec<HeaterConfig>,
}

impl RestClient {
    pub fn new(config: &ControllerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self::with_client(http, config.base_url()))
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            failures: AtomicU64::new(0),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Number of commands that failed since this client was created.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Send a command and report the outcome. `command` wraps this for
    /// callers that only log.
    pub async fn try_command(&self, path: &str, payload: &Value) -> Result<()> {
        debug!("[REST] PUT {} {}", path, payload);
        let response = self.http.put(self.url(path)).json(payload).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(BridgeError::Status {
            status: status.as_u16(),
            body,
        })
    }

    pub async fn try_fetch(&self, path: &str) -> Result<Value> {
        debug!("[REST] GET {}", path);
        let response = self.http.get(self.url(path)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// GET a configuration or state document. Failures are logged and
    /// surface as `None`.
    pub async fn fetch(&self, path: &str) -> Option<Value> {
        match self.try_fetch(path).await {
            Ok(value) => Some(value),
            Err(e) => {
                error!("[REST] Fetch {} failed: {}", path, e);
                None
            }
        }
    }

    async fn fetch_as<T: serde::de::DeserializeOwned>(&self, path: &str) -> Option<T> {
        let value = self.fetch(path).await?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                error!("[REST] Unexpected response from {}: {}", path, e);
                None
            }
        }
    }

    pub async fn state_all(&self) -> Option<Snapshot> {
        self.fetch_as(STATE_ALL).await
    }

    /// Heat modes available to a body. Empty when the lookup fails.
    pub async fn heat_modes(&self, body_id: u32) -> Vec<ValDesc> {
        self.fetch_as(&format!("config/body/{}/heatModes", body_id))
            .await
            .unwrap_or_default()
    }

    pub async fn light_themes(&self, circuit_id: u32) -> Vec<ValDesc> {
        self.fetch_as(&format!("config/circuit/{}/lightThemes", circuit_id))
            .await
            .unwrap_or_default()
    }

    pub async fn light_commands(&self, circuit_id: u32) -> Vec<ValDesc> {
        self.fetch_as(&format!("config/circuit/{}/lightCommands", circuit_id))
            .await
            .unwrap_or_default()
    }

    /// Whether any heater serving this body has cooling enabled.
    pub async fn has_cooling(&self, body_id: u32) -> bool {
        self.fetch_as::<HeaterOptions>(CONFIG_HEATERS)
            .await
            .is_some_and(|options| heaters_cool_body(&options.heaters, body_id))
    }
}

/// Heater `body` 32 means shared; 0 is pool, 1 is spa. Any body other than 0
/// is served by spa or shared heaters.
fn heaters_cool_body(heaters: &[HeaterConfig], body_id: u32) -> bool {
    heaters.iter().any(|heater| {
        let serves = match (body_id, heater.body) {
            (0, Some(0 | 32)) => true,
            (0, _) => false,
            (_, Some(1 | 32)) => true,
            _ => false,
        };
        serves && heater.cooling_enabled == Some(Value::Bool(true))
    })
}

#[async_trait]
impl CommandSink for RestClient {
    async fn command(&self, path: &str, payload: Value) {
        if let Err(e) = self.try_command(path, &payload).await {
            self.failures.fetch_add(1, Ordering::SeqCst);
            error!("[REST] Command {} failed: {}", path, e);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve every connection with the same canned HTTP response.
    pub(crate) async fn canned_server(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        status_line,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}", addr)
    }

    fn client(base_url: String) -> RestClient {
        RestClient::with_client(reqwest::Client::new(), base_url)
    }

    #[tokio::test]
    async fn test_command_failure_is_counted_once() {
        let base = canned_server("500 Internal Server Error", r#"{"message":"boom"}"#).await;
        let rest = client(base);

        rest.command("state/circuit/setState", json!({"id": 6, "state": true}))
            .await;
        assert_eq!(rest.failures(), 1);

        let err = rest
            .try_command("state/circuit/setState", &json!({"id": 6}))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Status { status: 500, ref body } if body.contains("boom")));
        // try_command reports but does not count
        assert_eq!(rest.failures(), 1);
    }

    #[tokio::test]
    async fn test_command_success() {
        let base = canned_server("200 OK", "{}").await;
        let rest = client(base);
        tokio_test::assert_ok!(rest.try_command("state/feature/setState", &json!({"id": 129, "state": false})).await);
        rest.command("state/feature/setState", json!({"id": 129})).await;
        assert_eq!(rest.failures(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_none() {
        let rest = client("http://127.0.0.1:1".to_string());
        assert!(rest.fetch(STATE_ALL).await.is_none());
        assert!(rest.heat_modes(1).await.is_empty());
        assert!(!rest.has_cooling(0).await);
    }

    #[tokio::test]
    async fn test_heat_modes_decoded() {
        let base = canned_server(
            "200 OK",
            r#"[{"val":0,"name":"off","desc":"Off"},{"val":3,"name":"heater","desc":"Heater"}]"#,
        )
        .await;
        let modes = client(base).heat_modes(1).await;
        assert_eq!(modes.len(), 2);
        assert_eq!(modes[1].desc.as_deref(), Some("Heater"));
    }

    #[test]
    fn test_heaters_cool_body() {
        let heaters: Vec<HeaterConfig> = serde_json::from_value(json!([
            {"body": 1, "coolingEnabled": true},
            {"body": 0, "coolingEnabled": false},
            {"body": 0}
        ]))
        .unwrap();
        assert!(!heaters_cool_body(&heaters, 0));
        assert!(heaters_cool_body(&heaters, 1));
        assert!(heaters_cool_body(&heaters, 2));

        let shared: Vec<HeaterConfig> =
            serde_json::from_value(json!([{"body": 32, "coolingEnabled": true}])).unwrap();
        assert!(heaters_cool_body(&shared, 0));

        let truthy: Vec<HeaterConfig> =
            serde_json::from_value(json!([{"body": 0, "coolingEnabled": "yes"}])).unwrap();
        assert!(!heaters_cool_body(&truthy, 0));
    }

    #[test]
    fn test_url_join() {
        let rest = client("http://pool.local:4200/".to_string());
        assert_eq!(rest.url("/state/all"), "http://pool.local:4200/state/all");
    }
}
