use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            pairs.push((key, value));
        }
    }

    pairs
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub controller: ControllerConfig,
    pub reconnect: ReconnectConfig,
}

/// Where the nodejs-PoolController instance lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub host: String,
    pub port: u16,
    pub http_timeout_secs: u64,
}

/// Backoff window for the push session. Retries are unlimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl ControllerConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn socket_url(&self) -> String {
        format!(
            "ws://{}:{}/socket.io/?EIO=4&transport=websocket",
            self.host, self.port
        )
    }

    /// Identifier derived from host and port, used as the prefix of every
    /// entity unique id (`10.0.0.5:4200` becomes `10005` + `4200`).
    pub fn controller_id(&self) -> String {
        format!("{}{}", self.host.replace('.', ""), self.port)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl ReconnectConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms.max(self.min_delay_ms))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            controller: ControllerConfig {
                host: "127.0.0.1".to_string(),
                port: 4200,
                http_timeout_secs: 10,
            },
            reconnect: ReconnectConfig {
                min_delay_ms: 1_000,
                max_delay_ms: 10_000,
                jitter: true,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults
    /// for missing or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("NJSPC_HOST") {
            config.controller.host = host;
        }
        if let Some(port) = lookup("NJSPC_PORT")
            && let Ok(p) = port.parse()
        {
            config.controller.port = p;
        }
        if let Some(timeout) = lookup("NJSPC_HTTP_TIMEOUT_SECS")
            && let Ok(t) = timeout.parse()
        {
            config.controller.http_timeout_secs = t;
        }

        // Reconnect backoff
        if let Some(min) = lookup("NJSPC_RECONNECT_MIN_MS")
            && let Ok(m) = min.parse()
        {
            config.reconnect.min_delay_ms = m;
        }
        if let Some(max) = lookup("NJSPC_RECONNECT_MAX_MS")
            && let Ok(m) = max.parse()
        {
            config.reconnect.max_delay_ms = m;
        }
        if let Some(jitter) = lookup("NJSPC_RECONNECT_JITTER")
            && let Ok(j) = jitter.parse()
        {
            config.reconnect.jitter = j;
        }

        config
    }
}
