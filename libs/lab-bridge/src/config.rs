use std::time::Duration;

use serde::Deserialize;

use crate::error::BridgeError;

// ═══════════════════════════════════════════════════════════════
//  BridgeConfig
// ═══════════════════════════════════════════════════════════════

/// Endpoints and secrets for every side channel.
///
/// Sources: `BridgeConfig::default()`, a TOML file (`load`) or the
/// process environment (`from_env`).
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_memory_url")]
    pub memory_url: String,
    #[serde(default = "default_presign_url")]
    pub presign_url: String,
    /// Bearer secret for the presign gateway. Absent disables archiving.
    #[serde(default)]
    pub presign_secret: Option<String>,
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Timeout for small JSON calls, seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    /// Timeout for the CSV upload, seconds.
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_memory_url() -> String {
    "http://localhost:8096".into()
}
fn default_presign_url() -> String {
    "http://localhost:8088".into()
}
fn default_nats_url() -> String {
    "nats://localhost:4222".into()
}
fn default_metrics_port() -> u16 {
    8201
}
fn default_bind_addr() -> String {
    "0.0.0.0".into()
}
fn default_http_timeout() -> u64 {
    10
}
fn default_upload_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    10
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            memory_url: default_memory_url(),
            presign_url: default_presign_url(),
            presign_secret: None,
            nats_url: default_nats_url(),
            metrics_port: default_metrics_port(),
            bind_addr: default_bind_addr(),
            http_timeout_secs: default_http_timeout(),
            upload_timeout_secs: default_upload_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, BridgeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the
    /// well-known variable names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BridgeError> {
        let mut cfg = Self::default();
        if let Some(v) = lookup("CIPHER_MEMORY_URL") {
            cfg.memory_url = v;
        }
        if let Some(v) = lookup("PRESIGN_URL") {
            cfg.presign_url = v;
        }
        cfg.presign_secret = lookup("PRESIGN_SHARED_SECRET");
        if let Some(v) = lookup("NATS_URL") {
            cfg.nats_url = v;
        }
        if let Some(v) = lookup("METRICS_PORT") {
            cfg.metrics_port = v.trim().parse().map_err(|e| BridgeError::Config {
                context: "METRICS_PORT",
                detail: format!("'{v}': {e}"),
            })?;
        }
        Ok(cfg.normalized())
    }

    pub fn load(path: &str) -> Result<Self, BridgeError> {
        let content = std::fs::read_to_string(path).map_err(|e| BridgeError::Config {
            context: "read",
            detail: format!("'{path}': {e}"),
        })?;
        let cfg: Self = toml::from_str(&content).map_err(|e| BridgeError::Config {
            context: "parse",
            detail: format!("'{path}': {e}"),
        })?;
        Ok(cfg.normalized())
    }

    /// Empty secret means "not set".
    fn normalized(mut self) -> Self {
        if self.presign_secret.as_deref().is_some_and(|s| s.is_empty()) {
            self.presign_secret = None;
        }
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
