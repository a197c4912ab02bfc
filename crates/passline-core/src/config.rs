use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Realtime protocol constants — shared by gateway and client.
pub const DEFAULT_PORT: u16 = 8090;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const REALTIME_PATH: &str = "/api/v1/realtime";
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024; // 64 KB hard cap per frame
pub const OUTBOUND_QUEUE_DEPTH: usize = 64; // per-connection send buffer

/// Replay cache: whichever limit is hit first wins.
pub const REPLAY_CAPACITY: usize = 50;
pub const REPLAY_TTL_SECS: i64 = 3600;

/// Health monitor thresholds.
pub const SWEEP_INTERVAL_SECS: u64 = 1;
pub const PROBE_AFTER_SECS: i64 = 60; // idle → send liveness probe
pub const CLOSE_AFTER_SECS: i64 = 300; // idle → force close

/// Client-side cadences.
pub const POLL_INTERVAL_SECS: u64 = 10;
pub const PENDING_MAX_AGE_SECS: i64 = 300; // optimistic mutation staleness GC
pub const UNDO_WINDOW_SECS: i64 = 10;

/// Top-level config (passline.toml + PASSLINE_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasslineConfig {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    pub auth: AuthConfig,
}

/// Shared-secret settings for access-token verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC key used to sign and verify access tokens.
    pub token_secret: String,
}

/// Settings for the kitchen-display client library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the canonical order REST API.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Seconds between canonical snapshot polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for PasslineConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                port: DEFAULT_PORT,
                bind: DEFAULT_BIND.to_string(),
                auth: AuthConfig {
                    token_secret: "change-me".to_string(),
                },
            },
            client: ClientConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_api_base() -> String {
    format!("http://{}:{}", DEFAULT_BIND, DEFAULT_PORT)
}
fn default_poll_interval() -> u64 {
    POLL_INTERVAL_SECS
}

impl PasslineConfig {
    /// Load config from a TOML file with PASSLINE_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.passline/passline.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: PasslineConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PASSLINE_").split("_"))
            .extract()
            .map_err(|e| crate::error::PasslineError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.passline/passline.toml", home)
}
