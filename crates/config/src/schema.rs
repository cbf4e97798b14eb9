/// Config schema types (server, throttle, session, bridge).
use std::{collections::HashMap, path::PathBuf, time::Duration};

use {
    anyhow::bail,
    secrecy::Secret,
    serde::Deserialize,
    venom_protocol::{
        DEFAULT_BIND, DEFAULT_PORT, PAIRING_IMAGE_URL, RATE_MAX, RATE_WINDOW_MS,
        RECONNECT_DELAY_MS, UPSTREAM_TIMEOUT_MS,
    },
};

/// Root configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VenomConfig {
    pub server: ServerConfig,
    pub throttle: ThrottleConfig,
    pub session: SessionConfig,
    pub bridge: BridgeConfig,
}

/// HTTP listener and credentials.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Shared secret every request must carry in `x-api-key`.
    pub api_key: Option<Secret<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.into(),
            port: DEFAULT_PORT,
            api_key: None,
        }
    }
}

/// Per-address request throttle.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub window_ms: u64,
    pub max_requests: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            window_ms: RATE_WINDOW_MS,
            max_requests: RATE_MAX,
        }
    }
}

impl ThrottleConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// A zero window or cap would turn throttling off.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.window_ms == 0 {
            bail!("throttle.window_ms must be greater than zero");
        }
        if self.max_requests == 0 {
            bail!("throttle.max_requests must be greater than zero");
        }
        Ok(())
    }
}

/// Session recovery and upstream call policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub reconnect_delay_ms: u64,
    /// `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
    pub upstream_timeout_ms: u64,
    /// Render each pairing code as a QR code on stderr.
    pub print_pairing_qr: bool,
    /// Image service the pairing page links to.
    pub pairing_image_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: RECONNECT_DELAY_MS,
            max_reconnect_attempts: None,
            upstream_timeout_ms: UPSTREAM_TIMEOUT_MS,
            print_pairing_qr: true,
            pairing_image_url: PAIRING_IMAGE_URL.into(),
        }
    }
}

impl SessionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

/// Browser bridge process the session client drives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    /// Where the bridge keeps session credentials. Opaque to the gateway.
    pub session_dir: PathBuf,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: "node".into(),
            args: vec!["bridge.js".into()],
            env: HashMap::new(),
            session_dir: PathBuf::from("sessions"),
        }
    }
}
