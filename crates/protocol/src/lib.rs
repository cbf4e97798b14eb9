//! Shared constants and wire types for the venom gateway.
//!
//! Two wire surfaces live here: the defaults the HTTP gateway exposes, and the
//! newline-delimited JSON-RPC 2.0 frames spoken with the browser bridge
//! process (see `venom-whatsapp`'s `bridge` module).

use serde::{Deserialize, Serialize};

// ── Defaults ─────────────────────────────────────────────────────────────────

pub const DEFAULT_PORT: u16 = 3371;
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Rolling throttle window.
pub const RATE_WINDOW_MS: u64 = 60_000;
/// Requests allowed per address per window.
pub const RATE_MAX: u32 = 30;

/// Fixed delay before re-initializing a failed session.
pub const RECONNECT_DELAY_MS: u64 = 5_000;

/// Upper bound on a single upstream call made on behalf of an HTTP request.
pub const UPSTREAM_TIMEOUT_MS: u64 = 15_000;

/// Upper bound on a single bridge RPC round trip.
pub const BRIDGE_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Suffix the chat network uses for individual contacts.
pub const CONTACT_SUFFIX: &str = "@c.us";

/// Image service used by the pairing page.
pub const PAIRING_IMAGE_URL: &str = "https://api.qrserver.com/v1/create-qr-code/";

// ── Bridge methods ───────────────────────────────────────────────────────────

pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const GET_INFO: &str = "getInfo";
    pub const IS_REGISTERED_USER: &str = "isRegisteredUser";
    pub const SEND_MESSAGE: &str = "sendMessage";
}

/// Notifications pushed by the bridge.
pub mod notifications {
    pub const QR: &str = "qr";
    pub const READY: &str = "ready";
    pub const DISCONNECTED: &str = "disconnected";
    pub const AUTH_FAILURE: &str = "auth_failure";
}

// ── JSON-RPC frames ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// Anything the bridge may write on a line of stdout.
///
/// Responses are tried first because a notification never carries an `id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BridgeFrame {
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
}
