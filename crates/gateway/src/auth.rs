use std::sync::Arc;

use {
    axum::{
        extract::{Request, State},
        http::HeaderMap,
        middleware::Next,
        response::{IntoResponse, Response},
    },
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
    venom_protocol::API_KEY_HEADER,
};

use crate::error::ApiError;

// ── Types ────────────────────────────────────────────────────────────────────

/// Shared-secret check applied to every route.
pub struct AuthGate {
    key: Secret<String>,
}

impl AuthGate {
    pub fn new(key: Secret<String>) -> Self {
        Self { key }
    }

    /// True when `presented` matches the configured key byte for byte.
    pub fn admits(&self, presented: Option<&[u8]>) -> bool {
        presented.is_some_and(|given| safe_equal(given, self.key.expose_secret().as_bytes()))
    }

    pub fn admits_headers(&self, headers: &HeaderMap) -> bool {
        self.admits(headers.get(API_KEY_HEADER).map(|v| v.as_bytes()))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Constant-time comparison (prevents timing attacks).
fn safe_equal(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    // XOR each byte and accumulate; any difference makes result non-zero.
    let diff = a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

// ── Middleware ───────────────────────────────────────────────────────────────

pub async fn require_api_key(
    State(gate): State<Arc<AuthGate>>,
    request: Request,
    next: Next,
) -> Response {
    if gate.admits_headers(request.headers()) {
        next.run(request).await
    } else {
        debug!(path = %request.uri().path(), "rejected request with invalid api key");
        ApiError::Forbidden.into_response()
    }
}
