use std::fmt;

use {serde::Serialize, tokio::sync::RwLock};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Uninitialized,
    AwaitingPairing,
    Ready,
    Disconnected,
    AuthFailed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::AwaitingPairing => "awaiting_pairing",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
            Self::AuthFailed => "auth_failed",
        }
    }

    /// Disconnected or failed authentication.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Disconnected | Self::AuthFailed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only projection handed to HTTP handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStatus {
    pub state: SessionState,
    pub ready: bool,
    pub disconnected: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct StateInner {
    state: SessionState,
    disconnected: bool,
    last_error: Option<String>,
}

/// Current lifecycle state plus the last failure reason.
///
/// Mutators are crate-private: only the session manager's event loop writes.
#[derive(Debug, Default)]
pub struct SessionStateStore {
    inner: RwLock<StateInner>,
}

impl SessionStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> SessionState {
        self.inner.read().await.state
    }

    pub async fn status(&self) -> ClientStatus {
        let inner = self.inner.read().await;
        ClientStatus {
            state: inner.state,
            ready: inner.state == SessionState::Ready,
            disconnected: inner.disconnected,
            last_error: inner.last_error.clone(),
        }
    }

    /// A pairing code never demotes a ready session.
    pub(crate) async fn on_pairing_code(&self) -> SessionState {
        let mut inner = self.inner.write().await;
        if inner.state != SessionState::Ready {
            inner.state = SessionState::AwaitingPairing;
        }
        inner.state
    }

    pub(crate) async fn on_ready(&self) {
        let mut inner = self.inner.write().await;
        inner.state = SessionState::Ready;
        inner.disconnected = false;
    }

    pub(crate) async fn on_disconnected(&self, reason: String) {
        let mut inner = self.inner.write().await;
        inner.state = SessionState::Disconnected;
        inner.disconnected = true;
        inner.last_error = Some(reason);
    }

    pub(crate) async fn on_auth_failed(&self, message: String) {
        let mut inner = self.inner.write().await;
        inner.state = SessionState::AuthFailed;
        inner.last_error = Some(message);
    }
}
