use tokio::sync::mpsc;

/// Lifecycle notifications pushed by a chat session client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A fresh pairing code is waiting to be scanned.
    PairingCodeIssued { code: String },
    /// The session is paired and usable.
    SessionReady,
    /// The session dropped.
    SessionDisconnected { reason: String },
    /// Stored credentials were rejected.
    AuthenticationFailed { message: String },
}

impl LifecycleEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PairingCodeIssued { .. } => "pairing_code_issued",
            Self::SessionReady => "session_ready",
            Self::SessionDisconnected { .. } => "session_disconnected",
            Self::AuthenticationFailed { .. } => "authentication_failed",
        }
    }
}

pub type LifecycleSender = mpsc::UnboundedSender<LifecycleEvent>;
pub type LifecycleReceiver = mpsc::UnboundedReceiver<LifecycleEvent>;

/// Create the channel a client pushes its lifecycle events into.
pub fn lifecycle_channel() -> (LifecycleSender, LifecycleReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (tx, mut rx) = lifecycle_channel();
        tx.send(LifecycleEvent::PairingCodeIssued { code: "a".into() })
            .unwrap();
        tx.send(LifecycleEvent::SessionReady).unwrap();

        assert_eq!(rx.recv().await.unwrap().kind(), "pairing_code_issued");
        assert_eq!(rx.recv().await.unwrap(), LifecycleEvent::SessionReady);
    }
}
