use std::time::Duration;

/// Failures reported by a [`crate::ChatSessionClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("chat client is not started")]
    NotStarted,

    /// The upstream answered with an error; `message` is its own text.
    #[error("{message}")]
    Rpc { code: i64, message: String },

    #[error("chat client transport error: {0}")]
    Transport(String),

    #[error("chat client request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("unexpected chat client response: {0}")]
    Protocol(String),
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_error_displays_upstream_text_only() {
        let err = ClientError::Rpc {
            code: -32000,
            message: "Evaluation failed: detached frame".into(),
        };
        assert_eq!(err.to_string(), "Evaluation failed: detached frame");
    }

    #[test]
    fn timeout_reports_millis() {
        let err = ClientError::Timeout(Duration::from_secs(15));
        assert_eq!(err.to_string(), "chat client request timed out after 15000ms");
    }
}
