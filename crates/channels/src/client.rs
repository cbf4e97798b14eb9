use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

use crate::{error::ClientError, recipient::RecipientId};

/// Whatever the upstream returns for a delivered message. Relayed verbatim.
pub type DeliveryReceipt = Value;

/// Account details of the paired session.
///
/// Only the fields the gateway reads are typed; everything else the client
/// reports is kept in `extra` and serialized back out unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub pushname: Option<String>,
    #[serde(default)]
    pub wid: Option<Value>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Handle to the remote chat session.
///
/// Implementations push lifecycle events through the sender they were built
/// with; the calls below are plain request/response round trips.
#[async_trait]
pub trait ChatSessionClient: Send + Sync {
    /// Start (or restart) the session. Returns once the start request was
    /// accepted; readiness is reported later as a lifecycle event.
    async fn initialize(&self) -> Result<(), ClientError>;

    /// Account details for the paired session.
    async fn account_info(&self) -> Result<AccountInfo, ClientError>;

    /// Whether the recipient has an account on the network.
    async fn is_registered(&self, recipient: &RecipientId) -> Result<bool, ClientError>;

    /// Deliver a text message.
    async fn send(
        &self,
        recipient: &RecipientId,
        text: &str,
    ) -> Result<DeliveryReceipt, ClientError>;

    /// Stop the session and release its resources.
    async fn shutdown(&self) {}
}
