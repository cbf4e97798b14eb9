use std::{sync::Arc, time::Duration};

use {
    serde::Deserialize,
    tracing::{debug, warn},
    venom_channels::{ChatSessionClient, ClientError, DeliveryReceipt, RecipientId},
};

use crate::upstream::bounded;

/// Body of an outbound send request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("number and message are required")]
    Validation,

    #[error("number is not registered")]
    NotRegistered { recipient: RecipientId },

    /// Upstream call failed; carries the upstream message.
    #[error("{0}")]
    Upstream(String),
}

impl From<ClientError> for DispatchError {
    fn from(e: ClientError) -> Self {
        Self::Upstream(e.to_string())
    }
}

/// A message the upstream accepted.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub recipient: RecipientId,
    pub receipt: DeliveryReceipt,
}

/// Validates outbound sends and forwards them to the session client.
pub struct MessageDispatcher {
    client: Arc<dyn ChatSessionClient>,
    timeout: Duration,
}

impl MessageDispatcher {
    pub fn new(client: Arc<dyn ChatSessionClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Registration check then send: two round trips, no retry.
    pub async fn dispatch(&self, request: SendRequest) -> Result<Dispatched, DispatchError> {
        let (Some(number), Some(message)) = (request.number, request.message) else {
            return Err(DispatchError::Validation);
        };
        if number.is_empty() || message.is_empty() {
            return Err(DispatchError::Validation);
        }

        let recipient = RecipientId::normalize(&number);

        let registered = bounded(self.timeout, self.client.is_registered(&recipient)).await?;
        if !registered {
            warn!(recipient = %recipient, "recipient is not registered");
            return Err(DispatchError::NotRegistered { recipient });
        }

        let receipt = bounded(self.timeout, self.client.send(&recipient, &message)).await?;
        debug!(recipient = %recipient, receipt = %receipt, "message sent");

        Ok(Dispatched { recipient, receipt })
    }
}
