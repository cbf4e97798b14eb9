use std::sync::Arc;

use {
    async_trait::async_trait,
    serde_json::json,
    tokio::sync::RwLock,
    tracing::info,
    venom_channels::{
        AccountInfo, ChatSessionClient, ClientError, DeliveryReceipt, LifecycleSender, RecipientId,
    },
    venom_config::BridgeConfig,
    venom_protocol::methods,
};

use super::transport::BridgeTransport;

/// Session client that drives the bridge process.
///
/// `initialize` replaces the running process; request calls go to whichever
/// process is current and fail with [`ClientError::NotStarted`] if none is.
pub struct BridgeClient {
    config: BridgeConfig,
    events: LifecycleSender,
    transport: RwLock<Option<Arc<BridgeTransport>>>,
}

impl BridgeClient {
    pub fn new(config: BridgeConfig, events: LifecycleSender) -> Self {
        Self {
            config,
            events,
            transport: RwLock::new(None),
        }
    }

    async fn current(&self) -> Result<Arc<BridgeTransport>, ClientError> {
        self.transport
            .read()
            .await
            .clone()
            .ok_or(ClientError::NotStarted)
    }
}

#[async_trait]
impl ChatSessionClient for BridgeClient {
    async fn initialize(&self) -> Result<(), ClientError> {
        let previous = self.transport.write().await.take();
        if let Some(previous) = previous {
            info!("stopping previous bridge process");
            previous.close().await;
        }

        let transport = BridgeTransport::spawn(
            &self.config.command,
            &self.config.args,
            &self.config.env,
            self.events.clone(),
        )
        .await?;
        *self.transport.write().await = Some(Arc::clone(&transport));

        let params = json!({ "sessionDir": self.config.session_dir.display().to_string() });
        if let Err(e) = transport.request(methods::INITIALIZE, Some(params)).await {
            transport.close().await;
            self.transport.write().await.take();
            return Err(e);
        }
        info!(command = %self.config.command, "bridge initialized");
        Ok(())
    }

    async fn account_info(&self) -> Result<AccountInfo, ClientError> {
        let value = self.current().await?.request(methods::GET_INFO, None).await?;
        if value.is_null() {
            return Err(ClientError::Protocol("no account info yet".into()));
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn is_registered(&self, recipient: &RecipientId) -> Result<bool, ClientError> {
        let value = self
            .current()
            .await?
            .request(
                methods::IS_REGISTERED_USER,
                Some(json!({ "chatId": recipient.as_str() })),
            )
            .await?;
        value
            .as_bool()
            .ok_or_else(|| ClientError::Protocol(format!("expected boolean, got {value}")))
    }

    async fn send(
        &self,
        recipient: &RecipientId,
        text: &str,
    ) -> Result<DeliveryReceipt, ClientError> {
        self.current()
            .await?
            .request(
                methods::SEND_MESSAGE,
                Some(json!({ "chatId": recipient.as_str(), "text": text })),
            )
            .await
    }

    async fn shutdown(&self) {
        if let Some(transport) = self.transport.write().await.take() {
            transport.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::time::Duration, venom_channels::lifecycle_channel};

    fn config(command: &str, script: Option<&str>) -> BridgeConfig {
        BridgeConfig {
            command: command.into(),
            args: script.map(|s| vec!["-c".into(), s.into()]).unwrap_or_default(),
            ..BridgeConfig::default()
        }
    }

    #[tokio::test]
    async fn calls_before_initialize_are_not_started() {
        let (tx, _rx) = lifecycle_channel();
        let client = BridgeClient::new(config("cat", None), tx);
        let recipient = RecipientId::normalize("628123");

        assert!(matches!(
            client.is_registered(&recipient).await,
            Err(ClientError::NotStarted)
        ));
        assert!(matches!(
            client.send(&recipient, "hi").await,
            Err(ClientError::NotStarted)
        ));
        assert!(matches!(
            client.account_info().await,
            Err(ClientError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn scripted_bridge_round_trip() {
        // Replies to requests 1..=3 in order: initialize, isRegisteredUser, sendMessage.
        let script = r#"
            read l; echo '{"jsonrpc":"2.0","id":1,"result":null}'
            echo '{"jsonrpc":"2.0","method":"ready"}'
            read l; echo '{"jsonrpc":"2.0","id":2,"result":true}'
            read l; echo '{"jsonrpc":"2.0","id":3,"result":{"ack":1,"id":"3EB0"}}'
            sleep 5
        "#;
        let (tx, mut rx) = lifecycle_channel();
        let client = BridgeClient::new(config("sh", Some(script)), tx);

        client.initialize().await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(venom_channels::LifecycleEvent::SessionReady)
        );

        let recipient = RecipientId::normalize("628123");
        assert!(client.is_registered(&recipient).await.unwrap());
        let receipt = client.send(&recipient, "hello").await.unwrap();
        assert_eq!(receipt["id"], "3EB0");

        client.shutdown().await;
        assert!(matches!(
            client.send(&recipient, "again").await,
            Err(ClientError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn unlinked_account_info_is_an_error() {
        let script = r#"
            read l; echo '{"jsonrpc":"2.0","id":1,"result":null}'
            read l; echo '{"jsonrpc":"2.0","id":2,"result":null}'
            sleep 5
        "#;
        let (tx, _rx) = lifecycle_channel();
        let client = BridgeClient::new(config("sh", Some(script)), tx);

        client.initialize().await.unwrap();
        let err = client.account_info().await.unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
        assert_eq!(
            err.to_string(),
            "unexpected chat client response: no account info yet"
        );
        client.shutdown().await;
    }

    #[tokio::test]
    async fn reinitialize_replaces_process_silently() {
        let script = r#"read l; echo '{"jsonrpc":"2.0","id":1,"result":null}'; sleep 5"#;
        let (tx, mut rx) = lifecycle_channel();
        let client = BridgeClient::new(config("sh", Some(script)), tx);

        client.initialize().await.unwrap();
        client.initialize().await.unwrap();
        client.shutdown().await;

        // Neither the replaced nor the stopped process reports a disconnect.
        let next = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    async fn failed_initialize_leaves_no_process() {
        let (tx, _rx) = lifecycle_channel();
        let client = BridgeClient::new(config("nonexistent_bridge_xyz_42", None), tx);

        assert!(client.initialize().await.is_err());
        assert!(matches!(
            client.account_info().await,
            Err(ClientError::NotStarted)
        ));
    }
}
