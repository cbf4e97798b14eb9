//! Scripted in-memory client for tests.

use std::{
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {async_trait::async_trait, serde_json::Value};

use crate::{AccountInfo, ChatSessionClient, ClientError, DeliveryReceipt, RecipientId};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn rpc_error(message: &str) -> ClientError {
    ClientError::Rpc {
        code: -32000,
        message: message.to_string(),
    }
}

/// A [`ChatSessionClient`] whose answers are set by the test and whose calls
/// are recorded for later assertions.
pub struct ScriptedClient {
    registered: AtomicBool,
    hang_requests: AtomicBool,
    send_result: Mutex<Result<Value, String>>,
    account_info: Mutex<Result<AccountInfo, String>>,
    init_delay: Mutex<Option<Duration>>,
    init_failure: Mutex<Option<String>>,
    init_calls: AtomicUsize,
    init_in_flight: AtomicUsize,
    init_max_in_flight: AtomicUsize,
    shutdowns: AtomicUsize,
    registration_checks: Mutex<Vec<String>>,
    sends: Mutex<Vec<(String, String)>>,
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            registered: AtomicBool::new(true),
            hang_requests: AtomicBool::new(false),
            send_result: Mutex::new(Ok(serde_json::json!({ "ack": 1 }))),
            account_info: Mutex::new(Ok(AccountInfo::default())),
            init_delay: Mutex::new(None),
            init_failure: Mutex::new(None),
            init_calls: AtomicUsize::new(0),
            init_in_flight: AtomicUsize::new(0),
            init_max_in_flight: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            registration_checks: Mutex::new(Vec::new()),
            sends: Mutex::new(Vec::new()),
        }
    }

    pub fn set_registered(&self, registered: bool) {
        self.registered.store(registered, Ordering::SeqCst);
    }

    /// Make `account_info`, `is_registered` and `send` never return.
    pub fn set_hang_requests(&self, hang: bool) {
        self.hang_requests.store(hang, Ordering::SeqCst);
    }

    pub fn set_send_result(&self, result: Result<Value, String>) {
        *lock(&self.send_result) = result;
    }

    pub fn set_account_info(&self, info: Result<AccountInfo, String>) {
        *lock(&self.account_info) = info;
    }

    /// Make each `initialize` take this long before returning.
    pub fn set_init_delay(&self, delay: Duration) {
        *lock(&self.init_delay) = Some(delay);
    }

    /// Fail the next `initialize` call with this message.
    pub fn fail_next_init(&self, message: &str) {
        *lock(&self.init_failure) = Some(message.to_string());
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Highest number of `initialize` calls observed running at once.
    pub fn init_max_in_flight(&self) -> usize {
        self.init_max_in_flight.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn registration_checks(&self) -> Vec<String> {
        lock(&self.registration_checks).clone()
    }

    pub fn sends(&self) -> Vec<(String, String)> {
        lock(&self.sends).clone()
    }

    async fn maybe_hang(&self) {
        if self.hang_requests.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl ChatSessionClient for ScriptedClient {
    async fn initialize(&self) -> Result<(), ClientError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.init_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.init_max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *lock(&self.init_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.init_in_flight.fetch_sub(1, Ordering::SeqCst);
        match lock(&self.init_failure).take() {
            Some(message) => Err(ClientError::Transport(message)),
            None => Ok(()),
        }
    }

    async fn account_info(&self) -> Result<AccountInfo, ClientError> {
        self.maybe_hang().await;
        lock(&self.account_info).clone().map_err(|e| rpc_error(&e))
    }

    async fn is_registered(&self, recipient: &RecipientId) -> Result<bool, ClientError> {
        lock(&self.registration_checks).push(recipient.to_string());
        self.maybe_hang().await;
        Ok(self.registered.load(Ordering::SeqCst))
    }

    async fn send(
        &self,
        recipient: &RecipientId,
        text: &str,
    ) -> Result<DeliveryReceipt, ClientError> {
        self.maybe_hang().await;
        lock(&self.sends).push((recipient.to_string(), text.to_string()));
        lock(&self.send_result).clone().map_err(|e| rpc_error(&e))
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
