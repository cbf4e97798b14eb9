use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use {
    tokio::task::JoinHandle,
    tracing::{debug, info, warn},
    venom_channels::{
        AccountInfo, ChatSessionClient, ClientError, LifecycleEvent, LifecycleReceiver,
        LifecycleSender,
    },
    venom_config::SessionConfig,
};

use crate::{
    pairing::{PairingCode, PairingCodeCache},
    qr,
    reconnect::ReconnectScheduler,
    state::{ClientStatus, SessionState, SessionStateStore},
    upstream::bounded,
};

/// How the manager recovers from failures.
#[derive(Debug, Clone)]
pub struct RecoveryPolicy {
    pub reconnect_delay: Duration,
    /// `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
    pub upstream_timeout: Duration,
    pub print_pairing_qr: bool,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for RecoveryPolicy {
    fn from(cfg: &SessionConfig) -> Self {
        Self {
            reconnect_delay: cfg.reconnect_delay(),
            max_reconnect_attempts: cfg.max_reconnect_attempts,
            upstream_timeout: cfg.upstream_timeout(),
            print_pairing_qr: cfg.print_pairing_qr,
        }
    }
}

/// Resets the in-flight flag even if `initialize` is cancelled mid-way.
struct InitGuard<'a>(&'a AtomicBool);

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the process's single chat session.
///
/// Lifecycle events are applied one at a time by the loop spawned in
/// [`SessionManager::start`]; everything else only reads.
pub struct SessionManager {
    client: Arc<dyn ChatSessionClient>,
    pairing: PairingCodeCache,
    state: SessionStateStore,
    reconnect: ReconnectScheduler,
    policy: RecoveryPolicy,
    initializing: AtomicBool,
    /// A retry was skipped because a start was already running.
    retry_deferred: AtomicBool,
    reconnect_attempts: AtomicU32,
    /// Feeds start failures back into the event loop.
    events_tx: LifecycleSender,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// `events_tx` must be the sender the client pushes into.
    pub fn new(
        client: Arc<dyn ChatSessionClient>,
        events_tx: LifecycleSender,
        policy: RecoveryPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            pairing: PairingCodeCache::new(),
            state: SessionStateStore::new(),
            reconnect: ReconnectScheduler::new(),
            policy,
            initializing: AtomicBool::new(false),
            retry_deferred: AtomicBool::new(false),
            reconnect_attempts: AtomicU32::new(0),
            events_tx,
            event_loop: Mutex::new(None),
        })
    }

    /// Spawn the event loop and start the session.
    pub fn start(self: &Arc<Self>, events: LifecycleReceiver) {
        self.spawn_event_loop(events);
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.initialize().await });
    }

    fn spawn_event_loop(self: &Arc<Self>, mut events: LifecycleReceiver) {
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                manager.handle_event(event).await;
            }
            debug!("lifecycle event loop stopped");
        });
        let previous = self
            .event_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Start the client unless a start is already in flight.
    pub async fn initialize(&self) {
        if self
            .initializing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.retry_deferred.store(true, Ordering::SeqCst);
            debug!("initialize already in flight, deferring");
            return;
        }
        let _guard = InitGuard(&self.initializing);
        self.retry_deferred.store(false, Ordering::SeqCst);

        loop {
            info!("initializing chat session");
            if let Err(e) = self.client.initialize().await {
                warn!(error = %e, "chat session failed to start");
                let reason = format!("initialize failed: {e}");
                if self
                    .events_tx
                    .send(LifecycleEvent::SessionDisconnected { reason })
                    .is_err()
                {
                    debug!("event loop gone, dropping start failure");
                }
                return;
            }
            // A failure reported while this start ran had its retry skipped.
            if !self.retry_deferred.swap(false, Ordering::SeqCst)
                || !self.state.current().await.is_failure()
            {
                return;
            }
            debug!("running deferred restart");
        }
    }

    async fn handle_event(self: &Arc<Self>, event: LifecycleEvent) {
        debug!(event = event.kind(), "lifecycle event");
        match event {
            LifecycleEvent::PairingCodeIssued { code } => {
                self.pairing.store(code.clone()).await;
                let state = self.state.on_pairing_code().await;
                info!(state = %state, "pairing code received, scan it at /qr");
                if self.policy.print_pairing_qr {
                    match qr::render_terminal(&code) {
                        Ok(rendered) => eprintln!("{rendered}"),
                        Err(e) => warn!(error = %e, "could not render pairing code"),
                    }
                }
            },
            LifecycleEvent::SessionReady => {
                self.state.on_ready().await;
                self.reconnect_attempts.store(0, Ordering::SeqCst);
                if self.reconnect.cancel() {
                    debug!("cancelled pending reconnect");
                }
                info!("chat session is ready");
            },
            LifecycleEvent::SessionDisconnected { reason } => {
                warn!(reason = %reason, "chat session disconnected");
                self.state.on_disconnected(reason).await;
                self.schedule_reconnect();
            },
            LifecycleEvent::AuthenticationFailed { message } => {
                warn!(message = %message, "chat session authentication failed");
                self.state.on_auth_failed(message).await;
                self.schedule_reconnect();
            },
        }
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        let attempt = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(max) = self.policy.max_reconnect_attempts
            && attempt > max
        {
            warn!(max, "reconnect limit reached, not retrying");
            return;
        }

        let delay = self.policy.reconnect_delay;
        info!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        let weak = Arc::downgrade(self);
        self.reconnect.arm(delay, async move {
            if let Some(manager) = weak.upgrade() {
                manager.initialize().await;
            }
        });
    }

    /// Snapshot of the session health.
    pub async fn status(&self) -> ClientStatus {
        self.state.status().await
    }

    pub async fn state(&self) -> SessionState {
        self.state.current().await
    }

    pub async fn pairing_code(&self) -> Option<PairingCode> {
        self.pairing.latest().await
    }

    /// Account details, bounded by the upstream timeout.
    pub async fn account_info(&self) -> Result<AccountInfo, ClientError> {
        bounded(self.policy.upstream_timeout, self.client.account_info()).await
    }

    /// Shared handle for request-path calls. Never used to re-initialize.
    pub fn client(&self) -> Arc<dyn ChatSessionClient> {
        Arc::clone(&self.client)
    }

    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.is_pending()
    }

    /// Stop retrying, stop the event loop and shut the client down.
    pub async fn shutdown(&self) {
        self.reconnect.cancel();
        let handle = self
            .event_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.client.shutdown().await;
        info!("chat session stopped");
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        venom_channels::{lifecycle_channel, testing::ScriptedClient},
    };

    fn policy() -> RecoveryPolicy {
        RecoveryPolicy {
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: None,
            upstream_timeout: Duration::from_secs(15),
            print_pairing_qr: false,
        }
    }

    /// Manager with a running event loop but no initial `initialize`.
    fn manager_with(
        policy: RecoveryPolicy,
    ) -> (Arc<ScriptedClient>, LifecycleSender, Arc<SessionManager>) {
        let client = Arc::new(ScriptedClient::new());
        let (tx, rx) = lifecycle_channel();
        let manager = SessionManager::new(client.clone(), tx.clone(), policy);
        manager.spawn_event_loop(rx);
        (client, tx, manager)
    }

    /// Let the event loop drain without moving the paused clock.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_initializes_once() {
        let client = Arc::new(ScriptedClient::new());
        let (tx, rx) = lifecycle_channel();
        let manager = SessionManager::new(client.clone(), tx, policy());
        manager.start(rx);
        settle().await;

        assert_eq!(client.init_calls(), 1);
        assert_eq!(manager.state().await, SessionState::Uninitialized);
    }

    #[tokio::test(start_paused = true)]
    async fn pairing_then_ready() {
        let (_client, tx, manager) = manager_with(policy());
        assert!(manager.pairing_code().await.is_none());

        tx.send(LifecycleEvent::PairingCodeIssued {
            code: "2@abc".into(),
        })
        .unwrap();
        settle().await;
        assert_eq!(manager.state().await, SessionState::AwaitingPairing);
        assert_eq!(manager.pairing_code().await.unwrap().value, "2@abc");

        tx.send(LifecycleEvent::SessionReady).unwrap();
        settle().await;
        let status = manager.status().await;
        assert!(status.ready);
        assert!(!status.disconnected);
        // Stale but retained.
        assert_eq!(manager.pairing_code().await.unwrap().value, "2@abc");
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_reinitializes_once_after_delay() {
        let (client, tx, manager) = manager_with(policy());

        tx.send(LifecycleEvent::SessionDisconnected {
            reason: "NAVIGATION".into(),
        })
        .unwrap();
        settle().await;

        let status = manager.status().await;
        assert_eq!(status.state, SessionState::Disconnected);
        assert!(status.disconnected);
        assert_eq!(status.last_error.as_deref(), Some("NAVIGATION"));
        assert!(manager.reconnect_pending());

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(client.init_calls(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(client.init_calls(), 1);
        assert!(!manager.reconnect_pending());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(client.init_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_failures_keep_a_single_pending_retry() {
        let (client, tx, manager) = manager_with(policy());

        for i in 0..5 {
            tx.send(LifecycleEvent::SessionDisconnected {
                reason: format!("drop {i}"),
            })
            .unwrap();
            settle().await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        tx.send(LifecycleEvent::AuthenticationFailed {
            message: "bad creds".into(),
        })
        .unwrap();
        settle().await;
        assert_eq!(manager.state().await, SessionState::AuthFailed);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(client.init_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_overlapping_initialize() {
        let (client, tx, manager) = manager_with(policy());
        client.set_init_delay(Duration::from_secs(10));

        tx.send(LifecycleEvent::SessionDisconnected {
            reason: "first".into(),
        })
        .unwrap();
        settle().await;

        // Timer fires at 5s; initialize runs until 15s.
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(client.init_calls(), 1);

        // A second failure arms a retry that fires at 11s, mid-initialize.
        tx.send(LifecycleEvent::SessionDisconnected {
            reason: "second".into(),
        })
        .unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(client.init_calls(), 1);
        assert_eq!(client.init_max_in_flight(), 1);
        assert_eq!(manager.state().await, SessionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_skipped_mid_start_runs_after_it() {
        let (client, tx, manager) = manager_with(policy());
        client.set_init_delay(Duration::from_secs(10));

        tx.send(LifecycleEvent::SessionDisconnected {
            reason: "first".into(),
        })
        .unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(6)).await;

        // Fires at 11s while the 5s start is still running until 15s.
        tx.send(LifecycleEvent::SessionDisconnected {
            reason: "second".into(),
        })
        .unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(client.init_calls(), 2);
        assert_eq!(client.init_max_in_flight(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(client.init_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_mid_start_drops_skipped_retry() {
        let (client, tx, manager) = manager_with(policy());
        client.set_init_delay(Duration::from_secs(10));

        tx.send(LifecycleEvent::SessionDisconnected {
            reason: "first".into(),
        })
        .unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(6)).await;
        tx.send(LifecycleEvent::SessionDisconnected {
            reason: "second".into(),
        })
        .unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(6)).await;

        tx.send(LifecycleEvent::SessionReady).unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(client.init_calls(), 1);
        assert!(manager.status().await.ready);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_cancels_pending_reconnect() {
        let (client, tx, manager) = manager_with(policy());

        tx.send(LifecycleEvent::SessionDisconnected {
            reason: "blip".into(),
        })
        .unwrap();
        settle().await;
        assert!(manager.reconnect_pending());

        tx.send(LifecycleEvent::SessionReady).unwrap();
        settle().await;
        assert!(!manager.reconnect_pending());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(client.init_calls(), 0);
        assert!(manager.status().await.ready);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_is_retried() {
        let (client, _tx, manager) = manager_with(policy());
        client.fail_next_init("browser crashed");

        manager.initialize().await;
        settle().await;

        let status = manager.status().await;
        assert_eq!(status.state, SessionState::Disconnected);
        assert_eq!(
            status.last_error.as_deref(),
            Some("initialize failed: chat client transport error: browser crashed")
        );

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(client.init_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_cap_stops_retrying() {
        let (client, tx, manager) = manager_with(RecoveryPolicy {
            max_reconnect_attempts: Some(2),
            ..policy()
        });

        for _ in 0..3 {
            tx.send(LifecycleEvent::SessionDisconnected {
                reason: "gone".into(),
            })
            .unwrap();
            settle().await;
            tokio::time::sleep(Duration::from_secs(6)).await;
        }

        assert_eq!(client.init_calls(), 2);
        assert!(!manager.reconnect_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_retry_and_stops_client() {
        let (client, tx, manager) = manager_with(policy());

        tx.send(LifecycleEvent::SessionDisconnected {
            reason: "bye".into(),
        })
        .unwrap();
        settle().await;
        manager.shutdown().await;

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(client.init_calls(), 0);
        assert_eq!(client.shutdowns(), 1);
    }
}
