//! Stdio transport: spawn the bridge process and speak JSON-RPC over stdin/stdout.

use std::{
    collections::HashMap,
    process::Stdio,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    serde_json::Value,
    tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
        process::{Child, ChildStdin, Command},
        sync::{Mutex, oneshot},
        task::JoinHandle,
    },
    tracing::{debug, trace, warn},
    venom_channels::{ClientError, LifecycleEvent, LifecycleSender},
    venom_protocol::{
        BRIDGE_REQUEST_TIMEOUT_MS, BridgeFrame, JsonRpcNotification, JsonRpcRequest,
        JsonRpcResponse, notifications,
    },
};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// A running bridge process.
pub struct BridgeTransport {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    pending: PendingMap,
    next_id: AtomicU64,
    request_timeout: Duration,
    /// Set before a deliberate shutdown so the reader does not report it.
    closing: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BridgeTransport {
    /// Spawn the bridge and start forwarding its notifications to `events`.
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        events: LifecycleSender,
    ) -> Result<Arc<Self>, ClientError> {
        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ClientError::Transport(format!("failed to spawn bridge {command}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClientError::Transport("failed to capture bridge stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClientError::Transport("failed to capture bridge stdout".into()))?;
        let stderr = child.stderr.take();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closing = Arc::new(AtomicBool::new(false));

        let reader = tokio::spawn(read_stdout(
            BufReader::new(stdout),
            Arc::clone(&pending),
            Arc::clone(&closing),
            events,
        ));
        let mut tasks = vec![reader];
        if let Some(stderr) = stderr {
            tasks.push(tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "venom::bridge", "{line}");
                }
            }));
        }

        debug!(command, "bridge process spawned");
        Ok(Arc::new(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
            request_timeout: Duration::from_millis(BRIDGE_REQUEST_TIMEOUT_MS),
            closing,
            tasks: Mutex::new(tasks),
        }))
    }

    /// Send a request and wait for its response. Returns the `result` value.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = JsonRpcRequest::new(id, method, params);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let mut payload = serde_json::to_string(&req)?;
        payload.push('\n');
        trace!(method, id, "gateway -> bridge");

        if let Err(e) = self.write(&payload).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let resp = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(_)) => {
                return Err(ClientError::Transport(
                    "bridge closed before replying".into(),
                ));
            },
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(ClientError::Timeout(self.request_timeout));
            },
        };

        if let Some(err) = resp.error {
            return Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(resp.result.unwrap_or(Value::Null))
    }

    async fn write(&self, payload: &str) -> Result<(), ClientError> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(payload.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    pub async fn is_alive(&self) -> bool {
        let mut child = self.child.lock().await;
        matches!(child.try_wait(), Ok(None))
    }

    /// Stop the process without reporting a disconnect.
    pub async fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        let mut child = self.child.lock().await;
        if let Err(e) = child.kill().await {
            debug!(error = %e, "bridge process already gone");
        }
        self.pending.lock().await.clear();
    }
}

async fn read_stdout(
    mut reader: BufReader<tokio::process::ChildStdout>,
    pending: PendingMap,
    closing: Arc<AtomicBool>,
    events: LifecycleSender,
) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                trace!(raw = %trimmed, "bridge -> gateway");
                match serde_json::from_str::<BridgeFrame>(trimmed) {
                    Ok(BridgeFrame::Response(resp)) => {
                        match pending.lock().await.remove(&resp.id) {
                            Some(tx) => {
                                let _ = tx.send(resp);
                            },
                            None => warn!(id = resp.id, "response for unknown request id"),
                        }
                    },
                    Ok(BridgeFrame::Notification(notif)) => {
                        let Some(event) = lifecycle_event(&notif) else {
                            debug!(method = %notif.method, "ignoring bridge notification");
                            continue;
                        };
                        if events.send(event).is_err() {
                            debug!("lifecycle receiver dropped");
                        }
                    },
                    Err(e) => warn!(error = %e, "unparseable line from bridge"),
                }
            },
            Err(e) => {
                warn!(error = %e, "error reading bridge stdout");
                break;
            },
        }
    }

    // Outstanding requests fail once their senders drop.
    pending.lock().await.clear();

    if !closing.load(Ordering::SeqCst) {
        warn!("bridge process exited");
        let _ = events.send(LifecycleEvent::SessionDisconnected {
            reason: "bridge process exited".into(),
        });
    }
}

fn str_param(notif: &JsonRpcNotification, key: &str) -> Option<String> {
    notif
        .params
        .as_ref()
        .and_then(|p| p.get(key))
        .and_then(|v| v.as_str())
        .map(String::from)
}

/// Map a bridge notification onto a lifecycle event.
pub(crate) fn lifecycle_event(notif: &JsonRpcNotification) -> Option<LifecycleEvent> {
    match notif.method.as_str() {
        notifications::QR => {
            str_param(notif, "code").map(|code| LifecycleEvent::PairingCodeIssued { code })
        },
        notifications::READY => Some(LifecycleEvent::SessionReady),
        notifications::DISCONNECTED => Some(LifecycleEvent::SessionDisconnected {
            reason: str_param(notif, "reason").unwrap_or_else(|| "unknown".into()),
        }),
        notifications::AUTH_FAILURE => Some(LifecycleEvent::AuthenticationFailed {
            message: str_param(notif, "message").unwrap_or_else(|| "unknown".into()),
        }),
        _ => None,
    }
}
