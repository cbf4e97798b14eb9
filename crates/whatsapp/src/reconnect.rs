use std::{
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use {tokio::task::JoinHandle, tracing::debug};

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

type Slot = Arc<Mutex<Option<Pending>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<Pending>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds at most one pending delayed retry.
///
/// Arming replaces whatever was pending. A timer that fires removes itself
/// from the slot before running its action, so a later `arm` or `cancel`
/// never aborts an action that already started.
#[derive(Default)]
pub struct ReconnectScheduler {
    slot: Slot,
    generation: AtomicU64,
}

impl ReconnectScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` once after `delay`, replacing any pending timer.
    pub fn arm<F>(&self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let slot = Arc::clone(&self.slot);

        let mut pending = lock(&self.slot);
        if let Some(previous) = pending.take() {
            previous.handle.abort();
            debug!(replaced = previous.generation, "replaced pending reconnect");
        }

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut pending = lock(&slot);
                if pending.as_ref().map(|p| p.generation) != Some(generation) {
                    return;
                }
                pending.take();
            }
            debug!(generation, "reconnect timer fired");
            action.await;
        });

        *pending = Some(Pending { generation, handle });
    }

    /// Drop the pending timer, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match lock(&self.slot).take() {
            Some(previous) => {
                previous.handle.abort();
                true
            },
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.slot).is_some()
    }
}

impl Drop for ReconnectScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
