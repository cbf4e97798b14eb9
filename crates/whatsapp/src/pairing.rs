use std::time::SystemTime;

use tokio::sync::RwLock;

/// The most recently issued pairing code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingCode {
    pub value: String,
    pub issued_at: SystemTime,
}

/// Holds the latest pairing code. Each new code replaces the previous one
/// wholesale; the code is never cleared, so it goes stale once paired.
#[derive(Debug, Default)]
pub struct PairingCodeCache {
    latest: RwLock<Option<PairingCode>>,
}

impl PairingCodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn store(&self, value: String) -> PairingCode {
        let code = PairingCode {
            value,
            issued_at: SystemTime::now(),
        };
        *self.latest.write().await = Some(code.clone());
        code
    }

    pub async fn latest(&self) -> Option<PairingCode> {
        self.latest.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_until_first_code() {
        let cache = PairingCodeCache::new();
        assert!(cache.latest().await.is_none());
    }

    #[tokio::test]
    async fn newer_code_replaces_older() {
        let cache = PairingCodeCache::new();
        let first = cache.store("2@first".into()).await;
        let second = cache.store("2@second".into()).await;

        let latest = cache.latest().await.unwrap();
        assert_eq!(latest.value, "2@second");
        assert!(latest.issued_at >= first.issued_at);
        assert_eq!(latest, second);
    }
}
