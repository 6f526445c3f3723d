//! プレゼンス遷移の直列化

use tokio::sync::{Mutex, MutexGuard};

/// Orders presence transitions together with their `presence-changed` broadcast.
///
/// Connect and disconnect hold it from the registry update until the
/// broadcast is queued, so every peer observes transitions in the order the
/// registry applied them.
#[derive(Debug, Default)]
pub struct PresenceGate {
    lock: Mutex<()>,
}

impl PresenceGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn enter(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}
