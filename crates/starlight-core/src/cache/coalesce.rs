use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key async locks so that overlapping fetches of one category run one
/// after another instead of all hitting upstream.
#[derive(Debug, Default)]
pub struct FetchCoalescer {
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FetchCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}
