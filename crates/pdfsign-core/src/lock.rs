//! Per-document critical sections
//!
//! Signing the same document twice at once would race on the signed file
//! and the status row. Calls for one id queue on a shared async mutex;
//! calls for different ids never contend. Entries are dropped from the
//! registry once nobody holds or waits on them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Registry = HashMap<String, Arc<AsyncMutex<()>>>;

#[derive(Clone, Default)]
pub struct DocumentLocks {
    registry: Arc<Mutex<Registry>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`
    pub async fn acquire(&self, id: &str) -> DocumentGuard {
        let entry = {
            let mut registry = self.registry();
            registry
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = entry.lock_owned().await;
        DocumentGuard {
            id: id.to_string(),
            registry: Arc::clone(&self.registry),
            guard: Some(guard),
        }
    }

    /// Ids with a live holder or waiter
    pub fn active(&self) -> usize {
        self.registry().len()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        lock_registry(&self.registry)
    }
}

fn lock_registry(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // The map is always left consistent, so a poisoned lock is still usable
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Held for the duration of one signing call
pub struct DocumentGuard {
    id: String,
    registry: Arc<Mutex<Registry>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DocumentGuard {
    fn drop(&mut self) {
        let mut registry = lock_registry(&self.registry);
        // Release first; waiters cloned their Arc under the registry lock
        self.guard.take();
        if let Some(entry) = registry.get(&self.id) {
            if Arc::strong_count(entry) == 1 {
                registry.remove(&self.id);
            }
        }
    }
}
