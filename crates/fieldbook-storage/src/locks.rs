//! Per-entry locks serializing concurrent uploads of the same UUID

use fieldbook_core::ProjectId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Held for the duration of one upload; dropping it releases the UUID
pub type EntryLock = tokio::sync::OwnedMutexGuard<()>;

type Key = (ProjectId, String);

/// Lock table keyed by `(project, uuid)`
#[derive(Default)]
pub struct LockTable {
    locks: Mutex<HashMap<Key, Arc<tokio::sync::Mutex<()>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock of one entry UUID
    pub async fn acquire(&self, project_id: &ProjectId, uuid: &str) -> EntryLock {
        let slot = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // entries nobody holds or waits on
            locks.retain(|_, slot| Arc::strong_count(slot) > 1);
            locks
                .entry((project_id.clone(), uuid.to_string()))
                .or_default()
                .clone()
        };
        slot.lock_owned().await
    }

    /// Number of UUIDs currently locked or awaited
    pub fn len(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.values().filter(|slot| Arc::strong_count(slot) > 1).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
