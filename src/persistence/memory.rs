//! In-memory store for embedding and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::blockchain::types::SyncResult;
use crate::persistence::SnapshotStore;
use crate::state::Snapshot;

#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: Mutex<HashMap<String, Snapshot>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a snapshot as if a previous session had saved it.
    pub fn with_snapshot(wallet_id: &str, snapshot: Snapshot) -> Self {
        let store = Self::default();
        if let Ok(mut snapshots) = store.snapshots.lock() {
            snapshots.insert(wallet_id.to_string(), snapshot);
        }
        store
    }

    /// Number of saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }

    pub fn get(&self, wallet_id: &str) -> Option<Snapshot> {
        self.snapshots.lock().ok()?.get(wallet_id).cloned()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self, wallet_id: &str) -> SyncResult<Option<Snapshot>> {
        Ok(self.get(wallet_id))
    }

    async fn save(&self, wallet_id: &str, snapshot: &Snapshot) -> SyncResult<()> {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.insert(wallet_id.to_string(), snapshot.clone());
        }
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
