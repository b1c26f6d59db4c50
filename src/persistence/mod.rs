//! Snapshot persistence collaborator.
//!
//! The engine loads one snapshot at start, saves it whenever the reconciler's dirty flag
//! is set (on a fixed flush interval), and saves once more on stop.

pub mod file;
pub mod memory;

use async_trait::async_trait;

use crate::blockchain::types::SyncResult;
use crate::state::Snapshot;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Load and save snapshots keyed by wallet id.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when nothing was saved for `wallet_id` yet.
    async fn load(&self, wallet_id: &str) -> SyncResult<Option<Snapshot>>;

    async fn save(&self, wallet_id: &str, snapshot: &Snapshot) -> SyncResult<()>;
}
