//! JSON file store: one `<wallet id>.json` per wallet.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::blockchain::types::{SyncError, SyncResult};
use crate::persistence::SnapshotStore;
use crate::state::Snapshot;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, wallet_id: &str) -> PathBuf {
        self.dir.join(format!("{wallet_id}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn io_error(path: &Path, e: impl std::fmt::Display) -> SyncError {
    SyncError::Persistence(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn load(&self, wallet_id: &str) -> SyncResult<Option<Snapshot>> {
        let path = self.path_for(wallet_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };
        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| io_error(&path, e))?;
        tracing::info!(
            path = %path.display(),
            height = snapshot.block_height,
            transactions = snapshot.transaction_count(),
            "Loaded snapshot"
        );
        Ok(Some(snapshot))
    }

    async fn save(&self, wallet_id: &str, snapshot: &Snapshot) -> SyncResult<()> {
        let path = self.path_for(wallet_id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(snapshot).map_err(|e| io_error(&path, e))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;
        // Write-then-rename so a crash never leaves a truncated snapshot behind.
        tokio::fs::write(&tmp, &bytes).await.map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| io_error(&path, e))?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Saved snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use crate::spend::NonceAllocator;

    fn scratch_dir(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("wallet-sync-{name}-{}-{nanos}", std::process::id()))
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_none() {
        let store = JsonFileStore::new(scratch_dir("missing"));
        assert!(store.load("main").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = scratch_dir("roundtrip");
        let store = JsonFileStore::new(&dir);

        let mut snapshot = Snapshot::default();
        snapshot.block_height = 42;
        snapshot.nonces = NonceAllocator::new(U256::from(7));
        snapshot.balances.insert("ETH".to_string(), "1000".to_string());
        snapshot.last_queried_height.insert("ETH".to_string(), 40);

        store.save("main", &snapshot).await.unwrap();
        assert!(store.path_for("main").exists());
        assert!(!store.path_for("main").with_extension("json.tmp").exists());
        assert_eq!(store.load("main").await.unwrap(), Some(snapshot));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_persistence_error() {
        let dir = scratch_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("main.json"), b"{not json").unwrap();

        let err = JsonFileStore::new(&dir).load("main").await.unwrap_err();
        assert!(matches!(err, SyncError::Persistence(_)));

        std::fs::remove_dir_all(dir).unwrap();
    }
}
