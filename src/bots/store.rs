//! Single owner of the tracked-asset file.
//!
//! Bots never touch the file; they send commands to one coordinator task
//! which applies them in arrival order and persists after every change.

use super::{StoreError, TrackedFile};
use crate::domain::AssetId;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info};

enum StoreCommand {
    Remove {
        asset_id: AssetId,
        reply: oneshot::Sender<Result<bool, StoreError>>,
    },
    Snapshot {
        reply: oneshot::Sender<TrackedFile>,
    },
}

#[derive(Debug, Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    /// Stop tracking an asset. Resolves once the change is on disk.
    pub async fn remove(&self, asset_id: AssetId) -> Result<bool, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Remove { asset_id, reply })
            .await
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)?
    }

    pub async fn snapshot(&self) -> Result<TrackedFile, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Snapshot { reply })
            .await
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)
    }
}

impl std::fmt::Debug for StoreCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreCommand::Remove { asset_id, .. } => write!(f, "Remove({})", asset_id),
            StoreCommand::Snapshot { .. } => write!(f, "Snapshot"),
        }
    }
}

/// Start the coordinator. It stops when every handle has been dropped.
pub fn spawn_store(path: PathBuf, file: TrackedFile) -> (StoreHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(64);
    let task = tokio::spawn(run_loop(path, file, rx));
    (StoreHandle { tx }, task)
}

async fn run_loop(path: PathBuf, mut file: TrackedFile, mut rx: mpsc::Receiver<StoreCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            StoreCommand::Remove { asset_id, reply } => {
                let result = if file.remove(&asset_id) {
                    match file.save_atomic(&path) {
                        Ok(()) => {
                            info!(asset_id = %asset_id, remaining = file.assets.len(), "Asset no longer tracked");
                            Ok(true)
                        }
                        Err(e) => {
                            error!(asset_id = %asset_id, error = %e, "Tracked file write failed");
                            Err(e)
                        }
                    }
                } else {
                    Ok(false)
                };
                let _ = reply.send(result);
            }
            StoreCommand::Snapshot { reply } => {
                let _ = reply.send(file.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bots::TrackedAsset;
    use crate::domain::Decimal;
    use tempfile::TempDir;

    fn file_with(ids: &[&str]) -> TrackedFile {
        TrackedFile {
            rate_limit_seconds: 1,
            api_refresh_seconds: 1,
            error_retry_seconds: 1,
            max_consecutive_errors: 3,
            assets: ids
                .iter()
                .map(|id| TrackedAsset {
                    asset_id: AssetId::new(*id),
                    min_price: Decimal::zero(),
                    increment: Decimal::zero(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn concurrent_removals_are_all_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracked.json");
        let ids: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (store, task) = spawn_store(path.clone(), file_with(&id_refs));

        let workers: Vec<_> = ids
            .iter()
            .step_by(2)
            .map(|id| {
                let store = store.clone();
                let id = AssetId::new(id.clone());
                tokio::spawn(async move { store.remove(id).await })
            })
            .collect();
        for worker in futures::future::join_all(workers).await {
            assert!(worker.unwrap().unwrap());
        }

        let on_disk = TrackedFile::load(&path).unwrap();
        assert_eq!(on_disk.assets.len(), 10);
        assert_eq!(store.snapshot().await.unwrap(), on_disk);

        drop(store);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn removing_unknown_asset_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracked.json");
        let (store, _task) = spawn_store(path.clone(), file_with(&["1"]));

        assert!(!store.remove(AssetId::new("2")).await.unwrap());
        assert!(!path.exists());
    }
}
