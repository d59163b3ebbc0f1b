//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── latest.json           # {"run_id": N}
//! └── runs/
//!     └── NNNNNN.json       # One StoredRun per file
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::ScrapeRun;
use crate::storage::{RunId, RunStorage, StoredRun};

const LATEST_KEY: &str = "latest.json";

#[derive(Debug, Serialize, Deserialize)]
struct LatestPointer {
    run_id: RunId,
}

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn run_key(run_id: RunId) -> String {
        format!("runs/{:06}.json", run_id)
    }
}

#[async_trait]
impl RunStorage for LocalStorage {
    async fn save_run(&self, run: &ScrapeRun) -> Result<RunId> {
        let run_id = self.latest_run_id().await?.unwrap_or(0) + 1;
        let key = Self::run_key(run_id);

        if self.read_bytes(&key).await?.is_some() {
            return Err(AppError::storage(format!(
                "{} already exists; {} is out of date",
                key, LATEST_KEY
            )));
        }

        // Run file first: the pointer never names a run that is not on disk.
        self.write_json(&key, &StoredRun::new(run_id, run)).await?;
        self.write_json(LATEST_KEY, &LatestPointer { run_id })
            .await?;

        log::info!(
            "Saved run {} ({} gigs via {}) to {}",
            run_id,
            run.records.len(),
            run.strategy_used,
            key
        );
        Ok(run_id)
    }

    async fn load_run(&self, run_id: RunId) -> Result<Option<StoredRun>> {
        let key = Self::run_key(run_id);
        match self.read_json(&key).await? {
            Some(run) => Ok(Some(run)),
            None => {
                log::warn!("No run found at {}", key);
                Ok(None)
            }
        }
    }

    async fn latest_run_id(&self) -> Result<Option<RunId>> {
        Ok(self
            .read_json::<LatestPointer>(LATEST_KEY)
            .await?
            .map(|p| p.run_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GigRecord, Strategy};
    use tempfile::TempDir;

    fn sample_run(strategy: Strategy) -> ScrapeRun {
        ScrapeRun {
            strategy_used: strategy,
            duration_seconds: 12.5,
            records: vec![
                GigRecord::new(7_000_000_001, "Focus group", "$230-$250"),
                GigRecord::new(7_000_000_002, "Couch move", "pizza"),
            ],
        }
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!tmp.path().join("test.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let data = storage.read_bytes("nope.txt").await.unwrap();
        assert!(data.is_none());
        assert_eq!(storage.latest_run_id().await.unwrap(), None);
        assert!(storage.load_run(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_assigns_sequential_ids() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let first = storage.save_run(&sample_run(Strategy::Api)).await.unwrap();
        let second = storage
            .save_run(&sample_run(Strategy::Browser))
            .await
            .unwrap();

        assert_eq!((first, second), (1, 2));
        assert_eq!(storage.latest_run_id().await.unwrap(), Some(2));
        assert!(tmp.path().join("runs/000002.json").exists());
    }

    #[tokio::test]
    async fn test_saved_run_keeps_records_together() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let run = sample_run(Strategy::Browser);
        let id = storage.save_run(&run).await.unwrap();
        let stored = storage.load_run(id).await.unwrap().unwrap();

        assert_eq!(stored.run_id, id);
        assert_eq!(stored.strategy_used, Strategy::Browser);
        assert_eq!(stored.gig_count, 2);
        assert_eq!(stored.gigs, run.records);
        assert_eq!(stored.gigs[0].comp_estimate, Some(230.0));
    }

    #[tokio::test]
    async fn test_stale_pointer_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.save_run(&sample_run(Strategy::Api)).await.unwrap();
        storage.save_run(&sample_run(Strategy::Api)).await.unwrap();
        storage
            .write_json(LATEST_KEY, &LatestPointer { run_id: 1 })
            .await
            .unwrap();

        let err = storage
            .save_run(&sample_run(Strategy::Api))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
