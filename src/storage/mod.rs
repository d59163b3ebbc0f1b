//! Persistence for completed harvest runs.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml           # Crawler configuration
//! ├── latest.json           # Pointer to the newest run
//! └── runs/
//!     ├── 000001.json
//!     └── 000002.json
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{GigRecord, ScrapeRun, Strategy};

pub use local::LocalStorage;

/// Identifier assigned to a run when it is saved.
pub type RunId = u64;

/// A run as written to storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRun {
    pub run_id: RunId,
    pub strategy_used: Strategy,
    pub duration_seconds: f64,
    pub recorded_at: DateTime<Utc>,
    pub gig_count: usize,
    pub gigs: Vec<GigRecord>,
}

impl StoredRun {
    pub fn new(run_id: RunId, run: &ScrapeRun) -> Self {
        Self {
            run_id,
            strategy_used: run.strategy_used,
            duration_seconds: run.duration_seconds,
            recorded_at: Utc::now(),
            gig_count: run.records.len(),
            gigs: run.records.clone(),
        }
    }
}

/// Trait for run storage backends.
#[async_trait]
pub trait RunStorage: Send + Sync {
    /// Persist a run with all its records as one unit, returning its id.
    async fn save_run(&self, run: &ScrapeRun) -> Result<RunId>;

    /// Load a saved run, if it exists.
    async fn load_run(&self, run_id: RunId) -> Result<Option<StoredRun>>;

    /// Id of the newest saved run.
    async fn latest_run_id(&self) -> Result<Option<RunId>>;
}
