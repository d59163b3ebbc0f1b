// src/pipeline/orchestrator.rs

//! Harvest run controller: retry the primary source once, then escalate.

use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::models::{GigRecord, ScrapeRun};
use crate::services::GigSource;
use crate::storage::{RunId, RunStorage};
use crate::utils::timing::{DelayRange, Pacer};

/// Pause before the single retry of the primary source.
const RETRY_COOLDOWN: DelayRange = DelayRange::secs(100.0, 300.0);

/// Runs the primary source with one retry and falls back to the other.
pub struct Orchestrator {
    primary: Box<dyn GigSource>,
    fallback: Box<dyn GigSource>,
    pacer: Arc<dyn Pacer>,
}

impl Orchestrator {
    pub fn new(
        primary: Box<dyn GigSource>,
        fallback: Box<dyn GigSource>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            primary,
            fallback,
            pacer,
        }
    }

    /// Produce one complete run.
    ///
    /// A `BadResponse` from the primary earns one retry after a cooldown; any
    /// other primary failure escalates straight to the fallback, whose errors
    /// are returned as-is.
    pub async fn collect(&self) -> Result<ScrapeRun> {
        let started = Instant::now();

        let (strategy_used, records) = match self.attempt_primary().await {
            Ok(records) => (self.primary.strategy(), records),
            Err(e) => {
                log::warn!(
                    "Escalating from {} to {} after: {}",
                    self.primary.strategy(),
                    self.fallback.strategy(),
                    e
                );
                (self.fallback.strategy(), self.fallback.fetch_all().await?)
            }
        };

        let duration_seconds = started.elapsed().as_secs_f64();
        log::info!(
            "Collected {} gigs via {} in {:.1}s",
            records.len(),
            strategy_used,
            duration_seconds
        );

        Ok(ScrapeRun {
            strategy_used,
            duration_seconds,
            records,
        })
    }

    /// Collect a run and hand it to storage as one unit.
    pub async fn run(&self, storage: &dyn RunStorage) -> Result<(RunId, ScrapeRun)> {
        let run = self.collect().await?;
        let run_id = storage.save_run(&run).await?;
        Ok((run_id, run))
    }

    async fn attempt_primary(&self) -> Result<Vec<GigRecord>> {
        let strategy = self.primary.strategy();
        match self.primary.fetch_all().await {
            Ok(records) => Ok(records),
            Err(e) if e.is_retryable() => {
                log::warn!("{} source failed ({}), retrying after cooldown", strategy, e);
                self.pacer.pause(RETRY_COOLDOWN).await;
                self.primary.fetch_all().await
            }
            Err(e) => Err(e),
        }
    }
}

/// Single-source run with no retry or escalation.
pub async fn collect_with(source: &dyn GigSource) -> Result<ScrapeRun> {
    let started = Instant::now();
    let records = source.fetch_all().await?;
    Ok(ScrapeRun {
        strategy_used: source.strategy(),
        duration_seconds: started.elapsed().as_secs_f64(),
        records,
    })
}
