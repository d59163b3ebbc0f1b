//! Run orchestration and reporting.
//!
//! - `Orchestrator`: produce a run from the API source, escalating to the browser
//! - `estimate_hourly`: summarize a run's compensation

mod orchestrator;
mod report;

pub use orchestrator::{Orchestrator, collect_with};
pub use report::estimate_hourly;
