// src/models/mod.rs

//! Domain models for the gig crawler.
//!
//! Records and runs produced by the harvesters, plus the configuration
//! that drives them.

mod config;
mod gig;

// Re-export all public types
pub use config::{ApiConfig, BrowserConfig, Config, LoggingConfig, TimingConfig};
pub use gig::{GigRecord, ScrapeRun, Strategy};
