//! Gig record and scrape run data structures.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single paid gig listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GigRecord {
    /// Listing identifier assigned by the site
    pub gig_id: u64,

    /// Listing title
    pub title: String,

    /// Raw compensation text as posted
    pub comp_message: String,

    /// Dollar amount parsed out of `comp_message`, if any
    pub comp_estimate: Option<f64>,
}

impl GigRecord {
    /// Build a record, estimating compensation from the raw message.
    pub fn new(gig_id: u64, title: impl Into<String>, comp_message: impl Into<String>) -> Self {
        let comp_message = comp_message.into();
        let comp_estimate = crate::services::estimate_compensation(&comp_message);
        Self {
            gig_id,
            title: title.into(),
            comp_message,
            comp_estimate,
        }
    }
}

/// Acquisition strategy that produced a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Api,
    Browser,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Api => "api",
            Strategy::Browser => "browser",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One complete harvesting run, handed to storage as a unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapeRun {
    pub strategy_used: Strategy,
    /// Wall-clock duration of the whole run, retries and escalation included
    pub duration_seconds: f64,
    pub records: Vec<GigRecord>,
}
