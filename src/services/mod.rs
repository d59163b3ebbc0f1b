//! Service layer for the gig crawler.
//!
//! This module contains the acquisition strategies:
//! - Private API client (`ApiHarvester`)
//! - Browser-driven harvester (`BrowserHarvester`)
//! - Compensation estimation shared by both (`estimate_compensation`)

mod api;
pub mod browser;
mod compensation;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{GigRecord, Strategy};

pub use api::{ApiHarvester, ApiSession, CookieSession, SUPPORTED_API_VERSION, SessionTokens};
pub use browser::BrowserHarvester;
pub use compensation::estimate_compensation;

/// A strategy able to produce every current gig listing.
#[async_trait]
pub trait GigSource: Send + Sync {
    /// Which strategy this source implements.
    fn strategy(&self) -> Strategy;

    /// Collect the complete, ordered list of current gigs.
    async fn fetch_all(&self) -> Result<Vec<GigRecord>>;
}
