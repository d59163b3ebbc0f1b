//! Browser-driven harvesting.
//!
//! The harvester only talks to a [`BrowserSession`], an XPath-addressed view
//! of one automated browser tab. Sessions come from a [`BrowserLauncher`] so
//! the recovery ladder can throw a compromised session away and start over.

#[cfg(feature = "browser")]
mod chromium;
#[cfg(test)]
pub(crate) mod fake;
mod harvester;
mod navigator;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};

#[cfg(feature = "browser")]
pub use chromium::{ChromiumLauncher, find_chromium};
pub use harvester::BrowserHarvester;
pub use navigator::{Navigator, RecoveryTier, reached_target};

/// XPath selectors for the listing site's pages.
pub mod selectors {
    pub const TITLE: &str = "//*[@id='titletextonly']";
    pub const COMPENSATION: &str = "(//p|//span)[contains(text(), 'compensation')]/b";
    pub const PAID_FILTER: &str = "//*[@name='is_paid']/following-sibling::*//button[text()='paid']";
    pub const APPLY_SEARCH: &str = "//button[contains(@class, 'cl-exec-search')]";
    pub const FIRST_GIG: &str = "//div[contains(@class, 'cl-results-page')]//ol/li[1]//a[1]";
    pub const NEXT_GIG: &str = "//a[contains(@class, 'next')]";
}

/// One automated browser tab.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate to `url` and wait until the document reports `complete`.
    async fn load(&mut self, url: &str) -> Result<()>;

    /// URL the tab currently shows.
    async fn current_url(&self) -> Result<String>;

    /// Wait until an element matching `xpath` exists, failing after `timeout`.
    async fn wait_for(&self, xpath: &str, timeout: Duration) -> Result<()>;

    /// Visible text of the first element matching `xpath`.
    async fn text(&self, xpath: &str) -> Result<String>;

    /// Resolved `href` of the first element matching `xpath`, if it has one.
    async fn link_target(&self, xpath: &str) -> Result<Option<String>>;

    /// Move the pointer over the element.
    async fn hover(&self, xpath: &str) -> Result<()>;

    /// Pointer click on the element.
    async fn click(&self, xpath: &str) -> Result<()>;

    /// Click through the page's own scripting (`element.click()`).
    async fn script_click(&self, xpath: &str) -> Result<()>;

    /// Tear the session down.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Factory for fresh browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Holder for the session currently in use.
///
/// Empty only between a teardown and a successful relaunch.
pub struct SessionSlot {
    session: Option<Box<dyn BrowserSession>>,
}

impl SessionSlot {
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn get(&self) -> Result<&dyn BrowserSession> {
        self.session
            .as_deref()
            .ok_or_else(|| AppError::browser("browser session is closed"))
    }

    pub fn get_mut(&mut self) -> Result<&mut (dyn BrowserSession + 'static)> {
        self.session
            .as_deref_mut()
            .ok_or_else(|| AppError::browser("browser session is closed"))
    }

    /// Close the current session and replace it with a fresh one.
    pub async fn restart(&mut self, launcher: &dyn BrowserLauncher) -> Result<()> {
        if let Err(e) = self.close().await {
            log::warn!("Failed to close browser session: {}", e);
        }
        self.session = Some(launcher.launch().await?);
        Ok(())
    }

    /// Close the current session, if any.
    pub async fn close(&mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }
}
