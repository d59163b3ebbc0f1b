// src/services/browser/harvester.rs

//! Browser-driven gig harvester.
//!
//! Loads the search page, narrows it to paid gigs, opens the first listing
//! and then walks the "next" links one listing at a time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{BrowserConfig, GigRecord, Strategy};
use crate::services::GigSource;
use crate::services::browser::{BrowserLauncher, Navigator, SessionSlot, selectors};
use crate::utils::extract_gig_id;
use crate::utils::timing::{DelayRange, Pacer};

const PAID_HOVER_PAUSE: DelayRange = DelayRange::secs(0.1, 0.8);
const APPLY_HOVER_PAUSE: DelayRange = DelayRange::secs(0.2, 1.5);
const AFTER_FILTER_PAUSE: DelayRange = DelayRange::secs(1.0, 3.0);

const PER_GIG_PAUSE: DelayRange = DelayRange::secs(3.0, 10.0);
const LONG_PAUSE: DelayRange = DelayRange::secs(10.0, 50.0);
const LONG_PAUSE_ODDS: u32 = 20;
const RARE_PAUSE: DelayRange = DelayRange::secs(50.0, 250.0);
const RARE_PAUSE_ODDS: u32 = 200;

/// Harvester that walks listings in a real browser.
pub struct BrowserHarvester {
    config: BrowserConfig,
    launcher: Arc<dyn BrowserLauncher>,
    pacer: Arc<dyn Pacer>,
}

impl BrowserHarvester {
    /// Create a new browser harvester.
    pub fn new(
        config: BrowserConfig,
        launcher: Arc<dyn BrowserLauncher>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            config,
            launcher,
            pacer,
        }
    }

    fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.config.element_timeout_secs)
    }

    fn navigator(&self) -> Navigator<'_> {
        Navigator::new(self.launcher.as_ref(), self.pacer.as_ref())
    }

    /// Steps:
    /// 1. load the search page
    /// 2. restrict the search to paid gigs
    /// 3. open the first listing
    /// 4. record the listing, then follow "next" until it has no target
    async fn walk(&self, slot: &mut SessionSlot) -> Result<Vec<GigRecord>> {
        slot.get_mut()?.load(&self.config.search_url).await?;
        log::info!("Loaded page: {}", self.config.search_url);

        self.select_only_paid(slot).await?;
        self.open_first_gig(slot).await?;

        let mut gigs = Vec::new();
        loop {
            let gig = self.gig_data(slot).await?;
            log::info!("Scraped gig: \"{}\"", gig.title);
            gigs.push(gig);

            self.humanize().await;

            match self.next_gig_target(slot).await? {
                Some(href) => self.open_next_gig(slot, &href).await?,
                None => break,
            }
        }

        Ok(gigs)
    }

    /// Tick the "paid" filter and re-run the search.
    async fn select_only_paid(&self, slot: &mut SessionSlot) -> Result<()> {
        let session = slot.get()?;
        let timeout = self.element_timeout();
        session.wait_for(selectors::PAID_FILTER, timeout).await?;
        session.wait_for(selectors::APPLY_SEARCH, timeout).await?;

        session.hover(selectors::PAID_FILTER).await?;
        self.pacer.pause(PAID_HOVER_PAUSE).await;
        session.click(selectors::PAID_FILTER).await?;

        session.hover(selectors::APPLY_SEARCH).await?;
        self.pacer.pause(APPLY_HOVER_PAUSE).await;
        session.click(selectors::APPLY_SEARCH).await?;

        log::info!("Selected only paid gigs option");
        self.pacer.pause(AFTER_FILTER_PAUSE).await;
        Ok(())
    }

    async fn open_first_gig(&self, slot: &mut SessionSlot) -> Result<()> {
        let session = slot.get()?;
        let timeout = Duration::from_secs(self.config.page_load_timeout_secs);
        session.wait_for(selectors::FIRST_GIG, timeout).await?;
        session.hover(selectors::FIRST_GIG).await?;
        let href = session.link_target(selectors::FIRST_GIG).await?;
        log::info!("Navigating to first gig page");

        self.navigator()
            .get_to(slot, selectors::FIRST_GIG, href.as_deref())
            .await?;
        Ok(())
    }

    async fn open_next_gig(&self, slot: &mut SessionSlot, href: &str) -> Result<()> {
        slot.get()?.hover(selectors::NEXT_GIG).await?;
        log::debug!("Navigating to next gig: {}", href);

        self.navigator()
            .get_to(slot, selectors::NEXT_GIG, Some(href))
            .await?;
        Ok(())
    }

    /// Target of the "next" control, or `None` on the last listing.
    async fn next_gig_target(&self, slot: &SessionSlot) -> Result<Option<String>> {
        let session = slot.get()?;
        session
            .wait_for(selectors::NEXT_GIG, self.element_timeout())
            .await?;
        session.link_target(selectors::NEXT_GIG).await
    }

    /// Read title, compensation and id off the current listing page.
    async fn gig_data(&self, slot: &SessionSlot) -> Result<GigRecord> {
        let session = slot.get()?;
        let timeout = self.element_timeout();

        session.wait_for(selectors::COMPENSATION, timeout).await?;
        session.wait_for(selectors::TITLE, timeout).await?;
        let comp = session.text(selectors::COMPENSATION).await?;
        let title = session.text(selectors::TITLE).await?;

        let url = session.current_url().await?;
        let gig_id = extract_gig_id(&url)
            .ok_or_else(|| AppError::extraction(format!("no gig id in {url}")))?;

        log::debug!("title = {:?}, comp = {:?}, gig_id = {}", title, comp, gig_id);
        Ok(GigRecord::new(gig_id, title.trim(), comp.trim()))
    }

    /// Per-listing pause with two rarer, longer layers on top.
    async fn humanize(&self) {
        self.pacer.pause(PER_GIG_PAUSE).await;
        if self.pacer.one_in(LONG_PAUSE_ODDS) {
            self.pacer.pause(LONG_PAUSE).await;
        }
        if self.pacer.one_in(RARE_PAUSE_ODDS) {
            self.pacer.pause(RARE_PAUSE).await;
        }
    }
}

#[async_trait]
impl GigSource for BrowserHarvester {
    fn strategy(&self) -> Strategy {
        Strategy::Browser
    }

    /// Walk every listing, then shut the browser down whatever the outcome.
    async fn fetch_all(&self) -> Result<Vec<GigRecord>> {
        let mut slot = SessionSlot::new(self.launcher.launch().await?);
        let result = self.walk(&mut slot).await;

        if let Err(e) = slot.close().await {
            log::warn!("Failed to close browser session: {}", e);
        }
        result
    }
}
