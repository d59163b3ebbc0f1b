// src/services/browser/navigator.rs

//! Escalating recovery ladder for getting from one page to the next.
//!
//! Tiers run in order until one lands on the expected page:
//!
//! 1. pointer click on the element
//! 2. script click on the same element
//! 3. direct navigation to the target URL
//! 4. new browser session, then direct navigation
//!
//! Tiers 3 and 4 need a known target URL. Each later tier waits longer before
//! it starts. An error inside a tier is logged and counts as that tier failing.

use std::fmt;

use crate::error::{AppError, Result};
use crate::services::browser::{BrowserLauncher, SessionSlot};
use crate::utils::timing::{DelayRange, Pacer};

/// Pause after a tier errors out, before the next one is tried.
const ERROR_COOLDOWN: DelayRange = DelayRange::secs(40.0, 120.0);

/// One way of reaching a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryTier {
    DirectClick,
    ScriptClick,
    DirectNavigation,
    FreshSession,
}

impl RecoveryTier {
    /// Tiers in escalation order.
    pub const LADDER: [RecoveryTier; 4] = [
        RecoveryTier::DirectClick,
        RecoveryTier::ScriptClick,
        RecoveryTier::DirectNavigation,
        RecoveryTier::FreshSession,
    ];

    pub fn number(self) -> usize {
        match self {
            RecoveryTier::DirectClick => 1,
            RecoveryTier::ScriptClick => 2,
            RecoveryTier::DirectNavigation => 3,
            RecoveryTier::FreshSession => 4,
        }
    }

    /// Whether the tier can only run with a known target URL.
    pub fn requires_target(self) -> bool {
        matches!(
            self,
            RecoveryTier::DirectNavigation | RecoveryTier::FreshSession
        )
    }

    /// Humanized wait before the tier starts.
    pub fn lead_in(self) -> Option<DelayRange> {
        match self {
            RecoveryTier::DirectClick => None,
            RecoveryTier::ScriptClick => Some(DelayRange::secs(5.0, 7.0)),
            RecoveryTier::DirectNavigation => Some(DelayRange::secs(5.0, 10.0)),
            RecoveryTier::FreshSession => Some(DelayRange::secs(120.0, 240.0)),
        }
    }
}

impl fmt::Display for RecoveryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryTier::DirectClick => "direct click",
            RecoveryTier::ScriptClick => "script click",
            RecoveryTier::DirectNavigation => "direct navigation",
            RecoveryTier::FreshSession => "fresh session",
        };
        write!(f, "tier {} ({})", self.number(), name)
    }
}

/// Whether the tab moved off `prior`, and onto `target` when one is known.
pub fn reached_target(current: &str, prior: &str, target: Option<&str>) -> bool {
    current != prior && target.is_none_or(|target| current == target)
}

/// Runs the recovery ladder against a session slot.
pub struct Navigator<'a> {
    launcher: &'a dyn BrowserLauncher,
    pacer: &'a dyn Pacer,
}

impl<'a> Navigator<'a> {
    pub fn new(launcher: &'a dyn BrowserLauncher, pacer: &'a dyn Pacer) -> Self {
        Self { launcher, pacer }
    }

    /// Reach the page behind `xpath` (at `target`, when known).
    ///
    /// Returns the tier that succeeded, or `NavigationUnrecoverable` once the
    /// ladder is exhausted.
    pub async fn get_to(
        &self,
        slot: &mut SessionSlot,
        xpath: &str,
        target: Option<&str>,
    ) -> Result<RecoveryTier> {
        let prior = slot.get()?.current_url().await?;

        for tier in RecoveryTier::LADDER {
            if tier.requires_target() && target.is_none() {
                break;
            }
            if let Some(delay) = tier.lead_in() {
                self.pacer.pause(delay).await;
            }

            match self.try_tier(tier, slot, xpath, target, &prior).await {
                Ok(true) => {
                    log::info!("Reached page via {}", tier);
                    return Ok(tier);
                }
                Ok(false) => log::error!("{} did not reach the page", tier),
                Err(e) => {
                    log::error!("{} failed: {}", tier, e);
                    self.pacer.pause(ERROR_COOLDOWN).await;
                }
            }
        }

        Err(AppError::NavigationUnrecoverable {
            target: target.map(str::to_owned),
        })
    }

    async fn try_tier(
        &self,
        tier: RecoveryTier,
        slot: &mut SessionSlot,
        xpath: &str,
        target: Option<&str>,
        prior: &str,
    ) -> Result<bool> {
        match (tier, target) {
            (RecoveryTier::DirectClick, _) => slot.get()?.click(xpath).await?,
            (RecoveryTier::ScriptClick, _) => slot.get()?.script_click(xpath).await?,
            (RecoveryTier::DirectNavigation, Some(url)) => slot.get_mut()?.load(url).await?,
            (RecoveryTier::FreshSession, Some(url)) => {
                log::error!("Unable to get to {}. Restarting browser session", url);
                slot.restart(self.launcher).await?;
                slot.get_mut()?.load(url).await?;
            }
            (_, None) => return Ok(false),
        }

        let current = slot.get()?.current_url().await?;
        Ok(reached_target(&current, prior, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::browser::BrowserLauncher;
    use crate::services::browser::fake::{FakeElement, FakeLauncher, FakePage, FakeWorld};
    use crate::utils::timing::InstantPacer;

    const HERE: &str = "https://boston.craigslist.org/gbs/cpg/d/here/7000000001.html";
    const THERE: &str = "https://boston.craigslist.org/gbs/cpg/d/there/7000000002.html";
    const ELSEWHERE: &str = "https://boston.craigslist.org/search/ggg";
    const NEXT: &str = "//a[contains(@class, 'next')]";

    fn world() -> FakeWorld {
        let mut world = FakeWorld::default();
        world.pages.insert(
            HERE.into(),
            FakePage::default().with(NEXT, FakeElement::link(THERE)),
        );
        world.pages.insert(THERE.into(), FakePage::default());
        world
    }

    async fn start(launcher: &FakeLauncher) -> SessionSlot {
        let mut slot = SessionSlot::new(launcher.launch().await.unwrap());
        slot.get_mut().unwrap().load(HERE).await.unwrap();
        slot
    }

    #[test]
    fn test_reached_target() {
        assert!(reached_target(THERE, HERE, Some(THERE)));
        assert!(reached_target(THERE, HERE, None));
        assert!(!reached_target(HERE, HERE, None));
        assert!(!reached_target(HERE, HERE, Some(HERE)));
        assert!(!reached_target(ELSEWHERE, HERE, Some(THERE)));
    }

    #[test]
    fn test_lead_in_escalates() {
        let floors: Vec<f64> = RecoveryTier::LADDER
            .iter()
            .map(|t| t.lead_in().map_or(0.0, |d| d.low))
            .collect();
        assert!(floors.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(RecoveryTier::FreshSession.to_string(), "tier 4 (fresh session)");
    }

    #[tokio::test]
    async fn test_direct_click_succeeds_first() {
        let launcher = FakeLauncher::new(world());
        let mut slot = start(&launcher).await;

        let tier = Navigator::new(&launcher, &InstantPacer)
            .get_to(&mut slot, NEXT, Some(THERE))
            .await
            .unwrap();

        assert_eq!(tier, RecoveryTier::DirectClick);
        let world = launcher.world();
        assert_eq!(world.url, THERE);
        assert_eq!(world.count("script_click"), 0);
    }

    #[tokio::test]
    async fn test_direct_navigation_succeeds_without_teardown() {
        let mut w = world();
        w.click_navigates = false;
        w.script_click_navigates = false;
        let launcher = FakeLauncher::new(w);
        let mut slot = start(&launcher).await;

        let tier = Navigator::new(&launcher, &InstantPacer)
            .get_to(&mut slot, NEXT, Some(THERE))
            .await
            .unwrap();

        assert_eq!(tier, RecoveryTier::DirectNavigation);
        let world = launcher.world();
        assert_eq!(world.url, THERE);
        assert_eq!(world.count("click"), 1);
        assert_eq!(world.count("script_click"), 1);
        assert_eq!(world.launches, 1);
        assert_eq!(world.closes, 0);
    }

    #[tokio::test]
    async fn test_fresh_session_is_last_resort() {
        let mut w = world();
        w.click_navigates = false;
        w.script_click_navigates = false;
        w.loads_work_from_launch = 2;
        let launcher = FakeLauncher::new(w);
        let mut slot = SessionSlot::new(launcher.launch().await.unwrap());
        // The first session cannot load anything, so start it on HERE by hand.
        launcher.world().url = HERE.into();

        let tier = Navigator::new(&launcher, &InstantPacer)
            .get_to(&mut slot, NEXT, Some(THERE))
            .await
            .unwrap();

        assert_eq!(tier, RecoveryTier::FreshSession);
        let world = launcher.world();
        assert_eq!(world.url, THERE);
        assert_eq!(world.launches, 2);
        assert_eq!(world.closes, 1);
    }

    #[tokio::test]
    async fn test_exhausted_ladder_is_unrecoverable() {
        let mut w = world();
        w.click_navigates = false;
        w.script_click_navigates = false;
        w.loads_work_from_launch = usize::MAX;
        let launcher = FakeLauncher::new(w);
        let mut slot = SessionSlot::new(launcher.launch().await.unwrap());
        launcher.world().url = HERE.into();

        let err = Navigator::new(&launcher, &InstantPacer)
            .get_to(&mut slot, NEXT, Some(THERE))
            .await
            .unwrap_err();

        match err {
            AppError::NavigationUnrecoverable { target } => {
                assert_eq!(target.as_deref(), Some(THERE))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(launcher.world().launches, 2);
    }

    #[tokio::test]
    async fn test_without_target_only_clicks_are_tried() {
        let mut w = world();
        w.click_navigates = false;
        w.script_click_navigates = false;
        let launcher = FakeLauncher::new(w);
        let mut slot = start(&launcher).await;

        let err = Navigator::new(&launcher, &InstantPacer)
            .get_to(&mut slot, NEXT, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::NavigationUnrecoverable { target: None }
        ));
        let world = launcher.world();
        // Only the initial load from `start`.
        assert_eq!(world.count("load"), 1);
        assert_eq!(world.launches, 1);
    }

    #[tokio::test]
    async fn test_without_target_any_move_counts() {
        let mut w = world();
        w.click_redirect = Some(ELSEWHERE.into());
        let launcher = FakeLauncher::new(w);
        let mut slot = start(&launcher).await;

        let tier = Navigator::new(&launcher, &InstantPacer)
            .get_to(&mut slot, NEXT, None)
            .await
            .unwrap();
        assert_eq!(tier, RecoveryTier::DirectClick);
    }

    #[tokio::test]
    async fn test_wrong_destination_escalates() {
        let mut w = world();
        w.click_redirect = Some(ELSEWHERE.into());
        let launcher = FakeLauncher::new(w);
        let mut slot = start(&launcher).await;

        let tier = Navigator::new(&launcher, &InstantPacer)
            .get_to(&mut slot, NEXT, Some(THERE))
            .await
            .unwrap();

        // The pointer click lands on the wrong page, where the "next" link no
        // longer exists; only the direct navigation reaches the target.
        assert_eq!(tier, RecoveryTier::DirectNavigation);
        let world = launcher.world();
        assert_eq!(world.url, THERE);
        assert_eq!(world.count("script_click"), 1);
    }

    #[tokio::test]
    async fn test_tier_error_is_not_propagated() {
        let mut w = world();
        w.click_navigates = false;
        w.script_click_errors = true;
        let launcher = FakeLauncher::new(w);
        let mut slot = start(&launcher).await;

        let tier = Navigator::new(&launcher, &InstantPacer)
            .get_to(&mut slot, NEXT, Some(THERE))
            .await
            .unwrap();
        assert_eq!(tier, RecoveryTier::DirectNavigation);
    }
}
