//! Scriptable in-memory browser used by the browser harvester tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{BrowserLauncher, BrowserSession};
use crate::error::{AppError, Result};

pub const BLANK: &str = "about:blank";

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub text: String,
    pub href: Option<String>,
}

impl FakeElement {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.into(),
            href: None,
        }
    }

    pub fn link(href: &str) -> Self {
        Self {
            text: String::new(),
            href: Some(href.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub elements: HashMap<String, FakeElement>,
}

impl FakePage {
    pub fn with(mut self, xpath: &str, element: FakeElement) -> Self {
        self.elements.insert(xpath.into(), element);
        self
    }
}

/// Shared state behind every session a [`FakeLauncher`] hands out.
#[derive(Debug)]
pub struct FakeWorld {
    pub pages: HashMap<String, FakePage>,
    pub url: String,
    pub click_navigates: bool,
    pub script_click_navigates: bool,
    pub script_click_errors: bool,
    /// Loads only take effect in sessions launched at or after this count.
    pub loads_work_from_launch: usize,
    /// URLs that a load never reaches.
    pub unreachable: HashSet<String>,
    /// Pointer clicks land on this URL instead of the element's `href`.
    pub click_redirect: Option<String>,
    pub calls: Vec<String>,
    pub launches: usize,
    pub closes: usize,
}

impl Default for FakeWorld {
    fn default() -> Self {
        Self {
            pages: HashMap::new(),
            url: BLANK.into(),
            click_navigates: true,
            script_click_navigates: true,
            script_click_errors: false,
            loads_work_from_launch: 1,
            unreachable: HashSet::new(),
            click_redirect: None,
            calls: Vec::new(),
            launches: 0,
            closes: 0,
        }
    }
}

impl FakeWorld {
    fn element(&self, xpath: &str) -> Option<&FakeElement> {
        self.pages.get(&self.url)?.elements.get(xpath)
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(call)).count()
    }
}

#[derive(Clone, Default)]
pub struct FakeLauncher {
    pub world: Arc<Mutex<FakeWorld>>,
}

impl FakeLauncher {
    pub fn new(world: FakeWorld) -> Self {
        Self {
            world: Arc::new(Mutex::new(world)),
        }
    }

    pub fn world(&self) -> MutexGuard<'_, FakeWorld> {
        self.world.lock().unwrap()
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let mut world = self.world();
        world.launches += 1;
        world.url = BLANK.into();
        world.calls.push("launch".into());
        Ok(Box::new(FakeSession {
            world: Arc::clone(&self.world),
            launch: world.launches,
        }))
    }
}

pub struct FakeSession {
    world: Arc<Mutex<FakeWorld>>,
    launch: usize,
}

impl FakeSession {
    fn world(&self) -> MutexGuard<'_, FakeWorld> {
        self.world.lock().unwrap()
    }

    fn missing(xpath: &str) -> AppError {
        AppError::ElementTimeout {
            selector: xpath.into(),
            timeout_secs: 0,
        }
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn load(&mut self, url: &str) -> Result<()> {
        let mut world = self.world();
        world.calls.push(format!("load {url}"));
        if self.launch >= world.loads_work_from_launch && !world.unreachable.contains(url) {
            world.url = url.into();
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.world().url.clone())
    }

    async fn wait_for(&self, xpath: &str, _timeout: Duration) -> Result<()> {
        match self.world().element(xpath) {
            Some(_) => Ok(()),
            None => Err(Self::missing(xpath)),
        }
    }

    async fn text(&self, xpath: &str) -> Result<String> {
        let world = self.world();
        world
            .element(xpath)
            .map(|e| e.text.clone())
            .ok_or_else(|| Self::missing(xpath))
    }

    async fn link_target(&self, xpath: &str) -> Result<Option<String>> {
        let world = self.world();
        world
            .element(xpath)
            .map(|e| e.href.clone())
            .ok_or_else(|| Self::missing(xpath))
    }

    async fn hover(&self, xpath: &str) -> Result<()> {
        self.world().calls.push(format!("hover {xpath}"));
        Ok(())
    }

    async fn click(&self, xpath: &str) -> Result<()> {
        let mut world = self.world();
        world.calls.push(format!("click {xpath}"));
        let href = world
            .element(xpath)
            .ok_or_else(|| Self::missing(xpath))?
            .href
            .clone();
        if world.click_navigates {
            if let Some(redirect) = world.click_redirect.clone() {
                world.url = redirect;
            } else if let Some(href) = href {
                world.url = href;
            }
        }
        Ok(())
    }

    async fn script_click(&self, xpath: &str) -> Result<()> {
        let mut world = self.world();
        world.calls.push(format!("script_click {xpath}"));
        if world.script_click_errors {
            return Err(AppError::browser("script execution failed"));
        }
        let href = world
            .element(xpath)
            .ok_or_else(|| Self::missing(xpath))?
            .href
            .clone();
        if world.script_click_navigates {
            if let Some(href) = href {
                world.url = href;
            }
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut world = self.world();
        world.closes += 1;
        world.calls.push("close".into());
        Ok(())
    }
}
