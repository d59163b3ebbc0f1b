// src/services/browser/chromium.rs

//! Chromium sessions over the DevTools protocol.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};

use crate::error::{AppError, Result};
use crate::models::BrowserConfig;
use crate::services::browser::{BrowserLauncher, BrowserSession};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
/// How long a click may take to turn into a navigation before we stop waiting.
const CLICK_SETTLE: Duration = Duration::from_secs(5);

/// Locate a Chrome or Chromium binary.
///
/// `CHROME_PATH` wins, then the usual binary names on `PATH`, then the
/// standard macOS install location.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CHROME_PATH") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    let names = ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"];
    if let Some(paths) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths) {
            for name in names {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launches Chromium sessions from [`BrowserConfig`].
pub struct ChromiumLauncher {
    config: BrowserConfig,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn chrome_config(&self) -> Result<ChromeConfig> {
        let mut builder = ChromeConfig::builder()
            .request_timeout(Duration::from_secs(self.config.page_load_timeout_secs))
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled");

        if !self.config.headless {
            builder = builder.with_head();
        }

        let executable = self.config.chrome_executable.clone().or_else(find_chromium);
        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }

        builder
            .build()
            .map_err(|e| AppError::browser(format!("invalid browser config: {e}")))
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        log::info!("Launching browser (headless: {})", self.config.headless);

        let (browser, mut handler) = Browser::launch(self.chrome_config()?)
            .await
            .map_err(|e| AppError::browser(format!("failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::browser(format!("failed to open page: {e}")))?;

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            page_load_timeout: Duration::from_secs(self.config.page_load_timeout_secs),
        }))
    }
}

/// One Chromium process with a single tab.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    page_load_timeout: Duration,
}

/// Result of reading one property off an XPath match.
#[derive(Debug, Deserialize)]
struct NodeRead {
    found: bool,
    value: Option<String>,
}

/// JS expression yielding the first node matching `xpath`, or null.
fn xpath_node(xpath: &str) -> String {
    // A JSON string literal is also a valid JS string literal.
    let literal = serde_json::Value::String(xpath.to_owned()).to_string();
    format!(
        "document.evaluate({literal}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue"
    )
}

/// Rendered text of the first match, as the user sees it.
fn text_script(xpath: &str) -> String {
    format!(
        "(() => {{ const n = {}; return {{ found: n !== null, value: n === null ? null : n.innerText }}; }})()",
        xpath_node(xpath)
    )
}

impl ChromiumSession {
    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| AppError::browser(format!("script failed: {e}")))?
            .into_value()
            .map_err(|e| AppError::browser(format!("unexpected script result: {e}")))
    }

    async fn require(&self, xpath: &str) -> Result<chromiumoxide::element::Element> {
        self.page
            .find_xpath(xpath)
            .await
            .map_err(|e| AppError::browser(format!("element {xpath} not found: {e}")))
    }

    async fn ready_state(&self) -> Result<String> {
        self.eval("document.readyState".to_owned()).await
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn load(&mut self, url: &str) -> Result<()> {
        log::debug!("Loading {}", url);
        let deadline = Instant::now() + self.page_load_timeout;

        timeout(self.page_load_timeout, self.page.goto(url))
            .await
            .map_err(|_| AppError::browser(format!("timed out loading {url}")))?
            .map_err(|e| AppError::browser(format!("failed to load {url}: {e}")))?;

        while self.ready_state().await? != "complete" {
            if Instant::now() >= deadline {
                return Err(AppError::browser(format!("{url} never finished loading")));
            }
            sleep(POLL_INTERVAL).await;
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| AppError::browser(format!("failed to read URL: {e}")))?;
        Ok(url.unwrap_or_default())
    }

    async fn wait_for(&self, xpath: &str, limit: Duration) -> Result<()> {
        let deadline = Instant::now() + limit;
        let present = format!("{} !== null", xpath_node(xpath));

        loop {
            // Evaluation errors while a page swaps out count as "not there yet".
            if self.eval::<bool>(present.clone()).await.unwrap_or(false) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AppError::ElementTimeout {
                    selector: xpath.to_owned(),
                    timeout_secs: limit.as_secs(),
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn text(&self, xpath: &str) -> Result<String> {
        let read: NodeRead = self.eval(text_script(xpath)).await?;
        match read {
            NodeRead { found: true, value } => Ok(value.unwrap_or_default()),
            _ => Err(AppError::extraction(format!("no element at {xpath}"))),
        }
    }

    async fn link_target(&self, xpath: &str) -> Result<Option<String>> {
        let script = format!(
            "(() => {{ const n = {}; return {{ found: n !== null, value: n && n.href ? String(n.href) : null }}; }})()",
            xpath_node(xpath)
        );
        let read: NodeRead = self.eval(script).await?;
        if !read.found {
            return Err(AppError::extraction(format!("no element at {xpath}")));
        }
        Ok(read.value.filter(|href| !href.is_empty()))
    }

    async fn hover(&self, xpath: &str) -> Result<()> {
        self.require(xpath)
            .await?
            .hover()
            .await
            .map_err(|e| AppError::browser(format!("hover on {xpath} failed: {e}")))?;
        Ok(())
    }

    async fn click(&self, xpath: &str) -> Result<()> {
        self.require(xpath)
            .await?
            .click()
            .await
            .map_err(|e| AppError::browser(format!("click on {xpath} failed: {e}")))?;

        // Not every click navigates; the caller checks where the tab ended up.
        let _ = timeout(CLICK_SETTLE, self.page.wait_for_navigation()).await;
        Ok(())
    }

    async fn script_click(&self, xpath: &str) -> Result<()> {
        let script = format!(
            "(() => {{ const n = {}; if (n === null) return false; n.click(); return true; }})()",
            xpath_node(xpath)
        );
        if !self.eval::<bool>(script).await? {
            return Err(AppError::extraction(format!("no element at {xpath}")));
        }

        let _ = timeout(CLICK_SETTLE, self.page.wait_for_navigation()).await;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        let closed = this.browser.close().await;
        if let Err(e) = this.browser.wait().await {
            log::warn!("Browser process did not exit cleanly: {}", e);
        }
        this.handler_task.abort();

        closed
            .map(|_| ())
            .map_err(|e| AppError::browser(format!("failed to close browser: {e}")))
    }
}
