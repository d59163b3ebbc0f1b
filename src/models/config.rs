//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Private search API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Browser fallback settings
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Humanized pacing settings
    #[serde(default)]
    pub timing: TimingConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.api.user_agent.trim().is_empty() {
            return Err(AppError::validation("api.user_agent is empty"));
        }
        if self.api.timeout_secs == 0 {
            return Err(AppError::validation("api.timeout_secs must be > 0"));
        }
        if self.api.batch_size == 0 {
            return Err(AppError::validation("api.batch_size must be > 0"));
        }
        url::Url::parse(&self.api.site_url())
            .map_err(|e| AppError::validation(format!("api site url: {e}")))?;
        url::Url::parse(&self.api.api_url)
            .map_err(|e| AppError::validation(format!("api.api_url: {e}")))?;
        url::Url::parse(&self.browser.search_url)
            .map_err(|e| AppError::validation(format!("browser.search_url: {e}")))?;
        if self.browser.page_load_timeout_secs == 0 || self.browser.element_timeout_secs == 0 {
            return Err(AppError::validation("browser timeouts must be > 0"));
        }
        Ok(())
    }
}

/// Settings for the private search API client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Site subdomain, e.g. `boston`
    #[serde(default = "defaults::location")]
    pub location: String,

    /// Numeric area code used inside `batch` parameters
    #[serde(default = "defaults::location_code")]
    pub location_code: u32,

    /// Postings requested per batch
    #[serde(default = "defaults::batch_size")]
    pub batch_size: u64,

    /// Sort order id sent with the handshake
    #[serde(default = "defaults::sort_id")]
    pub sort_id: u32,

    /// `CC` query value for the handshake
    #[serde(default = "defaults::country")]
    pub country: String,

    /// `lang` query value
    #[serde(default = "defaults::lang")]
    pub lang: String,

    /// Search category path (`ggg` is gigs)
    #[serde(default = "defaults::search_path")]
    pub search_path: String,

    /// `is_paid` filter value
    #[serde(default = "defaults::is_paid")]
    pub is_paid: String,

    /// Override for the site origin; derived from `location` when absent
    #[serde(default)]
    pub site_url: Option<String>,

    /// Origin of the private API
    #[serde(default = "defaults::api_url")]
    pub api_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl ApiConfig {
    /// Site origin, e.g. `https://boston.craigslist.org`.
    pub fn site_url(&self) -> String {
        match &self.site_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.craigslist.org", self.location),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            location: defaults::location(),
            location_code: defaults::location_code(),
            batch_size: defaults::batch_size(),
            sort_id: defaults::sort_id(),
            country: defaults::country(),
            lang: defaults::lang(),
            search_path: defaults::search_path(),
            is_paid: defaults::is_paid(),
            site_url: None,
            api_url: defaults::api_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Settings for the browser-driven harvester.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Search page the harvester starts from
    #[serde(default = "defaults::search_url")]
    pub search_url: String,

    /// Run Chromium without a window
    #[serde(default = "defaults::headless")]
    pub headless: bool,

    /// Explicit Chromium binary; detected when absent
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,

    /// Bound on waiting for `document.readyState`
    #[serde(default = "defaults::page_load_timeout")]
    pub page_load_timeout_secs: u64,

    /// Bound on waiting for any single element
    #[serde(default = "defaults::element_timeout")]
    pub element_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            search_url: defaults::search_url(),
            headless: defaults::headless(),
            chrome_executable: None,
            page_load_timeout_secs: defaults::page_load_timeout(),
            element_timeout_secs: defaults::element_timeout(),
        }
    }
}

/// Humanized pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Insert randomized delays between actions
    #[serde(default = "defaults::humanize")]
    pub humanize: bool,

    /// Fixed RNG seed for reproducible pacing
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            humanize: defaults::humanize(),
            seed: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter (`error`, `warn`, `info`, `debug`, `trace`)
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // API defaults
    pub fn location() -> String {
        "boston".into()
    }
    pub fn location_code() -> u32 {
        4
    }
    pub fn batch_size() -> u64 {
        1080
    }
    pub fn sort_id() -> u32 {
        1
    }
    pub fn country() -> String {
        "US".into()
    }
    pub fn lang() -> String {
        "en".into()
    }
    pub fn search_path() -> String {
        "ggg".into()
    }
    pub fn is_paid() -> String {
        "yes".into()
    }
    pub fn api_url() -> String {
        "https://sapi.craigslist.org".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
         (KHTML, like Gecko) Version/15.5 Safari/605.1.15"
            .into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Browser defaults
    pub fn search_url() -> String {
        "https://boston.craigslist.org/search/ggg".into()
    }
    pub fn headless() -> bool {
        true
    }
    pub fn page_load_timeout() -> u64 {
        15
    }
    pub fn element_timeout() -> u64 {
        10
    }

    // Timing defaults
    pub fn humanize() -> bool {
        true
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
}
