// src/services/api.rs

//! Private search API client.
//!
//! Replays the requests the site's own search page makes:
//!
//! 1. load the search page to obtain the `cl_b` session cookie,
//! 2. call `/postings/search/full` to obtain cache tokens and the result count,
//! 3. page through `/postings/search/batch` until every posting is collected.
//!
//! Each step returns an explicit session value consumed by the next one, so
//! the data flow between the requests stays visible. Nothing here retries;
//! the orchestrator decides what a failure means.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::cookie::Jar;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ApiConfig, GigRecord, Strategy};
use crate::services::GigSource;
use crate::utils::http::{browser_headers, create_client, has_cookie};
use crate::utils::timing::{DelayRange, Pacer};
use crate::utils::unix_timestamp;

/// The only private API version this client understands.
pub const SUPPORTED_API_VERSION: i64 = 8;

/// Cookie the search page must set before the API will answer.
const SESSION_COOKIE: &str = "cl_b";

/// Display-mode cookie the browser adds on its own.
const TOC_MODE_COOKIE: &str = "cl_tocmode=ggg%3Apic; Path=/";

/// Compensation text used for postings that carry none.
const NO_COMPENSATION: &str = "$0";

/// Version reported when the `full` response carries none.
const MISSING_VERSION: i64 = -1;

const HANDSHAKE_PAUSE: DelayRange = DelayRange::millis(30.0, 200.0);
const BATCH_PAUSE: DelayRange = DelayRange::millis(5.0, 20.0);

/// HTTP client after the bootstrap request; its cookie store holds the
/// session cookies.
pub struct CookieSession {
    client: reqwest::Client,
}

/// Pagination tokens returned by the `full` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub cache_id: String,
    pub cache_ts: String,
    pub max_posted_ts: String,
    pub total_gig_count: u64,
    pub api_version: i64,
}

/// A fully initialized API session, valid for a single run.
pub struct ApiSession {
    cookies: CookieSession,
    tokens: SessionTokens,
}

impl ApiSession {
    pub fn tokens(&self) -> &SessionTokens {
        &self.tokens
    }
}

/// Harvester that talks to the private search API.
pub struct ApiHarvester {
    config: ApiConfig,
    pacer: Arc<dyn Pacer>,
}

impl ApiHarvester {
    /// Create a new API harvester.
    pub fn new(config: ApiConfig, pacer: Arc<dyn Pacer>) -> Self {
        Self { config, pacer }
    }

    /// Load the search page and capture the session cookie.
    pub async fn bootstrap(&self) -> Result<CookieSession> {
        let jar = Arc::new(Jar::default());
        let client = create_client(&self.config, Arc::clone(&jar))?;

        let site = self.site_url()?;
        let search_url = site.join(&format!("/search/{}", self.config.search_path))?;

        let response = client
            .get(search_url.clone())
            .headers(browser_headers(
                "text/html,application/xhtml+xml,application/xml;q=0.9",
                "https://www.google.com/",
            ))
            .query(&[("is_paid", self.config.is_paid.as_str())])
            .send()
            .await?;

        let status = response.status();
        log::info!(
            "Sent request to search page for session cookie. Status code: {}",
            status.as_u16()
        );

        if status != StatusCode::OK || !has_cookie(&jar, &search_url, SESSION_COOKIE) {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::bad_response(status.as_u16(), body));
        }

        let api = self.api_url()?;
        jar.add_cookie_str(TOC_MODE_COOKIE, &site);
        jar.add_cookie_str(TOC_MODE_COOKIE, &api);
        log::debug!("Session cookies initialized for {}", site);

        Ok(CookieSession { client })
    }

    /// Call the `full` endpoint and capture pagination tokens.
    ///
    /// Fails with `ProtocolVersionMismatch` when the API reports a version
    /// other than [`SUPPORTED_API_VERSION`].
    pub async fn handshake(&self, cookies: CookieSession) -> Result<ApiSession> {
        let url = self.api_url()?.join("/web/v8/postings/search/full")?;
        let batch = format!(
            "{}-{}-0-{}-0",
            self.config.location_code,
            unix_timestamp(),
            self.config.sort_id
        );
        let query = [
            ("CC", self.config.country.as_str()),
            ("batch", batch.as_str()),
            ("lang", self.config.lang.as_str()),
            ("searchPath", self.config.search_path.as_str()),
            ("is_paid", self.config.is_paid.as_str()),
        ];

        let response = cookies
            .client
            .get(url)
            .headers(browser_headers("*/*", &self.config.site_url()))
            .query(&query)
            .send()
            .await?;

        log::info!(
            "Sent request to full endpoint for tokens. Status code: {}",
            response.status().as_u16()
        );
        let (status, body) = read_success(response).await?;
        let parsed: Value = parse_body(status, &body)?;

        // The version decides how the rest of the body is read, so it is
        // checked before any token field is touched.
        let api_version = api_version(&parsed);
        log::info!("Using API version {}", api_version);
        if api_version != SUPPORTED_API_VERSION {
            return Err(AppError::ProtocolVersionMismatch {
                expected: SUPPORTED_API_VERSION,
                found: api_version,
            });
        }

        let data = parsed
            .get("data")
            .map(|data| FullData::deserialize(data))
            .transpose()
            .map_err(|e| {
                log::warn!("Malformed full endpoint data: {}", e);
                AppError::bad_response(status.as_u16(), body.as_str())
            })?
            .ok_or_else(|| AppError::bad_response(status.as_u16(), body.as_str()))?;

        let tokens = SessionTokens {
            cache_id: data.cache_id,
            cache_ts: data.cache_ts,
            max_posted_ts: data.max_posted_ts,
            total_gig_count: data.total_result_count,
            api_version,
        };
        log::debug!("Collected tokens: {:?}", tokens);

        Ok(ApiSession { cookies, tokens })
    }

    /// Collect every posting, one batch at a time.
    pub async fn gather(&self, session: &ApiSession) -> Result<Vec<GigRecord>> {
        let total = session.tokens.total_gig_count;
        let step = usize::try_from(self.config.batch_size)
            .map_err(|_| AppError::config("api.batch_size does not fit in usize"))?
            .max(1);

        let mut gigs = Vec::new();
        for offset in (0..total).step_by(step) {
            gigs.extend(self.fetch_batch(session, offset).await?);
            self.pacer.pause(BATCH_PAUSE).await;
        }

        log::info!("Collected {} gigs from {} advertised", gigs.len(), total);
        Ok(gigs)
    }

    /// Fetch one batch starting at `offset`.
    pub async fn fetch_batch(&self, session: &ApiSession, offset: u64) -> Result<Vec<GigRecord>> {
        let count = self.config.batch_size;
        log::info!("Requesting batch: start = {}, count = {}", offset, count);

        let tokens = &session.tokens;
        let url = self.api_url()?.join("/web/v8/postings/search/batch")?;
        let batch = format!(
            "{}-{}-{}-1-0-{}-{}",
            self.config.location_code, offset, count, tokens.max_posted_ts, tokens.cache_ts
        );
        // `CC` carries the language value here; that is what the site itself sends.
        let query = [
            ("batch", batch.as_str()),
            ("cacheId", tokens.cache_id.as_str()),
            ("CC", self.config.lang.as_str()),
            ("lang", self.config.lang.as_str()),
        ];

        let response = session
            .cookies
            .client
            .get(url)
            .headers(browser_headers("*/*", &self.config.site_url()))
            .query(&query)
            .send()
            .await?;

        log::info!(
            "Sent request to batch endpoint. Status code: {}",
            response.status().as_u16()
        );
        let (status, body) = read_success(response).await?;
        let parsed: BatchResponse = parse_body(status, &body)?;

        let base_id = parsed.data.min_posting_id;
        parsed
            .data
            .batch
            .iter()
            .map(|posting| parse_posting(posting, base_id))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| AppError::bad_response(status.as_u16(), body))
    }

    fn site_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.config.site_url())?)
    }

    fn api_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.config.api_url)?)
    }
}

#[async_trait]
impl GigSource for ApiHarvester {
    fn strategy(&self) -> Strategy {
        Strategy::Api
    }

    async fn fetch_all(&self) -> Result<Vec<GigRecord>> {
        let cookies = self.bootstrap().await?;
        let session = self.handshake(cookies).await?;
        self.pacer.pause(HANDSHAKE_PAUSE).await;
        self.gather(&session).await
    }
}

/// Read the body, failing with `BadResponse` on anything but 200.
async fn read_success(response: reqwest::Response) -> Result<(StatusCode, String)> {
    let status = response.status();
    let body = response.text().await?;
    if status != StatusCode::OK {
        return Err(AppError::bad_response(status.as_u16(), body));
    }
    Ok((status, body))
}

fn parse_body<T: de::DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        log::warn!("Malformed API body: {}", e);
        AppError::bad_response(status.as_u16(), body)
    })
}

/// Turn one compact posting array into a record.
///
/// `[0]` is an id delta against the batch's `minPostingId`, `[1]` the title,
/// and `[4][1]` the compensation text when the array has at least five items.
fn parse_posting(posting: &[Value], base_id: u64) -> Option<GigRecord> {
    let delta = posting.first().and_then(value_as_u64)?;
    let title = posting.get(1)?.as_str()?;
    let comp_message = if posting.len() < 5 {
        NO_COMPENSATION
    } else {
        posting[4]
            .get(1)
            .and_then(Value::as_str)
            .unwrap_or(NO_COMPENSATION)
    };

    Some(GigRecord::new(base_id.checked_add(delta)?, title, comp_message))
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Top-level `apiVersion` of a `full` response; -1 when absent or unreadable.
fn api_version(body: &Value) -> i64 {
    match body.get("apiVersion") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(MISSING_VERSION),
        Some(Value::String(s)) => s.parse().unwrap_or(MISSING_VERSION),
        _ => MISSING_VERSION,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullData {
    #[serde(deserialize_with = "token_string")]
    cache_id: String,
    #[serde(deserialize_with = "token_string")]
    cache_ts: String,
    #[serde(deserialize_with = "token_string")]
    max_posted_ts: String,
    #[serde(deserialize_with = "token_u64")]
    total_result_count: u64,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    data: BatchData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchData {
    #[serde(deserialize_with = "token_u64")]
    min_posting_id: u64,
    #[serde(default)]
    batch: Vec<Vec<Value>>,
}

fn token_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn token_u64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
    let value = Value::deserialize(d)?;
    value_as_u64(&value)
        .ok_or_else(|| de::Error::custom(format!("expected unsigned integer, got {value}")))
}
