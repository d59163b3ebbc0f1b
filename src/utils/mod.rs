//! Utility functions and helpers.

pub mod http;
pub mod timing;

use url::Url;

/// Extract the listing id from a gig URL (`/.../{digits}.html`).
pub fn extract_gig_id(url_str: &str) -> Option<u64> {
    let path = Url::parse(url_str)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url_str.to_string());

    let pattern = regex::Regex::new(r"/(\d+)\.html").ok()?;
    pattern
        .captures(&path)
        .and_then(|caps| caps.get(1))
        .and_then(|id| id.as_str().parse().ok())
}

/// Current UNIX time in whole seconds.
pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
