// src/utils/http.rs

//! HTTP client utilities.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderName, HeaderValue, REFERER};
use url::Url;

use crate::error::Result;
use crate::models::ApiConfig;

/// Create an HTTP client that stores cookies in `jar`.
pub fn create_client(config: &ApiConfig, jar: Arc<Jar>) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .cookie_provider(jar)
        .build()?;
    Ok(client)
}

/// Headers a browser sends when it loads a page or calls the search API.
pub fn browser_headers(accept: &'static str, referer: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    if let Ok(value) = HeaderValue::from_str(referer) {
        headers.insert(REFERER, value);
    }
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("script"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("cors"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("same-site"),
    );
    headers
}

/// Whether the jar holds a cookie called `name` for `url`.
pub fn has_cookie(jar: &Jar, url: &Url, name: &str) -> bool {
    jar.cookies(url)
        .and_then(|value| value.to_str().map(str::to_owned).ok())
        .map(|header| {
            header
                .split(';')
                .filter_map(|pair| pair.trim().split_once('='))
                .any(|(key, _)| key == name)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_cookie() {
        let jar = Jar::default();
        let url = Url::parse("https://boston.craigslist.org/search/ggg").unwrap();
        assert!(!has_cookie(&jar, &url, "cl_b"));

        jar.add_cookie_str("cl_b=4|abc; Path=/", &url);
        jar.add_cookie_str("cl_tocmode=ggg%3Apic; Path=/", &url);
        assert!(has_cookie(&jar, &url, "cl_b"));
        assert!(has_cookie(&jar, &url, "cl_tocmode"));
        assert!(!has_cookie(&jar, &url, "cl_"));
    }

    #[test]
    fn test_browser_headers() {
        let headers = browser_headers("*/*", "https://boston.craigslist.org");
        assert_eq!(headers[ACCEPT], "*/*");
        assert_eq!(headers[REFERER], "https://boston.craigslist.org");
        assert_eq!(headers["sec-fetch-site"], "same-site");
    }
}
