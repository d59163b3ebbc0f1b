// src/error.rs

//! Unified error handling for the gig crawler.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The remote API answered with a non-success status or a malformed body.
    #[error("Bad response (status {status}): {body}")]
    BadResponse { status: u16, body: String },

    /// The private API reported a version this client does not speak.
    #[error("API version mismatch: expected {expected}, found {found}")]
    ProtocolVersionMismatch { expected: i64, found: i64 },

    /// Every recovery tier failed to reach the target page.
    #[error("Unable to reach {}", target.as_deref().unwrap_or("the next page"))]
    NavigationUnrecoverable { target: Option<String> },

    /// Browser driver failure
    #[error("Browser error: {0}")]
    Browser(String),

    /// A required page element did not show up in time
    #[error("Timed out after {timeout_secs}s waiting for '{selector}'")]
    ElementTimeout { selector: String, timeout_secs: u64 },

    /// Listing page could not be turned into a record
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Run storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// Create a bad response error from a status code and body text.
    pub fn bad_response(status: u16, body: impl Into<String>) -> Self {
        Self::BadResponse {
            status,
            body: body.into(),
        }
    }

    /// Create a browser driver error.
    pub fn browser(message: impl fmt::Display) -> Self {
        Self::Browser(message.to_string())
    }

    /// Create an extraction error.
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Whether the orchestrator may retry the same strategy after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BadResponse { .. })
    }
}
