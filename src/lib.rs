// src/lib.rs

//! Gig Crawler Library
//!
//! Collects paid gig listings through the site's private search API, falling
//! back to a driven browser when the API path fails.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
