// src/services/compensation.rs

//! Compensation estimation from free-text pay descriptions.

use regex::Regex;

/// A dollar amount: comma-grouped thousands or a plain digit run, with
/// optional cents.
const DOLLAR_PATTERN: &str = r"\$(\d{1,3}(?:,\d{3})+|\d+)(\.\d{2})?";

/// Extract the first dollar amount from a compensation message.
///
/// Returns `None` when the text contains no `$` amount.
pub fn estimate_compensation(comp_msg: &str) -> Option<f64> {
    let pattern = Regex::new(DOLLAR_PATTERN).ok()?;
    let matched = pattern.find(comp_msg)?;

    matched
        .as_str()
        .trim_start_matches('$')
        .replace(',', "")
        .parse()
        .ok()
}
