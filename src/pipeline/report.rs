// src/pipeline/report.rs

//! Rough earnings estimate over a run's gigs.

use crate::models::GigRecord;

/// Above this the amount is treated as a typo or a salary and ignored.
const IGNORE_ABOVE: f64 = 20_000.0;
/// Above this the amount is taken to be a week's pay.
const WEEKLY_ABOVE: f64 = 1_000.0;
/// Above this the amount is taken to be a day's pay.
const DAILY_ABOVE: f64 = 200.0;

const HOURS_PER_WEEK: f64 = 40.0;
const HOURS_PER_DAY: f64 = 8.0;

/// Hourly rate and hours implied by one compensation estimate.
fn rate_and_hours(estimate: f64) -> Option<(f64, f64)> {
    if estimate > IGNORE_ABOVE {
        None
    } else if estimate > WEEKLY_ABOVE {
        Some((estimate / HOURS_PER_WEEK, HOURS_PER_WEEK))
    } else if estimate > DAILY_ABOVE {
        Some((estimate / HOURS_PER_DAY, HOURS_PER_DAY))
    } else {
        Some((estimate, 1.0))
    }
}

/// What an eight hour day of these gigs would roughly pay.
///
/// Gigs without a parsed estimate are skipped. Returns `None` when no gig
/// contributes any hours.
pub fn estimate_hourly(gigs: &[GigRecord]) -> Option<f64> {
    let (total, hours) = gigs
        .iter()
        .filter_map(|g| g.comp_estimate)
        .filter_map(rate_and_hours)
        .fold((0.0, 0.0), |(total, hours), (rate, h)| (total + rate, hours + h));

    (hours > 0.0).then(|| total / hours * HOURS_PER_DAY)
}
