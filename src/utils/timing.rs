// src/utils/timing.rs

//! Humanized delays.
//!
//! Delays are drawn from a normal distribution centred between a floor and a
//! ceiling. Samples under the floor are redrawn; there is no upper cut-off, so
//! the occasional long pause slips through on purpose.
//!
//! Harvesters never sleep directly. They hold a [`Pacer`], which lets tests
//! swap in [`InstantPacer`] and run without waiting.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::models::TimingConfig;

/// Default ratio between the range width and the standard deviation.
pub const DEFAULT_SPREAD_DIVISOR: f64 = 4.0;

/// Unit a [`DelayRange`] is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Millis,
    Secs,
}

/// Floor and centre-defining ceiling of a humanized delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayRange {
    pub low: f64,
    pub high: f64,
    pub scale: Scale,
}

impl DelayRange {
    pub const fn millis(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            scale: Scale::Millis,
        }
    }

    pub const fn secs(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            scale: Scale::Secs,
        }
    }

    /// Convert a sample expressed in this range's unit into a duration.
    pub fn to_duration(&self, sample: f64) -> Duration {
        let secs = match self.scale {
            Scale::Millis => sample / 1000.0,
            Scale::Secs => sample,
        };
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Draw a delay from `N((low + high) / 2, (high - low) / spread_divisor)`,
/// redrawing anything below `low`. Rounded to three decimals.
pub fn gaussian_delay<R: Rng + ?Sized>(
    rng: &mut R,
    low: f64,
    high: f64,
    spread_divisor: f64,
) -> f64 {
    let mean = (low + high) / 2.0;
    let std_dev = (high - low) / spread_divisor;
    let normal = match Normal::new(mean, std_dev) {
        Ok(normal) if std_dev > 0.0 => normal,
        _ => return low,
    };

    loop {
        let sample = normal.sample(rng);
        if sample >= low {
            return ((sample * 1000.0).round() / 1000.0).max(low);
        }
    }
}

/// Source of humanized pauses and random chances.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait for a delay sampled from `range` and report how long that was.
    async fn pause(&self, range: DelayRange) -> Duration;

    /// True with probability `1 / n`.
    fn one_in(&self, n: u32) -> bool;
}

/// Pacer backed by a real clock and a seedable RNG.
pub struct HumanPacer {
    rng: Mutex<StdRng>,
    spread_divisor: f64,
}

impl HumanPacer {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            spread_divisor: DEFAULT_SPREAD_DIVISOR,
        }
    }

    /// Sample a delay without sleeping.
    pub fn sample(&self, range: DelayRange) -> Duration {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let value = gaussian_delay(&mut *rng, range.low, range.high, self.spread_divisor);
        range.to_duration(value)
    }
}

impl Default for HumanPacer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Pacer for HumanPacer {
    async fn pause(&self, range: DelayRange) -> Duration {
        let delay = self.sample(range);
        log::trace!("Pausing for {:.3}s", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
        delay
    }

    fn one_in(&self, n: u32) -> bool {
        if n == 0 {
            return false;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(0..n) == 0
    }
}

/// Pacer that never waits and never rolls a hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantPacer;

#[async_trait]
impl Pacer for InstantPacer {
    async fn pause(&self, _range: DelayRange) -> Duration {
        Duration::ZERO
    }

    fn one_in(&self, _n: u32) -> bool {
        false
    }
}

/// Build the pacer described by the timing configuration.
pub fn pacer_from_config(config: &TimingConfig) -> Arc<dyn Pacer> {
    if !config.humanize {
        return Arc::new(InstantPacer);
    }
    match config.seed {
        Some(seed) => Arc::new(HumanPacer::with_seed(seed)),
        None => Arc::new(HumanPacer::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_below_floor() {
        let mut rng = StdRng::seed_from_u64(7);
        for (low, high) in [(3.0, 10.0), (0.1, 0.8), (5.0, 20.0), (120.0, 240.0)] {
            for _ in 0..2_000 {
                assert!(gaussian_delay(&mut rng, low, high, DEFAULT_SPREAD_DIVISOR) >= low);
            }
        }
    }

    #[test]
    fn test_never_below_floor_with_wide_spread() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..2_000 {
            assert!(gaussian_delay(&mut rng, 1.0, 2.0, 0.5) >= 1.0);
        }
    }

    #[test]
    fn test_degenerate_range_returns_floor() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(gaussian_delay(&mut rng, 5.0, 5.0, 4.0), 5.0);
        assert_eq!(gaussian_delay(&mut rng, 5.0, 2.0, 4.0), 5.0);
    }

    #[test]
    fn test_samples_centre_on_midpoint() {
        let mut rng = StdRng::seed_from_u64(3);
        let samples: Vec<f64> = (0..5_000)
            .map(|_| gaussian_delay(&mut rng, 10.0, 50.0, 4.0))
            .collect();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        // Rejection below the floor pulls the mean slightly above the midpoint.
        assert!(mean > 30.0 && mean < 40.0, "mean was {mean}");
        assert!(samples.iter().any(|s| *s > 50.0));
    }

    #[test]
    fn test_scales_convert_to_duration() {
        assert_eq!(
            DelayRange::millis(5.0, 20.0).to_duration(12.5),
            Duration::from_micros(12_500)
        );
        assert_eq!(
            DelayRange::secs(1.0, 3.0).to_duration(2.0),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_seeded_pacers_agree() {
        let a = HumanPacer::with_seed(42);
        let b = HumanPacer::with_seed(42);
        let range = DelayRange::secs(3.0, 10.0);
        for _ in 0..10 {
            let sample = a.sample(range);
            assert_eq!(sample, b.sample(range));
            assert!(sample >= Duration::from_secs(3));
        }
    }

    #[tokio::test]
    async fn test_instant_pacer_does_not_wait() {
        let pacer = InstantPacer;
        let waited = pacer.pause(DelayRange::secs(100.0, 300.0)).await;
        assert_eq!(waited, Duration::ZERO);
        assert!(!pacer.one_in(1));
    }

    #[test]
    fn test_one_in_one_always_hits() {
        let pacer = HumanPacer::with_seed(5);
        assert!((0..20).all(|_| pacer.one_in(1)));
        assert!(!pacer.one_in(0));
    }
}
