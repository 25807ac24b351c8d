//! Shared pacing utilities
//!
//! All human-behavior simulation (typing cadence, scroll pacing, dwell
//! timing) samples its delays here instead of reimplementing ranges per
//! component.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::browser::{BrowserError, PageDriver};

/// Inclusive millisecond delay range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Sample a delay uniformly from the range.
    pub fn sample(&self) -> Duration {
        let upper = self.max_ms.max(self.min_ms);
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=upper))
    }

    /// Sample and sleep.
    pub async fn pause(&self) {
        sleep(self.sample()).await;
    }
}

/// Roll an independent probability.
pub fn chance(probability: f64) -> bool {
    rand::thread_rng().gen_bool(probability.clamp(0.0, 1.0))
}

/// Uniform sample from an inclusive integer range.
pub fn jitter(min: i64, max: i64) -> i64 {
    rand::thread_rng().gen_range(min..=max.max(min))
}

/// Wheel-scroll pacing: tick size, inter-tick pause and the occasional
/// longer reading pause.
#[derive(Debug, Clone, Copy)]
pub struct ScrollPattern {
    pub tick_px: (i64, i64),
    pub tick_pause: DelayRange,
    pub long_pause_chance: f64,
    pub long_pause: DelayRange,
}

impl ScrollPattern {
    /// Reading a results page: a few slow ticks.
    pub const fn serp_settle() -> Self {
        Self {
            tick_px: (100, 300),
            tick_pause: DelayRange::new(800, 2000),
            long_pause_chance: 0.0,
            long_pause: DelayRange::new(0, 0),
        }
    }

    /// Dwelling on a visited page: faster ticks with pause bursts.
    pub const fn dwell() -> Self {
        Self {
            tick_px: (100, 300),
            tick_pause: DelayRange::new(200, 400),
            long_pause_chance: 0.3,
            long_pause: DelayRange::new(800, 1500),
        }
    }
}

/// Run `ticks` wheel scrolls against the page with the given pattern.
pub async fn scroll_ticks(
    driver: &dyn PageDriver,
    pattern: &ScrollPattern,
    ticks: usize,
) -> Result<(), BrowserError> {
    for _ in 0..ticks {
        driver
            .scroll_by(jitter(pattern.tick_px.0, pattern.tick_px.1))
            .await?;
        pattern.tick_pause.pause().await;
        if chance(pattern.long_pause_chance) {
            pattern.long_pause.pause().await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_stays_within_bounds() {
        let range = DelayRange::new(50, 150);
        for _ in 0..200 {
            let ms = range.sample().as_millis() as u64;
            assert!((50..=150).contains(&ms));
        }
    }

    #[test]
    fn zero_width_range_is_exact() {
        assert_eq!(DelayRange::new(200, 200).sample().as_millis(), 200);
    }

    #[test]
    fn inverted_range_does_not_panic() {
        let ms = DelayRange::new(300, 100).sample().as_millis() as u64;
        assert!(ms >= 300);
    }

    #[test]
    fn chance_extremes() {
        assert!(!chance(0.0));
        assert!(chance(1.0));
    }
}
