//! Randomized pauses between navigations.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PacingConfig;

/// Inclusive range of seconds to pause for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange {
        min_secs: 0,
        max_secs: 0,
    };

    pub const fn secs(min_secs: u64, max_secs: u64) -> Self {
        Self { min_secs, max_secs }
    }

    pub fn is_zero(&self) -> bool {
        self.min_secs == 0 && self.max_secs == 0
    }

    /// Uniform sample with millisecond jitter. A reversed range is treated as its minimum.
    pub fn sample(&self) -> Duration {
        let min_ms = self.min_secs.saturating_mul(1000);
        let max_ms = self.max_secs.saturating_mul(1000);
        if max_ms <= min_ms {
            return Duration::from_millis(min_ms);
        }
        Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
    }
}

/// Which navigation a pause precedes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    BeforeListing,
    BeforeDetail,
    BetweenPages,
}

/// Applies the configured pauses.
#[derive(Debug, Clone)]
pub struct Pacer {
    config: PacingConfig,
}

impl Pacer {
    pub fn new(config: PacingConfig) -> Self {
        Self { config }
    }

    fn range(&self, pause: Pause) -> DelayRange {
        match pause {
            Pause::BeforeListing => self.config.before_listing,
            Pause::BeforeDetail => self.config.before_detail,
            Pause::BetweenPages => self.config.between_pages,
        }
    }

    pub async fn pause(&self, pause: Pause) {
        let range = self.range(pause);
        if range.is_zero() {
            return;
        }
        let delay = range.sample();
        debug!("Pausing {:?} for {:.1}s", pause, delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }
}
