//! Randomized delay applied by a worker after each item it finishes

use rand::Rng;
use std::time::Duration;

const MAX_DELAY: Duration = Duration::from_secs(3600);

/// Uniformly random pause between `min` and `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    min: Duration,
    max: Duration,
}

impl Throttle {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Builds a throttle from bounds in seconds
    ///
    /// Negative or NaN bounds become zero; bounds too large for a
    /// [`Duration`] saturate at an hour.
    pub fn from_secs(min: f64, max: f64) -> Self {
        Self::new(secs_to_delay(min), secs_to_delay(max))
    }

    /// No delay at all
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Slower throttle used by the serial sweep passes
    ///
    /// `min = max(3 × min, 1s)`, `max = max(6 × max, min + 0.5s)`.
    pub fn for_sweeps(&self) -> Self {
        let min = (self.min * 3).max(Duration::from_secs(1));
        let max = (self.max * 6).max(min + Duration::from_millis(500));
        Self { min, max }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draws one delay from the range
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let secs = rand::rng().random_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(self.max)
    }

    /// Sleeps for one sampled delay
    pub async fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn secs_to_delay(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs)
        .unwrap_or(MAX_DELAY)
        .min(MAX_DELAY)
}
