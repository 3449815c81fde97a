//! Randomized pacing and backoff delays.
//!
//! The portal throttles aggressive clients, so every click is preceded by a
//! short randomized pause, with a longer pause injected periodically. All
//! delays are carried in [`PacingSettings`] so tests can zero them out.

use std::time::Duration;

use rand::Rng;

/// Delay configuration for the harvest pipeline.
#[derive(Debug, Clone)]
pub struct PacingSettings {
    /// Minimum pause before each click (and after navigation).
    pub short_pause_min: Duration,
    /// Maximum pause before each click (and after navigation).
    pub short_pause_max: Duration,
    /// A long pause is inserted before every Nth download click.
    pub long_pause_every: usize,
    /// Minimum duration of the periodic long pause.
    pub long_pause_min: Duration,
    /// Maximum duration of the periodic long pause.
    pub long_pause_max: Duration,
    /// Minimum backoff between whole-record attempts.
    pub attempt_backoff_min: Duration,
    /// Maximum backoff between whole-record attempts.
    pub attempt_backoff_max: Duration,
    /// Fixed backoff before the single upload retry.
    pub upload_retry_backoff: Duration,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            short_pause_min: Duration::from_secs(2),
            short_pause_max: Duration::from_secs(4),
            long_pause_every: 5,
            long_pause_min: Duration::from_secs(10),
            long_pause_max: Duration::from_secs(15),
            attempt_backoff_min: Duration::from_secs(45),
            attempt_backoff_max: Duration::from_secs(90),
            upload_retry_backoff: Duration::from_secs(2),
        }
    }
}

impl PacingSettings {
    /// Settings with every delay zeroed. Intended for tests.
    pub fn none() -> Self {
        Self {
            short_pause_min: Duration::ZERO,
            short_pause_max: Duration::ZERO,
            long_pause_every: 5,
            long_pause_min: Duration::ZERO,
            long_pause_max: Duration::ZERO,
            attempt_backoff_min: Duration::ZERO,
            attempt_backoff_max: Duration::ZERO,
            upload_retry_backoff: Duration::ZERO,
        }
    }

    /// Short randomized pause applied before clicks and after navigation.
    pub async fn short_pause(&self) {
        sleep_range(self.short_pause_min, self.short_pause_max).await;
    }

    /// Long randomized pause applied before every Nth download click.
    pub async fn long_pause(&self) {
        sleep_range(self.long_pause_min, self.long_pause_max).await;
    }

    /// Whether a long pause is due before the download at `index` (0-based).
    pub fn long_pause_due(&self, index: usize) -> bool {
        self.long_pause_every > 0 && index > 0 && index % self.long_pause_every == 0
    }

    /// Randomized backoff between whole-record attempts.
    pub async fn attempt_backoff(&self) {
        sleep_range(self.attempt_backoff_min, self.attempt_backoff_max).await;
    }
}

/// Sleep for a uniformly random duration in `[min, max]`.
///
/// A degenerate range (`max <= min`) sleeps exactly `min`.
pub async fn sleep_range(min: Duration, max: Duration) {
    let delay: Duration = if max > min {
        let span_ms: u64 = (max - min).as_millis() as u64;
        min + Duration::from_millis(rand::thread_rng().gen_range(0..=span_ms))
    } else {
        min
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
