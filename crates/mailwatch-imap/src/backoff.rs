//! Randomized exponential backoff over a sliding attempt window.
//!
//! The delay grows with the number of connection attempts made within the
//! trailing hour, capped at five minutes, and is multiplied by a uniform
//! random factor so that many independent watcher instances do not retry
//! in lockstep against a server that just came back.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rand::Rng;

/// Attempts older than this fall out of the window.
const HORIZON: Duration = Duration::from_secs(60 * 60);

/// Base delay, doubled per attempt in the window.
const BASE: Duration = Duration::from_millis(200);

/// Upper bound on any computed delay.
const MAX_DELAY: Duration = Duration::from_secs(5 * 60);

/// Sliding window of recent connection attempts.
#[derive(Debug, Default)]
pub struct Backoff {
    attempts: VecDeque<Instant>,
}

impl Backoff {
    /// Creates an empty backoff window.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attempts: VecDeque::new(),
        }
    }

    /// Records one attempt and returns how long to wait before making it.
    ///
    /// Call once immediately before every connection attempt, including
    /// the first. `None` means no delay: the window held only this
    /// attempt, either because it is the first ever or because the last
    /// failure burst has aged out entirely.
    pub fn before_attempt(&mut self, now: Instant) -> Option<Duration> {
        self.record(now, rand::thread_rng().gen_range(0.0..1.0))
    }

    /// Window bookkeeping and delay computation, with the random factor
    /// injected for tests.
    fn record(&mut self, now: Instant, jitter: f64) -> Option<Duration> {
        self.attempts.push_back(now);
        while let Some(&front) = self.attempts.front() {
            if now.duration_since(front) > HORIZON {
                self.attempts.pop_front();
            } else {
                break;
            }
        }
        if self.attempts.len() > 1 {
            Some(delay_for(self.attempts.len(), jitter))
        } else {
            None
        }
    }
}

/// `min(MAX_DELAY, BASE * 2^count * jitter)`.
///
/// Computed in floating point first so that a huge count saturates at the
/// cap instead of overflowing.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn delay_for(count: usize, jitter: f64) -> Duration {
    let raw = BASE.as_secs_f64() * 2f64.powi(count.min(1024) as i32) * jitter;
    Duration::from_secs_f64(raw.min(MAX_DELAY.as_secs_f64()))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_has_no_delay() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.record(Instant::now(), 0.5), None);
    }

    #[test]
    fn test_delay_grows_with_attempts() {
        let mut backoff = Backoff::new();
        let base = Instant::now();

        assert_eq!(backoff.record(base, 1.0), None);
        // Two attempts in the window: 200ms * 2^2.
        assert_eq!(
            backoff.record(base + Duration::from_secs(1), 1.0),
            Some(Duration::from_millis(800))
        );
        // Three: 200ms * 2^3.
        assert_eq!(
            backoff.record(base + Duration::from_secs(2), 1.0),
            Some(Duration::from_millis(1600))
        );
    }

    #[test]
    fn test_horizon_evicts_old_attempts() {
        let mut backoff = Backoff::new();
        let base = Instant::now();

        assert_eq!(backoff.record(base, 1.0), None);
        assert_eq!(
            backoff.record(base + Duration::from_secs(10), 1.0),
            Some(Duration::from_millis(800))
        );
        // 3601s after the first attempt: it falls out, leaving a window of
        // two (the t=10s attempt and this one), not three.
        assert_eq!(
            backoff.record(base + Duration::from_secs(3601), 1.0),
            Some(Duration::from_millis(800))
        );
    }

    #[test]
    fn test_fully_expired_window_resets_delay() {
        let mut backoff = Backoff::new();
        let base = Instant::now();

        assert_eq!(backoff.record(base, 1.0), None);
        // Both prior entries aged out: this attempt is alone again.
        assert_eq!(backoff.record(base + Duration::from_secs(7200), 1.0), None);
    }

    #[test]
    fn test_jitter_scales_delay() {
        let mut backoff = Backoff::new();
        let base = Instant::now();

        let _ = backoff.record(base, 0.0);
        assert_eq!(
            backoff.record(base + Duration::from_secs(1), 0.0),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_delay_never_exceeds_cap() {
        for count in [2, 10, 20, 64, 1000, usize::MAX] {
            assert!(delay_for(count, 0.999999) <= MAX_DELAY);
        }
        assert_eq!(delay_for(64, 1.0), MAX_DELAY);
    }
}
