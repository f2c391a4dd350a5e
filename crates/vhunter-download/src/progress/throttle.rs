//! Progress throttling.
//!
//! Decides which parsed samples of one task are worth broadcasting.

use std::time::{Duration, Instant};

/// Minimum percentage advance that always passes the filter.
const MIN_STEP: f64 = 1.0;

/// Rate-limiter for one task's progress broadcasts.
///
/// A sample passes when it is the first one, when `min_interval` has elapsed
/// since the last emitted sample, when the percentage moved by at least one
/// point, or when it reached 100.
#[derive(Debug)]
pub struct ProgressThrottle {
    last_emit: Option<(Instant, f64)>,
    min_interval: Duration,
}

impl ProgressThrottle {
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_emit: None,
            min_interval,
        }
    }

    pub fn should_emit(&mut self, percent: f64) -> bool {
        self.should_emit_at(percent, Instant::now())
    }

    /// [`should_emit`](Self::should_emit) against an explicit clock.
    pub fn should_emit_at(&mut self, percent: f64, now: Instant) -> bool {
        let pass = match self.last_emit {
            None => true,
            Some((at, last_percent)) => {
                percent >= 100.0
                    || now.duration_since(at) >= self.min_interval
                    || percent - last_percent >= MIN_STEP
            }
        };
        if pass {
            self.last_emit = Some((now, percent));
        }
        pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_within_one_second() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(1));
        let start = Instant::now();
        let samples = [0.0, 0.2, 0.5, 1.2, 1.3, 50.0];
        let emitted: Vec<f64> = samples
            .iter()
            .enumerate()
            .filter(|(i, p)| {
                let at = start + Duration::from_millis(*i as u64 * 100);
                throttle.should_emit_at(**p, at)
            })
            .map(|(_, p)| *p)
            .collect();
        assert_eq!(emitted, [0.0, 1.2, 50.0]);

        let late = start + Duration::from_millis(2000);
        assert!(throttle.should_emit_at(100.0, late));
    }

    #[test]
    fn test_completion_always_passes() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(1));
        let now = Instant::now();
        assert!(throttle.should_emit_at(99.5, now));
        assert!(throttle.should_emit_at(100.0, now));
        assert!(throttle.should_emit_at(100.0, now));
    }

    #[test]
    fn test_interval_releases_small_steps() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(500));
        let now = Instant::now();
        assert!(throttle.should_emit_at(10.0, now));
        assert!(!throttle.should_emit_at(10.1, now + Duration::from_millis(100)));
        assert!(throttle.should_emit_at(10.2, now + Duration::from_millis(600)));
    }
}
