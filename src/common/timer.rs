use std::time::{Duration, Instant};

/// Source of elapsed time for the episode loop.
///
/// `now` is measured from an arbitrary fixed origin. `sleep` is one of the
/// episode's suspension points, so test clocks advance instead of blocking.
pub trait Clock {
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `Instant`.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration)
    }
}

/// Episode truncation timer.
///
/// Once the elapsed time exceeds the limit the timer stays expired until
/// the next `start`.
#[derive(Debug, Clone)]
pub struct TruncationTimer {
    limit: Duration,
    started_at: Option<Duration>,
    expired: bool,
}

impl TruncationTimer {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            started_at: None,
            expired: false,
        }
    }

    pub fn start(&mut self, now: Duration) {
        self.started_at = Some(now);
        self.expired = false;
    }

    pub fn stop(&mut self) {
        self.started_at = None;
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn elapsed(&self, now: Duration) -> Duration {
        self.started_at
            .map(|start| now.saturating_sub(start))
            .unwrap_or_default()
    }

    /// Polls the timer, latching expiry.
    pub fn check(&mut self, now: Duration) -> bool {
        if !self.expired && self.started_at.is_some() && self.elapsed(now) > self.limit {
            self.expired = true;
        }

        self.expired
    }

    pub fn expired(&self) -> bool {
        self.expired
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{Clock, SystemClock, TruncationTimer};

    #[test]
    fn test_timer_latches_after_limit() {
        let mut timer = TruncationTimer::new(Duration::from_secs(10));
        timer.start(Duration::from_secs(5));

        assert!(!timer.check(Duration::from_secs(15)));
        assert!(timer.check(Duration::from_millis(15_001)));
        // stays expired even if asked about an earlier instant
        assert!(timer.check(Duration::from_secs(6)));
        assert!(timer.expired());
    }

    #[test]
    fn test_timer_restart_clears_expiry() {
        let mut timer = TruncationTimer::new(Duration::from_secs(1));
        timer.start(Duration::ZERO);
        assert!(timer.check(Duration::from_secs(2)));

        timer.start(Duration::from_secs(2));
        assert!(!timer.check(Duration::from_secs(2)));
        assert_eq!(timer.elapsed(Duration::from_secs(3)), Duration::from_secs(1));
    }

    #[test]
    fn test_unstarted_timer_never_expires() {
        let mut timer = TruncationTimer::new(Duration::ZERO);
        assert!(!timer.check(Duration::from_secs(100)));
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock::default();
        let t0 = clock.now();
        clock.sleep(Duration::from_millis(2));

        assert!(clock.now() > t0);
    }
}
