use std::time::{Duration, Instant};

/// Fixed-rate frame deadlines.
///
/// A late frame moves the next deadline to "now" instead of queueing
/// catch-up frames, so backlog never exceeds one period.
#[derive(Debug, Clone)]
pub struct FramePacer {
    period: Duration,
    next: Instant,
}

impl FramePacer {
    /// `rate_hz == 0` is treated as 1 Hz.
    pub fn new(rate_hz: u32) -> Self {
        Self::starting_at(rate_hz, Instant::now())
    }

    pub fn starting_at(rate_hz: u32, start: Instant) -> Self {
        Self {
            period: Duration::from_secs(1) / rate_hz.max(1),
            next: start,
        }
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// When the next frame should be produced.
    #[inline]
    pub fn next_deadline(&self) -> Instant {
        self.next
    }

    #[inline]
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next
    }

    /// Time left until the next deadline; zero when already due.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.next.saturating_duration_since(now)
    }

    /// Records a frame produced at `now` and returns the next deadline.
    pub fn advance(&mut self, now: Instant) -> Instant {
        self.next += self.period;
        if self.next < now {
            self.next = now;
        }
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_follows_rate() {
        assert_eq!(FramePacer::new(30).period(), Duration::from_nanos(33_333_333));
        assert_eq!(FramePacer::new(0).period(), Duration::from_secs(1));
    }

    #[test]
    fn on_time_frames_keep_a_fixed_cadence() {
        let t0 = Instant::now();
        let mut pacer = FramePacer::starting_at(10, t0);
        assert!(pacer.is_due(t0));

        let next = pacer.advance(t0 + Duration::from_millis(3));
        assert_eq!(next, t0 + Duration::from_millis(100));
        assert!(!pacer.is_due(t0 + Duration::from_millis(50)));
        assert_eq!(pacer.remaining(t0 + Duration::from_millis(50)), Duration::from_millis(50));

        // A slightly late frame does not shift the grid.
        let next = pacer.advance(t0 + Duration::from_millis(120));
        assert_eq!(next, t0 + Duration::from_millis(200));
    }

    #[test]
    fn long_stall_does_not_queue_catch_up_frames() {
        let t0 = Instant::now();
        let mut pacer = FramePacer::starting_at(10, t0);
        let late = t0 + Duration::from_secs(2);
        assert_eq!(pacer.advance(late), late);
        // one immediate frame, then back to the normal period
        assert_eq!(pacer.advance(late), late + Duration::from_millis(100));
    }
}
