//! Rolling frame timings.
//!
//! Keeps the last `window` samples of each phase and logs mean, p95 and max
//! once per interval. Without an interval nothing is recorded.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Bounded window of durations.
#[derive(Debug, Clone)]
pub struct Timings {
    samples: VecDeque<Duration>,
    capacity: usize,
}

impl Timings {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, d: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(d);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        Some(total / self.samples.len() as u32)
    }

    /// Nearest-rank percentile, `q` in `[0, 1]`.
    pub fn percentile(&self, q: f64) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<Duration> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let idx = ((sorted.len() as f64 * q.clamp(0.0, 1.0)).floor() as usize).min(sorted.len() - 1);
        Some(sorted[idx])
    }

    pub fn p95(&self) -> Option<Duration> {
        self.percentile(0.95)
    }

    pub fn max(&self) -> Option<Duration> {
        self.samples.iter().max().copied()
    }

    fn summary(&self) -> String {
        let ms = |d: Option<Duration>| d.map_or(0.0, |d| d.as_secs_f64() * 1e3);
        format!(
            "mean {:.2} ms, p95 {:.2} ms, max {:.2} ms",
            ms(self.mean()),
            ms(self.p95()),
            ms(self.max())
        )
    }
}

/// Compose, present and whole-frame timings of the render loop.
#[derive(Debug)]
pub struct FrameProfiler {
    interval: Option<Duration>,
    compose: Timings,
    present: Timings,
    frame: Timings,
    last_frame: Option<Instant>,
    last_report: Option<Instant>,
}

impl FrameProfiler {
    pub fn new(interval: Option<Duration>, window: usize) -> Self {
        Self {
            interval,
            compose: Timings::new(window),
            present: Timings::new(window),
            frame: Timings::new(window),
            last_frame: None,
            last_report: None,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    pub fn compose(&self) -> &Timings {
        &self.compose
    }

    pub fn present(&self) -> &Timings {
        &self.present
    }

    /// Time between consecutive frame starts.
    pub fn frame(&self) -> &Timings {
        &self.frame
    }

    /// Records one frame that started at `start`. Returns true when a report
    /// was logged.
    pub fn record(&mut self, start: Instant, compose: Duration, present: Duration) -> bool {
        let Some(interval) = self.interval else {
            return false;
        };
        if let Some(prev) = self.last_frame {
            self.frame.push(start.saturating_duration_since(prev));
        }
        self.last_frame = Some(start);
        self.compose.push(compose);
        self.present.push(present);

        let since = *self.last_report.get_or_insert(start);
        if start.saturating_duration_since(since) < interval {
            return false;
        }
        self.last_report = Some(start);
        log::info!("frame: {}", self.frame.summary());
        log::info!("compose: {}", self.compose.summary());
        log::info!("present: {}", self.present.summary());
        true
    }
}
