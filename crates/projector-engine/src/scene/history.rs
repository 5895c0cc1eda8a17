use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::coords::Vec2;

/// One recorded pose.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PoseSample {
    pub position: Vec2,
    /// Effective heading at the time of the sample (radians, world frame).
    pub orientation: f64,
    pub at: Instant,
}

/// Bounded pose history. Appends are O(1); the oldest sample is evicted first.
#[derive(Debug, Clone)]
pub struct PoseHistory {
    samples: VecDeque<PoseSample>,
    capacity: usize,
}

impl PoseHistory {
    /// `capacity` is at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn push(&mut self, sample: PoseSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &PoseSample> + ExactSizeIterator {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&PoseSample> {
        self.samples.back()
    }

    pub fn positions(&self) -> Vec<Vec2> {
        self.samples.iter().map(|s| s.position).collect()
    }

    /// Positions recorded within `window` seconds before `now`, oldest first.
    pub fn within_time(&self, window: f64, now: Instant) -> Vec<Vec2> {
        let window = Duration::try_from_secs_f64(window).unwrap_or(Duration::ZERO);
        match now.checked_sub(window) {
            Some(cutoff) => self
                .samples
                .iter()
                .filter(|s| s.at >= cutoff)
                .map(|s| s.position)
                .collect(),
            None => self.positions(),
        }
    }

    /// The newest stretch of path with total length at most `length`, oldest first.
    ///
    /// The last kept segment is cut so the path length matches `length` exactly
    /// when the history is long enough.
    pub fn within_distance(&self, length: f64) -> Vec<Vec2> {
        let mut newest_first = self.samples.iter().rev().map(|s| s.position);
        let Some(head) = newest_first.next() else {
            return Vec::new();
        };

        let mut points = vec![head];
        let mut travelled = 0.0;
        let mut prev = head;

        for p in newest_first {
            let seg = prev.distance(p);
            if travelled + seg <= length {
                points.push(p);
                travelled += seg;
                prev = p;
            } else {
                let remaining = length - travelled;
                if remaining > 0.0 {
                    points.push(prev.lerp(p, remaining / seg));
                }
                break;
            }
        }

        points.reverse();
        points
    }
}

impl Default for PoseHistory {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(x: f64, at: Instant) -> PoseSample {
        PoseSample { position: Vec2::new(x, 0.0), orientation: 0.0, at }
    }

    // ── ring buffer ───────────────────────────────────────────────────────

    #[test]
    fn capacity_three_keeps_last_three() {
        let now = Instant::now();
        let mut h = PoseHistory::new(3);
        for x in [1.0, 2.0, 3.0, 4.0] {
            h.push(sample(x, now));
        }
        let xs: Vec<f64> = h.iter().map(|s| s.position.x).collect();
        assert_eq!(xs, vec![2.0, 3.0, 4.0]);
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut h = PoseHistory::new(0);
        h.push(sample(1.0, Instant::now()));
        h.push(sample(2.0, Instant::now()));
        assert_eq!(h.capacity(), 1);
        assert_eq!(h.positions(), vec![Vec2::new(2.0, 0.0)]);
    }

    // ── trail windows ─────────────────────────────────────────────────────

    #[test]
    fn time_window_drops_old_samples() {
        let start = Instant::now();
        let mut h = PoseHistory::new(10);
        for (i, x) in [0.0, 1.0, 2.0, 3.0].iter().enumerate() {
            h.push(sample(*x, start + Duration::from_secs(i as u64)));
        }
        let now = start + Duration::from_secs(3);
        let pts = h.within_time(1.5, now);
        assert_eq!(pts, vec![Vec2::new(2.0, 0.0), Vec2::new(3.0, 0.0)]);
    }

    #[test]
    fn distance_window_interpolates_the_tail() {
        let now = Instant::now();
        let mut h = PoseHistory::new(10);
        for x in [0.0, 1.0, 2.0, 3.0] {
            h.push(sample(x, now));
        }
        let pts = h.within_distance(1.5);
        assert_eq!(pts.len(), 3);
        assert_relative_eq!(pts[0].x, 1.5, epsilon = 1e-12);
        assert_eq!(pts[1], Vec2::new(2.0, 0.0));
        assert_eq!(pts[2], Vec2::new(3.0, 0.0));
    }

    #[test]
    fn exhausted_budget_adds_no_degenerate_point() {
        let now = Instant::now();
        let mut h = PoseHistory::new(10);
        for x in [0.0, 1.0, 2.0, 3.0] {
            h.push(sample(x, now));
        }
        // budget runs out exactly on a sample
        assert_eq!(h.within_distance(1.0), vec![Vec2::new(2.0, 0.0), Vec2::new(3.0, 0.0)]);
        assert_eq!(h.within_distance(0.0), vec![Vec2::new(3.0, 0.0)]);
    }

    #[test]
    fn distance_window_shorter_than_requested_returns_all() {
        let now = Instant::now();
        let mut h = PoseHistory::new(10);
        h.push(sample(0.0, now));
        h.push(sample(0.5, now));
        assert_eq!(h.within_distance(10.0).len(), 2);
    }
}
