use std::collections::VecDeque;

use crate::coords::Vec2;
use crate::scene::{Pose, TrackedUpdate};

/// One body as reported by a tracking source, in world meters.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedSample {
    /// Source-side body name; matched against `TrackingBinding::source_name`.
    pub name: String,
    pub position: Vec2,
    /// Heading in radians, when the source solved one.
    pub orientation: Option<f64>,
    /// False when the source saw the body but lost its solution.
    pub valid: bool,
}

impl TrackedSample {
    pub fn new(name: impl Into<String>, position: Vec2, orientation: Option<f64>) -> Self {
        Self { name: name.into(), position, orientation, valid: true }
    }

    pub fn invalid(name: impl Into<String>) -> Self {
        Self { name: name.into(), position: Vec2::zero(), orientation: None, valid: false }
    }

    pub(crate) fn to_update(&self) -> TrackedUpdate {
        let pose = (self.valid && self.position.is_finite())
            .then(|| Pose::new(self.position, self.orientation.filter(|o| o.is_finite())));
        TrackedUpdate { source_name: self.name.clone(), pose }
    }
}

/// Capability interface of an external tracking system.
pub trait TrackingSource: Send {
    /// Decided once at startup; an unavailable source is never polled.
    fn available(&self) -> bool;

    /// Latest complete frame of bodies. An empty frame means nothing was seen.
    fn poll(&mut self) -> Vec<TrackedSample>;

    fn name(&self) -> &str {
        "tracking"
    }
}

/// The source used when no tracking system is present.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTracking;

impl TrackingSource for NoTracking {
    fn available(&self) -> bool {
        false
    }

    fn poll(&mut self) -> Vec<TrackedSample> {
        Vec::new()
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Replays prepared frames, then keeps repeating the last one.
///
/// Stands in for a live tracker in demos and tests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    frames: VecDeque<Vec<TrackedSample>>,
    last: Vec<TrackedSample>,
}

impl ScriptedSource {
    pub fn new(frames: impl IntoIterator<Item = Vec<TrackedSample>>) -> Self {
        Self { frames: frames.into_iter().collect(), last: Vec::new() }
    }
}

impl TrackingSource for ScriptedSource {
    fn available(&self) -> bool {
        true
    }

    fn poll(&mut self) -> Vec<TrackedSample> {
        if let Some(frame) = self.frames.pop_front() {
            self.last = frame;
        }
        self.last.clone()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
