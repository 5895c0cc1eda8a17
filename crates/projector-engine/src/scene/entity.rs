use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::coords::{Rgba, Vec2};
use crate::error::{OverlayError, Result};
use crate::geometry::Primitive;

use super::history::{PoseHistory, PoseSample};
use super::key::{SortKey, ZIndex};

/// Position plus optional heading, world frame.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec2,
    #[serde(default)]
    pub orientation: Option<f64>,
}

impl Pose {
    #[inline]
    pub fn new(position: Vec2, orientation: Option<f64>) -> Self {
        Self { position, orientation }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.position.is_finite() {
            return Err(OverlayError::InvalidArgument("position must be finite".into()));
        }
        if self.orientation.is_some_and(|o| !o.is_finite()) {
            return Err(OverlayError::InvalidArgument("orientation must be finite".into()));
        }
        Ok(())
    }
}

/// Body outline. Coordinates are body-local in units of `EntityStyle::size`,
/// with +x pointing along the entity's heading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BodyShape {
    #[default]
    Circle,
    Box,
    Triangle,
    Polygon { vertices: Vec<Vec2> },
    Compound { parts: Vec<Primitive> },
}

/// How an entity is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityStyle {
    pub shape: BodyShape,
    /// Body scale in meters: circle radius, box half side, triangle tip distance.
    pub size: f64,
    pub color: Rgba,
    pub label: bool,
    /// Label offset from the body centre, meters.
    pub label_offset: Vec2,
    /// Heading arrow length, meters.
    pub orientation_length: f64,
    pub orientation_color: Rgba,
    /// Heading arrow width, pixels.
    pub orientation_thickness: f64,
}

impl Default for EntityStyle {
    fn default() -> Self {
        Self {
            shape: BodyShape::Circle,
            size: 0.1,
            color: Rgba::rgb(0, 0, 255),
            label: true,
            label_offset: Vec2::new(0.0, -0.2),
            orientation_length: 0.15,
            orientation_color: Rgba::white(),
            orientation_thickness: 2.0,
        }
    }
}

impl EntityStyle {
    pub fn validate(&self) -> Result<()> {
        if !(self.size.is_finite() && self.size > 0.0) {
            return Err(OverlayError::InvalidArgument(format!(
                "size must be positive, got {}",
                self.size
            )));
        }
        if !self.label_offset.is_finite()
            || !self.orientation_length.is_finite()
            || !(self.orientation_thickness.is_finite() && self.orientation_thickness >= 0.0)
        {
            return Err(OverlayError::InvalidArgument("style lengths must be finite".into()));
        }
        match &self.shape {
            BodyShape::Polygon { vertices } if vertices.len() < 3 => Err(
                OverlayError::InvalidArgument("polygon body needs at least 3 vertices".into()),
            ),
            BodyShape::Compound { parts } => parts.iter().try_for_each(Primitive::validate),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailMode {
    /// `length` is seconds.
    Time,
    /// `length` is meters.
    Distance,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailPattern {
    Solid,
    Dotted,
    Dashed,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrailColor {
    Solid { color: Rgba },
    /// `start` at the entity, `end` at the tail.
    Gradient { start: Rgba, end: Rgba },
}

/// How the pose history is drawn behind an entity.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailStyle {
    pub enabled: bool,
    pub mode: TrailMode,
    pub length: f64,
    pub pattern: TrailPattern,
    /// Line width, pixels.
    pub thickness: f64,
    pub color: TrailColor,
    /// Dot pitch for dotted trails, meters.
    pub dot_spacing: f64,
    /// Dash length for dashed trails, meters. Gaps are half a dash.
    pub dash_length: f64,
}

impl Default for TrailStyle {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: TrailMode::Time,
            length: 5.0,
            pattern: TrailPattern::Solid,
            thickness: 2.0,
            color: TrailColor::Solid { color: Rgba::rgb(100, 100, 255) },
            dot_spacing: 0.05,
            dash_length: 0.1,
        }
    }
}

impl TrailStyle {
    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !(self.length.is_finite() && self.length >= 0.0) {
            return Err(OverlayError::InvalidArgument("trail length must be >= 0".into()));
        }
        if !positive(self.thickness) || !positive(self.dot_spacing) || !positive(self.dash_length) {
            return Err(OverlayError::InvalidArgument(
                "trail thickness and spacings must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Binding to an external tracking source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingBinding {
    /// Name the tracking source uses for this body.
    pub source_name: Option<String>,
    /// Tracked pose wins over the manual one when both exist.
    pub prefer_tracked: bool,
    /// Set by the feed when the body dropped out of view.
    pub lost: bool,
}

/// A displayable rigid body.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: String,
    pub manual: Option<Pose>,
    pub tracked: Option<Pose>,
    pub tracking: TrackingBinding,
    /// Last heading seen from any source; used when the current pose has none.
    pub last_orientation: f64,
    /// True once any heading was received.
    pub has_heading: bool,
    pub history: PoseHistory,
    pub style: EntityStyle,
    pub trail: TrailStyle,
    pub z: ZIndex,
    pub(crate) seq: u64,
}

impl Entity {
    pub fn new(id: impl Into<String>, history_capacity: usize) -> Self {
        Self {
            id: id.into(),
            manual: None,
            tracked: None,
            tracking: TrackingBinding::default(),
            last_orientation: 0.0,
            has_heading: false,
            history: PoseHistory::new(history_capacity),
            style: EntityStyle::default(),
            trail: TrailStyle::default(),
            z: ZIndex::default(),
            seq: 0,
        }
    }

    /// The authoritative pose, if any.
    pub fn display_pose(&self) -> Option<Pose> {
        if self.tracking.prefer_tracked && self.tracked.is_some() {
            return self.tracked;
        }
        self.manual.or(self.tracked)
    }

    pub fn display_position(&self) -> Option<Vec2> {
        self.display_pose().map(|p| p.position)
    }

    /// Current heading, falling back to the last known one.
    pub fn effective_orientation(&self) -> f64 {
        self.display_pose()
            .and_then(|p| p.orientation)
            .unwrap_or(self.last_orientation)
    }

    #[inline]
    pub fn sort_key(&self) -> SortKey {
        SortKey::new(self.z, self.seq)
    }

    pub fn set_manual(&mut self, pose: Pose, at: Instant) {
        self.manual = Some(pose);
        if !(self.tracking.prefer_tracked && self.tracked.is_some()) {
            self.record(pose, at);
        } else {
            self.note_heading(pose);
        }
    }

    pub fn set_tracked(&mut self, pose: Pose, at: Instant) {
        self.tracked = Some(pose);
        self.tracking.lost = false;
        if self.tracking.prefer_tracked || self.manual.is_none() {
            self.record(pose, at);
        } else {
            self.note_heading(pose);
        }
    }

    /// Trail vertices for the current trail settings, oldest first.
    pub fn trail_points(&self, now: Instant) -> Vec<Vec2> {
        if !self.trail.enabled {
            return Vec::new();
        }
        match self.trail.mode {
            TrailMode::Time => self.history.within_time(self.trail.length, now),
            TrailMode::Distance => self.history.within_distance(self.trail.length),
        }
    }

    fn note_heading(&mut self, pose: Pose) {
        if let Some(o) = pose.orientation {
            self.last_orientation = o;
            self.has_heading = true;
        }
    }

    fn record(&mut self, pose: Pose, at: Instant) {
        self.note_heading(pose);
        self.history.push(PoseSample {
            position: pose.position,
            orientation: self.effective_orientation(),
            at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose(x: f64, o: Option<f64>) -> Pose {
        Pose::new(Vec2::new(x, 0.0), o)
    }

    // ── pose selection ────────────────────────────────────────────────────

    #[test]
    fn manual_wins_unless_tracked_is_preferred() {
        let now = Instant::now();
        let mut e = Entity::new("r1", 10);
        e.set_manual(pose(1.0, None), now);
        e.set_tracked(pose(2.0, None), now);
        assert_eq!(e.display_position(), Some(Vec2::new(1.0, 0.0)));

        e.tracking.prefer_tracked = true;
        assert_eq!(e.display_position(), Some(Vec2::new(2.0, 0.0)));
    }

    #[test]
    fn tracked_pose_is_used_when_manual_is_absent() {
        let mut e = Entity::new("r1", 10);
        e.set_tracked(pose(3.0, None), Instant::now());
        assert_eq!(e.display_position(), Some(Vec2::new(3.0, 0.0)));
        assert_eq!(e.history.len(), 1);
    }

    #[test]
    fn heading_falls_back_to_last_known() {
        let now = Instant::now();
        let mut e = Entity::new("r1", 10);
        e.set_manual(pose(0.0, Some(1.25)), now);
        e.set_manual(pose(1.0, None), now);
        assert_eq!(e.effective_orientation(), 1.25);
        assert!(e.has_heading);
        assert_eq!(e.history.latest().map(|s| s.orientation), Some(1.25));
    }

    #[test]
    fn non_authoritative_updates_skip_history() {
        let now = Instant::now();
        let mut e = Entity::new("r1", 10);
        e.set_manual(pose(1.0, None), now);
        e.set_tracked(pose(5.0, None), now);
        assert_eq!(e.history.len(), 1);
    }

    // ── styles ────────────────────────────────────────────────────────────

    #[test]
    fn partial_style_uses_defaults() {
        let s: EntityStyle =
            serde_json::from_value(serde_json::json!({"shape": {"kind": "triangle"}, "size": 0.3}))
                .unwrap();
        assert_eq!(s.shape, BodyShape::Triangle);
        assert_eq!(s.size, 0.3);
        assert_eq!(s.color, Rgba::rgb(0, 0, 255));
    }

    #[test]
    fn zero_size_is_invalid() {
        let s = EntityStyle { size: 0.0, ..EntityStyle::default() };
        assert!(s.validate().is_err());
    }
}
