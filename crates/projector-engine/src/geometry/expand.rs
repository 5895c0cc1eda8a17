//! Primitive → vertex expansion in the primitive's own frame.

use std::f64::consts::TAU;

use crate::coords::Vec2;
use crate::scene::BodyShape;

use super::Primitive;

/// Half-angle between an arrow shaft and each wing, radians.
pub const ARROW_WING_ANGLE: f64 = 0.5;

/// Smallest arrowhead drawn for orientation arrows, pixels.
pub const MIN_ARROW_WING_PX: f64 = 5.0;

/// How the expanded points are meant to be drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum Outline {
    /// Closed polygon; filled or stroked depending on the style.
    Closed,
    /// Polyline.
    Open,
    /// `[start, end, wing, wing]`: a shaft plus a filled head.
    Arrow,
    /// Single anchor point carrying text.
    Label { text: String, font_size: f64 },
}

/// Explicit vertex list for one primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct Expanded {
    pub outline: Outline,
    pub points: Vec<Vec2>,
}

impl Expanded {
    #[inline]
    pub fn closed(points: Vec<Vec2>) -> Self {
        Self { outline: Outline::Closed, points }
    }

    /// Applies `f` to every point in place.
    pub fn map_points(mut self, f: impl Fn(Vec2) -> Vec2) -> Self {
        for p in &mut self.points {
            *p = f(*p);
        }
        self
    }
}

/// Regular `segments`-gon inscribed in the circle, counter-clockwise from +x.
pub fn circle_points(center: Vec2, radius: f64, segments: u32) -> Vec<Vec2> {
    let n = segments.max(3);
    (0..n)
        .map(|i| center + Vec2::from_angle(TAU * i as f64 / n as f64) * radius)
        .collect()
}

/// Box corners rotated by `angle` about `center`, counter-clockwise.
pub fn box_corners(center: Vec2, width: f64, height: f64, angle: f64) -> [Vec2; 4] {
    let (hw, hh) = (width * 0.5, height * 0.5);
    [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|c| center + Vec2::from(c).rotated(angle))
}

/// The two wing tips of an arrowhead at `end`.
///
/// Wings are a quarter of the shaft long but never shorter than `min_wing`.
/// Returns `None` for a zero-length shaft.
pub fn arrow_wings(start: Vec2, end: Vec2, min_wing: f64) -> Option<[Vec2; 2]> {
    let shaft = end - start;
    let len = shaft.length();
    if !(len > 0.0) {
        return None;
    }
    let wing = (len * 0.25).max(min_wing);
    let heading = shaft.angle();
    Some([
        end - Vec2::from_angle(heading - ARROW_WING_ANGLE) * wing,
        end - Vec2::from_angle(heading + ARROW_WING_ANGLE) * wing,
    ])
}

/// Expands a primitive into source-frame vertices.
/// Axis-aligned bounds of `points`.
pub fn bounds(points: &[Vec2]) -> Option<(Vec2, Vec2)> {
    let first = *points.first()?;
    Some(points.iter().fold((first, first), |(lo, hi), p| {
        (Vec2::new(lo.x.min(p.x), lo.y.min(p.y)), Vec2::new(hi.x.max(p.x), hi.y.max(p.y)))
    }))
}

pub fn expand(primitive: &Primitive, circle_segments: u32) -> Expanded {
    match primitive {
        Primitive::Circle { center, radius } => {
            Expanded::closed(circle_points(*center, *radius, circle_segments))
        }
        Primitive::Box { center, width, height, angle } => {
            Expanded::closed(box_corners(*center, *width, *height, *angle).to_vec())
        }
        Primitive::Polygon { vertices } => Expanded::closed(vertices.clone()),
        Primitive::Line { start, end } => Expanded {
            outline: Outline::Open,
            points: vec![*start, *end],
        },
        Primitive::Arrow { start, end } => {
            let mut points = vec![*start, *end];
            // Degenerate arrows keep only the shaft; validation already
            // rejected non-finite input.
            if let Some(wings) = arrow_wings(*start, *end, 0.0) {
                points.extend(wings);
            }
            Expanded { outline: Outline::Arrow, points }
        }
        Primitive::Text { position, text, font_size } => Expanded {
            outline: Outline::Label { text: text.clone(), font_size: *font_size },
            points: vec![*position],
        },
    }
}

/// Unit triangle pointing along +x.
pub const TRIANGLE: [Vec2; 3] = [
    Vec2::new(1.0, 0.0),
    Vec2::new(-0.5, -0.866),
    Vec2::new(-0.5, 0.866),
];

/// Rigid placement of body-local geometry into the world frame.
///
/// Points are scaled, then rotated, then translated. This happens before any
/// projective conversion so that size and heading stay metric.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Placement {
    pub position: Vec2,
    pub orientation: f64,
    pub scale: f64,
}

impl Placement {
    #[inline]
    pub fn apply(&self, p: Vec2) -> Vec2 {
        self.position + (p * self.scale).rotated(self.orientation)
    }
}

/// Body outline in body-local units (multiples of the entity size, +x = heading).
pub fn body_parts(shape: &BodyShape, circle_segments: u32) -> Vec<Expanded> {
    match shape {
        BodyShape::Circle => vec![Expanded::closed(circle_points(Vec2::zero(), 1.0, circle_segments))],
        BodyShape::Box => vec![Expanded::closed(box_corners(Vec2::zero(), 2.0, 2.0, 0.0).to_vec())],
        BodyShape::Triangle => vec![Expanded::closed(TRIANGLE.to_vec())],
        BodyShape::Polygon { vertices } => vec![Expanded::closed(vertices.clone())],
        BodyShape::Compound { parts } => parts.iter().map(|p| expand(p, circle_segments)).collect(),
    }
}

/// Body outline placed in the world frame.
pub fn place_body(shape: &BodyShape, placement: Placement, circle_segments: u32) -> Vec<Expanded> {
    body_parts(shape, circle_segments)
        .into_iter()
        .map(|part| part.map_points(|p| placement.apply(p)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    // ── primitives ────────────────────────────────────────────────────────

    #[test]
    fn bounds_enclose_every_point() {
        let (lo, hi) = bounds(&[Vec2::new(3.0, -1.0), Vec2::new(-2.0, 4.0), Vec2::new(0.5, 0.5)]).unwrap();
        assert_eq!((lo, hi), (Vec2::new(-2.0, -1.0), Vec2::new(3.0, 4.0)));
        assert!(bounds(&[]).is_none());
    }

    #[test]
    fn circle_becomes_regular_polygon() {
        let pts = circle_points(Vec2::new(1.0, 1.0), 2.0, 32);
        assert_eq!(pts.len(), 32);
        for p in &pts {
            assert_abs_diff_eq!(p.distance(Vec2::new(1.0, 1.0)), 2.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(pts[0].x, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn rotated_box_corners() {
        let c = box_corners(Vec2::zero(), 2.0, 1.0, FRAC_PI_2);
        // (-1,-0.5) rotated by 90° → (0.5,-1)
        assert_abs_diff_eq!(c[0].x, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(c[0].y, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn arrow_has_two_wings_behind_the_tip() {
        let e = expand(&Primitive::Arrow { start: Vec2::zero(), end: Vec2::new(4.0, 0.0) }, 32);
        assert_eq!(e.outline, Outline::Arrow);
        assert_eq!(e.points.len(), 4);
        for w in &e.points[2..] {
            assert!(w.x < 4.0);
            assert_abs_diff_eq!(w.distance(Vec2::new(4.0, 0.0)), 1.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(e.points[2].y, -e.points[3].y, epsilon = 1e-12);
    }

    #[test]
    fn short_arrow_uses_minimum_wing() {
        let [a, _] = arrow_wings(Vec2::zero(), Vec2::new(4.0, 0.0), MIN_ARROW_WING_PX).unwrap();
        assert_abs_diff_eq!(a.distance(Vec2::new(4.0, 0.0)), MIN_ARROW_WING_PX, epsilon = 1e-12);
        assert!(arrow_wings(Vec2::zero(), Vec2::zero(), 1.0).is_none());
    }

    // ── bodies ────────────────────────────────────────────────────────────

    #[test]
    fn triangle_tip_follows_heading() {
        let placement = Placement { position: Vec2::new(2.0, 1.0), orientation: FRAC_PI_2, scale: 0.1 };
        let parts = place_body(&BodyShape::Triangle, placement, 32);
        let tip = parts[0].points[0];
        assert_abs_diff_eq!(tip.x, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(tip.y, 1.1, epsilon = 1e-12);
    }

    #[test]
    fn compound_parts_scale_with_size() {
        let shape = BodyShape::Compound {
            parts: vec![
                Primitive::Line { start: Vec2::zero(), end: Vec2::new(1.0, 0.0) },
                Primitive::Text { position: Vec2::new(0.0, 1.0), text: "id".into(), font_size: 12.0 },
            ],
        };
        let placement = Placement { position: Vec2::zero(), orientation: 0.0, scale: 0.5 };
        let parts = place_body(&shape, placement, 8);
        assert_eq!(parts[0].points[1], Vec2::new(0.5, 0.0));
        assert_eq!(parts[1].points[0], Vec2::new(0.0, 0.5));
        assert!(matches!(parts[1].outline, Outline::Label { font_size, .. } if font_size == 12.0));
    }
}
