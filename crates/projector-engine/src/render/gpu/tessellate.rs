//! Tessellation into convex pixel-space pieces, fanned into triangles by the
//! batch builder.

use crate::coords::Vec2;
use crate::geometry::circle_points;

/// Stroke widths at or above this get filled joints.
const JOIN_MIN_WIDTH: f64 = 3.0;
const JOIN_SEGMENTS: u32 = 8;

/// Polygon segment count that keeps circle edges smooth at `radius` pixels.
pub fn segments_for_radius(radius: f64) -> u32 {
    ((radius.max(0.0).sqrt() * 4.0).ceil() as u32).clamp(12, 128)
}

pub fn circle(center: Vec2, radius: f64) -> Vec<Vec2> {
    circle_points(center, radius, segments_for_radius(radius))
}

/// Rectangle of `width` centered on the segment, or `None` when `a == b`.
pub fn line_quad(a: Vec2, b: Vec2, width: f64) -> Option<[Vec2; 4]> {
    let d = b - a;
    let len = d.length();
    if !(len > 0.0) {
        return None;
    }
    let n = Vec2::new(-d.y, d.x) * (width * 0.5 / len);
    Some([a + n, b + n, b - n, a - n])
}

/// Quads for every segment of the polyline plus round-ish joints for thick
/// strokes.
pub fn stroke(points: &[Vec2], width: f64, closed: bool) -> Vec<Vec<Vec2>> {
    let mut out = Vec::with_capacity(points.len() * 2);
    let n = points.len();
    if n < 2 {
        return out;
    }
    let seg_count = if closed && n > 2 { n } else { n - 1 };
    for i in 0..seg_count {
        if let Some(q) = line_quad(points[i], points[(i + 1) % n], width) {
            out.push(q.to_vec());
        }
    }
    if width >= JOIN_MIN_WIDTH {
        let joints: Box<dyn Iterator<Item = &Vec2>> = if closed && n > 2 {
            Box::new(points.iter())
        } else {
            Box::new(points[1..n - 1].iter())
        };
        for p in joints {
            out.push(circle_points(*p, width * 0.5, JOIN_SEGMENTS));
        }
    }
    out
}

/// Annulus from `radius - width` to `radius`, as one quad per segment.
pub fn ring(center: Vec2, radius: f64, width: f64) -> Vec<Vec<Vec2>> {
    let outer = circle(center, radius);
    let inner_r = (radius - width).max(0.0);
    if inner_r == 0.0 {
        return vec![outer];
    }
    let inner = circle_points(center, inner_r, outer.len() as u32);
    let n = outer.len();
    (0..n)
        .map(|i| {
            let j = (i + 1) % n;
            vec![outer[i], outer[j], inner[j], inner[i]]
        })
        .collect()
}

/// Triangle fan over a convex polygon.
pub fn fan(points: &[Vec2]) -> impl Iterator<Item = [Vec2; 3]> + '_ {
    let first = points.first().copied().unwrap_or_default();
    points
        .windows(2)
        .skip(1)
        .map(move |w| [first, w[0], w[1]])
}
