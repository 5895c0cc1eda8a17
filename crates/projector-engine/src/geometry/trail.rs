//! Trail patterning in pixel space.

use crate::coords::{Rgba, Vec2};
use crate::scene::{TrailColor, TrailPattern, TrailStyle};

/// Patterns shorter than this many pixels degrade to a solid line.
const MIN_PATTERN_PX: f64 = 1.0;

/// Draw-ready trail pieces. Every segment and dot carries its own color so
/// gradients survive patterning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrailGeometry {
    pub segments: Vec<(Vec2, Vec2, Rgba)>,
    pub dots: Vec<(Vec2, Rgba)>,
    /// Segment width, pixels.
    pub width: f64,
    /// Dot radius, pixels.
    pub dot_radius: f64,
}

impl TrailGeometry {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.dots.is_empty()
    }
}

fn color_at(color: &TrailColor, t: f64) -> Rgba {
    match *color {
        TrailColor::Solid { color } => color,
        // t = 0 at the tail (oldest point), 1 at the entity.
        TrailColor::Gradient { start, end } => end.lerp(start, t),
    }
}

/// Builds the trail for `points` (pixel space, oldest first).
///
/// `to_px` turns a world length into pixels at the entity position; it sizes
/// the dot pitch and dash length.
pub fn pattern_trail(points: &[Vec2], style: &TrailStyle, to_px: impl Fn(f64) -> f64) -> TrailGeometry {
    let mut out = TrailGeometry {
        width: style.thickness,
        dot_radius: style.thickness.max(2.0),
        ..TrailGeometry::default()
    };
    if !style.enabled || points.len() < 2 {
        return out;
    }

    let last = (points.len() - 1) as f64;
    let param = |i: usize, frac: f64| (i as f64 + frac) / last;

    let pitch = match style.pattern {
        TrailPattern::Solid => None,
        TrailPattern::Dotted => Some(to_px(style.dot_spacing)),
        TrailPattern::Dashed => Some(to_px(style.dash_length)),
    }
    .filter(|px| px.is_finite() && *px >= MIN_PATTERN_PX);

    match (style.pattern, pitch) {
        (TrailPattern::Dotted, Some(spacing)) => {
            walk(points, &[spacing], |i, frac, p, _| {
                out.dots.push((p, color_at(&style.color, param(i, frac))));
            });
        }
        (TrailPattern::Dashed, Some(dash)) => {
            for (a, b, t) in dashes(points, dash, param) {
                out.segments.push((a, b, color_at(&style.color, t)));
            }
        }
        _ => {
            for (i, w) in points.windows(2).enumerate() {
                out.segments.push((w[0], w[1], color_at(&style.color, param(i, 0.5))));
            }
        }
    }
    out
}

/// Walks the polyline and calls `emit(segment, fraction, point, phase)` every
/// time the cursor has advanced by the current entry of `pitches` (cycled).
/// The first call happens at the very first point.
fn walk(points: &[Vec2], pitches: &[f64], mut emit: impl FnMut(usize, f64, Vec2, usize)) {
    let mut phase = 0;
    let mut left = 0.0;
    for (i, w) in points.windows(2).enumerate() {
        let (a, b) = (w[0], w[1]);
        let len = a.distance(b);
        if len <= 0.0 {
            continue;
        }
        let mut pos = 0.0;
        while len - pos >= left {
            pos += left;
            emit(i, pos / len, a.lerp(b, pos / len), phase);
            left = pitches[phase % pitches.len()];
            phase += 1;
        }
        left -= len - pos;
    }
}

/// Splits the polyline into dashes of `dash` pixels separated by half-dash
/// gaps. Each returned piece is one straight run of a dash plus its gradient
/// parameter.
fn dashes(points: &[Vec2], dash: f64, param: impl Fn(usize, f64) -> f64) -> Vec<(Vec2, Vec2, f64)> {
    // Even phases start a dash, odd phases end it.
    let mut cuts: Vec<(usize, f64, usize)> = Vec::new();
    walk(points, &[dash, dash * 0.5], |i, frac, _, phase| cuts.push((i, frac, phase)));

    let mut out = Vec::new();
    let mut pen: Option<(Vec2, f64)> = None;
    let mut cuts = cuts.into_iter().peekable();
    for (i, w) in points.windows(2).enumerate() {
        let (a, b) = (w[0], w[1]);
        while let Some((_, frac, phase)) = cuts.next_if(|c| c.0 == i) {
            let here = (a.lerp(b, frac), param(i, frac));
            if phase % 2 == 0 {
                pen = Some(here);
            } else if let Some(start) = pen.take() {
                out.push((start.0, here.0, (start.1 + here.1) * 0.5));
            }
        }
        if let Some(start) = pen {
            let end = (b, param(i, 1.0));
            if start.0 != end.0 {
                out.push((start.0, end.0, (start.1 + end.1) * 0.5));
            }
            pen = Some(end);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn style(pattern: TrailPattern) -> TrailStyle {
        TrailStyle { pattern, ..TrailStyle::default() }
    }

    fn straight(len: f64) -> Vec<Vec2> {
        vec![Vec2::new(0.0, 0.0), Vec2::new(len, 0.0)]
    }

    // ── patterns ──────────────────────────────────────────────────────────

    #[test]
    fn solid_trail_is_one_segment_per_step() {
        let pts = vec![Vec2::zero(), Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0)];
        let g = pattern_trail(&pts, &style(TrailPattern::Solid), |m| m * 100.0);
        assert_eq!(g.segments.len(), 2);
        assert!(g.dots.is_empty());
    }

    #[test]
    fn dots_are_spaced_by_pitch() {
        // 0.05 m at 200 px/m = 10 px
        let g = pattern_trail(&straight(35.0), &style(TrailPattern::Dotted), |m| m * 200.0);
        let xs: Vec<f64> = g.dots.iter().map(|d| d.0.x).collect();
        assert_eq!(xs.len(), 4);
        for (x, want) in xs.iter().zip([0.0, 10.0, 20.0, 30.0]) {
            assert_abs_diff_eq!(*x, want, epsilon = 1e-9);
        }
        assert_eq!(g.dot_radius, 2.0);
    }

    #[test]
    fn dashes_have_half_length_gaps() {
        // 0.1 m at 100 px/m = 10 px dashes, 5 px gaps
        let g = pattern_trail(&straight(40.0), &style(TrailPattern::Dashed), |m| m * 100.0);
        let spans: Vec<(f64, f64)> = g.segments.iter().map(|s| (s.0.x, s.1.x)).collect();
        let want = [(0.0, 10.0), (15.0, 25.0), (30.0, 40.0)];
        assert_eq!(spans.len(), want.len());
        for (got, want) in spans.iter().zip(want) {
            assert_abs_diff_eq!(got.0, want.0, epsilon = 1e-9);
            assert_abs_diff_eq!(got.1, want.1, epsilon = 1e-9);
        }
    }

    #[test]
    fn dash_continues_around_a_corner() {
        let pts = vec![Vec2::zero(), Vec2::new(6.0, 0.0), Vec2::new(6.0, 6.0)];
        let g = pattern_trail(&pts, &style(TrailPattern::Dashed), |m| m * 100.0);
        // first dash: 0..6 on the first leg plus 4 px on the second
        assert_eq!(g.segments[0].1, Vec2::new(6.0, 0.0));
        assert_abs_diff_eq!(g.segments[1].1.y, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn tiny_pitch_degrades_to_solid() {
        let g = pattern_trail(&straight(40.0), &style(TrailPattern::Dotted), |m| m * 1.0);
        assert!(g.dots.is_empty());
        assert_eq!(g.segments.len(), 1);
    }

    // ── color ─────────────────────────────────────────────────────────────

    #[test]
    fn gradient_runs_from_tail_to_head() {
        let s = TrailStyle {
            color: TrailColor::Gradient { start: Rgba::rgb(255, 0, 0), end: Rgba::new(0, 0, 255, 0) },
            ..TrailStyle::default()
        };
        let pts: Vec<Vec2> = (0..5).map(|i| Vec2::new(i as f64, 0.0)).collect();
        let g = pattern_trail(&pts, &s, |m| m);
        let tail = g.segments.first().unwrap().2;
        let head = g.segments.last().unwrap().2;
        assert!(tail.b > tail.r);
        assert!(head.r > head.b);
        assert!(tail.a < head.a);
    }

    #[test]
    fn disabled_or_short_trails_are_empty() {
        let off = TrailStyle { enabled: false, ..TrailStyle::default() };
        assert!(pattern_trail(&straight(10.0), &off, |m| m).is_empty());
        assert!(pattern_trail(&[Vec2::zero()], &TrailStyle::default(), |m| m).is_empty());
    }
}
