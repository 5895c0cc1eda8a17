//! Calibration aids drawn underneath the scene.

use crate::config::GridStyle;
use crate::coords::{Rgba, Vec2};
use crate::error::Result;
use crate::field::{FieldRegistry, SCREEN, WORLD};
use crate::geometry;
use crate::render::{Renderer, TextStyle};

use super::FrameStats;

/// More lines than this per axis and the set is skipped as unreadable.
const MAX_LINES_PER_AXIS: usize = 1000;

/// Half length of the origin crosshair arms, meters.
const ORIGIN_ARM: f64 = 0.2;

const FIELD_COLOR: Rgba = Rgba::rgb(0, 200, 255);
const FIELD_LABEL_PX: f64 = 16.0;
const CORNER_NAMES: [&str; 4] = ["BL", "BR", "TR", "TL"];

/// Grid segments in world meters, grouped by how they are painted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridLines {
    pub major: Vec<(Vec2, Vec2)>,
    pub minor: Vec<(Vec2, Vec2)>,
    pub origin: Vec<(Vec2, Vec2)>,
}

/// Multiples of `spacing` inside `[lo, hi]`, or nothing when there are too many.
fn stops(lo: f64, hi: f64, spacing: f64) -> Vec<f64> {
    if !(spacing > 0.0) || !(hi >= lo) {
        return Vec::new();
    }
    let first = (lo / spacing).ceil() as i64;
    let last = (hi / spacing).floor() as i64;
    if last < first || (last - first) as usize >= MAX_LINES_PER_AXIS {
        return Vec::new();
    }
    (first..=last).map(|k| k as f64 * spacing).collect()
}

fn on_multiple(v: f64, spacing: f64) -> bool {
    spacing > 0.0 && ((v / spacing).round() * spacing - v).abs() < 1e-9
}

/// World grid clipped to the area the projector covers.
#[derive(Debug, Clone)]
pub struct GridLayer {
    style: GridStyle,
}

impl GridLayer {
    pub fn new(style: GridStyle) -> Self {
        Self { style }
    }

    pub fn lines(&self, lo: Vec2, hi: Vec2) -> GridLines {
        let s = &self.style;
        let mut out = GridLines::default();

        let add = |spacing: f64, major: bool, out: &mut GridLines| {
            for x in stops(lo.x, hi.x, spacing) {
                if !major && on_multiple(x, s.major_spacing) {
                    continue;
                }
                let seg = (Vec2::new(x, lo.y), Vec2::new(x, hi.y));
                if major { out.major.push(seg) } else { out.minor.push(seg) }
            }
            for y in stops(lo.y, hi.y, spacing) {
                if !major && on_multiple(y, s.major_spacing) {
                    continue;
                }
                let seg = (Vec2::new(lo.x, y), Vec2::new(hi.x, y));
                if major { out.major.push(seg) } else { out.minor.push(seg) }
            }
        };
        add(s.minor_spacing, false, &mut out);
        add(s.major_spacing, true, &mut out);

        if lo.x <= 0.0 && 0.0 <= hi.x && lo.y <= 0.0 && 0.0 <= hi.y {
            out.origin.push((Vec2::new(-ORIGIN_ARM, 0.0), Vec2::new(ORIGIN_ARM, 0.0)));
            out.origin.push((Vec2::new(0.0, -ORIGIN_ARM), Vec2::new(0.0, ORIGIN_ARM)));
        }
        out
    }

    pub fn draw(&self, fields: &FieldRegistry, renderer: &mut dyn Renderer, stats: &mut FrameStats) -> Result<()> {
        let Some(screen) = fields.get(SCREEN) else {
            return Ok(());
        };
        let Some((lo, hi)) = geometry::bounds(&screen.world_points) else {
            return Ok(());
        };
        let lines = self.lines(lo, hi);

        let flat: Vec<Vec2> = [&lines.minor, &lines.major, &lines.origin]
            .into_iter()
            .flatten()
            .flat_map(|(a, b)| [*a, *b])
            .collect();
        let px = fields.convert(&flat, WORLD, SCREEN)?;
        let pairs: Vec<(Vec2, Vec2)> = px.chunks_exact(2).map(|c| (c[0], c[1])).collect();

        let (minor, rest) = pairs.split_at(lines.minor.len());
        let (major, origin) = rest.split_at(lines.major.len());
        let s = &self.style;
        for (segs, color, width) in [
            (minor, s.minor_color, s.line_width),
            (major, s.major_color, s.line_width),
            (origin, s.origin_color, s.line_width * 2.0),
        ] {
            if !segs.is_empty() {
                stats.record(renderer.draw_lines_batch(segs, color, width), "grid");
            }
        }
        Ok(())
    }
}

/// Outline of every registered field with its corner order and name.
#[derive(Debug, Clone, Default)]
pub struct FieldLayer;

impl FieldLayer {
    pub fn draw(&self, fields: &FieldRegistry, renderer: &mut dyn Renderer, stats: &mut FrameStats) -> Result<()> {
        let mut names = Vec::new();
        let mut world = Vec::new();
        for field in fields.fields() {
            names.push(field.name.clone());
            world.extend(field.world_points);
            world.push(field.world_centroid());
        }
        let px = fields.convert(&world, WORLD, SCREEN)?;

        let label = TextStyle::new(FIELD_COLOR, FIELD_LABEL_PX).with_background(Rgba::black());
        for (name, pts) in names.iter().zip(px.chunks_exact(5)) {
            stats.record(renderer.draw_lines(&pts[..4], FIELD_COLOR, 2.0, true), "field outline");
            for (corner, p) in CORNER_NAMES.iter().zip(&pts[..4]) {
                stats.record(renderer.draw_text(corner, *p, label), "field corner");
            }
            stats.record(renderer.draw_text(name, pts[4], label), "field name");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_cover_closed_range() {
        assert_eq!(stops(0.0, 3.0, 1.0), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(stops(0.5, 2.5, 1.0), vec![1.0, 2.0]);
        assert!(stops(0.0, 1.0, 0.0).is_empty());
        assert!(stops(0.0, 1.0e6, 1.0e-3).is_empty());
    }

    #[test]
    fn minor_lines_skip_major_positions() {
        let grid = GridLayer::new(GridStyle {
            major_spacing: 1.0,
            minor_spacing: 0.5,
            ..GridStyle::default()
        });
        let lines = grid.lines(Vec2::zero(), Vec2::new(2.0, 1.0));
        // x: 0,1,2 major; 0.5,1.5 minor. y: 0,1 major; 0.5 minor.
        assert_eq!(lines.major.len(), 5);
        assert_eq!(lines.minor.len(), 3);
        assert_eq!(lines.origin.len(), 2);
    }

    #[test]
    fn origin_outside_extent_has_no_crosshair() {
        let grid = GridLayer::new(GridStyle::default());
        let lines = grid.lines(Vec2::new(1.0, 1.0), Vec2::new(2.0, 2.0));
        assert!(lines.origin.is_empty());
    }
}
