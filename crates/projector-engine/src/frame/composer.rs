//! Snapshot → draw calls.
//!
//! One frame runs in two passes over the z-ordered renderables:
//! 1. plan: expand every shape in its source frame and push the vertices into
//!    the batch projector (one conversion per source frame)
//! 2. paint: slice the converted points back out and issue draw calls
//!
//! Field backgrounds go down first, then the calibration layers.
//!
//! Draw failures are counted, never propagated.

use std::time::{Duration, Instant};

use crate::config::{LayerToggles, OverlayConfig};
use crate::coords::{Rgba, Vec2};
use crate::error::{OverlayError, Result};
use crate::field::{FieldRegistry, SCREEN, WORLD};
use crate::geometry::{
    BatchProjector, DEFAULT_FONT_SIZE, MIN_ARROW_WING_PX, Outline, Placement, Span, TrailGeometry,
    arrow_wings, expand, pattern_trail, place_body,
};
use crate::render::{Renderer, TextStyle};
use crate::scene::{DEFAULT_STROKE_WIDTH, Drawing, Entity, SceneSnapshot, SortKey};

use super::background::BackgroundLayer;
use super::layers::{FieldLayer, GridLayer};

/// Outline around filled shapes.
const FILL_BORDER_PX: f64 = 2.0;
const FILL_BORDER_COLOR: Rgba = Rgba::black();

/// Outline of an entity whose tracking source stopped reporting it.
const LOST_COLOR: Rgba = Rgba::rgb(255, 0, 0);
const LOST_WIDTH_PX: f64 = 4.0;

/// Minimum time between two skipped-draw warnings.
const SKIP_WARN_INTERVAL: Duration = Duration::from_secs(5);

/// Per-frame draw accounting.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub drawn: usize,
    pub skipped: usize,
}

impl FrameStats {
    pub(crate) fn record(&mut self, result: Result<()>, what: &str) {
        match result {
            Ok(()) => self.drawn += 1,
            Err(e) => self.skip(what, &e),
        }
    }

    pub(crate) fn skip(&mut self, what: &str, err: &OverlayError) {
        self.skipped += 1;
        log::debug!("{what} skipped: {err}");
    }
}

/// Folds skipped draws into an occasional warning.
#[derive(Debug, Default)]
struct SkipReport {
    pending: usize,
    last: Option<Instant>,
}

impl SkipReport {
    fn note(&mut self, skipped: usize, now: Instant) {
        self.pending += skipped;
        if self.pending == 0 {
            return;
        }
        if self.last.is_none_or(|t| now.saturating_duration_since(t) >= SKIP_WARN_INTERVAL) {
            log::warn!("{} draw calls skipped since the last report", self.pending);
            self.pending = 0;
            self.last = Some(now);
        }
    }
}

struct PartPlan {
    outline: Outline,
    span: Span,
}

struct EntityPlan<'a> {
    entity: &'a Entity,
    position: Vec2,
    parts: Vec<PartPlan>,
    trail: Option<Span>,
    arrow: Option<Span>,
    label: Option<Span>,
}

enum Plan<'a> {
    Entity(EntityPlan<'a>),
    Drawing(&'a Drawing, PartPlan),
}

/// Paint of one expanded part.
#[derive(Debug, Copy, Clone)]
struct PartPaint {
    color: Rgba,
    filled: bool,
    width: f64,
    lost: bool,
}

/// Turns scene snapshots into draw calls on any [`Renderer`].
pub struct FrameComposer {
    background: Rgba,
    circle_segments: u32,
    layers: LayerToggles,
    field_backgrounds: BackgroundLayer,
    grid: GridLayer,
    field_layer: FieldLayer,
    projector: BatchProjector,
    skips: SkipReport,
}

impl FrameComposer {
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            background: config.background,
            circle_segments: config.circle_segments,
            layers: config.layers,
            field_backgrounds: BackgroundLayer::new(config.asset_dir.clone()),
            grid: GridLayer::new(config.grid),
            field_layer: FieldLayer,
            projector: BatchProjector::new(),
            skips: SkipReport::default(),
        }
    }

    pub fn layers(&self) -> LayerToggles {
        self.layers
    }

    /// Returns the new visibility.
    pub fn toggle_grid(&mut self) -> bool {
        self.layers.grid = !self.layers.grid;
        log::info!("grid layer {}", if self.layers.grid { "on" } else { "off" });
        self.layers.grid
    }

    /// Returns the new visibility.
    pub fn toggle_fields(&mut self) -> bool {
        self.layers.fields = !self.layers.fields;
        log::info!("field layer {}", if self.layers.fields { "on" } else { "off" });
        self.layers.fields
    }

    /// Clears `renderer` and draws `snapshot` into it. Does not present.
    ///
    /// Without a "screen" field nothing but the background is drawn and
    /// `TransformUnavailable` is returned.
    pub fn compose(
        &mut self,
        snapshot: &SceneSnapshot,
        renderer: &mut dyn Renderer,
        now: Instant,
    ) -> Result<FrameStats> {
        renderer.clear(self.background);
        let fields = &snapshot.fields;
        if fields.get(SCREEN).is_none() {
            return Err(OverlayError::transform_unavailable(WORLD, SCREEN));
        }

        let mut stats = FrameStats::default();
        self.field_backgrounds.draw(fields, &snapshot.backgrounds, renderer, &mut stats);
        if self.layers.grid {
            if let Err(e) = self.grid.draw(fields, renderer, &mut stats) {
                stats.skip("grid layer", &e);
            }
        }
        if self.layers.fields {
            if let Err(e) = self.field_layer.draw(fields, renderer, &mut stats) {
                stats.skip("field layer", &e);
            }
        }

        let mut order: Vec<(SortKey, Renderable<'_>)> = snapshot
            .entities
            .values()
            .map(|e| (e.sort_key(), Renderable::Entity(e)))
            .chain(snapshot.drawings.values().map(|d| (d.sort_key(), Renderable::Drawing(d))))
            .collect();
        order.sort_by_key(|(key, _)| *key);

        self.projector.clear();
        let mut plans = Vec::with_capacity(order.len());
        for (_, item) in order {
            match item {
                Renderable::Entity(e) => {
                    if let Some(plan) = plan_entity(&mut self.projector, e, self.circle_segments, now) {
                        plans.push(Plan::Entity(plan));
                    }
                }
                Renderable::Drawing(d) => {
                    let expanded = expand(&d.primitive, self.circle_segments);
                    let span = self.projector.push(&d.field, &expanded.points);
                    plans.push(Plan::Drawing(d, PartPlan { outline: expanded.outline, span }));
                }
            }
        }
        self.projector.project(fields, SCREEN);

        for plan in &plans {
            match plan {
                Plan::Entity(p) => self.paint_entity(p, fields, renderer, &mut stats),
                Plan::Drawing(d, part) => {
                    let paint = PartPaint {
                        color: d.style.color,
                        filled: d.style.filled,
                        width: d.style.stroke_width(),
                        lost: false,
                    };
                    self.paint_part(part, paint, renderer, &mut stats);
                }
            }
        }

        self.skips.note(stats.skipped, now);
        Ok(stats)
    }

    fn paint_entity(
        &self,
        plan: &EntityPlan<'_>,
        fields: &FieldRegistry,
        renderer: &mut dyn Renderer,
        stats: &mut FrameStats,
    ) {
        let entity = plan.entity;
        let style = &entity.style;

        if let Some(span) = plan.trail {
            match self.projector.slice(span) {
                Ok(px) => {
                    let to_px = |d: f64| fields.world_scale(plan.position, d).unwrap_or(f64::NAN);
                    let trail = pattern_trail(px, &entity.trail, to_px);
                    paint_trail(&trail, renderer, stats);
                }
                Err(e) => stats.skip("trail", &e),
            }
        }

        let paint = PartPaint {
            color: style.color,
            filled: true,
            width: DEFAULT_STROKE_WIDTH,
            lost: entity.tracking.lost,
        };
        for part in &plan.parts {
            self.paint_part(part, paint, renderer, stats);
        }

        if let Some(span) = plan.arrow {
            match self.projector.slice(span) {
                Ok(&[base, tip]) => {
                    let (color, width) = (style.orientation_color, style.orientation_thickness);
                    stats.record(renderer.draw_line(base, tip, color, width), "heading");
                    if let Some([w0, w1]) = arrow_wings(base, tip, MIN_ARROW_WING_PX) {
                        stats.record(renderer.draw_polygon(&[tip, w0, w1], color, 0.0), "heading");
                    }
                }
                Ok(_) => {}
                Err(e) => stats.skip("heading", &e),
            }
        }

        if let Some(span) = plan.label {
            match self.projector.slice(span) {
                Ok(&[at]) => {
                    let text = TextStyle::new(Rgba::white(), DEFAULT_FONT_SIZE).with_background(Rgba::black());
                    stats.record(renderer.draw_text(&entity.id, at, text), "label");
                }
                Ok(_) => {}
                Err(e) => stats.skip("label", &e),
            }
        }
    }

    fn paint_part(&self, part: &PartPlan, paint: PartPaint, renderer: &mut dyn Renderer, stats: &mut FrameStats) {
        let pts = match self.projector.slice(part.span) {
            Ok(pts) => pts,
            Err(e) => return stats.skip("shape", &e),
        };
        match &part.outline {
            Outline::Closed => {
                if paint.filled {
                    stats.record(renderer.draw_polygon(pts, paint.color, 0.0), "fill");
                    stats.record(renderer.draw_polygon(pts, FILL_BORDER_COLOR, FILL_BORDER_PX), "border");
                } else {
                    stats.record(renderer.draw_polygon(pts, paint.color, paint.width), "outline");
                }
                if paint.lost {
                    stats.record(renderer.draw_polygon(pts, LOST_COLOR, LOST_WIDTH_PX), "lost outline");
                }
            }
            Outline::Open => {
                stats.record(renderer.draw_lines(pts, paint.color, paint.width, false), "line");
            }
            Outline::Arrow => {
                if let [start, end, rest @ ..] = pts {
                    stats.record(renderer.draw_line(*start, *end, paint.color, paint.width), "arrow");
                    if let [w0, w1] = rest {
                        stats.record(renderer.draw_polygon(&[*end, *w0, *w1], paint.color, 0.0), "arrow");
                    }
                }
            }
            Outline::Label { text, font_size } => {
                if let Some(at) = pts.first() {
                    let style = TextStyle::new(paint.color, *font_size);
                    stats.record(renderer.draw_text(text, *at, style), "text");
                }
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Renderable<'a> {
    Entity(&'a Entity),
    Drawing(&'a Drawing),
}

/// Pushes everything an entity draws. `None` when it has no pose yet.
fn plan_entity<'a>(
    projector: &mut BatchProjector,
    entity: &'a Entity,
    circle_segments: u32,
    now: Instant,
) -> Option<EntityPlan<'a>> {
    let position = entity.display_position()?;
    let style = &entity.style;
    let orientation = entity.effective_orientation();

    let placement = Placement { position, orientation, scale: style.size };
    let parts = place_body(&style.shape, placement, circle_segments)
        .into_iter()
        .map(|part| PartPlan { span: projector.push(WORLD, &part.points), outline: part.outline })
        .collect();

    let trail_points = entity.trail_points(now);
    let trail = (trail_points.len() >= 2).then(|| projector.push(WORLD, &trail_points));

    let arrow = (entity.has_heading && style.orientation_length > 0.0).then(|| {
        let tip = position + Vec2::from_angle(orientation) * style.orientation_length;
        projector.push(WORLD, &[position, tip])
    });

    let label = style
        .label
        .then(|| projector.push(WORLD, &[position + style.label_offset]));

    Some(EntityPlan { entity, position, parts, trail, arrow, label })
}

/// Same-colored runs go out as one batch call.
fn paint_trail(trail: &TrailGeometry, renderer: &mut dyn Renderer, stats: &mut FrameStats) {
    for run in trail.segments.chunk_by(|a, b| a.2 == b.2) {
        let segs: Vec<(Vec2, Vec2)> = run.iter().map(|(a, b, _)| (*a, *b)).collect();
        stats.record(renderer.draw_lines_batch(&segs, run[0].2, trail.width), "trail");
    }
    for run in trail.dots.chunk_by(|a, b| a.1 == b.1) {
        let dots: Vec<(Vec2, f64)> = run.iter().map(|(p, _)| (*p, trail.dot_radius)).collect();
        stats.record(renderer.draw_circles_batch(&dots, run[0].1, 0.0), "trail");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use crate::render::{CpuRenderer, ImageHandle};
    use crate::scene::{
        BodyShape, DrawStyle, EntitySpec, EntityStyle, FieldBackground, Pose, Scene, TrailMode,
        TrailPattern, TrailStyle, ZIndex,
    };

    const RED: Rgba = Rgba::rgb(255, 0, 0);
    const GREEN: Rgba = Rgba::rgb(0, 255, 0);
    const BLUE: Rgba = Rgba::rgb(0, 0, 255);

    fn quad(p: [(f64, f64); 4]) -> [Vec2; 4] {
        p.map(Vec2::from)
    }

    fn scene() -> Scene {
        let scene = Scene::new();
        scene
            .register_field(
                SCREEN,
                quad([(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (0.0, 3.0)]),
                quad([(0.0, 1080.0), (1920.0, 1080.0), (1920.0, 0.0), (0.0, 0.0)]),
            )
            .unwrap();
        scene
    }

    fn spawn(scene: &Scene, id: &str, color: Rgba, z: i32) {
        let spec = EntitySpec {
            style: EntityStyle { color, label: false, ..EntityStyle::default() },
            z: ZIndex(z),
            pose: Some(Pose::new(Vec2::new(2.0, 1.5), None)),
            ..EntitySpec::default()
        };
        scene.create_entity(id, spec).unwrap();
    }

    fn render(scene: &Scene) -> (CpuRenderer, Result<FrameStats>) {
        let config = OverlayConfig::default();
        let mut r = CpuRenderer::new(1920, 1080, &config);
        r.init().unwrap();
        let mut composer = FrameComposer::new(&config);
        let stats = composer.compose(&scene.snapshot(), &mut r, Instant::now());
        r.present().unwrap();
        (r, stats)
    }

    fn px(r: &CpuRenderer, x: u32, y: u32) -> Rgba {
        r.frame().unwrap().pixel(x, y).unwrap()
    }

    /// Keeps the geometry of fills and batched segments instead of pixels.
    #[derive(Default)]
    struct Recorder {
        fills: Vec<Vec<Vec2>>,
        segments: Vec<(Vec2, Vec2)>,
    }

    impl Renderer for Recorder {
        fn init(&mut self) -> Result<()> {
            Ok(())
        }
        fn size(&self) -> (u32, u32) {
            (1920, 1080)
        }
        fn clear(&mut self, _: Rgba) {
            self.fills.clear();
            self.segments.clear();
        }
        fn present(&mut self) -> Result<()> {
            Ok(())
        }
        fn shutdown(&mut self) {}
        fn draw_circle(&mut self, _: Vec2, _: f64, _: Rgba, _: f64) -> Result<()> {
            Ok(())
        }
        fn draw_polygon(&mut self, points: &[Vec2], _: Rgba, border: f64) -> Result<()> {
            if border == 0.0 {
                self.fills.push(points.to_vec());
            }
            Ok(())
        }
        fn draw_line(&mut self, _: Vec2, _: Vec2, _: Rgba, _: f64) -> Result<()> {
            Ok(())
        }
        fn draw_lines(&mut self, _: &[Vec2], _: Rgba, _: f64, _: bool) -> Result<()> {
            Ok(())
        }
        fn draw_text(&mut self, _: &str, _: Vec2, _: TextStyle) -> Result<()> {
            Ok(())
        }
        fn create_image(&mut self, _: &[u8], _: u32, _: u32) -> Result<ImageHandle> {
            Ok(ImageHandle(0))
        }
        fn draw_image(&mut self, _: ImageHandle, _: Vec2, _: Vec2) -> Result<()> {
            Ok(())
        }
        fn release_image(&mut self, _: ImageHandle) {}
        fn draw_circles_batch(&mut self, _: &[(Vec2, f64)], _: Rgba, _: f64) -> Result<()> {
            Ok(())
        }
        fn draw_lines_batch(&mut self, segments: &[(Vec2, Vec2)], _: Rgba, _: f64) -> Result<()> {
            self.segments.extend_from_slice(segments);
            Ok(())
        }
    }

    fn keystoned_scene() -> Scene {
        let scene = Scene::new();
        scene
            .register_field(
                SCREEN,
                quad([(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (0.0, 3.0)]),
                quad([(240.0, 1080.0), (1680.0, 1080.0), (1920.0, 0.0), (0.0, 0.0)]),
            )
            .unwrap();
        scene
    }

    // ── screen field ──────────────────────────────────────────────────────

    #[test]
    fn missing_screen_leaves_background() {
        let scene = Scene::new();
        let (r, stats) = render(&scene);
        assert!(matches!(stats, Err(OverlayError::TransformUnavailable { .. })));
        assert_eq!(px(&r, 960, 540), Rgba::black());
    }

    // ── entities ──────────────────────────────────────────────────────────

    #[test]
    fn entity_is_sized_in_meters() {
        let scene = scene();
        spawn(&scene, "r1", RED, 0);
        let (r, stats) = render(&scene);
        let stats = stats.unwrap();

        // 0.1 m at 480 px/m is a 48 px radius around (960, 540).
        assert_eq!(px(&r, 960, 540), RED);
        assert_eq!(px(&r, 1000, 540), RED);
        assert_eq!(px(&r, 1020, 540), Rgba::black());
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.drawn, 2);
    }

    #[test]
    fn lost_tracking_draws_red_outline() {
        let scene = scene();
        spawn(&scene, "r1", BLUE, 0);
        scene.set_tracking_lost("r1", true).unwrap();
        let (r, _) = render(&scene);
        assert_eq!(px(&r, 960, 540), BLUE);
        assert_eq!(px(&r, 1007, 540), RED);
    }

    #[test]
    fn heading_arrow_follows_orientation() {
        let scene = scene();
        spawn(&scene, "r1", BLUE, 0);
        scene.update_position("r1", Vec2::new(2.0, 1.5), Some(0.0)).unwrap();
        let (r, _) = render(&scene);
        // 0.15 m heading along +x ends 72 px right of center.
        assert_eq!(px(&r, 1025, 540), Rgba::white());
        assert_eq!(px(&r, 1025, 560), Rgba::black());
    }

    #[test]
    fn labels_without_font_are_counted_as_skipped() {
        let scene = scene();
        scene.create_entity("r1", EntitySpec {
            pose: Some(Pose::new(Vec2::new(2.0, 1.5), None)),
            ..EntitySpec::default()
        })
        .unwrap();
        let (_, stats) = render(&scene);
        assert_eq!(stats.unwrap().skipped, 1);
    }

    #[test]
    fn entities_without_pose_are_not_drawn() {
        let scene = scene();
        scene.create_entity("ghost", EntitySpec::default()).unwrap();
        let (_, stats) = render(&scene);
        assert_eq!(stats.unwrap(), FrameStats::default());
    }

    // ── drawings ──────────────────────────────────────────────────────────

    fn square(z: i32, color: Rgba) -> Drawing {
        Drawing::new(
            "zone",
            WORLD,
            Primitive::Box { center: Vec2::new(2.0, 1.5), width: 0.5, height: 0.5, angle: 0.0 },
        )
        .with_style(DrawStyle { color, ..DrawStyle::default() })
        .with_z(z)
    }

    #[test]
    fn z_order_puts_drawing_on_top() {
        let scene = scene();
        spawn(&scene, "r1", RED, 0);
        scene.create_drawing(square(1, GREEN)).unwrap();
        let (r, _) = render(&scene);
        assert_eq!(px(&r, 960, 540), GREEN);
    }

    #[test]
    fn equal_z_uses_creation_order() {
        let scene = scene();
        scene.create_drawing(square(0, GREEN)).unwrap();
        spawn(&scene, "r1", RED, 0);
        let (r, _) = render(&scene);
        assert_eq!(px(&r, 960, 540), RED);
    }

    #[test]
    fn drawing_in_field_frame_lands_in_world() {
        let scene = scene();
        scene
            .register_field(
                "table",
                quad([(1.0, 1.0), (3.0, 1.0), (3.0, 2.0), (1.0, 2.0)]),
                quad([(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]),
            )
            .unwrap();
        let circle = Primitive::Circle { center: Vec2::new(0.5, 0.5), radius: 0.1 };
        scene.create_drawing(Drawing::new("dot", "table", circle)).unwrap();
        let (r, stats) = render(&scene);
        // table (0.5, 0.5) is world (2.0, 1.5)
        assert_eq!(px(&r, 960, 540), Rgba::white());
        assert_eq!(stats.unwrap().skipped, 0);
    }

    // ── layers ────────────────────────────────────────────────────────────

    #[test]
    fn grid_layer_draws_major_lines() {
        let scene = scene();
        let mut config = OverlayConfig::default();
        config.grid.line_width = 3.0;
        let mut r = CpuRenderer::new(1920, 1080, &config);
        r.init().unwrap();
        let mut composer = FrameComposer::new(&config);
        assert!(composer.toggle_grid());
        composer.compose(&scene.snapshot(), &mut r, Instant::now()).unwrap();
        r.present().unwrap();
        // x = 1 m is pixel column 480.
        assert_eq!(px(&r, 480, 300), config.grid.major_color);
        assert_ne!(px(&r, 500, 300), config.grid.major_color);
    }

    #[test]
    fn screen_background_goes_under_entities() {
        let scene = scene();
        let floor = FieldBackground::Color { color: Rgba::rgb(0, 60, 0), alpha: 255 };
        scene.set_field_background(SCREEN, floor).unwrap();
        spawn(&scene, "r1", RED, 0);
        let (r, stats) = render(&scene);
        assert_eq!(stats.unwrap().skipped, 0);
        assert_eq!(px(&r, 960, 540), RED);
        assert_eq!(px(&r, 100, 100), Rgba::rgb(0, 60, 0));
    }

    // ── keystoned screen ──────────────────────────────────────────────────

    #[test]
    fn triangle_tip_follows_the_keystone() {
        let scene = keystoned_scene();
        let (position, heading, size) = (Vec2::new(2.0, 1.5), 0.5, 0.2);
        let spec = EntitySpec {
            style: EntityStyle { shape: BodyShape::Triangle, size, label: false, ..EntityStyle::default() },
            pose: Some(Pose::new(position, Some(heading))),
            ..EntitySpec::default()
        };
        scene.create_entity("t", spec).unwrap();

        let snapshot = scene.snapshot();
        let mut r = Recorder::default();
        let mut composer = FrameComposer::new(&OverlayConfig::default());
        composer.compose(&snapshot, &mut r, Instant::now()).unwrap();

        let tip = position + Vec2::from_angle(heading) * size;
        let expected = snapshot.fields.convert_point(tip, WORLD, SCREEN).unwrap();
        let drawn = r.fills[0][0];
        approx::assert_abs_diff_eq!(drawn.x, expected.x, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(drawn.y, expected.y, epsilon = 1e-6);
        // A keystoned screen is not a plain scale of the square one.
        assert!((expected.x - tip.x * 480.0).abs() > 1.0);
    }

    #[test]
    fn dashed_trail_stays_on_the_projected_line() {
        let scene = keystoned_scene();
        let trail = TrailStyle {
            mode: TrailMode::Distance,
            length: 10.0,
            pattern: TrailPattern::Dashed,
            dash_length: 0.1,
            ..TrailStyle::default()
        };
        let spec = EntitySpec {
            style: EntityStyle { label: false, ..EntityStyle::default() },
            trail,
            ..EntitySpec::default()
        };
        scene.create_entity("t", spec).unwrap();
        for k in 0..=20 {
            let x = 1.0 + k as f64 * 0.1;
            scene.update_position("t", Vec2::new(x, 1.0), None).unwrap();
        }

        let now = Instant::now();
        let snapshot = scene.snapshot();
        let mut r = Recorder::default();
        let mut composer = FrameComposer::new(&OverlayConfig::default());
        composer.compose(&snapshot, &mut r, now).unwrap();

        let entity = &snapshot.entities["t"];
        let fields = &snapshot.fields;
        let projected = fields.convert(&entity.trail_points(now), WORLD, SCREEN).unwrap();
        let last = entity.display_position().unwrap();
        let expected = pattern_trail(&projected, &entity.trail, |d| fields.world_scale(last, d).unwrap());
        assert!(expected.segments.len() > 3);
        assert_eq!(r.segments.len(), expected.segments.len());

        let a = fields.convert_point(Vec2::new(1.0, 1.0), WORLD, SCREEN).unwrap();
        let b = fields.convert_point(Vec2::new(3.0, 1.0), WORLD, SCREEN).unwrap();
        let dir = b - a;
        for (p, q) in &r.segments {
            for end in [*p, *q] {
                let off_line = (end - a).cross(dir).abs() / dir.length();
                assert!(off_line < 1e-6, "{end:?} is {off_line} px off the trail line");
            }
        }
    }
}
