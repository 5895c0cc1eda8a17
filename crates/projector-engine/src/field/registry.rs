use std::collections::HashMap;

use crate::coords::Vec2;
use crate::error::{OverlayError, Result};

use super::homography::Homography;

/// Name of the shared physical reference frame. Always present, never registered.
pub const WORLD: &str = "world";

/// Field that maps world meters to output pixels.
pub const SCREEN: &str = "screen";

pub const DEFAULT_PROBE_DISTANCE: f64 = 0.1;

const CORNER_LABELS: [&str; 4] = ["bottom-left", "bottom-right", "top-right", "top-left"];

/// A named coordinate system calibrated by four corner correspondences.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    /// Corners in world meters, counter-clockwise from bottom-left.
    pub world_points: [Vec2; 4],
    /// The same corners in the field's own units.
    pub local_points: [Vec2; 4],
    to_world: Homography,
    from_world: Homography,
}

impl Field {
    /// Validates four corner correspondences and solves both directions of
    /// the mapping. Touches no registry.
    pub fn calibrate(name: &str, world_points: [Vec2; 4], local_points: [Vec2; 4]) -> Result<Self> {
        if name.is_empty() {
            return Err(OverlayError::InvalidArgument("field name is empty".into()));
        }
        if name == WORLD {
            return Err(OverlayError::InvalidArgument(format!("'{WORLD}' is reserved")));
        }

        check_finite(&world_points, "world")?;
        check_finite(&local_points, "local")?;
        check_counter_clockwise(&world_points)?;
        check_convex(&local_points)?;

        let to_world = Homography::from_correspondences(&local_points, &world_points)
            .ok_or_else(|| OverlayError::InvalidGeometry("corner system is singular".into()))?;
        let from_world = to_world
            .inverse()
            .ok_or_else(|| OverlayError::InvalidGeometry("transform is not invertible".into()))?;

        Ok(Self {
            name: name.to_string(),
            world_points,
            local_points,
            to_world,
            from_world,
        })
    }

    #[inline]
    pub fn to_world(&self) -> &Homography {
        &self.to_world
    }

    #[inline]
    pub fn from_world(&self) -> &Homography {
        &self.from_world
    }

    /// Average of the world corners.
    pub fn world_centroid(&self) -> Vec2 {
        let sum = self.world_points.iter().fold(Vec2::zero(), |acc, p| acc + *p);
        sum / 4.0
    }
}

/// Cached transforms between one field and every other frame.
#[derive(Debug, Clone)]
pub struct FieldPairs {
    name: String,
    outgoing: HashMap<String, Homography>,
    incoming: Vec<(String, Homography)>,
}

impl FieldPairs {
    /// Composes `field` with world and with each of `others`. A field of the
    /// same name among `others` is ignored.
    pub fn build<'a>(field: &Field, others: impl IntoIterator<Item = &'a Field>) -> Self {
        let mut outgoing = HashMap::new();
        outgoing.insert(WORLD.to_string(), field.to_world);
        let mut incoming = vec![(WORLD.to_string(), field.from_world)];

        for other in others.into_iter().filter(|f| f.name != field.name) {
            outgoing.insert(other.name.clone(), field.to_world.then(&other.from_world));
            incoming.push((other.name.clone(), other.to_world.then(&field.from_world)));
        }
        Self { name: field.name.clone(), outgoing, incoming }
    }
}

/// Registered fields plus the cached transform for every ordered pair of frames.
///
/// The cache is filled eagerly on registration, so conversion never mutates the
/// registry and a cloned registry is a self-contained snapshot.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: HashMap<String, Field>,
    // from -> to -> transform, "world" included on both sides.
    pairs: HashMap<String, HashMap<String, Homography>>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── registration ──────────────────────────────────────────────────────

    /// Validates and stores a field, replacing any previous calibration of the
    /// same name and recomputing every cached pair it takes part in.
    pub fn register_field(
        &mut self,
        name: &str,
        world_points: [Vec2; 4],
        local_points: [Vec2; 4],
    ) -> Result<()> {
        let field = Field::calibrate(name, world_points, local_points)?;
        let pairs = FieldPairs::build(&field, self.fields.values());
        self.install(field, pairs);
        log::info!("registered field '{name}'");
        Ok(())
    }

    /// Stores a calibrated field together with pairs built against the
    /// current field set. Pairs built against another set leave the cache
    /// inconsistent.
    pub fn install(&mut self, field: Field, pairs: FieldPairs) {
        debug_assert_eq!(field.name, pairs.name);
        let name = field.name.clone();
        self.drop_pairs(&name);
        self.fields.insert(name.clone(), field);
        self.pairs.insert(name.clone(), pairs.outgoing);
        for (from, h) in pairs.incoming {
            self.pairs.entry(from).or_default().insert(name.clone(), h);
        }
    }

    /// Copies of every field except `name`, enough to build pairs away from
    /// the registry.
    pub fn others(&self, name: &str) -> Vec<Field> {
        self.fields.values().filter(|f| f.name != name).cloned().collect()
    }

    pub fn remove_field(&mut self, name: &str) -> Result<Field> {
        let field = self
            .fields
            .remove(name)
            .ok_or_else(|| OverlayError::not_found("field", name))?;
        self.drop_pairs(name);
        log::info!("removed field '{name}'");
        Ok(field)
    }

    /// Removes every field except `keep`.
    pub fn retain_only(&mut self, keep: &str) {
        let names: Vec<String> = self.fields.keys().filter(|n| *n != keep).cloned().collect();
        for name in names {
            self.fields.remove(&name);
            self.drop_pairs(&name);
        }
    }

    // ── lookup ────────────────────────────────────────────────────────────

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// True for registered fields and for the world frame.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        name == WORLD || self.fields.contains_key(name)
    }

    /// Registered field names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Cached transform for the ordered pair `from -> to`.
    pub fn transform(&self, from: &str, to: &str) -> Result<Homography> {
        if from == to {
            return if self.contains(from) {
                Ok(Homography::identity())
            } else {
                Err(OverlayError::transform_unavailable(from, to))
            };
        }
        self.pairs
            .get(from)
            .and_then(|m| m.get(to))
            .copied()
            .ok_or_else(|| OverlayError::transform_unavailable(from, to))
    }

    // ── conversion ────────────────────────────────────────────────────────

    /// Converts a batch of points from one frame to another with one matrix lookup.
    pub fn convert(&self, points: &[Vec2], from: &str, to: &str) -> Result<Vec<Vec2>> {
        let mut out = Vec::with_capacity(points.len());
        self.convert_into(points, from, to, &mut out)?;
        Ok(out)
    }

    /// Like [`convert`](Self::convert) but appends into a caller-owned buffer.
    pub fn convert_into(
        &self,
        points: &[Vec2],
        from: &str,
        to: &str,
        out: &mut Vec<Vec2>,
    ) -> Result<()> {
        let h = self.transform(from, to)?;
        out.extend(points.iter().map(|p| h.apply(*p)));
        Ok(())
    }

    pub fn convert_point(&self, point: Vec2, from: &str, to: &str) -> Result<Vec2> {
        Ok(self.transform(from, to)?.apply(point))
    }

    // ── probes ────────────────────────────────────────────────────────────

    /// Re-derives a world heading inside `field` with the default probe distance.
    pub fn transform_orientation(&self, field: &str, position: Vec2, angle: f64) -> Result<f64> {
        self.transform_orientation_with_probe(field, position, angle, DEFAULT_PROBE_DISTANCE)
    }

    /// Converts `position` and `position + probe·(cos, sin)` into `field` and
    /// returns the heading of the converted delta.
    pub fn transform_orientation_with_probe(
        &self,
        field: &str,
        position: Vec2,
        angle: f64,
        probe_distance: f64,
    ) -> Result<f64> {
        if !(probe_distance.is_finite() && probe_distance > 0.0) {
            return Err(OverlayError::InvalidArgument(format!(
                "probe distance must be positive, got {probe_distance}"
            )));
        }
        let h = self.transform(WORLD, field)?;
        let tip = position + Vec2::from_angle(angle) * probe_distance;
        let delta = h.apply(tip) - h.apply(position);
        Ok(delta.angle())
    }

    /// Pixels covered by `distance` world meters around `position` on the screen field.
    pub fn world_scale(&self, position: Vec2, distance: f64) -> Result<f64> {
        self.scale_between(WORLD, SCREEN, position, distance)
    }

    /// [`world_scale`](Self::world_scale) keeping the sign of `distance`.
    pub fn signed_world_scale(&self, position: Vec2, distance: f64) -> Result<f64> {
        let magnitude = self.world_scale(position, distance.abs())?;
        Ok(magnitude.copysign(distance))
    }

    /// Local length scale between two frames sampled with a five-point probe:
    /// the centre plus `±distance` along each source axis. The two distances per
    /// axis are averaged, then the two axes.
    pub fn scale_between(&self, from: &str, to: &str, position: Vec2, distance: f64) -> Result<f64> {
        if !distance.is_finite() || !position.is_finite() {
            return Err(OverlayError::InvalidArgument("scale probe must be finite".into()));
        }
        let d = distance.abs();
        if d == 0.0 {
            return Ok(0.0);
        }

        let h = self.transform(from, to)?;
        let c = h.apply(position);
        let px = h.apply(position + Vec2::new(d, 0.0));
        let nx = h.apply(position - Vec2::new(d, 0.0));
        let py = h.apply(position + Vec2::new(0.0, d));
        let ny = h.apply(position - Vec2::new(0.0, d));

        let along_x = (c.distance(px) + c.distance(nx)) / 2.0;
        let along_y = (c.distance(py) + c.distance(ny)) / 2.0;
        Ok((along_x + along_y) / 2.0)
    }

    // ── cache maintenance ─────────────────────────────────────────────────

    fn drop_pairs(&mut self, name: &str) {
        self.pairs.remove(name);
        for targets in self.pairs.values_mut() {
            targets.remove(name);
        }
    }
}

// ── validation ────────────────────────────────────────────────────────────

fn check_finite(points: &[Vec2; 4], which: &str) -> Result<()> {
    match points.iter().position(|p| !p.is_finite()) {
        Some(i) => Err(OverlayError::InvalidGeometry(format!(
            "{which} {} corner is not finite",
            CORNER_LABELS[i]
        ))),
        None => Ok(()),
    }
}

/// Turn at each corner, as the cross product of the incoming and outgoing edges.
fn corner_turns(points: &[Vec2; 4]) -> [f64; 4] {
    std::array::from_fn(|i| {
        let prev = points[(i + 3) % 4];
        let here = points[i];
        let next = points[(i + 1) % 4];
        (here - prev).cross(next - here)
    })
}

/// World corners must turn left at every corner (y-up frame).
fn check_counter_clockwise(points: &[Vec2; 4]) -> Result<()> {
    for (i, turn) in corner_turns(points).iter().enumerate() {
        if *turn == 0.0 {
            return Err(OverlayError::InvalidGeometry(format!(
                "world points are collinear at the {} corner",
                CORNER_LABELS[i]
            )));
        }
        if *turn < 0.0 {
            return Err(OverlayError::InvalidGeometry(format!(
                "world points wind clockwise at the {} corner",
                CORNER_LABELS[i]
            )));
        }
    }
    Ok(())
}

/// Local corners only need a consistent turn direction: pixel frames are y-down,
/// so a counter-clockwise world quad arrives clockwise there.
fn check_convex(points: &[Vec2; 4]) -> Result<()> {
    let turns = corner_turns(points);
    if let Some(i) = turns.iter().position(|t| *t == 0.0) {
        return Err(OverlayError::InvalidGeometry(format!(
            "local points are collinear at the {} corner",
            CORNER_LABELS[i]
        )));
    }
    let positive = turns.iter().filter(|t| **t > 0.0).count();
    if positive != 0 && positive != 4 {
        return Err(OverlayError::InvalidGeometry(
            "local points do not form a convex quadrilateral".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad(p: [(f64, f64); 4]) -> [Vec2; 4] {
        p.map(Vec2::from)
    }

    fn world_4x3() -> [Vec2; 4] {
        quad([(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (0.0, 3.0)])
    }

    fn screen_registry() -> FieldRegistry {
        let mut reg = FieldRegistry::new();
        reg.register_field(
            SCREEN,
            world_4x3(),
            quad([(0.0, 1080.0), (1920.0, 1080.0), (1920.0, 0.0), (0.0, 0.0)]),
        )
        .unwrap();
        reg
    }

    fn with_keystone(mut reg: FieldRegistry) -> FieldRegistry {
        reg.register_field(
            "table",
            quad([(0.5, 0.5), (3.0, 0.7), (3.2, 2.5), (0.4, 2.2)]),
            quad([(0.0, 0.0), (100.0, 0.0), (100.0, 60.0), (0.0, 60.0)]),
        )
        .unwrap();
        reg
    }

    // ── registration ──────────────────────────────────────────────────────

    #[test]
    fn clockwise_world_points_are_rejected() {
        let mut reg = FieldRegistry::new();
        let err = reg
            .register_field(
                "cw",
                quad([(0.0, 0.0), (0.0, 3.0), (4.0, 3.0), (4.0, 0.0)]),
                world_4x3(),
            )
            .unwrap_err();
        assert!(matches!(err, OverlayError::InvalidGeometry(_)));
        assert!(!reg.contains("cw"));
    }

    #[test]
    fn collinear_points_are_rejected() {
        let mut reg = FieldRegistry::new();
        let err = reg
            .register_field(
                "flat",
                quad([(0.0, 0.0), (2.0, 0.0), (4.0, 0.0), (0.0, 3.0)]),
                world_4x3(),
            )
            .unwrap_err();
        assert!(matches!(err, OverlayError::InvalidGeometry(_)));
    }

    #[test]
    fn bowtie_local_points_are_rejected() {
        let mut reg = FieldRegistry::new();
        let err = reg
            .register_field(
                "bowtie",
                world_4x3(),
                quad([(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0)]),
            )
            .unwrap_err();
        assert!(matches!(err, OverlayError::InvalidGeometry(_)));
    }

    #[test]
    fn pairs_built_off_registry_match_registration() {
        let direct = with_keystone(screen_registry());

        let mut staged = screen_registry();
        let table = Field::calibrate(
            "table",
            quad([(0.5, 0.5), (3.0, 0.7), (3.2, 2.5), (0.4, 2.2)]),
            quad([(0.0, 0.0), (100.0, 0.0), (100.0, 60.0), (0.0, 60.0)]),
        )
        .unwrap();
        let others = staged.others("table");
        staged.install(table.clone(), FieldPairs::build(&table, &others));

        for (from, to) in [("table", SCREEN), (SCREEN, "table"), ("table", WORLD), (WORLD, "table")] {
            assert_eq!(staged.transform(from, to).unwrap(), direct.transform(from, to).unwrap());
        }
    }

    #[test]
    fn world_name_is_reserved() {
        let mut reg = FieldRegistry::new();
        let err = reg.register_field(WORLD, world_4x3(), world_4x3()).unwrap_err();
        assert!(matches!(err, OverlayError::InvalidArgument(_)));
    }

    #[test]
    fn reregistration_recomputes_cached_pairs() {
        let mut reg = with_keystone(screen_registry());
        let before = reg.convert_point(Vec2::new(50.0, 30.0), "table", SCREEN).unwrap();

        reg.register_field(
            "table",
            quad([(1.0, 1.0), (3.0, 1.0), (3.0, 2.0), (1.0, 2.0)]),
            quad([(0.0, 0.0), (100.0, 0.0), (100.0, 60.0), (0.0, 60.0)]),
        )
        .unwrap();
        let after = reg.convert_point(Vec2::new(50.0, 30.0), "table", SCREEN).unwrap();

        assert_ne!(before, after);
        // Centre of the new 2x1 m rectangle is world (2, 1.5).
        assert_relative_eq!(after.x, 960.0, epsilon = 1e-6);
        assert_relative_eq!(after.y, 540.0, epsilon = 1e-6);
    }

    #[test]
    fn removed_field_is_unavailable() {
        let mut reg = with_keystone(screen_registry());
        reg.remove_field("table").unwrap();
        let err = reg.convert_point(Vec2::zero(), "table", SCREEN).unwrap_err();
        assert!(matches!(err, OverlayError::TransformUnavailable { .. }));
        assert!(matches!(
            reg.remove_field("table").unwrap_err(),
            OverlayError::NotFound { .. }
        ));
    }

    // ── conversion ────────────────────────────────────────────────────────

    #[test]
    fn screen_centre_maps_to_pixel_centre() {
        let reg = screen_registry();
        let p = reg.convert_point(Vec2::new(2.0, 1.5), WORLD, SCREEN).unwrap();
        assert_relative_eq!(p.x, 960.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 540.0, epsilon = 1e-9);
    }

    #[test]
    fn same_field_conversion_is_identity() {
        let reg = with_keystone(screen_registry());
        for name in [SCREEN, "table", WORLD] {
            let p = Vec2::new(13.7, -2.25);
            let q = reg.convert_point(p, name, name).unwrap();
            assert_relative_eq!(q.x, p.x, epsilon = 1e-12);
            assert_relative_eq!(q.y, p.y, epsilon = 1e-12);
        }
    }

    #[test]
    fn conversion_composes_through_world() {
        let reg = with_keystone(screen_registry());
        let points = [Vec2::new(10.0, 5.0), Vec2::new(80.0, 55.0), Vec2::new(50.0, 30.0)];

        let via_world = reg.convert(&points, "table", WORLD).unwrap();
        let two_hops = reg.convert(&via_world, WORLD, SCREEN).unwrap();
        let direct = reg.convert(&points, "table", SCREEN).unwrap();

        for (a, b) in two_hops.iter().zip(direct.iter()) {
            assert_relative_eq!(a.x, b.x, epsilon = 1e-8);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-8);
        }
    }

    #[test]
    fn unregistered_field_is_unavailable() {
        let reg = screen_registry();
        let err = reg.convert(&[Vec2::zero()], "nowhere", SCREEN).unwrap_err();
        assert_eq!(err, OverlayError::transform_unavailable("nowhere", SCREEN));
        assert!(reg.convert_point(Vec2::zero(), "nowhere", "nowhere").is_err());
    }

    // ── probes ────────────────────────────────────────────────────────────

    #[test]
    fn world_scale_on_uniform_screen() {
        let reg = screen_registry();
        let s = reg.world_scale(Vec2::new(2.0, 1.5), 0.1).unwrap();
        assert_relative_eq!(s, 48.0, epsilon = 1e-9);
    }

    #[test]
    fn similarity_scale_is_position_independent() {
        let reg = screen_registry();
        for pos in [Vec2::new(0.3, 0.2), Vec2::new(3.9, 2.9), Vec2::new(-5.0, 10.0)] {
            for d in [0.05, 0.5, 2.0] {
                let s = reg.world_scale(pos, d).unwrap();
                assert_relative_eq!(s, d * 480.0, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn signed_scale_keeps_direction() {
        let reg = screen_registry();
        let s = reg.signed_world_scale(Vec2::new(1.0, 1.0), -0.2).unwrap();
        assert_relative_eq!(s, -96.0, epsilon = 1e-9);
    }

    #[test]
    fn orientation_is_probe_independent_under_affine_map() {
        let mut reg = FieldRegistry::new();
        // L(x, y) = (2x + 0.5y + 10, 0.3x + 1.5y + 5)
        let affine = |x: f64, y: f64| (2.0 * x + 0.5 * y + 10.0, 0.3 * x + 1.5 * y + 5.0);
        let world = world_4x3();
        let local = world.map(|p| Vec2::from(affine(p.x, p.y)));
        reg.register_field("skew", world, local).unwrap();

        let pos = Vec2::new(1.2, 0.7);
        let angle = 0.6;
        let reference = reg.transform_orientation("skew", pos, angle).unwrap();
        for probe in [0.001, 0.05, 0.5, 3.0] {
            let a = reg
                .transform_orientation_with_probe("skew", pos, angle, probe)
                .unwrap();
            assert_relative_eq!(a, reference, epsilon = 1e-9);
        }
    }

    #[test]
    fn orientation_flips_on_y_down_screen() {
        let reg = screen_registry();
        let a = reg
            .transform_orientation(SCREEN, Vec2::new(2.0, 1.5), std::f64::consts::FRAC_PI_2)
            .unwrap();
        assert_relative_eq!(a, -std::f64::consts::FRAC_PI_2, epsilon = 1e-9);
    }

    #[test]
    fn zero_probe_distance_is_rejected() {
        let reg = screen_registry();
        let err = reg
            .transform_orientation_with_probe(SCREEN, Vec2::zero(), 0.0, 0.0)
            .unwrap_err();
        assert!(matches!(err, OverlayError::InvalidArgument(_)));
    }
}
