//! Operation name → handler table.
//!
//! Every handler takes the scene plus JSON arguments already parsed by the
//! transport, decodes them into a typed struct and returns a JSON result.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::coords::{Rgba, Vec2};
use crate::error::{OverlayError, Result};
use crate::field::{DEFAULT_PROBE_DISTANCE, WORLD};
use crate::scene::{
    Drawing, Entity, EntitySpec, EntityStyle, FieldBackground, Scene, TrackingUpdate, TrailStyle,
};

pub type Handler = fn(&Scene, Value) -> Result<Value>;

/// Explicit table of every operation the overlay accepts.
#[derive(Clone)]
pub struct CommandTable {
    handlers: HashMap<&'static str, Handler>,
}

impl std::fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTable {
    /// Table with every built-in operation.
    pub fn new() -> Self {
        let entries: [(&'static str, Handler); 34] = [
            // fields
            ("create_field", create_field),
            ("remove_field", remove_field),
            ("list_fields", list_fields),
            ("get_field", get_field),
            ("convert", convert),
            ("transform_orientation", transform_orientation),
            ("world_scale", world_scale),
            ("set_field_background", set_field_background),
            ("set_field_background_color", set_field_background_color),
            ("remove_field_background", remove_field_background),
            // entities
            ("create_entity", create_entity),
            ("remove_entity", remove_entity),
            ("update_position", update_position),
            ("update_tracked_position", update_tracked_position),
            ("set_tracking", set_tracking),
            ("set_tracking_lost", set_tracking_lost),
            ("update_style", update_style),
            ("update_trail", update_trail),
            ("clear_history", clear_history),
            ("set_z_order", set_z_order),
            ("list_entities", list_entities),
            ("get_entity", get_entity),
            // drawings
            ("create_drawing", create_drawing),
            ("update_drawing", update_drawing),
            ("remove_drawing", remove_drawing),
            ("get_drawing", get_drawing),
            ("list_drawings", list_drawings),
            ("clear_drawings", clear_drawings),
            // scene
            ("clear_scene", clear_scene),
            ("clear_all", clear_all),
            ("get_scene", get_scene),
            ("export_scene", export_scene),
            ("import_scene", import_scene),
            ("ping", ping),
        ];
        Self { handlers: entries.into_iter().collect() }
    }

    /// Adds or replaces an operation.
    pub fn register(&mut self, name: &'static str, handler: Handler) {
        if self.handlers.insert(name, handler).is_some() {
            log::warn!("command '{name}' re-registered");
        }
    }

    pub fn get(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).copied()
    }

    /// Sorted operation names.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs `name`. Unknown names fail with `NotFound`.
    pub fn execute(&self, scene: &Scene, name: &str, args: Value) -> Result<Value> {
        let handler = self.get(name).ok_or_else(|| OverlayError::not_found("command", name))?;
        handler(scene, args)
    }
}

fn decode<T: DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() { Value::Object(Default::default()) } else { args };
    serde_json::from_value(args).map_err(|e| OverlayError::InvalidArgument(e.to_string()))
}

fn ok() -> Result<Value> {
    Ok(json!({}))
}

#[derive(Deserialize)]
struct Name {
    name: String,
}

#[derive(Deserialize)]
struct Id {
    id: String,
}

// ── fields ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateField {
    name: String,
    world_points: [Vec2; 4],
    local_points: [Vec2; 4],
}

fn create_field(scene: &Scene, args: Value) -> Result<Value> {
    let a: CreateField = decode(args)?;
    scene.register_field(&a.name, a.world_points, a.local_points)?;
    Ok(json!({ "name": a.name }))
}

fn remove_field(scene: &Scene, args: Value) -> Result<Value> {
    let a: Name = decode(args)?;
    scene.remove_field(&a.name)?;
    Ok(json!({ "name": a.name }))
}

fn list_fields(scene: &Scene, _args: Value) -> Result<Value> {
    Ok(json!({ "fields": scene.list_fields() }))
}

fn get_field(scene: &Scene, args: Value) -> Result<Value> {
    let a: Name = decode(args)?;
    let field = scene
        .get_field(&a.name)
        .ok_or_else(|| OverlayError::not_found("field", a.name.as_str()))?;
    Ok(json!({
        "name": field.name,
        "world_points": field.world_points,
        "local_points": field.local_points,
        "background": scene.field_background(&a.name),
    }))
}

#[derive(Deserialize)]
struct Convert {
    points: Vec<Vec2>,
    from: String,
    to: String,
}

fn convert(scene: &Scene, args: Value) -> Result<Value> {
    let a: Convert = decode(args)?;
    let points = scene.snapshot().fields.convert(&a.points, &a.from, &a.to)?;
    Ok(json!({ "points": points }))
}

#[derive(Deserialize)]
struct Orientation {
    field: String,
    position: Vec2,
    angle: f64,
    #[serde(default = "default_probe")]
    probe_distance: f64,
}

fn default_probe() -> f64 {
    DEFAULT_PROBE_DISTANCE
}

fn transform_orientation(scene: &Scene, args: Value) -> Result<Value> {
    let a: Orientation = decode(args)?;
    let angle = scene.snapshot().fields.transform_orientation_with_probe(
        &a.field,
        a.position,
        a.angle,
        a.probe_distance,
    )?;
    Ok(json!({ "angle": angle }))
}

#[derive(Deserialize)]
struct WorldScale {
    position: Vec2,
    distance: f64,
}

fn world_scale(scene: &Scene, args: Value) -> Result<Value> {
    let a: WorldScale = decode(args)?;
    let pixels = scene.snapshot().fields.world_scale(a.position, a.distance)?;
    Ok(json!({ "pixels": pixels }))
}

#[derive(Deserialize)]
struct SetBackground {
    field: String,
    /// Asset name under the asset directory, or a file path.
    image: PathBuf,
    #[serde(default = "opaque")]
    alpha: u8,
}

#[derive(Deserialize)]
struct SetBackgroundColor {
    field: String,
    color: Rgba,
    #[serde(default = "opaque")]
    alpha: u8,
}

fn opaque() -> u8 {
    255
}

fn set_field_background(scene: &Scene, args: Value) -> Result<Value> {
    let a: SetBackground = decode(args)?;
    let background = FieldBackground::Image { image: a.image, alpha: a.alpha };
    scene.set_field_background(&a.field, background.clone())?;
    Ok(json!({ "field": a.field, "background": background }))
}

fn set_field_background_color(scene: &Scene, args: Value) -> Result<Value> {
    let a: SetBackgroundColor = decode(args)?;
    let background = FieldBackground::Color { color: a.color, alpha: a.alpha };
    scene.set_field_background(&a.field, background.clone())?;
    Ok(json!({ "field": a.field, "background": background }))
}

#[derive(Deserialize)]
struct FieldName {
    field: String,
}

fn remove_field_background(scene: &Scene, args: Value) -> Result<Value> {
    let a: FieldName = decode(args)?;
    let removed = scene.remove_field_background(&a.field)?;
    Ok(json!({ "field": a.field, "removed": removed.is_some() }))
}

// ── entities ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateEntity {
    id: String,
    #[serde(flatten)]
    spec: EntitySpec,
}

fn create_entity(scene: &Scene, args: Value) -> Result<Value> {
    let a: CreateEntity = decode(args)?;
    scene.create_entity(&a.id, a.spec)?;
    Ok(json!({ "id": a.id }))
}

fn remove_entity(scene: &Scene, args: Value) -> Result<Value> {
    let a: Id = decode(args)?;
    scene.remove_entity(&a.id)?;
    Ok(json!({ "id": a.id }))
}

#[derive(Deserialize)]
struct Position {
    id: String,
    position: Vec2,
    #[serde(default)]
    orientation: Option<f64>,
    /// Frame `position` and `orientation` are given in.
    #[serde(default = "world_field")]
    field: String,
}

fn world_field() -> String {
    WORLD.to_string()
}

/// Brings a pose given in `field` into the world frame. The heading is
/// re-derived with a probe at the original position.
fn pose_to_world(scene: &Scene, a: &Position) -> Result<(Vec2, Option<f64>)> {
    if a.field == WORLD {
        return Ok((a.position, a.orientation));
    }
    let snapshot = scene.snapshot();
    let fields = &snapshot.fields;
    let position = fields.convert_point(a.position, &a.field, WORLD)?;
    let orientation = match a.orientation {
        Some(angle) => {
            let tip = a.position + Vec2::from_angle(angle) * DEFAULT_PROBE_DISTANCE;
            let tip = fields.convert_point(tip, &a.field, WORLD)?;
            Some((tip - position).angle())
        }
        None => None,
    };
    Ok((position, orientation))
}

fn update_position(scene: &Scene, args: Value) -> Result<Value> {
    let a: Position = decode(args)?;
    let (position, orientation) = pose_to_world(scene, &a)?;
    scene.update_position(&a.id, position, orientation)?;
    ok()
}

fn update_tracked_position(scene: &Scene, args: Value) -> Result<Value> {
    let a: Position = decode(args)?;
    let (position, orientation) = pose_to_world(scene, &a)?;
    scene.update_tracked_position(&a.id, position, orientation)?;
    ok()
}

#[derive(Deserialize)]
struct SetTracking {
    id: String,
    #[serde(flatten)]
    update: TrackingUpdate,
}

fn set_tracking(scene: &Scene, args: Value) -> Result<Value> {
    let a: SetTracking = decode(args)?;
    scene.set_tracking(&a.id, a.update)?;
    ok()
}

#[derive(Deserialize)]
struct SetLost {
    id: String,
    lost: bool,
}

fn set_tracking_lost(scene: &Scene, args: Value) -> Result<Value> {
    let a: SetLost = decode(args)?;
    scene.set_tracking_lost(&a.id, a.lost)?;
    ok()
}

/// Style changes are partial: given keys are merged over the current style.
#[derive(Deserialize)]
struct Patch {
    id: String,
    #[serde(default)]
    style: Option<Value>,
    #[serde(default)]
    trail: Option<Value>,
}

fn merge<T>(current: &T, patch: Option<Value>) -> Result<T>
where
    T: serde::Serialize + DeserializeOwned,
{
    let mut base = serde_json::to_value(current).map_err(|e| OverlayError::InvalidArgument(e.to_string()))?;
    match (patch, &mut base) {
        (Some(Value::Object(changes)), Value::Object(map)) => {
            map.extend(changes);
        }
        (Some(Value::Null) | None, _) => {}
        (Some(_), _) => return Err(OverlayError::InvalidArgument("expected an object".into())),
    }
    decode(base)
}

// The merge runs under the scene lock so concurrent patches of different
// keys on one entity all land.
fn update_style(scene: &Scene, args: Value) -> Result<Value> {
    let a: Patch = decode(args)?;
    let patch = a.style;
    scene.modify_style(&a.id, |current: &EntityStyle| merge(current, patch))?;
    ok()
}

fn update_trail(scene: &Scene, args: Value) -> Result<Value> {
    let a: Patch = decode(args)?;
    let patch = a.trail;
    scene.modify_trail(&a.id, |current: &TrailStyle| merge(current, patch))?;
    ok()
}

fn clear_history(scene: &Scene, args: Value) -> Result<Value> {
    let a: Id = decode(args)?;
    scene.clear_history(&a.id)?;
    ok()
}

#[derive(Deserialize)]
struct ZOrder {
    id: String,
    z: i32,
}

fn set_z_order(scene: &Scene, args: Value) -> Result<Value> {
    let a: ZOrder = decode(args)?;
    scene.set_entity_z_order(&a.id, a.z)?;
    ok()
}

fn list_entities(scene: &Scene, _args: Value) -> Result<Value> {
    Ok(json!({ "entities": scene.list_entities() }))
}

fn entity_value(e: &Entity) -> Value {
    json!({
        "id": e.id,
        "pose": e.manual,
        "tracked_pose": e.tracked,
        "display_pose": e.display_pose(),
        "orientation": e.effective_orientation(),
        "tracking": e.tracking,
        "style": e.style,
        "trail": e.trail,
        "z": e.z,
        "history_len": e.history.len(),
    })
}

fn get_entity(scene: &Scene, args: Value) -> Result<Value> {
    let a: Id = decode(args)?;
    let entity = scene.get_entity(&a.id).ok_or_else(|| OverlayError::not_found("entity", a.id.as_str()))?;
    Ok(entity_value(&entity))
}

// ── drawings ──────────────────────────────────────────────────────────────

fn create_drawing(scene: &Scene, args: Value) -> Result<Value> {
    let drawing: Drawing = decode(args)?;
    let id = drawing.id.clone();
    scene.create_drawing(drawing)?;
    Ok(json!({ "id": id }))
}

fn update_drawing(scene: &Scene, args: Value) -> Result<Value> {
    let drawing: Drawing = decode(args)?;
    let id = drawing.id.clone();
    scene.update_drawing(drawing)?;
    Ok(json!({ "id": id }))
}

fn remove_drawing(scene: &Scene, args: Value) -> Result<Value> {
    let a: Id = decode(args)?;
    scene.remove_drawing(&a.id)?;
    Ok(json!({ "id": a.id }))
}

fn get_drawing(scene: &Scene, args: Value) -> Result<Value> {
    let a: Id = decode(args)?;
    let drawing = scene.get_drawing(&a.id).ok_or_else(|| OverlayError::not_found("drawing", a.id.as_str()))?;
    serde_json::to_value(drawing).map_err(|e| OverlayError::InvalidArgument(e.to_string()))
}

fn list_drawings(scene: &Scene, _args: Value) -> Result<Value> {
    Ok(json!({ "drawings": scene.list_drawings() }))
}

fn clear_drawings(scene: &Scene, _args: Value) -> Result<Value> {
    Ok(json!({ "removed": scene.clear_drawings() }))
}

// ── scene ─────────────────────────────────────────────────────────────────

fn clear_scene(scene: &Scene, _args: Value) -> Result<Value> {
    scene.clear()?;
    ok()
}

fn clear_all(scene: &Scene, _args: Value) -> Result<Value> {
    scene.clear_all()?;
    ok()
}

/// Summary of what is currently displayed.
fn get_scene(scene: &Scene, _args: Value) -> Result<Value> {
    let snapshot = scene.snapshot();
    let mut entities: Vec<&Entity> = snapshot.entities.values().collect();
    entities.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(json!({
        "version": snapshot.version,
        "fields": snapshot.fields.names(),
        "entities": entities.into_iter().map(entity_value).collect::<Vec<_>>(),
        "drawings": snapshot.drawings.len(),
    }))
}

fn export_scene(scene: &Scene, _args: Value) -> Result<Value> {
    Ok(scene.export_value())
}

fn import_scene(scene: &Scene, args: Value) -> Result<Value> {
    // Accepts the document itself or `{ "document": ... }`.
    let doc = match args {
        Value::Object(mut map) if map.contains_key("document") => map.remove("document").unwrap_or(Value::Null),
        other => other,
    };
    let report = scene.import_state(&doc)?;
    serde_json::to_value(report).map_err(|e| OverlayError::InvalidArgument(e.to_string()))
}

fn ping(_scene: &Scene, _args: Value) -> Result<Value> {
    Ok(json!({ "pong": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn screen_args() -> Value {
        json!({
            "name": "screen",
            "world_points": [[0, 0], [4, 0], [4, 3], [0, 3]],
            "local_points": [[0, 1080], [1920, 1080], [1920, 0], [0, 0]],
        })
    }

    fn setup() -> (CommandTable, Scene) {
        let table = CommandTable::new();
        let scene = Scene::new();
        table.execute(&scene, "create_field", screen_args()).unwrap();
        (table, scene)
    }

    // ── table ─────────────────────────────────────────────────────────────

    #[test]
    fn unknown_command_is_not_found() {
        let (table, scene) = setup();
        let err = table.execute(&scene, "fly", Value::Null).unwrap_err();
        assert_eq!(err, OverlayError::not_found("command", "fly"));
    }

    #[test]
    fn names_are_sorted_and_complete() {
        let table = CommandTable::new();
        let names = table.names();
        assert_eq!(names.len(), table.len());
        assert!(names.windows(2).all(|w| w[0] < w[1]));
        assert!(names.contains(&"create_drawing"));
    }

    #[test]
    fn malformed_arguments_are_invalid() {
        let (table, scene) = setup();
        let err = table.execute(&scene, "update_position", json!({ "id": 3 })).unwrap_err();
        assert!(matches!(err, OverlayError::InvalidArgument(_)));
    }

    // ── fields ────────────────────────────────────────────────────────────

    #[test]
    fn convert_maps_world_to_pixels() {
        let (table, scene) = setup();
        let out = table
            .execute(&scene, "convert", json!({ "points": [[2.0, 1.5]], "from": "world", "to": "screen" }))
            .unwrap();
        assert_abs_diff_eq!(out["points"][0][0].as_f64().unwrap(), 960.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out["points"][0][1].as_f64().unwrap(), 540.0, epsilon = 1e-9);

        let out = table
            .execute(&scene, "world_scale", json!({ "position": [2.0, 1.5], "distance": 0.1 }))
            .unwrap();
        assert_abs_diff_eq!(out["pixels"].as_f64().unwrap(), 48.0, epsilon = 1e-9);
    }

    #[test]
    fn clockwise_field_is_rejected() {
        let (table, scene) = setup();
        let err = table
            .execute(
                &scene,
                "create_field",
                json!({
                    "name": "bad",
                    "world_points": [[0, 0], [0, 3], [4, 3], [4, 0]],
                    "local_points": [[0, 0], [1, 0], [1, 1], [0, 1]],
                }),
            )
            .unwrap_err();
        assert!(matches!(err, OverlayError::InvalidGeometry(_)));
    }

    // ── entities ──────────────────────────────────────────────────────────

    #[test]
    fn create_then_update_and_patch_style() {
        let (table, scene) = setup();
        table
            .execute(&scene, "create_entity", json!({ "id": "r1", "style": { "size": 0.2 } }))
            .unwrap();
        table
            .execute(&scene, "update_position", json!({ "id": "r1", "position": [1.0, 1.0], "orientation": 0.5 }))
            .unwrap();
        table
            .execute(&scene, "update_style", json!({ "id": "r1", "style": { "color": [255, 0, 0] } }))
            .unwrap();

        let e = scene.get_entity("r1").unwrap();
        assert_eq!(e.display_position(), Some(Vec2::new(1.0, 1.0)));
        assert_abs_diff_eq!(e.style.size, 0.2);
        assert_eq!(e.style.color, Rgba::rgb(255, 0, 0));
    }

    #[test]
    fn concurrent_patches_of_different_keys_both_land() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        let (table, scene) = setup();
        table.execute(&scene, "create_entity", json!({ "id": "r1" })).unwrap();
        let scene = Arc::new(scene);
        let start = Arc::new(Barrier::new(2));
        const ROUNDS: usize = 200;

        let colors = {
            let (table, scene, start) = (table.clone(), Arc::clone(&scene), Arc::clone(&start));
            thread::spawn(move || {
                start.wait();
                for i in 0..ROUNDS {
                    let patch = json!({ "id": "r1", "style": { "color": [i as u8, 10, 20] } });
                    table.execute(&scene, "update_style", patch).unwrap();
                }
            })
        };
        let sizes = {
            let (table, scene, start) = (table.clone(), Arc::clone(&scene), Arc::clone(&start));
            thread::spawn(move || {
                start.wait();
                for i in 0..ROUNDS {
                    let patch = json!({ "id": "r1", "style": { "size": 0.1 + i as f64 * 0.001 } });
                    table.execute(&scene, "update_style", patch).unwrap();
                }
            })
        };
        colors.join().unwrap();
        sizes.join().unwrap();

        let style = scene.get_entity("r1").unwrap().style;
        assert_eq!(style.color, Rgba::rgb((ROUNDS - 1) as u8, 10, 20));
        assert_abs_diff_eq!(style.size, 0.1 + (ROUNDS - 1) as f64 * 0.001, epsilon = 1e-12);
    }

    #[test]
    fn trail_patch_keeps_other_keys() {
        let (table, scene) = setup();
        table
            .execute(&scene, "create_entity", json!({ "id": "r1", "trail": { "thickness": 5.0 } }))
            .unwrap();
        table
            .execute(&scene, "update_trail", json!({ "id": "r1", "trail": { "pattern": "dashed" } }))
            .unwrap();
        let trail = scene.get_entity("r1").unwrap().trail;
        assert_abs_diff_eq!(trail.thickness, 5.0);
        assert_eq!(trail.pattern, crate::scene::TrailPattern::Dashed);

        let err = table
            .execute(&scene, "update_trail", json!({ "id": "ghost", "trail": {} }))
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn update_without_create_is_not_found() {
        let (table, scene) = setup();
        let err = table
            .execute(&scene, "update_position", json!({ "id": "ghost", "position": [1.0, 1.0] }))
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
        assert!(scene.get_entity("ghost").is_none());
    }

    #[test]
    fn position_in_field_frame_is_converted_to_world() {
        let (table, scene) = setup();
        table
            .execute(
                &scene,
                "create_field",
                json!({
                    "name": "table",
                    "world_points": [[1, 1], [3, 1], [3, 2], [1, 2]],
                    "local_points": [[0, 0], [1, 0], [1, 1], [0, 1]],
                }),
            )
            .unwrap();
        table.execute(&scene, "create_entity", json!({ "id": "r1" })).unwrap();
        table
            .execute(
                &scene,
                "update_position",
                json!({ "id": "r1", "position": [0.5, 0.5], "orientation": 0.0, "field": "table" }),
            )
            .unwrap();

        let e = scene.get_entity("r1").unwrap();
        let p = e.display_position().unwrap();
        assert_abs_diff_eq!(p.x, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, 1.5, epsilon = 1e-9);
        assert_abs_diff_eq!(e.effective_orientation(), 0.0, epsilon = 1e-9);
    }

    // ── backgrounds ───────────────────────────────────────────────────────

    #[test]
    fn field_background_lifecycle() {
        let (table, scene) = setup();
        let out = table
            .execute(&scene, "set_field_background", json!({ "field": "screen", "image": "floor.png", "alpha": 128 }))
            .unwrap();
        assert_eq!(out["background"]["kind"], json!("image"));
        assert_eq!(
            scene.field_background("screen"),
            Some(FieldBackground::Image { image: PathBuf::from("floor.png"), alpha: 128 })
        );

        table
            .execute(&scene, "set_field_background_color", json!({ "field": "screen", "color": [0, 40, 0] }))
            .unwrap();
        let field = table.execute(&scene, "get_field", json!({ "name": "screen" })).unwrap();
        assert_eq!(field["background"]["kind"], json!("color"));
        assert_eq!(field["background"]["alpha"], json!(255));

        let out = table.execute(&scene, "remove_field_background", json!({ "field": "screen" })).unwrap();
        assert_eq!(out["removed"], json!(true));
        let out = table.execute(&scene, "remove_field_background", json!({ "field": "screen" })).unwrap();
        assert_eq!(out["removed"], json!(false));

        let err = table
            .execute(&scene, "set_field_background", json!({ "field": "nowhere", "image": "a.png" }))
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    // ── drawings and scene ────────────────────────────────────────────────

    #[test]
    fn drawing_lifecycle() {
        let (table, scene) = setup();
        table
            .execute(
                &scene,
                "create_drawing",
                json!({ "id": "zone", "type": "circle", "center": [2.0, 1.5], "radius": 0.3 }),
            )
            .unwrap();
        let listed = table.execute(&scene, "list_drawings", Value::Null).unwrap();
        assert_eq!(listed["drawings"], json!(["zone"]));

        let cleared = table.execute(&scene, "clear_drawings", Value::Null).unwrap();
        assert_eq!(cleared["removed"], json!(1));
        assert!(table.execute(&scene, "remove_drawing", json!({ "id": "zone" })).is_err());
    }

    #[test]
    fn export_then_import_restores_entities() {
        let (table, scene) = setup();
        table
            .execute(&scene, "create_entity", json!({ "id": "r1", "pose": { "position": [1.0, 2.0] } }))
            .unwrap();
        let doc = table.execute(&scene, "export_scene", Value::Null).unwrap();

        let (_, fresh) = setup();
        let report = table.execute(&fresh, "import_scene", json!({ "document": doc })).unwrap();
        assert_eq!(report["entities"], json!(1));
        assert!(fresh.get_entity("r1").is_some());
    }
}
