use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coords::Vec2;
use crate::error::{OverlayError, Result};
use crate::field::{FieldPairs, FieldRegistry, SCREEN, WORLD};

use super::background::FieldBackground;

use super::drawing::Drawing;
use super::entity::{Entity, EntityStyle, Pose, TrackingBinding, TrailStyle};
use super::key::ZIndex;
use super::store::Scene;

/// Serialized calibration of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDocument {
    pub world_points: [Vec2; 4],
    pub local_points: [Vec2; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<FieldBackground>,
}

/// Serialized entity. Pose history is transient and not stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityDocument {
    pub manual: Option<Pose>,
    pub tracked: Option<Pose>,
    pub last_orientation: Option<f64>,
    pub tracking: TrackingBinding,
    pub style: EntityStyle,
    pub trail: TrailStyle,
    pub z: ZIndex,
}

impl EntityDocument {
    fn from_entity(e: &Entity) -> Self {
        Self {
            manual: e.manual,
            tracked: e.tracked,
            last_orientation: e.has_heading.then_some(e.last_orientation),
            tracking: TrackingBinding { lost: false, ..e.tracking.clone() },
            style: e.style.clone(),
            trail: e.trail,
            z: e.z,
        }
    }

    fn validate(&self) -> Result<()> {
        self.style.validate()?;
        self.trail.validate()?;
        for pose in self.manual.iter().chain(self.tracked.iter()) {
            pose.validate()?;
        }
        if self.last_orientation.is_some_and(|o| !o.is_finite()) {
            return Err(OverlayError::InvalidArgument("orientation must be finite".into()));
        }
        Ok(())
    }

    fn into_entity(self, id: &str, history_capacity: usize) -> Entity {
        let mut e = Entity::new(id, history_capacity);
        e.manual = self.manual;
        e.tracked = self.tracked;
        if let Some(o) = self.last_orientation {
            e.last_orientation = o;
            e.has_heading = true;
        }
        e.tracking = self.tracking;
        e.style = self.style;
        e.trail = self.trail;
        e.z = self.z;
        e
    }
}

/// Nested, serializable dump of the scene.
///
/// The screen calibration belongs to the display, not the scene, and is never
/// part of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDocument {
    pub fields: BTreeMap<String, FieldDocument>,
    pub entities: BTreeMap<String, EntityDocument>,
    pub drawings: BTreeMap<String, Drawing>,
}

/// One part of an import document that could not be applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    /// Dotted location in the document, e.g. `fields.table`.
    pub path: String,
    pub reason: String,
}

/// Outcome of [`Scene::import_state`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub fields: usize,
    pub entities: usize,
    pub drawings: usize,
    pub rejected: Vec<Rejection>,
}

impl ImportReport {
    fn reject(&mut self, path: String, reason: impl ToString) {
        let reason = reason.to_string();
        log::warn!("import: rejected {path}: {reason}");
        self.rejected.push(Rejection { path, reason });
    }
}

// Splits a section of the document into per-key raw values.
fn section<'a>(
    doc: &'a serde_json::Map<String, Value>,
    key: &str,
    report: &mut ImportReport,
) -> Vec<(&'a String, &'a Value)> {
    match doc.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(map)) => map.iter().collect(),
        Some(_) => {
            report.reject(key.to_string(), "expected an object");
            Vec::new()
        }
    }
}

impl Scene {
    pub fn export_state(&self) -> SceneDocument {
        let state = self.lock();
        let fields = state
            .fields
            .fields()
            .filter(|f| f.name != SCREEN)
            .map(|f| {
                let doc = FieldDocument {
                    world_points: f.world_points,
                    local_points: f.local_points,
                    background: state.backgrounds.get(&f.name).cloned(),
                };
                (f.name.clone(), doc)
            })
            .collect();
        let entities = state
            .entities
            .iter()
            .map(|(id, e)| (id.clone(), EntityDocument::from_entity(e)))
            .collect();
        let drawings = state
            .drawings
            .iter()
            .map(|(id, d)| (id.clone(), d.clone()))
            .collect();
        SceneDocument { fields, entities, drawings }
    }

    pub fn export_value(&self) -> Value {
        // Maps with string keys and finite numbers always serialize.
        serde_json::to_value(self.export_state()).unwrap_or(Value::Null)
    }

    /// Replaces entities, drawings and every non-screen field with the
    /// contents of `doc`.
    ///
    /// Each field, entity and drawing is decoded on its own. Bad parts are
    /// listed in the report and skipped, the rest is applied in one step.
    pub fn import_state(&self, doc: &Value) -> Result<ImportReport> {
        let Value::Object(doc) = doc else {
            return Err(OverlayError::InvalidArgument("scene document must be an object".into()));
        };

        let mut report = ImportReport::default();

        let mut fields = Vec::new();
        for (name, raw) in section(doc, "fields", &mut report) {
            let path = format!("fields.{name}");
            if name == SCREEN || name == WORLD {
                report.reject(path, format!("'{name}' cannot be imported"));
                continue;
            }
            match FieldDocument::deserialize(raw) {
                Ok(f) => fields.push((name.clone(), f)),
                Err(e) => report.reject(path, e),
            }
        }

        let mut entities = Vec::new();
        for (id, raw) in section(doc, "entities", &mut report) {
            let path = format!("entities.{id}");
            let decoded = EntityDocument::deserialize(raw)
                .map_err(|e| e.to_string())
                .and_then(|e| e.validate().map(|_| e).map_err(|e| e.to_string()));
            match decoded {
                Ok(e) if !id.is_empty() => entities.push((id.clone(), e)),
                Ok(_) => report.reject(path, "entity id is empty"),
                Err(reason) => report.reject(path, reason),
            }
        }

        let mut drawings = Vec::new();
        for (id, raw) in section(doc, "drawings", &mut report) {
            let path = format!("drawings.{id}");
            let decoded = Drawing::deserialize(raw).map_err(|e| e.to_string()).and_then(|mut d| {
                d.id = id.clone();
                d.validate().map(|_| d).map_err(|e| e.to_string())
            });
            match decoded {
                Ok(d) => drawings.push(d),
                Err(reason) => report.reject(path, reason),
            }
        }

        // Deterministic paint order for equal z.
        entities.sort_by(|a, b| a.0.cmp(&b.0));
        drawings.sort_by(|a, b| a.id.cmp(&b.id));

        let capacity = self.history_capacity();
        loop {
            // Calibrating imported fields happens on a private registry that
            // only borrows the current screen.
            let (epoch, screen) = {
                let s = self.lock();
                (s.field_epoch, s.fields.get(SCREEN).cloned())
            };
            let mut attempt = report.clone();
            let mut registry = FieldRegistry::new();
            if let Some(screen) = screen {
                let pairs = FieldPairs::build(&screen, std::iter::empty());
                registry.install(screen, pairs);
            }
            let mut backgrounds = HashMap::new();
            for (name, f) in &fields {
                match registry.register_field(name, f.world_points, f.local_points) {
                    Ok(()) => {
                        attempt.fields += 1;
                        if let Some(bg) = &f.background {
                            backgrounds.insert(name.clone(), bg.clone());
                        }
                    }
                    Err(e) => attempt.reject(format!("fields.{name}"), e),
                }
            }

            let mut s = self.lock();
            if s.field_epoch != epoch {
                log::debug!("fields changed during import, retrying");
                continue;
            }

            let mut new_entities = HashMap::with_capacity(entities.len());
            for (id, doc) in entities {
                let mut e = doc.into_entity(&id, capacity);
                e.seq = s.next_seq();
                new_entities.insert(id, e);
                attempt.entities += 1;
            }

            let mut new_drawings = HashMap::with_capacity(drawings.len());
            for mut d in drawings {
                if !registry.contains(&d.field) {
                    let reason = OverlayError::not_found("field", d.field.clone());
                    attempt.reject(format!("drawings.{}", d.id), reason);
                    continue;
                }
                d.seq = s.next_seq();
                new_drawings.insert(d.id.clone(), d);
                attempt.drawings += 1;
            }

            if let Some(bg) = s.backgrounds.remove(SCREEN) {
                backgrounds.insert(SCREEN.to_string(), bg);
            }
            s.fields = registry;
            s.entities = new_entities;
            s.drawings = new_drawings;
            s.backgrounds = backgrounds;
            s.field_epoch += 1;
            s.touch();

            log::info!(
                "imported {} fields, {} entities, {} drawings ({} rejected)",
                attempt.fields,
                attempt.entities,
                attempt.drawings,
                attempt.rejected.len()
            );
            return Ok(attempt);
        }
    }
}
