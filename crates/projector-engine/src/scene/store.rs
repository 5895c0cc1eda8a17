use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::config::DEFAULT_HISTORY_CAPACITY;
use crate::coords::Vec2;
use crate::error::{OverlayError, Result};
use crate::field::{Field, FieldPairs, FieldRegistry, SCREEN};

use super::background::FieldBackground;

use super::drawing::Drawing;
use super::entity::{Entity, EntityStyle, Pose, TrackingBinding, TrailStyle};
use super::key::ZIndex;

/// Creation parameters for an entity. Everything is optional.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EntitySpec {
    pub style: EntityStyle,
    pub trail: TrailStyle,
    pub tracking: TrackingBinding,
    pub z: ZIndex,
    /// Initial manual pose.
    pub pose: Option<Pose>,
}

/// Partial change to a tracking binding; `None` leaves a setting untouched.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct TrackingUpdate {
    pub source_name: Option<String>,
    pub prefer_tracked: Option<bool>,
}

/// One sample from a tracking source, addressed by source-side name.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedUpdate {
    pub source_name: String,
    /// `None` means the source saw the body but could not solve its pose.
    pub pose: Option<Pose>,
}

/// Immutable view of the scene published for the render path.
#[derive(Debug, Clone, Default)]
pub struct SceneSnapshot {
    pub version: u64,
    pub fields: FieldRegistry,
    pub entities: HashMap<String, Entity>,
    pub drawings: HashMap<String, Drawing>,
    pub backgrounds: HashMap<String, FieldBackground>,
}

#[derive(Debug, Default)]
pub(super) struct SceneState {
    pub(super) fields: FieldRegistry,
    pub(super) entities: HashMap<String, Entity>,
    pub(super) drawings: HashMap<String, Drawing>,
    pub(super) backgrounds: HashMap<String, FieldBackground>,
    // Bumped whenever the set of fields changes. Work done on a copy of the
    // fields is only installed if the epoch it started from still holds.
    pub(super) field_epoch: u64,
    version: u64,
    next_seq: u64,
    published: Option<Arc<SceneSnapshot>>,
}

impl SceneState {
    /// Marks the state as changed and drops the published snapshot.
    pub(super) fn touch(&mut self) {
        self.version += 1;
        self.published = None;
    }

    pub(super) fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn entity_mut(&mut self, id: &str) -> Result<&mut Entity> {
        self.entities
            .get_mut(id)
            .ok_or_else(|| OverlayError::not_found("entity", id))
    }

    fn drawing_mut(&mut self, id: &str) -> Result<&mut Drawing> {
        self.drawings
            .get_mut(id)
            .ok_or_else(|| OverlayError::not_found("drawing", id))
    }
}

/// Authoritative scene state shared by request workers, the tracking feed and
/// the render loop.
///
/// Every mutator runs inside one short critical section and either applies
/// completely or not at all. Readers get copies; nothing outside this type
/// ever touches the live collections.
#[derive(Debug)]
pub struct Scene {
    state: Mutex<SceneState>,
    history_capacity: usize,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_history_capacity(history_capacity: usize) -> Self {
        Self {
            state: Mutex::new(SceneState::default()),
            history_capacity: history_capacity.max(1),
        }
    }

    #[inline]
    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    // A poisoned lock means a mutator panicked mid-update; the state can no
    // longer be trusted to be consistent.
    pub(super) fn lock(&self) -> MutexGuard<'_, SceneState> {
        self.state.lock().expect("scene state lock poisoned")
    }

    /// Runs `f` under the lock. A successful mutation bumps the version and
    /// invalidates the published snapshot.
    pub(super) fn mutate<R>(&self, f: impl FnOnce(&mut SceneState) -> Result<R>) -> Result<R> {
        let mut state = self.lock();
        let out = f(&mut state)?;
        state.touch();
        Ok(out)
    }

    // ── fields ────────────────────────────────────────────────────────────

    /// Calibrates and stores a field.
    ///
    /// Solving the homographies and composing them with every other field
    /// happens without the lock held. If another field changed meanwhile the
    /// pairs are rebuilt against the new set.
    pub fn register_field(&self, name: &str, world: [Vec2; 4], local: [Vec2; 4]) -> Result<()> {
        let field = Field::calibrate(name, world, local)?;
        loop {
            let (epoch, others) = {
                let s = self.lock();
                (s.field_epoch, s.fields.others(name))
            };
            let pairs = FieldPairs::build(&field, &others);

            let mut s = self.lock();
            if s.field_epoch != epoch {
                log::debug!("fields changed while pairing '{name}', retrying");
                continue;
            }
            s.fields.install(field, pairs);
            s.field_epoch += 1;
            s.touch();
            log::info!("registered field '{name}'");
            return Ok(());
        }
    }

    /// Removes a field and every drawing anchored in it. The screen field is
    /// required for rendering and cannot be removed.
    pub fn remove_field(&self, name: &str) -> Result<()> {
        if name == SCREEN {
            return Err(OverlayError::InvalidArgument(format!(
                "'{SCREEN}' is required for rendering and cannot be removed"
            )));
        }
        self.mutate(|s| {
            s.fields.remove_field(name)?;
            s.field_epoch += 1;
            s.drawings.retain(|_, d| d.field != name);
            s.backgrounds.remove(name);
            Ok(())
        })
    }

    pub fn get_field(&self, name: &str) -> Option<Field> {
        self.lock().fields.get(name).cloned()
    }

    pub fn list_fields(&self) -> Vec<String> {
        self.lock().fields.names()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.lock().fields.contains(name)
    }

    /// Sets what is painted under a field's screen quad, replacing any
    /// previous background.
    pub fn set_field_background(&self, field: &str, background: FieldBackground) -> Result<()> {
        if let FieldBackground::Image { image, .. } = &background {
            if image.as_os_str().is_empty() {
                return Err(OverlayError::InvalidArgument("background image path is empty".into()));
            }
        }
        self.mutate(|s| {
            if s.fields.get(field).is_none() {
                return Err(OverlayError::not_found("field", field));
            }
            s.backgrounds.insert(field.to_string(), background);
            Ok(())
        })
    }

    /// Returns the removed background, `None` if the field had none.
    pub fn remove_field_background(&self, field: &str) -> Result<Option<FieldBackground>> {
        self.mutate(|s| {
            if s.fields.get(field).is_none() {
                return Err(OverlayError::not_found("field", field));
            }
            Ok(s.backgrounds.remove(field))
        })
    }

    pub fn field_background(&self, field: &str) -> Option<FieldBackground> {
        self.lock().backgrounds.get(field).cloned()
    }

    // ── entities ──────────────────────────────────────────────────────────

    /// Fails if the id is taken.
    pub fn create_entity(&self, id: &str, spec: EntitySpec) -> Result<()> {
        if id.is_empty() {
            return Err(OverlayError::InvalidArgument("entity id is empty".into()));
        }
        spec.style.validate()?;
        spec.trail.validate()?;
        if let Some(pose) = &spec.pose {
            pose.validate()?;
        }

        let now = Instant::now();
        let capacity = self.history_capacity;
        self.mutate(|s| {
            if s.entities.contains_key(id) {
                return Err(OverlayError::InvalidArgument(format!("entity '{id}' already exists")));
            }
            let mut entity = Entity::new(id, capacity);
            entity.style = spec.style;
            entity.trail = spec.trail;
            entity.tracking = spec.tracking;
            entity.z = spec.z;
            entity.seq = s.next_seq();
            if let Some(pose) = spec.pose {
                entity.set_manual(pose, now);
            }
            s.entities.insert(id.to_string(), entity);
            Ok(())
        })
    }

    pub fn remove_entity(&self, id: &str) -> Result<()> {
        self.mutate(|s| {
            s.entities
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| OverlayError::not_found("entity", id))
        })
    }

    /// Sets the manual pose. Unknown ids fail with `NotFound`; there is no upsert.
    pub fn update_position(&self, id: &str, position: Vec2, orientation: Option<f64>) -> Result<()> {
        let pose = Pose::new(position, orientation);
        pose.validate()?;
        let now = Instant::now();
        self.mutate(|s| {
            s.entity_mut(id)?.set_manual(pose, now);
            Ok(())
        })
    }

    /// Sets the externally tracked pose and clears the lost flag.
    pub fn update_tracked_position(
        &self,
        id: &str,
        position: Vec2,
        orientation: Option<f64>,
    ) -> Result<()> {
        let pose = Pose::new(position, orientation);
        pose.validate()?;
        let now = Instant::now();
        self.mutate(|s| {
            s.entity_mut(id)?.set_tracked(pose, now);
            Ok(())
        })
    }

    pub fn set_tracking(&self, id: &str, update: TrackingUpdate) -> Result<()> {
        self.mutate(|s| {
            let e = s.entity_mut(id)?;
            if let Some(name) = update.source_name {
                e.tracking.source_name = if name.is_empty() { None } else { Some(name) };
            }
            if let Some(prefer) = update.prefer_tracked {
                e.tracking.prefer_tracked = prefer;
            }
            Ok(())
        })
    }

    pub fn set_tracking_lost(&self, id: &str, lost: bool) -> Result<()> {
        self.mutate(|s| {
            s.entity_mut(id)?.tracking.lost = lost;
            Ok(())
        })
    }

    pub fn update_style(&self, id: &str, style: EntityStyle) -> Result<()> {
        style.validate()?;
        self.mutate(|s| {
            s.entity_mut(id)?.style = style;
            Ok(())
        })
    }

    /// Derives a new style from the current one. The result is validated before
    /// it replaces the old style.
    pub fn modify_style(
        &self,
        id: &str,
        f: impl FnOnce(&EntityStyle) -> Result<EntityStyle>,
    ) -> Result<()> {
        self.mutate(|s| {
            let e = s.entity_mut(id)?;
            let style = f(&e.style)?;
            style.validate()?;
            e.style = style;
            Ok(())
        })
    }

    pub fn update_trail(&self, id: &str, trail: TrailStyle) -> Result<()> {
        trail.validate()?;
        self.mutate(|s| {
            s.entity_mut(id)?.trail = trail;
            Ok(())
        })
    }

    /// Trail counterpart of [`modify_style`](Self::modify_style).
    pub fn modify_trail(
        &self,
        id: &str,
        f: impl FnOnce(&TrailStyle) -> Result<TrailStyle>,
    ) -> Result<()> {
        self.mutate(|s| {
            let e = s.entity_mut(id)?;
            let trail = f(&e.trail)?;
            trail.validate()?;
            e.trail = trail;
            Ok(())
        })
    }

    pub fn clear_history(&self, id: &str) -> Result<()> {
        self.mutate(|s| {
            s.entity_mut(id)?.history.clear();
            Ok(())
        })
    }

    pub fn set_entity_z_order(&self, id: &str, z: i32) -> Result<()> {
        self.mutate(|s| {
            s.entity_mut(id)?.z = ZIndex(z);
            Ok(())
        })
    }

    /// Applies one frame from a tracking source in a single critical section.
    ///
    /// Bound entities present in `batch` with a pose are updated; bound
    /// entities that are missing or came without a pose are flagged lost.
    /// Returns the number of entities that received a pose.
    pub fn apply_tracked_poses(&self, batch: &[TrackedUpdate]) -> usize {
        let now = Instant::now();
        let by_name: HashMap<&str, Option<Pose>> = batch
            .iter()
            .filter(|u| u.pose.is_none_or(|p| p.validate().is_ok()))
            .map(|u| (u.source_name.as_str(), u.pose))
            .collect();

        let result = self.mutate(|s| {
            let mut updated = 0;
            for e in s.entities.values_mut() {
                let Some(name) = e.tracking.source_name.as_deref() else { continue };
                match by_name.get(name) {
                    Some(Some(pose)) => {
                        e.set_tracked(*pose, now);
                        updated += 1;
                    }
                    _ => e.tracking.lost = true,
                }
            }
            Ok(updated)
        });
        result.unwrap_or(0)
    }

    // ── drawings ──────────────────────────────────────────────────────────

    /// Inserts a drawing, replacing one with the same id (its paint order is kept).
    pub fn create_drawing(&self, drawing: Drawing) -> Result<()> {
        drawing.validate()?;
        self.mutate(|s| {
            if !s.fields.contains(&drawing.field) {
                return Err(OverlayError::not_found("field", drawing.field.clone()));
            }
            let mut drawing = drawing;
            drawing.seq = match s.drawings.get(&drawing.id) {
                Some(old) => old.seq,
                None => s.next_seq(),
            };
            s.drawings.insert(drawing.id.clone(), drawing);
            Ok(())
        })
    }

    /// Replaces an existing drawing. Unknown ids fail with `NotFound`.
    pub fn update_drawing(&self, drawing: Drawing) -> Result<()> {
        drawing.validate()?;
        self.mutate(|s| {
            if !s.fields.contains(&drawing.field) {
                return Err(OverlayError::not_found("field", drawing.field.clone()));
            }
            let slot = s.drawing_mut(&drawing.id)?;
            let seq = slot.seq;
            *slot = Drawing { seq, ..drawing };
            Ok(())
        })
    }

    pub fn remove_drawing(&self, id: &str) -> Result<()> {
        self.mutate(|s| {
            s.drawings
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| OverlayError::not_found("drawing", id))
        })
    }

    /// Returns how many drawings were removed.
    pub fn clear_drawings(&self) -> usize {
        let result = self.mutate(|s| {
            let n = s.drawings.len();
            s.drawings.clear();
            Ok(n)
        });
        result.unwrap_or(0)
    }

    // ── whole scene ───────────────────────────────────────────────────────

    /// Removes all entities and drawings; fields stay.
    pub fn clear(&self) -> Result<()> {
        self.mutate(|s| {
            s.entities.clear();
            s.drawings.clear();
            Ok(())
        })
    }

    /// Like [`clear`](Self::clear) and also drops every field except the
    /// screen, together with their backgrounds.
    pub fn clear_all(&self) -> Result<()> {
        self.mutate(|s| {
            s.entities.clear();
            s.drawings.clear();
            s.fields.retain_only(SCREEN);
            s.backgrounds.retain(|name, _| name == SCREEN);
            s.field_epoch += 1;
            Ok(())
        })
    }

    // ── readers ───────────────────────────────────────────────────────────

    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /// Current published snapshot.
    ///
    /// The copy is built at most once per scene version; until the next
    /// mutation every caller shares the same `Arc`.
    pub fn snapshot(&self) -> Arc<SceneSnapshot> {
        let mut state = self.lock();
        if let Some(published) = &state.published {
            return Arc::clone(published);
        }
        let snapshot = Arc::new(SceneSnapshot {
            version: state.version,
            fields: state.fields.clone(),
            entities: state.entities.clone(),
            drawings: state.drawings.clone(),
            backgrounds: state.backgrounds.clone(),
        });
        state.published = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Independent copy of every entity.
    pub fn snapshot_entities(&self) -> HashMap<String, Entity> {
        self.lock().entities.clone()
    }

    /// Independent copy of every drawing.
    pub fn snapshot_drawings(&self) -> HashMap<String, Drawing> {
        self.lock().drawings.clone()
    }

    /// Independent copy of the field registry, cached transforms included.
    pub fn snapshot_fields(&self) -> FieldRegistry {
        self.lock().fields.clone()
    }

    pub fn get_entity(&self, id: &str) -> Option<Entity> {
        self.lock().entities.get(id).cloned()
    }

    pub fn get_drawing(&self, id: &str) -> Option<Drawing> {
        self.lock().drawings.get(id).cloned()
    }

    pub fn list_entities(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().entities.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn list_drawings(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().drawings.keys().cloned().collect();
        ids.sort();
        ids
    }
}
