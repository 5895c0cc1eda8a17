//! Scene state.
//!
//! Responsibilities:
//! - own entities, drawings, field backgrounds and the field registry behind
//!   one lock
//! - hand out snapshots so the render path never touches live state
//! - deterministic paint order (z-index + creation order)
//! - export / import of the whole scene as a nested document

mod background;
mod drawing;
mod entity;
mod history;
mod key;
mod persist;
mod store;

pub use background::FieldBackground;
pub use drawing::{DEFAULT_STROKE_WIDTH, DrawStyle, Drawing};
pub use entity::{
    BodyShape, Entity, EntityStyle, Pose, TrackingBinding, TrailColor, TrailMode, TrailPattern,
    TrailStyle,
};
pub use history::{PoseHistory, PoseSample};
pub use key::{SortKey, ZIndex};
pub use persist::{EntityDocument, FieldDocument, ImportReport, Rejection, SceneDocument};
pub use store::{EntitySpec, Scene, SceneSnapshot, TrackedUpdate, TrackingUpdate};
