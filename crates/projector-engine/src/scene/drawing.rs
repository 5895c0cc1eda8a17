use serde::{Deserialize, Serialize};

use crate::coords::Rgba;
use crate::error::{OverlayError, Result};
use crate::field::WORLD;
use crate::geometry::Primitive;

use super::key::{SortKey, ZIndex};

/// Outline width used when `thickness` is zero.
pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;

fn default_field() -> String {
    WORLD.to_string()
}

/// Paint settings of a drawing.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawStyle {
    pub color: Rgba,
    /// Closed shapes are filled and get a thin dark border.
    pub filled: bool,
    /// Stroke width in pixels; `0` selects the default.
    pub thickness: f64,
}

impl Default for DrawStyle {
    fn default() -> Self {
        Self {
            color: Rgba::white(),
            filled: true,
            thickness: 0.0,
        }
    }
}

impl DrawStyle {
    #[inline]
    pub fn stroke_width(&self) -> f64 {
        if self.thickness > 0.0 { self.thickness } else { DEFAULT_STROKE_WIDTH }
    }
}

/// A persistent overlay shape anchored in a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    #[serde(default)]
    pub id: String,
    /// Frame the primitive's coordinates live in.
    #[serde(default = "default_field")]
    pub field: String,
    #[serde(flatten)]
    pub primitive: Primitive,
    #[serde(default)]
    pub style: DrawStyle,
    #[serde(default)]
    pub z: ZIndex,
    #[serde(skip)]
    pub(crate) seq: u64,
}

impl Drawing {
    pub fn new(id: impl Into<String>, field: impl Into<String>, primitive: Primitive) -> Self {
        Self {
            id: id.into(),
            field: field.into(),
            primitive,
            style: DrawStyle::default(),
            z: ZIndex::default(),
            seq: 0,
        }
    }

    pub fn with_style(mut self, style: DrawStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_z(mut self, z: i32) -> Self {
        self.z = ZIndex(z);
        self
    }

    #[inline]
    pub fn sort_key(&self) -> SortKey {
        SortKey::new(self.z, self.seq)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(OverlayError::InvalidArgument("drawing id is empty".into()));
        }
        if !(self.style.thickness.is_finite() && self.style.thickness >= 0.0) {
            return Err(OverlayError::InvalidArgument("thickness must be >= 0".into()));
        }
        self.primitive.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;
    use serde_json::json;

    #[test]
    fn decodes_flat_request_shape() {
        let d: Drawing = serde_json::from_value(json!({
            "id": "zone",
            "field": "table",
            "type": "circle",
            "center": [10.0, 20.0],
            "radius": 5.0,
            "style": {"color": [255, 0, 0, 128], "filled": false}
        }))
        .unwrap();

        assert_eq!(d.field, "table");
        assert_eq!(d.primitive, Primitive::Circle { center: Vec2::new(10.0, 20.0), radius: 5.0 });
        assert_eq!(d.style.color, Rgba::new(255, 0, 0, 128));
        assert!(!d.style.filled);
        assert_eq!(d.style.stroke_width(), DEFAULT_STROKE_WIDTH);
    }

    #[test]
    fn field_defaults_to_world() {
        let d: Drawing = serde_json::from_value(json!({
            "id": "l", "type": "line", "start": [0, 0], "end": [1, 1]
        }))
        .unwrap();
        assert_eq!(d.field, WORLD);
        assert!(d.validate().is_ok());
    }
}
