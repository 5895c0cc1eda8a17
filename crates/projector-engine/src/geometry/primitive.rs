use serde::{Deserialize, Serialize};

use crate::coords::Vec2;
use crate::error::{OverlayError, Result};

pub const DEFAULT_FONT_SIZE: f64 = 24.0;

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

/// Compact shape description in its source frame.
///
/// Lengths are in the units of whatever frame the primitive is anchored in;
/// nothing is pre-expanded, so a recalibrated field re-renders correctly.
/// `font_size` is always in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Primitive {
    Circle {
        center: Vec2,
        radius: f64,
    },
    Box {
        center: Vec2,
        width: f64,
        height: f64,
        /// Rotation about `center`, radians counter-clockwise.
        #[serde(default)]
        angle: f64,
    },
    Line {
        start: Vec2,
        end: Vec2,
    },
    Arrow {
        start: Vec2,
        end: Vec2,
    },
    Polygon {
        vertices: Vec<Vec2>,
    },
    Text {
        position: Vec2,
        text: String,
        #[serde(default = "default_font_size")]
        font_size: f64,
    },
}

impl Primitive {
    pub fn kind(&self) -> &'static str {
        match self {
            Primitive::Circle { .. } => "circle",
            Primitive::Box { .. } => "box",
            Primitive::Line { .. } => "line",
            Primitive::Arrow { .. } => "arrow",
            Primitive::Polygon { .. } => "polygon",
            Primitive::Text { .. } => "text",
        }
    }

    /// Representative point, used to sample the local pixel scale.
    pub fn anchor(&self) -> Vec2 {
        match self {
            Primitive::Circle { center, .. } | Primitive::Box { center, .. } => *center,
            Primitive::Line { start, end } | Primitive::Arrow { start, end } => start.lerp(*end, 0.5),
            Primitive::Polygon { vertices } => {
                if vertices.is_empty() {
                    return Vec2::zero();
                }
                let sum = vertices.iter().fold(Vec2::zero(), |acc, v| acc + *v);
                sum / vertices.len() as f64
            }
            Primitive::Text { position, .. } => *position,
        }
    }

    /// Rejects shapes that can never render.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| -> Result<()> { Err(OverlayError::InvalidArgument(msg)) };
        match self {
            Primitive::Circle { center, radius } => {
                if !center.is_finite() || !radius.is_finite() || *radius <= 0.0 {
                    return bad(format!("circle needs a finite centre and positive radius, got {radius}"));
                }
            }
            Primitive::Box { center, width, height, angle } => {
                if !center.is_finite() || !angle.is_finite() {
                    return bad("box centre and angle must be finite".into());
                }
                if !(width.is_finite() && height.is_finite() && *width > 0.0 && *height > 0.0) {
                    return bad(format!("box size must be positive, got {width}x{height}"));
                }
            }
            Primitive::Line { start, end } | Primitive::Arrow { start, end } => {
                if !start.is_finite() || !end.is_finite() {
                    return bad(format!("{} endpoints must be finite", self.kind()));
                }
            }
            Primitive::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return bad(format!("polygon needs at least 3 vertices, got {}", vertices.len()));
                }
                if vertices.iter().any(|v| !v.is_finite()) {
                    return bad("polygon vertices must be finite".into());
                }
            }
            Primitive::Text { position, text, font_size } => {
                if !position.is_finite() {
                    return bad("text position must be finite".into());
                }
                if text.is_empty() {
                    return bad("text is empty".into());
                }
                if !(font_size.is_finite() && *font_size > 0.0) {
                    return bad(format!("font size must be positive, got {font_size}"));
                }
            }
        }
        Ok(())
    }
}
