//! Value types shared by the field registry, the scene and the renderers.
//!
//! Frames in use:
//! - world: meters, +X right, +Y up
//! - field-local: whatever units the field was calibrated in
//! - screen: pixels, origin top-left, +Y down
//!
//! `Vec2` carries no frame tag; the frame is implied by the call site.

mod color;
mod vec2;

pub use color::Rgba;
pub use vec2::Vec2;
