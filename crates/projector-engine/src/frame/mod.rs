//! Per-frame composition.
//!
//! - [`FrameComposer`]: scene snapshot → draw calls on any renderer
//! - [`BackgroundLayer`]: per-field color or warped image, painted first
//! - [`GridLayer`] / [`FieldLayer`]: calibration aids under the scene
//! - [`FrameProfiler`]: rolling compose/present timings, logged periodically
//! - [`OverlayApp`]: the `core::App` that ties scene, feed and composer to a runtime

mod app;
mod background;
mod composer;
mod layers;
mod profiler;

pub use app::OverlayApp;
pub use background::{BackgroundLayer, WarpedImage, warp_image};
pub use composer::{FrameComposer, FrameStats};
pub use layers::{FieldLayer, GridLayer, GridLines};
pub use profiler::{FrameProfiler, Timings};
