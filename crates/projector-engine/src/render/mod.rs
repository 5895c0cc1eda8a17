//! Renderer abstraction and its two backends.
//!
//! Convention:
//! - every draw takes screen pixels (top-left origin, +Y down) as `f64`
//! - colors are straight alpha; backends premultiply on their own
//! - `border == 0.0` fills a closed shape, anything larger strokes it
//! - a bad draw returns `RenderSkipped` and leaves the frame untouched
//!
//! Backends:
//! - [`CpuRenderer`]: `vello_cpu` into an RGBA8 [`Frame`]
//! - [`GpuRenderer`]: wgpu, one reusable vertex buffer per frame

pub mod check;
pub mod cpu;
pub mod gpu;
pub mod text;

pub use cpu::{CpuRenderer, Frame, FrameSink, LatestFrame, PngSnapshot};
pub use gpu::GpuRenderer;
pub use text::{LruCache, TextBitmap, TextKey, TextRasterizer};

use crate::coords::{Rgba, Vec2};
use crate::error::Result;

/// Backend-owned image created by [`Renderer::create_image`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub(crate) u32);

/// Text appearance.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TextStyle {
    pub color: Rgba,
    /// Pixel height of the em box.
    pub size_px: f64,
    /// Filled box behind the text, padded by a couple of pixels.
    pub background: Option<Rgba>,
}

impl TextStyle {
    pub fn new(color: Rgba, size_px: f64) -> Self {
        Self { color, size_px, background: None }
    }

    pub fn with_background(mut self, background: Rgba) -> Self {
        self.background = Some(background);
        self
    }
}

/// Drawing capability shared by the CPU and GPU backends.
///
/// Lifecycle: `init` once, then per frame `clear` → draws → `present`, and
/// finally `shutdown`. Draws after `shutdown` are skipped.
pub trait Renderer {
    /// Acquires backend resources. Failure is fatal (`RenderBackend`).
    fn init(&mut self) -> Result<()>;

    /// Drawable size in pixels.
    fn size(&self) -> (u32, u32);

    fn clear(&mut self, color: Rgba);

    fn present(&mut self) -> Result<()>;

    /// Releases backend resources. Idempotent.
    fn shutdown(&mut self);

    fn draw_circle(&mut self, center: Vec2, radius: f64, color: Rgba, border: f64) -> Result<()>;

    fn draw_polygon(&mut self, points: &[Vec2], color: Rgba, border: f64) -> Result<()>;

    fn draw_line(&mut self, start: Vec2, end: Vec2, color: Rgba, width: f64) -> Result<()>;

    /// Connected segments through `points`.
    fn draw_lines(&mut self, points: &[Vec2], color: Rgba, width: f64, closed: bool)
    -> Result<()>;

    /// Draws `text` centered on `center`.
    fn draw_text(&mut self, text: &str, center: Vec2, style: TextStyle) -> Result<()>;

    /// Uploads straight-alpha RGBA8 pixels.
    fn create_image(&mut self, rgba: &[u8], width: u32, height: u32) -> Result<ImageHandle>;

    /// Draws an image stretched over the rectangle at `top_left` with `size`.
    fn draw_image(&mut self, image: ImageHandle, top_left: Vec2, size: Vec2) -> Result<()>;

    /// Frees an image. Unknown handles are ignored.
    fn release_image(&mut self, image: ImageHandle);

    /// Many circles sharing one color.
    fn draw_circles_batch(&mut self, circles: &[(Vec2, f64)], color: Rgba, border: f64)
    -> Result<()>;

    /// Many independent segments sharing one color and width.
    fn draw_lines_batch(&mut self, segments: &[(Vec2, Vec2)], color: Rgba, width: f64)
    -> Result<()>;
}
