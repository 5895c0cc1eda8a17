use crate::render::Renderer;
use crate::time::FrameTime;

/// Per-frame context passed to `core::App::on_frame`.
///
/// The renderer is initialized and has not been presented this frame.
pub struct FrameCtx<'a> {
    pub renderer: &'a mut dyn Renderer,
    pub time: FrameTime,
}

impl FrameCtx<'_> {
    /// Drawable size in pixels.
    pub fn size(&self) -> (u32, u32) {
        self.renderer.size()
    }
}
