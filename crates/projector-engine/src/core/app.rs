use crate::error::Result;
use crate::input::InputRequest;
use crate::render::Renderer;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract driven by the runtimes.
///
/// Order: any number of `on_input` / `on_frame` calls, then exactly one
/// `on_shutdown` while the renderer is still alive. The runtime releases the
/// renderer right after.
pub trait App {
    fn on_input(&mut self, request: InputRequest) -> AppControl {
        let _ = request;
        AppControl::Continue
    }

    /// Called once per paced frame. A fatal error (see
    /// [`OverlayError::is_fatal`](crate::error::OverlayError::is_fatal))
    /// stops the runtime; anything else is logged and the loop continues.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> Result<AppControl>;

    /// Last chance to use the renderer, e.g. for a final present.
    fn on_shutdown(&mut self, renderer: &mut dyn Renderer) {
        let _ = renderer;
    }
}
