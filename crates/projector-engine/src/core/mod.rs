//! Core engine-facing contracts.
//!
//! The interface between a runtime (windowed or headless loop) and the code
//! that draws. Runtimes own the renderer and its lifecycle; apps only see it
//! through the per-frame context.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::FrameCtx;
