//! Input subsystem.
//!
//! The overlay takes no pointer or text input. Keyboard and window events are
//! reduced to a handful of [`InputRequest`]s the render loop acts on; the
//! public API does not expose winit types.

mod platform {
    pub(crate) mod winit;
}
mod types;

pub(crate) use platform::winit::translate_window_event;
pub use types::{InputRequest, Key, KeyState, request_for_key};
