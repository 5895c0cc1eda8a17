//! Time subsystem.
//!
//! - `FrameClock`: per-loop delta time with clamps
//! - `FramePacer`: fixed-rate deadlines for the render loop

mod frame_clock;
mod pacer;

pub use frame_clock::{FrameClock, FrameTime};
pub use pacer::FramePacer;
