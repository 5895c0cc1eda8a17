//! Projector overlay engine.
//!
//! Turns entities and drawings placed in calibrated coordinate fields into
//! pixels on a ceiling projector. Layers, leaf first:
//! - `field`: four-corner homographies between named frames and the world
//! - `scene`: lock-protected scene state with published snapshots
//! - `geometry`: primitive expansion and batched projection
//! - `render`: the `Renderer` contract with CPU and wgpu backends
//! - `frame`: composition of a snapshot into one frame
//!
//! Around them: `service` (command table for external requests), `feed`
//! (optional tracking source), `window` (windowed and headless runtimes).

pub mod config;
pub mod coords;
pub mod error;
pub mod field;
pub mod geometry;
pub mod scene;

pub mod device;
pub mod render;

pub mod core;
pub mod feed;
pub mod frame;
pub mod input;
pub mod logging;
pub mod service;
pub mod time;
pub mod window;

pub use config::OverlayConfig;
pub use error::{OverlayError, Result};
pub use field::{FieldRegistry, SCREEN, WORLD};
pub use scene::{Scene, SceneSnapshot};
