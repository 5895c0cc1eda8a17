use std::path::PathBuf;
use std::time::Duration;

use crate::coords::Rgba;

pub const DEFAULT_FRAME_RATE_HZ: u32 = 30;
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;
pub const DEFAULT_CIRCLE_SEGMENTS: u32 = 32;
pub const DEFAULT_TEXT_CACHE_CAPACITY: usize = 256;
pub const DEFAULT_GPU_VERTEX_CAPACITY: usize = 65_536;
pub const DEFAULT_IMAGE_CACHE_CAPACITY: usize = 16;
pub const DEFAULT_PROFILE_WINDOW: usize = 300;

/// Top-level overlay settings.
///
/// There is no file or CLI loader here; embedders build this in code and
/// override the fields they care about.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Target render rate.
    pub frame_rate_hz: u32,
    /// Color the frame is cleared to.
    pub background: Rgba,
    /// Pose samples kept per entity for trails.
    pub history_capacity: usize,
    /// Polygon segments used to approximate circles before projection.
    pub circle_segments: u32,
    /// Rasterized text entries kept by each backend.
    pub text_cache_capacity: usize,
    /// Vertices in the GPU backend's reusable vertex buffer.
    pub gpu_vertex_capacity: usize,
    /// Live images a backend keeps before evicting the least recently drawn.
    pub image_cache_capacity: usize,
    /// Base directory for relative background image paths.
    pub asset_dir: PathBuf,
    /// How often frame timings are logged; `None` disables profiling.
    pub profile_interval: Option<Duration>,
    /// Frames kept for the rolling timing statistics.
    pub profile_window: usize,
    /// Debug layers visible at startup.
    pub layers: LayerToggles,
    pub grid: GridStyle,
    /// Upper bound on waiting for in-flight requests during teardown.
    pub drain_timeout: Duration,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: DEFAULT_FRAME_RATE_HZ,
            background: Rgba::black(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            circle_segments: DEFAULT_CIRCLE_SEGMENTS,
            text_cache_capacity: DEFAULT_TEXT_CACHE_CAPACITY,
            gpu_vertex_capacity: DEFAULT_GPU_VERTEX_CAPACITY,
            image_cache_capacity: DEFAULT_IMAGE_CACHE_CAPACITY,
            asset_dir: PathBuf::from("assets"),
            profile_interval: None,
            profile_window: DEFAULT_PROFILE_WINDOW,
            layers: LayerToggles::default(),
            grid: GridStyle::default(),
            drain_timeout: Duration::from_secs(2),
        }
    }
}

/// Visibility of the debug layers.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LayerToggles {
    pub grid: bool,
    pub fields: bool,
}

/// Appearance of the world grid layer.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GridStyle {
    /// Major line spacing in meters.
    pub major_spacing: f64,
    /// Minor line spacing in meters; `0` disables minor lines.
    pub minor_spacing: f64,
    pub major_color: Rgba,
    pub minor_color: Rgba,
    pub origin_color: Rgba,
    /// Line width in pixels.
    pub line_width: f64,
}

impl Default for GridStyle {
    fn default() -> Self {
        Self {
            major_spacing: 1.0,
            minor_spacing: 0.1,
            major_color: Rgba::new(100, 100, 100, 255),
            minor_color: Rgba::new(50, 50, 50, 160),
            origin_color: Rgba::new(255, 255, 0, 255),
            line_width: 1.0,
        }
    }
}
