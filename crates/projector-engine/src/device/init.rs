/// Initialization parameters for the projector's wgpu device and surface.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when available.
    ///
    /// Off by default: overlay colors are authored in display space and the
    /// software backend blends in the same space, so both backends match.
    pub prefer_srgb: bool,

    /// FIFO keeps the projector tear-free and is supported everywhere.
    pub present_mode: wgpu::PresentMode,

    /// Alpha mode preference; falls back to a supported one.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub required_features: wgpu::Features,

    pub required_limits: wgpu::Limits,

    /// Hint only; support depends on platform/backend.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: false,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}
