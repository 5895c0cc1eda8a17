/// Represents a single acquired surface texture.
///
/// Short-lived: holding it prevents acquisition of the next frame. Command
/// buffers targeting `view` are submitted separately through [`super::Gpu::submit`]
/// before the frame is handed to [`super::Gpu::present`].
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
}
