//! wgpu renderer.
//!
//! Draw calls only append triangles to a CPU-side [`VertexBatch`]; `present`
//! acquires the surface texture, writes the batch into the fixed vertex buffer
//! and records one render pass per chunk. Nothing is allocated on the GPU per
//! frame except text and image textures that miss their caches. Textures
//! evicted or released mid-frame are destroyed once the frame is submitted.

mod batch;
mod pipeline;
mod tessellate;

use std::collections::HashMap;

use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::config::OverlayConfig;
use crate::coords::{Rgba, Vec2};
use crate::device::{Gpu, GpuInit, SurfaceErrorAction};
use crate::error::{OverlayError, Result};

use super::text::{LruCache, TextKey, TextRasterizer};
use super::{ImageHandle, Renderer, TextStyle, check};
use batch::{RunKind, VertexBatch};
use pipeline::{GpuTexture, Pipelines, ViewportUniform};

const TEXT_BG_PAD: f64 = 2.0;

/// Text texture dimensions paired with its texture id.
#[derive(Debug, Copy, Clone)]
struct TextEntry {
    texture: u32,
    width: u32,
    height: u32,
}

pub struct GpuRenderer<'w> {
    window: &'w Window,
    gpu_init: GpuInit,
    vertex_capacity: usize,
    gpu: Option<Gpu<'w>>,
    pipes: Option<Pipelines>,
    batch: VertexBatch,
    clear_color: Rgba,
    text: TextRasterizer,
    text_cache: LruCache<TextKey, TextEntry>,
    /// Texture ids of live images, by recency of use.
    images: LruCache<u32, ()>,
    textures: HashMap<u32, GpuTexture>,
    next_texture: u32,
    /// Textures evicted mid-frame; destroyed after the frame is submitted.
    retired: Vec<u32>,
}

impl<'w> GpuRenderer<'w> {
    pub fn new(window: &'w Window, gpu_init: GpuInit, config: &OverlayConfig) -> Self {
        Self {
            window,
            gpu_init,
            vertex_capacity: config.gpu_vertex_capacity,
            gpu: None,
            pipes: None,
            batch: VertexBatch::default(),
            clear_color: config.background,
            text: TextRasterizer::new(),
            text_cache: LruCache::new(config.text_cache_capacity),
            images: LruCache::new(config.image_cache_capacity),
            textures: HashMap::new(),
            next_texture: 0,
            retired: Vec::new(),
        }
    }

    /// Loads the font used by `draw_text`; cached text is dropped.
    pub fn load_font(&mut self, bytes: &[u8]) -> Result<()> {
        self.text.load_font(bytes)?;
        for (_, entry) in self.text_cache.clear() {
            self.retired.push(entry.texture);
        }
        Ok(())
    }

    /// Reconfigures the surface after a window resize.
    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.resize(size);
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.gpu.is_some() {
            Ok(())
        } else {
            Err(OverlayError::skipped("renderer is not initialized"))
        }
    }

    fn upload(&mut self, rgba: &[u8], width: u32, height: u32) -> Result<u32> {
        let (Some(gpu), Some(pipes)) = (self.gpu.as_ref(), self.pipes.as_ref()) else {
            return Err(OverlayError::skipped("renderer is not initialized"));
        };
        let limit = gpu.device().limits().max_texture_dimension_2d;
        if width > limit || height > limit {
            return Err(OverlayError::skipped(format!(
                "texture {width}x{height} exceeds the device limit {limit}"
            )));
        }
        let tex = pipes.upload_texture(gpu.device(), gpu.queue(), rgba, width, height);
        let id = self.next_texture;
        self.next_texture = self.next_texture.wrapping_add(1);
        self.textures.insert(id, tex);
        Ok(id)
    }

    fn present_frame(&mut self) -> Result<()> {
        let Some(gpu) = self.gpu.as_ref() else {
            return Err(OverlayError::skipped("renderer is not initialized"));
        };
        let frame = match gpu.begin_frame() {
            Ok(frame) => frame,
            Err(err) => {
                let reason = err.to_string();
                let action = match self.gpu.as_mut() {
                    Some(gpu) => gpu.handle_surface_error(err),
                    None => SurfaceErrorAction::Fatal,
                };
                if action == SurfaceErrorAction::Fatal {
                    return Err(OverlayError::RenderBackend(format!("surface failure: {reason}")));
                }
                log::debug!("frame dropped: {reason} ({action:?})");
                return Ok(());
            }
        };

        self.submit_batch(&frame.view);
        self.window.pre_present_notify();
        if let Some(gpu) = self.gpu.as_ref() {
            gpu.present(frame);
        }
        Ok(())
    }

    fn destroy_retired(&mut self) {
        for id in self.retired.drain(..) {
            if let Some(tex) = self.textures.remove(&id) {
                tex.destroy();
            }
        }
    }

    fn fill(&mut self, pieces: &[Vec<Vec2>], color: Rgba) -> Result<()> {
        self.ensure_live()?;
        self.batch.push_pieces(pieces, color);
        Ok(())
    }

    /// Writes the batch chunk by chunk and records a pass for each.
    fn submit_batch(&self, view: &wgpu::TextureView) {
        let (Some(gpu), Some(pipes)) = (self.gpu.as_ref(), self.pipes.as_ref()) else {
            return;
        };
        let size = gpu.size();
        gpu.queue().write_buffer(
            &pipes.viewport_ubo,
            0,
            bytemuck::bytes_of(&ViewportUniform {
                viewport: [size.width.max(1) as f32, size.height.max(1) as f32],
                _pad: [0.0; 2],
            }),
        );

        let chunks = self.batch.chunks(pipes.vertex_capacity);
        let passes = chunks.len().max(1);
        for i in 0..passes {
            let chunk = chunks.get(i);
            if let Some(chunk) = chunk {
                gpu.queue().write_buffer(
                    &pipes.vertex_buffer,
                    0,
                    bytemuck::cast_slice(&self.batch.vertices()[chunk.vertices.clone()]),
                );
            }

            let load = if i == 0 {
                let [r, g, b, a] = self.clear_color.to_premul_f32();
                wgpu::LoadOp::Clear(wgpu::Color { r: r as f64, g: g as f64, b: b as f64, a: a as f64 })
            } else {
                wgpu::LoadOp::Load
            };

            let mut encoder = gpu.create_encoder("projector frame encoder");
            {
                let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("projector overlay pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                    multiview_mask: None,
                });

                if let Some(chunk) = chunk {
                    rpass.set_bind_group(0, &pipes.viewport_bind_group, &[]);
                    rpass.set_vertex_buffer(0, pipes.vertex_buffer.slice(..));
                    for run in &chunk.runs {
                        match run.kind {
                            RunKind::Opaque => rpass.set_pipeline(&pipes.opaque),
                            RunKind::Blended => rpass.set_pipeline(&pipes.blended),
                            RunKind::Textured(id) => {
                                let Some(tex) = self.textures.get(&id) else {
                                    log::debug!("texture {id} vanished before submit");
                                    continue;
                                };
                                rpass.set_pipeline(&pipes.textured);
                                rpass.set_bind_group(1, &tex.bind_group, &[]);
                            }
                        }
                        rpass.draw(run.vertices.clone(), 0..1);
                    }
                }
            }
            gpu.submit(encoder);
        }
    }
}

impl Renderer for GpuRenderer<'_> {
    fn init(&mut self) -> Result<()> {
        if self.gpu.is_some() {
            return Ok(());
        }
        let gpu = pollster::block_on(Gpu::new(self.window, self.gpu_init.clone()))
            .map_err(|e| OverlayError::RenderBackend(format!("{e:#}")))?;
        let pipes = Pipelines::new(gpu.device(), gpu.surface_format(), self.vertex_capacity);
        log::info!("gpu renderer ready, {} vertices per chunk", pipes.vertex_capacity);
        self.gpu = Some(gpu);
        self.pipes = Some(pipes);
        Ok(())
    }

    fn size(&self) -> (u32, u32) {
        self.gpu.as_ref().map_or((0, 0), |g| (g.size().width, g.size().height))
    }

    fn clear(&mut self, color: Rgba) {
        self.clear_color = color;
        self.batch.clear();
    }

    fn present(&mut self) -> Result<()> {
        let outcome = self.present_frame();
        self.batch.clear();
        self.destroy_retired();
        outcome
    }

    fn shutdown(&mut self) {
        let Some(gpu) = self.gpu.take() else { return };
        for (_, entry) in self.text_cache.clear() {
            self.retired.push(entry.texture);
        }
        self.images.clear();
        self.retired.extend(self.textures.keys().copied());
        self.destroy_retired();
        self.pipes = None;
        self.batch.clear();
        drop(gpu);
        log::info!("gpu renderer shut down");
    }

    fn draw_circle(&mut self, center: Vec2, radius: f64, color: Rgba, border: f64) -> Result<()> {
        check::point(center)?;
        check::positive("radius", radius)?;
        check::border(border)?;
        if border == 0.0 {
            self.fill(&[tessellate::circle(center, radius)], color)
        } else {
            self.fill(&tessellate::ring(center, radius, border), color)
        }
    }

    fn draw_polygon(&mut self, points: &[Vec2], color: Rgba, border: f64) -> Result<()> {
        check::points(points, 3)?;
        check::border(border)?;
        if border == 0.0 {
            // Fans are exact for the convex shapes the composer produces.
            self.fill(&[points.to_vec()], color)
        } else {
            self.fill(&tessellate::stroke(points, border, true), color)
        }
    }

    fn draw_line(&mut self, start: Vec2, end: Vec2, color: Rgba, width: f64) -> Result<()> {
        check::point(start)?;
        check::point(end)?;
        check::positive("width", width)?;
        self.fill(&tessellate::stroke(&[start, end], width, false), color)
    }

    fn draw_lines(
        &mut self,
        points: &[Vec2],
        color: Rgba,
        width: f64,
        closed: bool,
    ) -> Result<()> {
        check::points(points, 2)?;
        check::positive("width", width)?;
        self.fill(&tessellate::stroke(points, width, closed), color)
    }

    fn draw_text(&mut self, text: &str, center: Vec2, style: TextStyle) -> Result<()> {
        check::text(text, style.size_px)?;
        check::point(center)?;
        self.ensure_live()?;

        let key = TextKey::new(text, style.size_px, style.color);
        let cached = self.text_cache.get(&key).copied();
        let entry = match cached {
            Some(entry) => entry,
            None => {
                let bitmap = self.text.rasterize(&key)?;
                let texture = self.upload(&bitmap.rgba, bitmap.width, bitmap.height)?;
                let entry = TextEntry { texture, width: bitmap.width, height: bitmap.height };
                if let Some((_, evicted)) = self.text_cache.insert(key, entry) {
                    self.retired.push(evicted.texture);
                }
                entry
            }
        };

        let size = Vec2::new(entry.width as f64, entry.height as f64);
        let top_left = Vec2::new((center.x - size.x * 0.5).round(), (center.y - size.y * 0.5).round());
        if let Some(bg) = style.background {
            let pad = Vec2::new(TEXT_BG_PAD, TEXT_BG_PAD);
            let (lo, hi) = (top_left - pad, top_left + size + pad);
            let rect = vec![lo, Vec2::new(hi.x, lo.y), hi, Vec2::new(lo.x, hi.y)];
            self.batch.push_pieces(&[rect], bg);
        }
        self.batch.push_textured(entry.texture, top_left, size);
        Ok(())
    }

    fn create_image(&mut self, rgba: &[u8], width: u32, height: u32) -> Result<ImageHandle> {
        check::image_data(rgba, width, height)?;
        let id = self.upload(rgba, width, height)?;
        if let Some((evicted, ())) = self.images.insert(id, ()) {
            log::debug!("image {evicted} evicted");
            self.retired.push(evicted);
        }
        Ok(ImageHandle(id))
    }

    fn draw_image(&mut self, image: ImageHandle, top_left: Vec2, size: Vec2) -> Result<()> {
        check::point(top_left)?;
        check::positive("image width", size.x)?;
        check::positive("image height", size.y)?;
        self.ensure_live()?;
        if self.images.get(&image.0).is_none() {
            return Err(OverlayError::skipped(format!("unknown image {}", image.0)));
        }
        self.batch.push_textured(image.0, top_left, size);
        Ok(())
    }

    fn release_image(&mut self, image: ImageHandle) {
        if self.images.remove(&image.0).is_some() {
            self.retired.push(image.0);
        }
    }

    fn draw_circles_batch(
        &mut self,
        circles: &[(Vec2, f64)],
        color: Rgba,
        border: f64,
    ) -> Result<()> {
        check::border(border)?;
        let mut pieces = Vec::with_capacity(circles.len());
        for &(center, radius) in circles {
            check::point(center)?;
            check::positive("radius", radius)?;
            if border == 0.0 {
                pieces.push(tessellate::circle(center, radius));
            } else {
                pieces.extend(tessellate::ring(center, radius, border));
            }
        }
        self.fill(&pieces, color)
    }

    fn draw_lines_batch(
        &mut self,
        segments: &[(Vec2, Vec2)],
        color: Rgba,
        width: f64,
    ) -> Result<()> {
        check::positive("width", width)?;
        let mut pieces = Vec::with_capacity(segments.len());
        for &(a, b) in segments {
            check::point(a)?;
            check::point(b)?;
            pieces.extend(tessellate::line_quad(a, b, width).map(|q| q.to_vec()));
        }
        self.fill(&pieces, color)
    }
}
