//! Software renderer on `vello_cpu`.
//!
//! Draws are recorded into a `RenderContext` and rasterized on `present`.
//! Each frame's output is unpremultiplied into a [`Frame`] and handed to an
//! optional [`FrameSink`].

mod frame;
mod sink;

pub use frame::Frame;
pub use sink::{FrameSink, LatestFrame, PngSnapshot};

use std::sync::Arc;

use vello_cpu::kurbo::{self, Affine, BezPath, Cap, Join, Shape, Stroke};
use vello_cpu::peniko::{Color, ImageSampler};

use crate::config::OverlayConfig;
use crate::coords::{Rgba, Vec2};
use crate::error::{OverlayError, Result};

use super::text::{LruCache, TextBitmap, TextKey, TextRasterizer};
use super::{ImageHandle, Renderer, TextStyle, check};
use frame::premultiplied_pixmap;

/// Padding around a text background box, in pixels.
const TEXT_BG_PAD: f64 = 2.0;

/// Flattening tolerance for circles, in pixels.
const TOLERANCE: f64 = 0.1;

/// An uploaded bitmap ready to be used as a paint.
#[derive(Clone)]
struct Sprite {
    paint: vello_cpu::Image,
    width: f64,
    height: f64,
}

impl Sprite {
    fn from_rgba(rgba: &[u8], width: u32, height: u32) -> Result<Self> {
        let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(OverlayError::skipped(format!("image size {width}x{height} is too large")));
        };
        let pixmap = premultiplied_pixmap(rgba, w, h);
        Ok(Self {
            paint: vello_cpu::Image {
                image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
                sampler: ImageSampler::default(),
            },
            width: width as f64,
            height: height as f64,
        })
    }

    fn from_bitmap(bitmap: &TextBitmap) -> Result<Self> {
        Self::from_rgba(&bitmap.rgba, bitmap.width, bitmap.height)
    }
}

struct Surface {
    ctx: vello_cpu::RenderContext,
    target: vello_cpu::Pixmap,
    width: u16,
    height: u16,
}

impl Surface {
    fn new(width: u16, height: u16) -> Self {
        Self {
            ctx: vello_cpu::RenderContext::new(width, height),
            target: vello_cpu::Pixmap::new(width, height),
            width,
            height,
        }
    }

    fn paint(&mut self, color: Rgba) {
        let [r, g, b, a] = color.to_array();
        self.ctx.set_paint(Color::from_rgba8(r, g, b, a));
    }

    fn fill(&mut self, path: &BezPath, color: Rgba) {
        self.paint(color);
        self.ctx.fill_path(path);
    }

    fn stroke(&mut self, path: &BezPath, color: Rgba, width: f64) {
        self.paint(color);
        self.ctx
            .set_stroke(Stroke::new(width).with_caps(Cap::Butt).with_join(Join::Round));
        self.ctx.stroke_path(path);
    }

    /// Stretches `sprite` over `top_left .. top_left + size`.
    fn sprite(&mut self, sprite: &Sprite, top_left: Vec2, size: Vec2) {
        let placement = Affine::translate((top_left.x, top_left.y))
            * Affine::scale_non_uniform(size.x / sprite.width, size.y / sprite.height);
        self.ctx.set_transform(placement);
        self.ctx.set_paint(sprite.paint.clone());
        self.ctx.fill_rect(&kurbo::Rect::new(0.0, 0.0, sprite.width, sprite.height));
        self.ctx.set_transform(Affine::IDENTITY);
    }
}

pub struct CpuRenderer {
    width: u32,
    height: u32,
    surface: Option<Surface>,
    frame: Option<Frame>,
    text: TextRasterizer,
    text_cache: LruCache<TextKey, Sprite>,
    images: LruCache<u32, Sprite>,
    next_image: u32,
    sink: Option<Box<dyn FrameSink>>,
    frames: u64,
}

impl CpuRenderer {
    pub fn new(width: u32, height: u32, config: &OverlayConfig) -> Self {
        Self {
            width,
            height,
            surface: None,
            frame: None,
            text: TextRasterizer::new(),
            text_cache: LruCache::new(config.text_cache_capacity),
            images: LruCache::new(config.image_cache_capacity),
            next_image: 0,
            sink: None,
            frames: 0,
        }
    }

    pub fn with_sink(mut self, sink: impl FrameSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Loads the font used by `draw_text`; cached text is dropped.
    pub fn load_font(&mut self, bytes: &[u8]) -> Result<()> {
        self.text.load_font(bytes)?;
        self.text_cache.clear();
        Ok(())
    }

    /// Last presented frame, `None` before the first `present` or after
    /// `shutdown`.
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Frames presented so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Live images held by the backend; bounded by the image cache capacity.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    fn surface(&mut self) -> Result<&mut Surface> {
        self.surface
            .as_mut()
            .ok_or_else(|| OverlayError::skipped("renderer is not initialized"))
    }
}

#[inline]
fn pt(p: Vec2) -> kurbo::Point {
    kurbo::Point::new(p.x, p.y)
}

fn polyline(path: &mut BezPath, points: &[Vec2], closed: bool) {
    let Some((first, rest)) = points.split_first() else {
        return;
    };
    path.move_to(pt(*first));
    for p in rest {
        path.line_to(pt(*p));
    }
    if closed {
        path.close_path();
    }
}

/// Adds a disc, or the ring of width `border` inside its edge, to the fill or
/// stroke path. A ring at least as wide as the radius is a disc.
fn circle(fills: &mut BezPath, rings: &mut BezPath, center: Vec2, radius: f64, border: f64) {
    if border == 0.0 || border >= radius {
        fills.extend(kurbo::Circle::new(pt(center), radius).path_elements(TOLERANCE));
    } else {
        let mid = radius - border * 0.5;
        rings.extend(kurbo::Circle::new(pt(center), mid).path_elements(TOLERANCE));
    }
}

fn rect(lo: Vec2, hi: Vec2) -> BezPath {
    kurbo::Rect::new(lo.x, lo.y, hi.x, hi.y).to_path(TOLERANCE)
}

impl Renderer for CpuRenderer {
    fn init(&mut self) -> Result<()> {
        let (Ok(w), Ok(h)) = (u16::try_from(self.width), u16::try_from(self.height)) else {
            return Err(OverlayError::RenderBackend(format!(
                "{}x{} exceeds the software surface limit",
                self.width, self.height
            )));
        };
        if w == 0 || h == 0 {
            return Err(OverlayError::RenderBackend(format!(
                "cannot render into a {}x{} surface",
                self.width, self.height
            )));
        }
        self.surface = Some(Surface::new(w, h));
        log::info!("cpu renderer ready ({}x{})", self.width, self.height);
        Ok(())
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Rgba) {
        if let Some(s) = self.surface.as_mut() {
            s.ctx = vello_cpu::RenderContext::new(s.width, s.height);
            let full = rect(Vec2::zero(), Vec2::new(s.width as f64, s.height as f64));
            s.fill(&full, color);
        }
    }

    fn present(&mut self) -> Result<()> {
        let index = self.frames;
        let Some(surface) = self.surface.as_mut() else {
            return Err(OverlayError::skipped("renderer is not initialized"));
        };
        surface.ctx.flush();
        surface.target.data_as_u8_slice_mut().fill(0);
        surface.ctx.render_to_pixmap(&mut surface.target);
        surface.ctx = vello_cpu::RenderContext::new(surface.width, surface.height);

        let frame = match self.frame.as_mut() {
            Some(f) => {
                f.copy_pixmap(&surface.target);
                &*f
            }
            None => &*self.frame.insert(Frame::from_pixmap(&surface.target)),
        };
        self.frames += 1;
        match self.sink.as_mut() {
            Some(sink) => sink.consume(frame, index),
            None => Ok(()),
        }
    }

    fn shutdown(&mut self) {
        if self.surface.take().is_some() {
            self.frame = None;
            self.text_cache.clear();
            self.images.clear();
            log::info!("cpu renderer shut down after {} frames", self.frames);
        }
    }

    fn draw_circle(&mut self, center: Vec2, radius: f64, color: Rgba, border: f64) -> Result<()> {
        self.draw_circles_batch(&[(center, radius)], color, border)
    }

    fn draw_polygon(&mut self, points: &[Vec2], color: Rgba, border: f64) -> Result<()> {
        check::points(points, 3)?;
        check::border(border)?;
        let surface = self.surface()?;
        let mut path = BezPath::new();
        polyline(&mut path, points, true);
        if border == 0.0 {
            surface.fill(&path, color);
        } else {
            surface.stroke(&path, color, border);
        }
        Ok(())
    }

    fn draw_line(&mut self, start: Vec2, end: Vec2, color: Rgba, width: f64) -> Result<()> {
        self.draw_lines(&[start, end], color, width, false)
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
        let surface = self.surface()?;
        let mut path = BezPath::new();
        polyline(&mut path, points, closed);
        surface.stroke(&path, color, width);
        Ok(())
    }

    fn draw_text(&mut self, text: &str, center: Vec2, style: TextStyle) -> Result<()> {
        check::text(text, style.size_px)?;
        check::point(center)?;
        if self.surface.is_none() {
            return Err(OverlayError::skipped("renderer is not initialized"));
        }

        let key = TextKey::new(text, style.size_px, style.color);
        let sprite = match self.text_cache.get(&key) {
            Some(s) => s.clone(),
            None => {
                let sprite = Sprite::from_bitmap(&self.text.rasterize(&key)?)?;
                self.text_cache.insert(key, sprite.clone());
                sprite
            }
        };

        let size = Vec2::new(sprite.width, sprite.height);
        let top_left = Vec2::new((center.x - size.x * 0.5).round(), (center.y - size.y * 0.5).round());
        let surface = self.surface()?;
        if let Some(bg) = style.background {
            let pad = Vec2::new(TEXT_BG_PAD, TEXT_BG_PAD);
            surface.fill(&rect(top_left - pad, top_left + size + pad), bg);
        }
        surface.sprite(&sprite, top_left, size);
        Ok(())
    }

    fn create_image(&mut self, rgba: &[u8], width: u32, height: u32) -> Result<ImageHandle> {
        check::image_data(rgba, width, height)?;
        let sprite = Sprite::from_rgba(rgba, width, height)?;
        let id = self.next_image;
        self.next_image = self.next_image.wrapping_add(1);
        if let Some((evicted, _)) = self.images.insert(id, sprite) {
            log::debug!("image {evicted} evicted");
        }
        Ok(ImageHandle(id))
    }

    fn draw_image(&mut self, image: ImageHandle, top_left: Vec2, size: Vec2) -> Result<()> {
        check::point(top_left)?;
        check::positive("image width", size.x)?;
        check::positive("image height", size.y)?;
        let sprite = self
            .images
            .get(&image.0)
            .cloned()
            .ok_or_else(|| OverlayError::skipped(format!("unknown image {}", image.0)))?;
        self.surface()?.sprite(&sprite, top_left, size);
        Ok(())
    }

    fn release_image(&mut self, image: ImageHandle) {
        self.images.remove(&image.0);
    }

    fn draw_circles_batch(
        &mut self,
        circles: &[(Vec2, f64)],
        color: Rgba,
        border: f64,
    ) -> Result<()> {
        check::border(border)?;
        let mut fills = BezPath::new();
        let mut rings = BezPath::new();
        for &(center, radius) in circles {
            check::point(center)?;
            check::positive("radius", radius)?;
            circle(&mut fills, &mut rings, center, radius, border);
        }
        let surface = self.surface()?;
        if !fills.elements().is_empty() {
            surface.fill(&fills, color);
        }
        if !rings.elements().is_empty() {
            surface.stroke(&rings, color, border);
        }
        Ok(())
    }

    fn draw_lines_batch(
        &mut self,
        segments: &[(Vec2, Vec2)],
        color: Rgba,
        width: f64,
    ) -> Result<()> {
        check::positive("width", width)?;
        let mut path = BezPath::new();
        for &(a, b) in segments {
            check::point(a)?;
            check::point(b)?;
            path.move_to(pt(a));
            path.line_to(pt(b));
        }
        let surface = self.surface()?;
        if !path.elements().is_empty() {
            surface.stroke(&path, color, width);
        }
        Ok(())
    }
}
