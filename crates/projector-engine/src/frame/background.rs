//! Field backgrounds painted before everything else.
//!
//! A color background fills the field's screen quad. An image background is
//! warped onto the quad on the CPU once, uploaded, and redrawn from the
//! backend image until the file, the calibration or the alpha changes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use image::RgbaImage;

use crate::coords::{Rgba, Vec2};
use crate::error::{OverlayError, Result};
use crate::field::{FieldRegistry, Homography, SCREEN};
use crate::geometry;
use crate::render::{ImageHandle, Renderer};
use crate::scene::FieldBackground;

use super::FrameStats;

/// Screen corners are compared at this many steps per pixel.
const CORNER_QUANTUM: f64 = 8.0;

/// Everything a warped image depends on.
#[derive(Debug, Clone, PartialEq)]
struct WarpKey {
    path: PathBuf,
    modified: Option<SystemTime>,
    alpha: u8,
    corners: [(i64, i64); 4],
    target: (u32, u32),
}

impl WarpKey {
    fn new(path: PathBuf, alpha: u8, quad: &[Vec2; 4], target: (u32, u32)) -> Self {
        let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        let q = |v: f64| (v * CORNER_QUANTUM).round() as i64;
        Self {
            path,
            modified,
            alpha,
            corners: quad.map(|p| (q(p.x), q(p.y))),
            target,
        }
    }
}

#[derive(Debug)]
struct Uploaded {
    key: WarpKey,
    image: ImageHandle,
    top_left: Vec2,
    size: Vec2,
}

/// Straight-alpha pixels covering the part of a quad that is on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct WarpedImage {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub top_left: Vec2,
}

/// Resamples `src` so its corners land on `quad` (bottom-left,
/// bottom-right, top-right, top-left in screen pixels).
///
/// Only the part inside a `target` sized screen is produced; `None` when the
/// quad is off screen or degenerate. Alpha is scaled by `alpha / 255`.
pub fn warp_image(src: &RgbaImage, quad: &[Vec2; 4], alpha: u8, target: (u32, u32)) -> Option<WarpedImage> {
    let (sw, sh) = (src.width() as f64, src.height() as f64);
    if sw < 1.0 || sh < 1.0 {
        return None;
    }
    let corners = [Vec2::new(0.0, sh), Vec2::new(sw, sh), Vec2::new(sw, 0.0), Vec2::new(0.0, 0.0)];
    let to_src: Homography = Homography::from_correspondences(&corners, quad)?.inverse()?;

    let (lo, hi) = geometry::bounds(quad)?;
    let x0 = lo.x.floor().max(0.0) as u32;
    let y0 = lo.y.floor().max(0.0) as u32;
    let x1 = (hi.x.ceil().min(target.0 as f64)).max(0.0) as u32;
    let y1 = (hi.y.ceil().min(target.1 as f64)).max(0.0) as u32;
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let (width, height) = (x1 - x0, y1 - y0);
    let mut rgba = vec![0u8; width as usize * height as usize * 4];
    for (i, out) in rgba.chunks_exact_mut(4).enumerate() {
        let x = x0 + i as u32 % width;
        let y = y0 + i as u32 / width;
        let s = to_src.apply(Vec2::new(x as f64 + 0.5, y as f64 + 0.5));
        if !(s.x >= 0.0 && s.x < sw && s.y >= 0.0 && s.y < sh) {
            continue;
        }
        let mut texel = sample_bilinear(src, s);
        texel[3] = (texel[3] as u16 * alpha as u16 / 255) as u8;
        out.copy_from_slice(&texel);
    }
    Some(WarpedImage { rgba, width, height, top_left: Vec2::new(x0 as f64, y0 as f64) })
}

// Texel centers sit at +0.5; edges clamp.
fn sample_bilinear(src: &RgbaImage, s: Vec2) -> [u8; 4] {
    let (w, h) = (src.width() as i64, src.height() as i64);
    let fx = s.x - 0.5;
    let fy = s.y - 0.5;
    let (ix, iy) = (fx.floor(), fy.floor());
    let (tx, ty) = (fx - ix, fy - iy);
    let at = |x: i64, y: i64| {
        let p = src.get_pixel(x.clamp(0, w - 1) as u32, y.clamp(0, h - 1) as u32);
        p.0.map(f64::from)
    };
    let (ix, iy) = (ix as i64, iy as i64);
    let (a, b, c, d) = (at(ix, iy), at(ix + 1, iy), at(ix, iy + 1), at(ix + 1, iy + 1));
    let mut out = [0u8; 4];
    for k in 0..4 {
        let top = a[k] + (b[k] - a[k]) * tx;
        let bottom = c[k] + (d[k] - c[k]) * tx;
        out[k] = (top + (bottom - top) * ty).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Paints every field background, screen first, then by field name.
#[derive(Debug)]
pub struct BackgroundLayer {
    asset_dir: PathBuf,
    uploaded: HashMap<String, Uploaded>,
    // Last key that could not be loaded, so a bad file is not reread every frame.
    failed: HashMap<String, WarpKey>,
}

impl BackgroundLayer {
    pub fn new(asset_dir: impl Into<PathBuf>) -> Self {
        Self { asset_dir: asset_dir.into(), uploaded: HashMap::new(), failed: HashMap::new() }
    }

    pub fn asset_dir(&self) -> &Path {
        &self.asset_dir
    }

    /// Number of warped images currently held by the renderer.
    pub fn uploaded(&self) -> usize {
        self.uploaded.len()
    }

    pub fn draw(
        &mut self,
        fields: &FieldRegistry,
        backgrounds: &HashMap<String, FieldBackground>,
        renderer: &mut dyn Renderer,
        stats: &mut FrameStats,
    ) {
        let stale: Vec<String> = self
            .uploaded
            .keys()
            .filter(|name| !matches!(backgrounds.get(*name), Some(FieldBackground::Image { .. })))
            .cloned()
            .collect();
        for name in stale {
            if let Some(old) = self.uploaded.remove(&name) {
                renderer.release_image(old.image);
            }
        }
        self.failed.retain(|name, _| backgrounds.contains_key(name));

        let mut names: Vec<&String> = backgrounds.keys().collect();
        names.sort_by(|a, b| (*a != SCREEN, a).cmp(&(*b != SCREEN, b)));
        for name in names {
            let result = self.draw_one(name, &backgrounds[name], fields, renderer);
            stats.record(result, "background");
        }
    }

    fn draw_one(
        &mut self,
        name: &str,
        background: &FieldBackground,
        fields: &FieldRegistry,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        let field = fields.get(name).ok_or_else(|| OverlayError::not_found("field", name))?;
        let px = fields.convert(&field.local_points, name, SCREEN)?;
        let quad: [Vec2; 4] = [px[0], px[1], px[2], px[3]];

        match background {
            FieldBackground::Color { color, alpha } => {
                renderer.draw_polygon(&quad, scaled(*color, *alpha), 0.0)
            }
            FieldBackground::Image { alpha, .. } => {
                let path = background
                    .image_path(&self.asset_dir)
                    .ok_or_else(|| OverlayError::skipped("background has no image"))?;
                let key = WarpKey::new(path, *alpha, &quad, renderer.size());
                if let Some(up) = self.uploaded.get(name).filter(|u| u.key == key) {
                    // The backend may have evicted it; fall through and upload again.
                    if renderer.draw_image(up.image, up.top_left, up.size).is_ok() {
                        return Ok(());
                    }
                }
                if let Some(old) = self.uploaded.remove(name) {
                    renderer.release_image(old.image);
                }
                if self.failed.get(name) == Some(&key) {
                    return Err(OverlayError::skipped("background image unavailable"));
                }
                let up = match upload(key.clone(), &quad, renderer) {
                    Ok(up) => up,
                    Err(e) => {
                        log::warn!("background of '{name}' not drawn: {e}");
                        self.failed.insert(name.to_string(), key);
                        return Err(e);
                    }
                };
                self.failed.remove(name);
                let result = renderer.draw_image(up.image, up.top_left, up.size);
                self.uploaded.insert(name.to_string(), up);
                result
            }
        }
    }
}

fn upload(key: WarpKey, quad: &[Vec2; 4], renderer: &mut dyn Renderer) -> Result<Uploaded> {
    let src = image::open(&key.path)
        .map_err(|e| OverlayError::skipped(format!("image {}: {e}", key.path.display())))?
        .to_rgba8();
    let warped = warp_image(&src, quad, key.alpha, key.target)
        .ok_or_else(|| OverlayError::skipped("background quad is off screen"))?;
    let image = renderer.create_image(&warped.rgba, warped.width, warped.height)?;
    log::debug!(
        "uploaded background {} as {}x{}",
        key.path.display(),
        warped.width,
        warped.height
    );
    Ok(Uploaded {
        key,
        image,
        top_left: warped.top_left,
        size: Vec2::new(warped.width as f64, warped.height as f64),
    })
}

fn scaled(color: Rgba, alpha: u8) -> Rgba {
    color.with_alpha((color.a as u16 * alpha as u16 / 255) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverlayConfig;
    use crate::render::CpuRenderer;

    fn screen_fields(w: f64, h: f64) -> FieldRegistry {
        let mut reg = FieldRegistry::new();
        reg.register_field(
            SCREEN,
            [(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (0.0, 3.0)].map(Vec2::from),
            [(0.0, h), (w, h), (w, 0.0), (0.0, 0.0)].map(Vec2::from),
        )
        .unwrap();
        reg
    }

    fn renderer(w: u32, h: u32) -> CpuRenderer {
        let mut r = CpuRenderer::new(w, h, &OverlayConfig::default());
        r.init().unwrap();
        r.clear(Rgba::black());
        r
    }

    fn temp_png(name: &str, img: &RgbaImage) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bg-layer-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("floor.png");
        img.save(&path).unwrap();
        path
    }

    // ── warping ───────────────────────────────────────────────────────────

    #[test]
    fn identity_quad_copies_pixels() {
        let mut src = RgbaImage::new(4, 2);
        src.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        src.put_pixel(3, 1, image::Rgba([0, 0, 255, 255]));
        let quad = [(0.0, 2.0), (4.0, 2.0), (4.0, 0.0), (0.0, 0.0)].map(Vec2::from);
        let out = warp_image(&src, &quad, 255, (10, 10)).unwrap();
        assert_eq!((out.width, out.height), (4, 2));
        assert_eq!(&out.rgba[0..4], &[255, 0, 0, 255]);
        assert_eq!(&out.rgba[(4 + 3) * 4..][..4], &[0, 0, 255, 255]);
    }

    #[test]
    fn warp_is_clipped_to_the_screen_and_scales_alpha() {
        let src = RgbaImage::from_pixel(2, 2, image::Rgba([0, 255, 0, 255]));
        let quad = [(-10.0, 20.0), (30.0, 20.0), (30.0, -5.0), (-10.0, -5.0)].map(Vec2::from);
        let out = warp_image(&src, &quad, 128, (16, 8)).unwrap();
        assert_eq!(out.top_left, Vec2::zero());
        assert_eq!((out.width, out.height), (16, 8));
        assert!(out.rgba.chunks_exact(4).all(|p| p == [0, 255, 0, 128]));
    }

    #[test]
    fn off_screen_quad_warps_to_nothing() {
        let src = RgbaImage::from_pixel(2, 2, image::Rgba([255, 255, 255, 255]));
        let quad = [(50.0, 60.0), (70.0, 60.0), (70.0, 40.0), (50.0, 40.0)].map(Vec2::from);
        assert!(warp_image(&src, &quad, 255, (32, 32)).is_none());
    }

    // ── layer ─────────────────────────────────────────────────────────────

    #[test]
    fn color_background_fills_the_screen_quad() {
        let fields = screen_fields(40.0, 30.0);
        let mut r = renderer(40, 30);
        let mut layer = BackgroundLayer::new("assets");
        let bgs = HashMap::from([(
            SCREEN.to_string(),
            FieldBackground::Color { color: Rgba::rgb(0, 80, 0), alpha: 255 },
        )]);
        let mut stats = FrameStats::default();
        layer.draw(&fields, &bgs, &mut r, &mut stats);
        r.present().unwrap();
        assert_eq!(stats, FrameStats { drawn: 1, skipped: 0 });
        assert_eq!(r.frame().unwrap().pixel(20, 15), Some(Rgba::rgb(0, 80, 0)));
        assert_eq!(scaled(Rgba::white(), 128).a, 128);
    }

    #[test]
    fn image_background_is_uploaded_once_and_released_on_removal() {
        let img = RgbaImage::from_pixel(8, 6, image::Rgba([200, 30, 30, 255]));
        let path = temp_png("reuse", &img);
        let fields = screen_fields(40.0, 30.0);
        let mut r = renderer(40, 30);
        let mut layer = BackgroundLayer::new("unused");
        let mut bgs = HashMap::from([(SCREEN.to_string(), FieldBackground::Image { image: path, alpha: 255 })]);

        for _ in 0..3 {
            let mut stats = FrameStats::default();
            r.clear(Rgba::black());
            layer.draw(&fields, &bgs, &mut r, &mut stats);
            assert_eq!(stats.skipped, 0);
        }
        r.present().unwrap();
        assert_eq!(r.frame().unwrap().pixel(20, 15), Some(Rgba::rgb(200, 30, 30)));
        assert_eq!(layer.uploaded(), 1);
        assert_eq!(r.image_count(), 1);

        bgs.clear();
        layer.draw(&fields, &bgs, &mut r, &mut FrameStats::default());
        assert_eq!(layer.uploaded(), 0);
        assert_eq!(r.image_count(), 0);
    }

    #[test]
    fn missing_image_is_a_skipped_draw() {
        let fields = screen_fields(40.0, 30.0);
        let mut r = renderer(40, 30);
        let mut layer = BackgroundLayer::new(std::env::temp_dir().join("no-such-asset-dir"));
        let bgs = HashMap::from([(
            SCREEN.to_string(),
            FieldBackground::Image { image: "missing.png".into(), alpha: 255 },
        )]);
        for _ in 0..2 {
            let mut stats = FrameStats::default();
            layer.draw(&fields, &bgs, &mut r, &mut stats);
            assert_eq!(stats.skipped, 1);
        }
        assert_eq!(layer.uploaded(), 0);
        assert_eq!(r.image_count(), 0);
    }
}
