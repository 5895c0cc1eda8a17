//! Draw-call validation shared by both backends.
//!
//! Every check returns `RenderSkipped` with a short reason; callers log and
//! continue with the next draw.

use crate::coords::Vec2;
use crate::error::{OverlayError, Result};

/// Coordinates beyond this magnitude are treated as garbage (typically a point
/// that crossed the projective horizon).
pub const MAX_COORD: f64 = 1.0e6;

/// Largest accepted radius, border, line width or font size.
pub const MAX_EXTENT: f64 = 1.0e5;

#[inline]
pub fn point(p: Vec2) -> Result<()> {
    if p.is_finite() && p.x.abs() <= MAX_COORD && p.y.abs() <= MAX_COORD {
        Ok(())
    } else {
        Err(OverlayError::skipped(format!("point ({}, {}) is out of range", p.x, p.y)))
    }
}

pub fn points(ps: &[Vec2], min: usize) -> Result<()> {
    if ps.len() < min {
        return Err(OverlayError::skipped(format!(
            "need at least {min} points, got {}",
            ps.len()
        )));
    }
    ps.iter().try_for_each(|p| point(*p))
}

/// Strictly positive length such as a radius or a stroke width.
pub fn positive(what: &str, v: f64) -> Result<()> {
    if v.is_finite() && v > 0.0 && v <= MAX_EXTENT {
        Ok(())
    } else {
        Err(OverlayError::skipped(format!("{what} {v} is out of range")))
    }
}

/// Border width: `0` means filled.
pub fn border(v: f64) -> Result<()> {
    if v == 0.0 { Ok(()) } else { positive("border", v) }
}

pub fn text(s: &str, size_px: f64) -> Result<()> {
    if s.is_empty() {
        return Err(OverlayError::skipped("empty text"));
    }
    positive("font size", size_px)
}

pub fn image_data(rgba: &[u8], width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(OverlayError::skipped(format!("image size {width}x{height} is empty")));
    }
    let want = width as usize * height as usize * 4;
    if rgba.len() != want {
        return Err(OverlayError::skipped(format!(
            "image data is {} bytes, expected {want}",
            rgba.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_parameters() {
        assert!(point(Vec2::new(f64::NAN, 0.0)).is_err());
        assert!(point(Vec2::new(2.0e6, 0.0)).is_err());
        assert!(positive("radius", -1.0).is_err());
        assert!(positive("radius", 0.0).is_err());
        assert!(border(-2.0).is_err());
        assert!(text("", 24.0).is_err());
        assert!(points(&[Vec2::zero(), Vec2::zero()], 3).is_err());
        assert!(image_data(&[0; 15], 2, 2).is_err());
    }

    #[test]
    fn accepts_good_parameters() {
        assert!(point(Vec2::new(1919.0, -5.0)).is_ok());
        assert!(border(0.0).is_ok());
        assert!(border(2.0).is_ok());
        assert!(text("r1", 24.0).is_ok());
        assert!(image_data(&[0; 16], 2, 2).is_ok());
    }

    #[test]
    fn skips_are_not_fatal() {
        let err = positive("width", f64::INFINITY).unwrap_err();
        assert!(matches!(err, OverlayError::RenderSkipped(_)));
        assert!(!err.is_fatal());
    }
}
