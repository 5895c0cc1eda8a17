use serde::{Deserialize, Serialize};

/// Straight-alpha RGBA color with 8-bit channels.
///
/// This is the storage and wire representation. Backends convert to their own
/// blending space (see [`Rgba::to_premul_f32`]).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[u8; 4]")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    #[inline]
    pub const fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    #[inline]
    pub const fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    #[inline]
    pub const fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Opaque draws take the fast path in both backends.
    #[inline]
    pub const fn is_opaque(self) -> bool {
        self.a == 255
    }

    #[inline]
    pub const fn is_invisible(self) -> bool {
        self.a == 0
    }

    #[inline]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Channel-wise interpolation, alpha included. `t` is clamped to `[0, 1]`.
    pub fn lerp(self, other: Rgba, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Self::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }

    /// Premultiplied `[r, g, b, a]` in `[0, 1]`, the layout GPU blending expects.
    #[inline]
    pub fn to_premul_f32(self) -> [f32; 4] {
        let a = self.a as f32 / 255.0;
        [
            self.r as f32 / 255.0 * a,
            self.g as f32 / 255.0 * a,
            self.b as f32 / 255.0 * a,
            a,
        ]
    }

    #[inline]
    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<Rgba> for [u8; 4] {
    #[inline]
    fn from(c: Rgba) -> Self {
        c.to_array()
    }
}

impl From<[u8; 4]> for Rgba {
    #[inline]
    fn from(c: [u8; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }
}

/// Accepts `[r, g, b]` (opaque) or `[r, g, b, a]`; channels are clamped to `0..=255`.
impl TryFrom<Vec<f64>> for Rgba {
    type Error = String;

    fn try_from(v: Vec<f64>) -> Result<Self, Self::Error> {
        if v.len() < 3 {
            return Err(format!("color needs 3 or 4 channels, got {}", v.len()));
        }
        if v.iter().any(|c| !c.is_finite()) {
            return Err("color channels must be finite".to_string());
        }
        let ch = |c: f64| c.clamp(0.0, 255.0).round() as u8;
        let a = v.get(3).copied().map_or(255, ch);
        Ok(Self::new(ch(v[0]), ch(v[1]), ch(v[2]), a))
    }
}
