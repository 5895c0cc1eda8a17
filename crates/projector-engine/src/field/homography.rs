use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use crate::coords::Vec2;

/// Below this the homogeneous `w` is treated as the line at infinity.
const W_EPSILON: f64 = 1e-12;

/// 3×3 projective transform acting on homogeneous 2D points.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Homography {
    m: Matrix3<f64>,
}

impl Homography {
    #[inline]
    pub fn identity() -> Self {
        Self { m: Matrix3::identity() }
    }

    #[inline]
    pub fn from_matrix(m: Matrix3<f64>) -> Self {
        Self { m }
    }

    #[inline]
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    /// Exact transform taking each `src[i]` to `dst[i]`.
    ///
    /// Four correspondences fix the eight unknowns (h22 = 1), so this is a
    /// square 8×8 solve rather than a least-squares fit. Returns `None` when
    /// the system is singular, i.e. three of the points are collinear.
    pub fn from_correspondences(src: &[Vec2; 4], dst: &[Vec2; 4]) -> Option<Self> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            let r = 2 * i;
            let (x, y, u, v) = (s.x, s.y, d.x, d.y);

            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -u * x;
            a[(r, 7)] = -u * y;
            b[r] = u;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -v * x;
            a[(r + 1, 7)] = -v * y;
            b[r + 1] = v;
        }

        let h = a.lu().solve(&b)?;
        if h.iter().any(|c| !c.is_finite()) {
            return None;
        }

        Some(Self {
            m: Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0),
        })
    }

    pub fn inverse(&self) -> Option<Self> {
        self.m.try_inverse().map(|m| Self { m })
    }

    /// Applies `self` first, then `next`.
    #[inline]
    pub fn then(&self, next: &Homography) -> Self {
        Self { m: next.m * self.m }
    }

    /// Maps a point. Points sent to infinity come back non-finite.
    #[inline]
    pub fn apply(&self, p: Vec2) -> Vec2 {
        let v = self.m * Vector3::new(p.x, p.y, 1.0);
        if v.z.abs() < W_EPSILON {
            return Vec2::new(f64::NAN, f64::NAN);
        }
        Vec2::new(v.x / v.z, v.y / v.z)
    }

    /// True when the bottom row is `[0, 0, 1]` up to scale, i.e. no perspective term.
    pub fn is_affine(&self) -> bool {
        let scale = self.m[(2, 2)];
        scale.abs() > W_EPSILON
            && (self.m[(2, 0)] / scale).abs() < 1e-12
            && (self.m[(2, 1)] / scale).abs() < 1e-12
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}
