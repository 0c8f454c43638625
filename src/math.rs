//! Planar Math Primitives
//!
//! Small value types used by every stage of the pipeline.
//!
//! # Types
//!
//! - `Vec2` / `Vec3`: column vectors with full operator overloading
//! - `Mat22` / `Mat33`: small matrices for effective-mass solves
//! - `Rot`: rotation stored as sine/cosine
//! - `Transform`: rigid frame (translation + rotation)
//! - `Sweep`: center-of-mass motion over a step, used by time of impact
//!
//! # Determinism
//!
//! All operations are plain IEEE 754 single precision with a fixed evaluation
//! order. Running the same world twice on the same build produces
//! bit-identical state; nothing here consults a clock or a random source.

use core::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Machine epsilon for `f32`, used by degenerate-case guards.
pub const EPSILON: f32 = f32::EPSILON;

/// Check that a scalar is neither NaN nor infinite.
#[inline]
#[must_use]
pub fn is_valid(x: f32) -> bool {
    x.is_finite()
}

// ============================================================================
// Vec2: 2D Vector
// ============================================================================

/// 2D column vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vec2 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
}

impl Vec2 {
    /// Zero vector (0, 0)
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Unit X vector (1, 0)
    pub const UNIT_X: Self = Self { x: 1.0, y: 0.0 };

    /// Unit Y vector (0, 1)
    pub const UNIT_Y: Self = Self { x: 0.0, y: 1.0 };

    /// Create a new vector.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Dot product.
    #[inline]
    #[must_use]
    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y
    }

    /// 2D cross product (returns a scalar: `a.x * b.y - a.y * b.x`).
    #[inline]
    #[must_use]
    pub fn cross(self, rhs: Self) -> f32 {
        self.x * rhs.y - self.y * rhs.x
    }

    /// Cross product of this vector with a scalar: `(s * y, -s * x)`.
    #[inline]
    #[must_use]
    pub fn cross_scalar(self, s: f32) -> Self {
        Self::new(s * self.y, -s * self.x)
    }

    /// Cross product of a scalar with a vector: `(-s * y, s * x)`.
    ///
    /// This is the velocity contribution `ω × r` of an angular velocity.
    #[inline]
    #[must_use]
    pub fn scalar_cross(s: f32, v: Self) -> Self {
        Self::new(-s * v.y, s * v.x)
    }

    /// Squared length (avoids sqrt).
    #[inline]
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    /// Length (magnitude).
    #[inline]
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Normalize in place and return the original length.
    ///
    /// Vectors shorter than `EPSILON` are left untouched and `0.0` is returned.
    #[inline]
    pub fn normalize(&mut self) -> f32 {
        let length = self.length();
        if length < EPSILON {
            return 0.0;
        }
        let inv = 1.0 / length;
        self.x *= inv;
        self.y *= inv;
        length
    }

    /// Unit-length copy. Returns `ZERO` for near-zero vectors.
    #[inline]
    #[must_use]
    pub fn normalized(self) -> Self {
        let length = self.length();
        if length < EPSILON {
            Self::ZERO
        } else {
            self * (1.0 / length)
        }
    }

    /// Counter-clockwise perpendicular `(-y, x)`.
    #[inline]
    #[must_use]
    pub fn skew(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Distance between two points.
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Squared distance between two points.
    #[inline]
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        (self - other).length_squared()
    }

    /// Component-wise minimum.
    #[inline]
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y))
    }

    /// Component-wise maximum.
    #[inline]
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y))
    }

    /// Component-wise absolute value.
    #[inline]
    #[must_use]
    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs())
    }

    /// Linear interpolation toward `other`.
    #[inline]
    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        self * (1.0 - t) + other * t
    }

    /// Both components finite.
    #[inline]
    #[must_use]
    pub fn is_valid(self) -> bool {
        is_valid(self.x) && is_valid(self.y)
    }
}

impl Add for Vec2 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul<Vec2> for f32 {
    type Output = Vec2;

    #[inline]
    fn mul(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self * rhs.x, self * rhs.y)
    }
}

impl MulAssign<f32> for Vec2 {
    #[inline]
    fn mul_assign(&mut self, rhs: f32) {
        self.x *= rhs;
        self.y *= rhs;
    }
}

impl Div<f32> for Vec2 {
    type Output = Self;

    #[inline]
    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

// ============================================================================
// Vec3: 3x3 joint solves
// ============================================================================

/// 3D column vector (x, y, angular) for point + angle joint rows.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Zero vector
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Create a new vector.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    #[inline]
    #[must_use]
    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Cross product.
    #[inline]
    #[must_use]
    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    /// The (x, y) part.
    #[inline]
    #[must_use]
    pub fn xy(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl MulAssign<f32> for Vec3 {
    #[inline]
    fn mul_assign(&mut self, rhs: f32) {
        self.x *= rhs;
        self.y *= rhs;
        self.z *= rhs;
    }
}

impl Neg for Vec3 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ============================================================================
// Mat22 / Mat33
// ============================================================================

/// 2x2 matrix stored column-major.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Mat22 {
    /// First column
    pub ex: Vec2,
    /// Second column
    pub ey: Vec2,
}

impl Mat22 {
    /// Zero matrix
    pub const ZERO: Self = Self {
        ex: Vec2::ZERO,
        ey: Vec2::ZERO,
    };

    /// Construct from columns.
    #[inline]
    #[must_use]
    pub const fn from_cols(ex: Vec2, ey: Vec2) -> Self {
        Self { ex, ey }
    }

    /// Inverse, or the zero matrix when singular.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let (a, b, c, d) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a * d - b * c;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Self {
            ex: Vec2::new(det * d, -det * c),
            ey: Vec2::new(-det * b, det * a),
        }
    }

    /// Solve `A * x = b` without forming the inverse. Singular matrices yield zero.
    #[must_use]
    pub fn solve(&self, b: Vec2) -> Vec2 {
        let (a11, a12, a21, a22) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a11 * a22 - a12 * a21;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
    }

    /// Matrix-vector product.
    #[inline]
    #[must_use]
    pub fn mul_vec(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.ex.x * v.x + self.ey.x * v.y,
            self.ex.y * v.x + self.ey.y * v.y,
        )
    }
}

/// 3x3 matrix stored column-major.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Mat33 {
    /// First column
    pub ex: Vec3,
    /// Second column
    pub ey: Vec3,
    /// Third column
    pub ez: Vec3,
}

impl Mat33 {
    /// Zero matrix
    pub const ZERO: Self = Self {
        ex: Vec3::ZERO,
        ey: Vec3::ZERO,
        ez: Vec3::ZERO,
    };

    /// Solve `A * x = b`. Singular matrices yield zero.
    #[must_use]
    pub fn solve33(&self, b: Vec3) -> Vec3 {
        let mut det = self.ex.dot(self.ey.cross(self.ez));
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec3::new(
            det * b.dot(self.ey.cross(self.ez)),
            det * self.ex.dot(b.cross(self.ez)),
            det * self.ex.dot(self.ey.cross(b)),
        )
    }

    /// Solve the upper 2x2 block `A * x = b`. Singular blocks yield zero.
    #[must_use]
    pub fn solve22(&self, b: Vec2) -> Vec2 {
        let (a11, a12, a21, a22) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a11 * a22 - a12 * a21;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
    }

    /// Inverse of the upper 2x2 block, embedded in a 3x3 with zero third row/column.
    #[must_use]
    pub fn inverse22(&self) -> Self {
        let (a, b, c, d) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a * d - b * c;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Self {
            ex: Vec3::new(det * d, -det * c, 0.0),
            ey: Vec3::new(-det * b, det * a, 0.0),
            ez: Vec3::ZERO,
        }
    }

    /// Inverse of a symmetric matrix. Singular matrices yield zero.
    #[must_use]
    pub fn sym_inverse33(&self) -> Self {
        let mut det = self.ex.dot(self.ey.cross(self.ez));
        if det != 0.0 {
            det = 1.0 / det;
        }

        let (a11, a12, a13) = (self.ex.x, self.ey.x, self.ez.x);
        let (a22, a23) = (self.ey.y, self.ez.y);
        let a33 = self.ez.z;

        let ex = Vec3::new(
            det * (a22 * a33 - a23 * a23),
            det * (a13 * a23 - a12 * a33),
            det * (a12 * a23 - a13 * a22),
        );
        let ey = Vec3::new(ex.y, det * (a11 * a33 - a13 * a13), det * (a13 * a12 - a11 * a23));
        let ez = Vec3::new(ex.z, ey.z, det * (a11 * a22 - a12 * a12));
        Self { ex, ey, ez }
    }

    /// Matrix-vector product.
    #[inline]
    #[must_use]
    pub fn mul_vec(&self, v: Vec3) -> Vec3 {
        self.ex * v.x + self.ey * v.y + self.ez * v.z
    }

    /// Product with the upper 2x2 block.
    #[inline]
    #[must_use]
    pub fn mul_vec22(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.ex.x * v.x + self.ey.x * v.y,
            self.ex.y * v.x + self.ey.y * v.y,
        )
    }
}

// ============================================================================
// Rot
// ============================================================================

/// Rotation stored as sine and cosine of the angle.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rot {
    /// Sine
    pub s: f32,
    /// Cosine
    pub c: f32,
}

impl Rot {
    /// Identity rotation
    pub const IDENTITY: Self = Self { s: 0.0, c: 1.0 };

    /// Rotation from an angle in radians.
    #[inline]
    #[must_use]
    pub fn from_angle(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self { s, c }
    }

    /// Angle in radians.
    #[inline]
    #[must_use]
    pub fn angle(self) -> f32 {
        self.s.atan2(self.c)
    }

    /// Rotated X axis.
    #[inline]
    #[must_use]
    pub fn x_axis(self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    /// Rotated Y axis.
    #[inline]
    #[must_use]
    pub fn y_axis(self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Rotate a vector.
    #[inline]
    #[must_use]
    pub fn apply(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Inverse-rotate a vector.
    #[inline]
    #[must_use]
    pub fn apply_inv(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// Compose rotations: `self * rhs`.
    #[inline]
    #[must_use]
    pub fn mul(self, rhs: Self) -> Self {
        Self {
            s: self.s * rhs.c + self.c * rhs.s,
            c: self.c * rhs.c - self.s * rhs.s,
        }
    }

    /// Transpose-compose: `self^T * rhs`.
    #[inline]
    #[must_use]
    pub fn mul_inv(self, rhs: Self) -> Self {
        Self {
            s: self.c * rhs.s - self.s * rhs.c,
            c: self.c * rhs.c + self.s * rhs.s,
        }
    }
}

impl Default for Rot {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ============================================================================
// Transform
// ============================================================================

/// Rigid transform: translation and rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Transform {
    /// Translation
    pub p: Vec2,
    /// Rotation
    pub q: Rot,
}

impl Transform {
    /// Identity transform
    pub const IDENTITY: Self = Self {
        p: Vec2::ZERO,
        q: Rot::IDENTITY,
    };

    /// Transform from a position and an angle.
    #[inline]
    #[must_use]
    pub fn new(p: Vec2, angle: f32) -> Self {
        Self {
            p,
            q: Rot::from_angle(angle),
        }
    }

    /// Map a local point to world space.
    #[inline]
    #[must_use]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        self.q.apply(v) + self.p
    }

    /// Map a world point to local space.
    #[inline]
    #[must_use]
    pub fn apply_inv(&self, v: Vec2) -> Vec2 {
        self.q.apply_inv(v - self.p)
    }

    /// Compose: `self * rhs` (apply `rhs`, then `self`).
    #[inline]
    #[must_use]
    pub fn mul(&self, rhs: &Self) -> Self {
        Self {
            q: self.q.mul(rhs.q),
            p: self.q.apply(rhs.p) + self.p,
        }
    }

    /// Relative transform `self^-1 * rhs`.
    #[inline]
    #[must_use]
    pub fn mul_inv(&self, rhs: &Self) -> Self {
        Self {
            q: self.q.mul_inv(rhs.q),
            p: self.q.apply_inv(rhs.p - self.p),
        }
    }
}

// ============================================================================
// Sweep
// ============================================================================

/// Motion of a body's center of mass across one step.
///
/// Shapes are defined relative to the body origin, which may not coincide
/// with the center of mass; `local_center` bridges the two.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sweep {
    /// Local center of mass position
    pub local_center: Vec2,
    /// Center world position at `alpha0`
    pub c0: Vec2,
    /// Center world position at the end of the step
    pub c: Vec2,
    /// World angle at `alpha0`
    pub a0: f32,
    /// World angle at the end of the step
    pub a: f32,
    /// Fraction of the current step already consumed, in [0, 1)
    pub alpha0: f32,
}

impl Sweep {
    /// Interpolated transform at `beta` in [0, 1], where 0 is `alpha0`.
    #[must_use]
    pub fn transform(&self, beta: f32) -> Transform {
        let center = self.c0 * (1.0 - beta) + self.c * beta;
        let angle = (1.0 - beta) * self.a0 + beta * self.a;
        let q = Rot::from_angle(angle);
        Transform {
            p: center - q.apply(self.local_center),
            q,
        }
    }

    /// Advance the start of the sweep forward to `alpha`.
    pub fn advance(&mut self, alpha: f32) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += (self.c - self.c0) * beta;
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Wrap angles into [-2π, 2π] keeping their difference.
    pub fn normalize(&mut self) {
        let two_pi = 2.0 * core::f32::consts::PI;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a -= d;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cross_identities() {
        let a = Vec2::new(2.0, 3.0);
        let b = Vec2::new(-1.0, 4.0);
        assert_relative_eq!(a.cross(b), 11.0);
        assert_eq!(a.cross_scalar(1.0), Vec2::new(3.0, -2.0));
        assert_eq!(Vec2::scalar_cross(1.0, a), Vec2::new(-3.0, 2.0));
        assert_eq!(a.skew(), Vec2::scalar_cross(1.0, a));
    }

    #[test]
    fn test_normalize_zero_is_safe() {
        let mut v = Vec2::ZERO;
        assert_eq!(v.normalize(), 0.0);
        assert_eq!(v, Vec2::ZERO);
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
    }

    #[test]
    fn test_transform_roundtrip() {
        let xf = Transform::new(Vec2::new(1.0, -2.0), 0.7);
        let p = Vec2::new(3.0, 0.5);
        let back = xf.apply_inv(xf.apply(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-5);

        let other = Transform::new(Vec2::new(-4.0, 1.0), -1.3);
        let rel = xf.mul_inv(&other);
        let composed = xf.mul(&rel);
        assert_relative_eq!(composed.p.x, other.p.x, epsilon = 1e-5);
        assert_relative_eq!(composed.q.angle(), other.q.angle(), epsilon = 1e-5);
    }

    #[test]
    fn test_mat22_solve() {
        let m = Mat22::from_cols(Vec2::new(4.0, 1.0), Vec2::new(2.0, 3.0));
        let x = m.solve(Vec2::new(8.0, 7.0));
        let b = m.mul_vec(x);
        assert_relative_eq!(b.x, 8.0, epsilon = 1e-5);
        assert_relative_eq!(b.y, 7.0, epsilon = 1e-5);
        assert_eq!(Mat22::ZERO.solve(Vec2::new(1.0, 1.0)), Vec2::ZERO);
    }

    #[test]
    fn test_mat33_sym_inverse() {
        let m = Mat33 {
            ex: Vec3::new(3.0, 1.0, 0.5),
            ey: Vec3::new(1.0, 2.0, 0.25),
            ez: Vec3::new(0.5, 0.25, 1.0),
        };
        let inv = m.sym_inverse33();
        let v = Vec3::new(1.0, -2.0, 0.5);
        let r = m.mul_vec(inv.mul_vec(v));
        assert_relative_eq!(r.x, v.x, epsilon = 1e-4);
        assert_relative_eq!(r.y, v.y, epsilon = 1e-4);
        assert_relative_eq!(r.z, v.z, epsilon = 1e-4);
    }

    #[test]
    fn test_sweep_advance() {
        let mut sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: Vec2::ZERO,
            c: Vec2::new(10.0, 0.0),
            a0: 0.0,
            a: 1.0,
            alpha0: 0.0,
        };
        sweep.advance(0.5);
        assert_relative_eq!(sweep.c0.x, 5.0);
        assert_relative_eq!(sweep.a0, 0.5);
        let xf = sweep.transform(1.0);
        assert_relative_eq!(xf.p.x, 10.0);
    }
}
