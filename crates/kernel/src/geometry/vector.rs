use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

use super::real::Real;

/// A vector in 3D Euclidean space over any [`Real`] scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3<R = f64> {
    pub x: R,
    pub y: R,
    pub z: R,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
    pub const X: Self = Self {
        x: 1.0,
        y: 0.0,
        z: 0.0,
    };
    pub const Y: Self = Self {
        x: 0.0,
        y: 1.0,
        z: 0.0,
    };
    pub const Z: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 1.0,
    };

    pub fn from_array(arr: [f64; 3]) -> Self {
        Self {
            x: arr[0],
            y: arr[1],
            z: arr[2],
        }
    }

    /// Embed into another scalar type as a constant.
    pub fn lift<R: Real>(&self) -> Vec3<R> {
        Vec3::new(R::cst(self.x), R::cst(self.y), R::cst(self.z))
    }

    pub fn distance_to(&self, other: &Self) -> f64 {
        (*self - *other).length()
    }
}

impl<R: Real> Vec3<R> {
    pub fn new(x: R, y: R, z: R) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(R::cst(0.0), R::cst(0.0), R::cst(0.0))
    }

    /// Read three consecutive scalars.
    pub fn from_slice(s: &[R]) -> Self {
        Self::new(s[0], s[1], s[2])
    }

    pub fn from_parts(value: [f64; 3], deriv: [f64; 3]) -> Self {
        Self::new(
            R::from_parts(value[0], deriv[0]),
            R::from_parts(value[1], deriv[1]),
            R::from_parts(value[2], deriv[2]),
        )
    }

    pub fn dot(&self, other: &Self) -> R {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn length(&self) -> R {
        self.dot(self).sqrt()
    }

    /// Divide by the length. Callers guarantee a non-degenerate vector.
    pub fn normalize(&self) -> Self {
        let inv = R::cst(1.0) / self.length();
        *self * inv
    }

    pub fn scale(&self, k: f64) -> Self {
        *self * R::cst(k)
    }

    pub fn value(&self) -> Vec3 {
        Vec3::new(self.x.value(), self.y.value(), self.z.value())
    }

    pub fn deriv(&self) -> Vec3 {
        Vec3::new(self.x.deriv(), self.y.deriv(), self.z.deriv())
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x.value(), self.y.value(), self.z.value()]
    }

    pub fn deriv_array(&self) -> [f64; 3] {
        [self.x.deriv(), self.y.deriv(), self.z.deriv()]
    }

    pub fn push_into(&self, out: &mut Vec<R>) {
        out.extend_from_slice(&[self.x, self.y, self.z]);
    }
}

impl<R: Real> Add for Vec3<R> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl<R: Real> Sub for Vec3<R> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl<R: Real> Mul<R> for Vec3<R> {
    type Output = Self;
    fn mul(self, rhs: R) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl<R: Real> Neg for Vec3<R> {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::real::Dual;

    #[test]
    fn test_dot_product() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert!((a.dot(&b) - 32.0).abs() < 1e-12);
    }

    #[test]
    fn test_cross_product() {
        let result = Vec3::X.cross(&Vec3::Y);
        assert!((result.x - Vec3::Z.x).abs() < 1e-12);
        assert!((result.y - Vec3::Z.y).abs() < 1e-12);
        assert!((result.z - Vec3::Z.z).abs() < 1e-12);
    }

    #[test]
    fn test_normalize() {
        let v = Vec3::new(3.0, 0.0, 4.0);
        let n = v.normalize();
        assert!((n.length() - 1.0).abs() < 1e-12);
        assert!((n.x - 0.6).abs() < 1e-12);
        assert!((n.z - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_derivative_is_orthogonal() {
        // d/ds of a unit vector is perpendicular to it.
        let v = Vec3::new(Dual::new(3.0, 0.2), Dual::new(1.0, -0.7), Dual::new(4.0, 0.1));
        let n = v.normalize();
        let along = n.value().dot(&n.deriv());
        assert!(along.abs() < 1e-12);
    }

    #[test]
    fn test_lift_has_zero_derivative() {
        let v: Vec3<Dual> = Vec3::new(1.0, 2.0, 3.0).lift();
        assert_eq!(v.deriv(), Vec3::ZERO);
        assert_eq!(v.value(), Vec3::new(1.0, 2.0, 3.0));
    }
}
