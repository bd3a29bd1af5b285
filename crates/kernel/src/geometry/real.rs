use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Scalar type that geometry evaluators are generic over.
///
/// `f64` is the plain value path. [`Dual`] carries a first-order
/// derivative alongside the value, so running the same evaluator over
/// `Dual` yields the derivative of every output with respect to whatever
/// the inputs were seeded with.
pub trait Real:
    Copy
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// Constant with zero derivative.
    fn cst(value: f64) -> Self;
    /// Rebuild from a value and a derivative. `f64` drops the derivative.
    fn from_parts(value: f64, deriv: f64) -> Self;
    fn value(self) -> f64;
    fn deriv(self) -> f64;
    fn sqrt(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn abs(self) -> Self;

    /// Multiply by a plain constant.
    fn scale(self, k: f64) -> Self {
        self * Self::cst(k)
    }

    /// Non-negative integer power by repeated multiplication.
    fn powi(self, n: u32) -> Self {
        let mut acc = Self::cst(1.0);
        for _ in 0..n {
            acc = acc * self;
        }
        acc
    }
}

impl Real for f64 {
    fn cst(value: f64) -> Self {
        value
    }

    fn from_parts(value: f64, _deriv: f64) -> Self {
        value
    }

    fn value(self) -> f64 {
        self
    }

    fn deriv(self) -> f64 {
        0.0
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    fn sin(self) -> Self {
        f64::sin(self)
    }

    fn cos(self) -> Self {
        f64::cos(self)
    }

    fn abs(self) -> Self {
        f64::abs(self)
    }
}

// ─── Dual numbers ───────────────────────────────────────────────

/// Forward-mode dual number: `val + dot·ε` with `ε² = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dual {
    pub val: f64,
    pub dot: f64,
}

impl Dual {
    #[inline]
    pub const fn new(val: f64, dot: f64) -> Self {
        Self { val, dot }
    }

    #[inline]
    pub const fn constant(val: f64) -> Self {
        Self { val, dot: 0.0 }
    }

    /// Seed an input variable (derivative one).
    #[inline]
    pub const fn variable(val: f64) -> Self {
        Self { val, dot: 1.0 }
    }
}

impl Add for Dual {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.val + rhs.val, self.dot + rhs.dot)
    }
}

impl Sub for Dual {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.val - rhs.val, self.dot - rhs.dot)
    }
}

impl Mul for Dual {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.val * rhs.val, self.val * rhs.dot + self.dot * rhs.val)
    }
}

impl Div for Dual {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        let inv = 1.0 / rhs.val;
        Self::new(
            self.val * inv,
            (self.dot * rhs.val - self.val * rhs.dot) * inv * inv,
        )
    }
}

impl Neg for Dual {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.val, -self.dot)
    }
}

impl Real for Dual {
    fn cst(value: f64) -> Self {
        Self::constant(value)
    }

    fn from_parts(value: f64, deriv: f64) -> Self {
        Self::new(value, deriv)
    }

    fn value(self) -> f64 {
        self.val
    }

    fn deriv(self) -> f64 {
        self.dot
    }

    fn sqrt(self) -> Self {
        let s = self.val.sqrt();
        // d/dx sqrt(x) is unbounded at 0; report a zero slope there.
        let d = if s > 0.0 { self.dot / (2.0 * s) } else { 0.0 };
        Self::new(s, d)
    }

    fn sin(self) -> Self {
        Self::new(self.val.sin(), self.dot * self.val.cos())
    }

    fn cos(self) -> Self {
        Self::new(self.val.cos(), -self.dot * self.val.sin())
    }

    fn abs(self) -> Self {
        if self.val < 0.0 { -self } else { self }
    }
}

/// Zip values and derivatives into duals. Missing derivatives are zero.
pub fn lift(values: &[f64], dots: &[f64]) -> Vec<Dual> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| Dual::new(*v, dots.get(i).copied().unwrap_or(0.0)))
        .collect()
}

/// Split any real sequence into its value and derivative parts.
pub fn split<R: Real>(reals: &[R]) -> (Vec<f64>, Vec<f64>) {
    reals.iter().map(|r| (r.value(), r.deriv())).unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finite_difference(f: impl Fn(f64) -> f64, x: f64) -> f64 {
        let h = 1e-6;
        (f(x + h) - f(x - h)) / (2.0 * h)
    }

    #[test]
    fn test_product_rule() {
        let x = Dual::variable(3.0);
        let y = x * x * Dual::constant(2.0);
        assert!((y.val - 18.0).abs() < 1e-12);
        assert!((y.dot - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_quotient_rule() {
        let x = Dual::variable(2.0);
        let y = Dual::constant(1.0) / x;
        assert!((y.dot + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_trig_matches_finite_difference() {
        let x = 0.7;
        let d = Dual::variable(x);
        let y = d.sin() * d.cos() + d.sqrt();
        let fd = finite_difference(|t| t.sin() * t.cos() + t.sqrt(), x);
        assert!((y.dot - fd).abs() < 1e-8);
    }

    #[test]
    fn test_sqrt_at_zero_has_zero_slope() {
        let y = Dual::variable(0.0).sqrt();
        assert_eq!(y.val, 0.0);
        assert_eq!(y.dot, 0.0);
    }

    #[test]
    fn test_value_arithmetic_matches_f64() {
        let a = 1.0 / 3.0;
        let b = 7.0_f64.sqrt();
        let plain = (a * b - a / b).sqrt();
        let dual = (Dual::variable(a) * Dual::constant(b) - Dual::variable(a) / Dual::constant(b)).sqrt();
        assert_eq!(plain, dual.val);
    }

    #[test]
    fn test_lift_and_split() {
        let duals = lift(&[1.0, 2.0], &[0.5]);
        assert_eq!(duals[1], Dual::new(2.0, 0.0));
        let (v, d) = split(&duals);
        assert_eq!(v, vec![1.0, 2.0]);
        assert_eq!(d, vec![0.5, 0.0]);
    }

    #[test]
    fn test_powi() {
        let y = Dual::variable(2.0).powi(3);
        assert!((y.val - 8.0).abs() < 1e-12);
        assert!((y.dot - 12.0).abs() < 1e-12);
    }
}
