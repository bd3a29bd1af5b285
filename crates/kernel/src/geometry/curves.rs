use serde::{Deserialize, Serialize};
use std::fmt;

use super::bspline::{BSplineCurve, CurvePoint};
use super::real::Real;
use super::vector::Vec3;
use crate::error::KernelError;

/// Curve variants understood by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveKind {
    Line,
    Circle,
    BSpline,
}

impl fmt::Display for CurveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CurveKind::Line => "Line",
            CurveKind::Circle => "Circle",
            CurveKind::BSpline => "BSpline",
        };
        f.write_str(name)
    }
}

/// Analytic and parametric curve representations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Curve<R = f64> {
    Line(Line3d<R>),
    Circle(Circle3d<R>),
    BSpline(BSplineCurve<R>),
}

/// An unbounded line `origin + t * direction`. The direction is not
/// normalised, so the parameter scales with its length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line3d<R = f64> {
    pub origin: Vec3<R>,
    pub direction: Vec3<R>,
}

impl<R: Real> Line3d<R> {
    pub fn evaluate(&self, t: R) -> CurvePoint<R> {
        CurvePoint {
            pos: self.origin + self.direction * t,
            d1: self.direction,
            d2: Vec3::zero(),
        }
    }
}

/// A circle in 3D space, parameterised by angle in radians.
///
/// The stored axes need not be unit or orthogonal; evaluation normalises
/// the x-axis and orthogonalises the y-axis against it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle3d<R = f64> {
    pub center: Vec3<R>,
    pub x_axis: Vec3<R>,
    pub y_axis: Vec3<R>,
    pub radius: R,
}

impl<R: Real> Circle3d<R> {
    /// Orthonormal in-plane frame.
    pub fn frame(&self) -> (Vec3<R>, Vec3<R>) {
        let a = self.x_axis.normalize();
        let b = self.y_axis - a * self.y_axis.dot(&a);
        (a, b.normalize())
    }

    pub fn normal(&self) -> Vec3<R> {
        let (a, b) = self.frame();
        a.cross(&b)
    }

    pub fn evaluate(&self, t: R) -> CurvePoint<R> {
        let (a, b) = self.frame();
        let (c, s) = (t.cos(), t.sin());
        let r = self.radius;
        CurvePoint {
            pos: self.center + (a * c + b * s) * r,
            d1: (b * c - a * s) * r,
            d2: -((a * c + b * s) * r),
        }
    }
}

impl<R: Real> Curve<R> {
    pub fn kind(&self) -> CurveKind {
        match self {
            Curve::Line(_) => CurveKind::Line,
            Curve::Circle(_) => CurveKind::Circle,
            Curve::BSpline(_) => CurveKind::BSpline,
        }
    }

    /// Evaluate position and the first two parametric derivatives.
    pub fn evaluate(&self, t: R) -> CurvePoint<R> {
        match self {
            Curve::Line(l) => l.evaluate(t),
            Curve::Circle(c) => c.evaluate(t),
            Curve::BSpline(b) => b.evaluate(t),
        }
    }

    /// Natural parameter domain, if the curve has one.
    pub fn domain(&self) -> Option<[f64; 2]> {
        match self {
            Curve::BSpline(b) => Some(b.domain()),
            _ => None,
        }
    }

    /// Decode a flat payload.
    ///
    /// * Line: `[origin(3), direction(3)]`, header empty.
    /// * Circle: `[center(3), x_axis(3), y_axis(3), radius]`, header empty.
    /// * BSpline: header `[degree, n_cp, n_knots]`, payload
    ///   `[knots(n_knots), control points(3 * n_cp)]`.
    pub fn from_payload(kind: CurveKind, header: &[usize], data: &[R]) -> Result<Self, KernelError> {
        match kind {
            CurveKind::Line => {
                expect_len("line", data, 6)?;
                let direction = Vec3::from_slice(&data[3..6]);
                if direction.value().length() == 0.0 {
                    return Err(KernelError::invalid("line", "zero direction"));
                }
                Ok(Curve::Line(Line3d {
                    origin: Vec3::from_slice(&data[0..3]),
                    direction,
                }))
            }
            CurveKind::Circle => {
                expect_len("circle", data, 10)?;
                let circle = Circle3d {
                    center: Vec3::from_slice(&data[0..3]),
                    x_axis: Vec3::from_slice(&data[3..6]),
                    y_axis: Vec3::from_slice(&data[6..9]),
                    radius: data[9],
                };
                if circle.radius.value() <= 0.0 {
                    return Err(KernelError::invalid("circle", "radius must be positive"));
                }
                let (xa, ya) = (circle.x_axis.value(), circle.y_axis.value());
                let cross = xa.cross(&ya).length();
                if cross <= 1e-12 * xa.length() * ya.length() || cross == 0.0 {
                    return Err(KernelError::invalid("circle", "axes are parallel or zero"));
                }
                Ok(Curve::Circle(circle))
            }
            CurveKind::BSpline => {
                let [degree, n_cp, n_knots] = bspline_header("bspline curve", header)?;
                expect_len("bspline curve", data, n_knots + 3 * n_cp)?;
                let knots = data[..n_knots].iter().map(|k| k.value()).collect();
                let cps = data[n_knots..].chunks(3).map(Vec3::from_slice).collect();
                Ok(Curve::BSpline(BSplineCurve::new(degree, knots, cps)?))
            }
        }
    }

    /// Encode as `(kind, header, payload)`; the inverse of [`Curve::from_payload`].
    pub fn to_payload(&self) -> (CurveKind, Vec<usize>, Vec<R>) {
        let mut data = Vec::new();
        match self {
            Curve::Line(l) => {
                l.origin.push_into(&mut data);
                l.direction.push_into(&mut data);
                (CurveKind::Line, vec![], data)
            }
            Curve::Circle(c) => {
                c.center.push_into(&mut data);
                c.x_axis.push_into(&mut data);
                c.y_axis.push_into(&mut data);
                data.push(c.radius);
                (CurveKind::Circle, vec![], data)
            }
            Curve::BSpline(b) => {
                data.extend(b.knots.iter().map(|k| R::cst(*k)));
                for p in &b.control_points {
                    p.push_into(&mut data);
                }
                (
                    CurveKind::BSpline,
                    vec![b.degree, b.num_control_points(), b.knots.len()],
                    data,
                )
            }
        }
    }
}

pub(crate) fn expect_len<R>(what: &'static str, data: &[R], len: usize) -> Result<(), KernelError> {
    if data.len() != len {
        return Err(KernelError::invalid(
            what,
            format!("expected {len} values, got {}", data.len()),
        ));
    }
    Ok(())
}

fn bspline_header(what: &'static str, header: &[usize]) -> Result<[usize; 3], KernelError> {
    match header {
        [degree, n_cp, n_knots] => Ok([*degree, *n_cp, *n_knots]),
        _ => Err(KernelError::invalid(what, "header must be [degree, n_cp, n_knots]")),
    }
}

// ─── Parameter-space curves ─────────────────────────────────────

/// A straight line in a face's (u, v) parameter space:
/// `origin + t * direction`. Payload `[u0, v0, du, dv]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PCurve {
    pub origin: [f64; 2],
    pub direction: [f64; 2],
}

impl PCurve {
    pub fn from_payload(data: &[f64]) -> Result<Self, KernelError> {
        expect_len("pcurve", data, 4)?;
        Ok(Self {
            origin: [data[0], data[1]],
            direction: [data[2], data[3]],
        })
    }

    pub fn to_payload(&self) -> Vec<f64> {
        vec![
            self.origin[0],
            self.origin[1],
            self.direction[0],
            self.direction[1],
        ]
    }

    pub fn evaluate(&self, t: f64) -> [f64; 2] {
        [
            self.origin[0] + t * self.direction[0],
            self.origin[1] + t * self.direction[1],
        ]
    }
}
