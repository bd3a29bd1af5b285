use serde::{Deserialize, Serialize};

use super::curves::{Circle3d, Curve, Line3d};
use super::real::Real;
use super::surfaces::{Plane, Surface};
use super::vector::Vec3;
use crate::error::KernelError;

/// Uniform scale followed by a translation: `p -> scale * p + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Xform<R = f64> {
    pub scale: R,
    pub offset: Vec3<R>,
}

impl<R: Real> Xform<R> {
    pub fn identity() -> Self {
        Self {
            scale: R::cst(1.0),
            offset: Vec3::zero(),
        }
    }

    /// From `[scale, ox, oy, oz]`.
    pub fn from_params(p: &[R]) -> Result<Self, KernelError> {
        if p.len() != 4 {
            return Err(KernelError::invalid(
                "transform",
                "expected [scale, ox, oy, oz]",
            ));
        }
        if p[0].value() <= 0.0 {
            return Err(KernelError::invalid("transform", "scale must be positive"));
        }
        Ok(Self {
            scale: p[0],
            offset: Vec3::from_slice(&p[1..4]),
        })
    }

    pub fn apply_point(&self, p: &Vec3<R>) -> Vec3<R> {
        *p * self.scale + self.offset
    }

    pub fn apply_vector(&self, v: &Vec3<R>) -> Vec3<R> {
        *v * self.scale
    }

    /// Transform a curve. The parameterisation is unchanged, so edge
    /// ranges carry over as they are.
    pub fn apply_curve(&self, curve: &Curve<R>) -> Curve<R> {
        match curve {
            Curve::Line(l) => Curve::Line(Line3d {
                origin: self.apply_point(&l.origin),
                direction: self.apply_vector(&l.direction),
            }),
            Curve::Circle(c) => Curve::Circle(Circle3d {
                center: self.apply_point(&c.center),
                x_axis: c.x_axis,
                y_axis: c.y_axis,
                radius: c.radius * self.scale,
            }),
            Curve::BSpline(b) => Curve::BSpline(b.map_points(|p| self.apply_point(p))),
        }
    }

    /// Transform a surface. Plane axes are direction-only and stay put.
    pub fn apply_surface(&self, surface: &Surface<R>) -> Surface<R> {
        match surface {
            Surface::Plane(p) => Surface::Plane(Plane {
                origin: self.apply_point(&p.origin),
                u_axis: p.u_axis,
                v_axis: p.v_axis,
            }),
            Surface::BSpline(s) => Surface::BSpline(s.map_points(|p| self.apply_point(p))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::curves::CurveKind;
    use crate::geometry::real::Dual;

    #[test]
    fn test_transformed_circle_matches_transformed_points() {
        let circle = Curve::from_payload(
            CurveKind::Circle,
            &[],
            &[0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.5],
        )
        .unwrap();
        let xf = Xform::from_params(&[2.0, 1.0, -1.0, 3.0]).unwrap();
        let moved = xf.apply_curve(&circle);
        for k in 0..8 {
            let t = k as f64 * 0.7;
            let expected = xf.apply_point(&circle.evaluate(t).pos);
            assert!(moved.evaluate(t).pos.distance_to(&expected) < 1e-12);
        }
    }

    #[test]
    fn test_scale_sensitivity_of_point() {
        let xf = Xform::from_params(&[
            Dual::variable(1.5),
            Dual::constant(0.0),
            Dual::constant(0.0),
            Dual::constant(0.0),
        ])
        .unwrap();
        let p = xf.apply_point(&Vec3::new(1.0, 2.0, 3.0).lift());
        assert_eq!(p.deriv(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_non_positive_scale_rejected() {
        assert!(Xform::from_params(&[0.0, 0.0, 0.0, 0.0]).is_err());
    }
}
