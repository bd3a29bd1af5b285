use serde::{Deserialize, Serialize};
use std::fmt;

use super::bspline::{BSplineSurface, SurfacePoint};
use super::curves::expect_len;
use super::real::Real;
use super::vector::Vec3;
use crate::error::KernelError;

/// Surface variants understood by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceKind {
    Plane,
    BSpline,
}

impl fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceKind::Plane => f.write_str("Plane"),
            SurfaceKind::BSpline => f.write_str("BSpline"),
        }
    }
}

/// All surface types supported by the kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Surface<R = f64> {
    Plane(Plane<R>),
    BSpline(BSplineSurface<R>),
}

/// An unbounded plane spanned by two in-plane axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane<R = f64> {
    pub origin: Vec3<R>,
    pub u_axis: Vec3<R>,
    pub v_axis: Vec3<R>,
}

impl<R: Real> Plane<R> {
    /// Orthonormal frame: the u-axis normalised, the v-axis orthogonalised
    /// against it.
    pub fn frame(&self) -> (Vec3<R>, Vec3<R>) {
        let a = self.u_axis.normalize();
        let b = self.v_axis - a * self.v_axis.dot(&a);
        (a, b.normalize())
    }

    pub fn normal(&self) -> Vec3<R> {
        let (a, b) = self.frame();
        a.cross(&b)
    }

    pub fn evaluate(&self, u: R, v: R) -> SurfacePoint<R> {
        let (a, b) = self.frame();
        SurfacePoint {
            pos: self.origin + a * u + b * v,
            du: a,
            dv: b,
        }
    }
}

impl Plane {
    /// Get (u, v) parameters for a point projected onto the plane.
    pub fn parameters_of(&self, p: &Vec3) -> [f64; 2] {
        let (a, b) = self.frame();
        let d = *p - self.origin;
        [d.dot(&a), d.dot(&b)]
    }
}

impl<R: Real> Surface<R> {
    pub fn kind(&self) -> SurfaceKind {
        match self {
            Surface::Plane(_) => SurfaceKind::Plane,
            Surface::BSpline(_) => SurfaceKind::BSpline,
        }
    }

    pub fn evaluate(&self, u: R, v: R) -> SurfacePoint<R> {
        match self {
            Surface::Plane(p) => p.evaluate(u, v),
            Surface::BSpline(s) => s.evaluate(u, v),
        }
    }

    /// Decode a flat payload.
    ///
    /// * Plane: `[origin(3), u_axis(3), v_axis(3)]`, header empty.
    /// * BSpline: header `[u_degree, n_u, n_u_knots, v_degree, n_v, n_v_knots]`,
    ///   payload `[u_knots, v_knots, control points (u fastest)]`.
    pub fn from_payload(kind: SurfaceKind, header: &[usize], data: &[R]) -> Result<Self, KernelError> {
        match kind {
            SurfaceKind::Plane => {
                expect_len("plane", data, 9)?;
                let plane = Plane {
                    origin: Vec3::from_slice(&data[0..3]),
                    u_axis: Vec3::from_slice(&data[3..6]),
                    v_axis: Vec3::from_slice(&data[6..9]),
                };
                let (a, b) = (plane.u_axis.value(), plane.v_axis.value());
                let cross = a.cross(&b).length();
                if cross == 0.0 || cross <= 1e-12 * a.length() * b.length() {
                    return Err(KernelError::invalid("plane", "axes are parallel or zero"));
                }
                Ok(Surface::Plane(plane))
            }
            SurfaceKind::BSpline => {
                let [u_degree, n_u, n_uk, v_degree, n_v, n_vk] = match header {
                    [a, b, c, d, e, f] => [*a, *b, *c, *d, *e, *f],
                    _ => {
                        return Err(KernelError::invalid(
                            "bspline surface",
                            "header must have six entries",
                        ));
                    }
                };
                expect_len("bspline surface", data, n_uk + n_vk + 3 * n_u * n_v)?;
                let u_knots = data[..n_uk].iter().map(|k| k.value()).collect();
                let v_knots = data[n_uk..n_uk + n_vk].iter().map(|k| k.value()).collect();
                let cps = data[n_uk + n_vk..].chunks(3).map(Vec3::from_slice).collect();
                Ok(Surface::BSpline(BSplineSurface::new(
                    u_degree, u_knots, v_degree, v_knots, n_u, cps,
                )?))
            }
        }
    }

    /// Encode as `(kind, header, payload)`.
    pub fn to_payload(&self) -> (SurfaceKind, Vec<usize>, Vec<R>) {
        let mut data = Vec::new();
        match self {
            Surface::Plane(p) => {
                p.origin.push_into(&mut data);
                p.u_axis.push_into(&mut data);
                p.v_axis.push_into(&mut data);
                (SurfaceKind::Plane, vec![], data)
            }
            Surface::BSpline(s) => {
                data.extend(s.u_knots.iter().map(|k| R::cst(*k)));
                data.extend(s.v_knots.iter().map(|k| R::cst(*k)));
                for p in &s.control_points {
                    p.push_into(&mut data);
                }
                let header = vec![
                    s.u_degree,
                    s.num_u,
                    s.u_knots.len(),
                    s.v_degree,
                    s.num_v,
                    s.v_knots.len(),
                ];
                (SurfaceKind::BSpline, header, data)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::real::{Dual, lift};

    #[test]
    fn test_plane_evaluate_and_invert() {
        let s = Surface::from_payload(
            SurfaceKind::Plane,
            &[],
            &[1.0, 2.0, 3.0, 2.0, 0.0, 0.0, 1.0, 1.0, 0.0],
        )
        .unwrap();
        let p = s.evaluate(0.5, -0.25).pos;
        assert!(p.distance_to(&Vec3::new(1.5, 1.75, 3.0)) < 1e-12);
        let Surface::Plane(plane) = s else {
            panic!("expected a plane");
        };
        let uv = plane.parameters_of(&p);
        assert!((uv[0] - 0.5).abs() < 1e-12);
        assert!((uv[1] + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_plane_origin_sensitivity() {
        let data = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let mut dots = [0.0; 9];
        dots[2] = 1.0;
        let s = Surface::from_payload(SurfaceKind::Plane, &[], &lift(&data, &dots)).unwrap();
        let p = s.evaluate(Dual::constant(0.3), Dual::constant(0.7));
        assert!(p.pos.deriv().distance_to(&Vec3::Z) < 1e-12);
    }

    #[test]
    fn test_bspline_payload_round_trip() {
        let header = [1, 2, 4, 1, 2, 4];
        let mut data = vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0];
        data.extend_from_slice(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0]);
        let s = Surface::from_payload(SurfaceKind::BSpline, &header, &data).unwrap();
        let mid = s.evaluate(0.5, 0.5).pos;
        assert!(mid.distance_to(&Vec3::new(0.5, 0.5, 0.0)) < 1e-12);
        let (kind, h, d) = s.to_payload();
        assert_eq!(kind, SurfaceKind::BSpline);
        assert_eq!(h, header.to_vec());
        assert_eq!(d, data);
    }
}
