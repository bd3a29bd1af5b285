//! Closed-form geometry of every shape family.
//!
//! The formulas are generic over [`Real`]: evaluated over `f64` they give
//! the payloads a shape is built from, over [`cad_kernel::Dual`] they give
//! the same payloads with their derivative along the seeded parameter.

use cad_kernel::geometry::bspline::interpolate;
use cad_kernel::geometry::curves::Curve;
use cad_kernel::{transform_curve_payload, CurveKind, Real, Vec3, Xform};

use crate::error::{HarnessError, Result};

/// Chordwise stations per airfoil side, leading and trailing edge included.
pub const NACA_STATIONS: usize = 13;

#[derive(Debug, Clone, PartialEq)]
pub struct CurveGeom<R> {
    pub kind: CurveKind,
    pub header: Vec<usize>,
    pub payload: Vec<R>,
}

impl<R: Real> CurveGeom<R> {
    pub fn line(origin: Vec3<R>, direction: Vec3<R>) -> Self {
        let mut payload = Vec::with_capacity(6);
        origin.push_into(&mut payload);
        direction.push_into(&mut payload);
        Self {
            kind: CurveKind::Line,
            header: vec![],
            payload,
        }
    }

    pub fn curve(&self) -> Result<Curve<R>> {
        Ok(Curve::from_payload(self.kind, &self.header, &self.payload)?)
    }

    pub fn point_at(&self, t: R) -> Result<Vec3<R>> {
        Ok(self.curve()?.evaluate(t).pos)
    }

    pub fn values(&self) -> Vec<f64> {
        self.payload.iter().map(|r| r.value()).collect()
    }

    pub fn dots(&self) -> Vec<f64> {
        self.payload.iter().map(|r| r.deriv()).collect()
    }
}

/// An edge over `curves[curve]`; one node index for closed edges, start
/// and end otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeGeom<R> {
    pub curve: usize,
    pub range: [R; 2],
    pub nodes: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopGeom<R> {
    pub closed: bool,
    pub nodes: Vec<Vec3<R>>,
    pub curves: Vec<CurveGeom<R>>,
    pub edges: Vec<EdgeGeom<R>>,
    /// `[origin, u axis, v axis]` of the plane a cap face lies on.
    pub plane: Option<[Vec3<R>; 3]>,
}

impl<R: Real> LoopGeom<R> {
    pub fn plane_payload(&self) -> Option<Vec<R>> {
        self.plane.map(|axes| {
            let mut payload = Vec::with_capacity(9);
            for v in axes {
                v.push_into(&mut payload);
            }
            payload
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeGeom<R> {
    Point(Vec3<R>),
    Loop(LoopGeom<R>),
}

impl<R: Real> ShapeGeom<R> {
    pub fn transformed(&self, xform: &Xform<R>) -> Result<Self> {
        Ok(match self {
            ShapeGeom::Point(p) => ShapeGeom::Point(xform.apply_point(p)),
            ShapeGeom::Loop(l) => {
                let curves = l
                    .curves
                    .iter()
                    .map(|c| {
                        Ok(CurveGeom {
                            kind: c.kind,
                            header: c.header.clone(),
                            payload: transform_curve_payload(xform, c.kind, &c.header, &c.payload)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                ShapeGeom::Loop(LoopGeom {
                    closed: l.closed,
                    nodes: l.nodes.iter().map(|p| xform.apply_point(p)).collect(),
                    curves,
                    edges: l.edges.clone(),
                    plane: l.plane.map(|[o, u, v]| [xform.apply_point(&o), u, v]),
                })
            }
        })
    }
}

fn vec_at<R: Real>(p: &[R], at: usize) -> Vec3<R> {
    Vec3::from_slice(&p[at..at + 3])
}

fn cst<R: Real>(v: f64) -> R {
    R::cst(v)
}

pub fn node<R: Real>(p: &[R]) -> ShapeGeom<R> {
    ShapeGeom::Point(vec_at(p, 0))
}

fn segment<R: Real>(a: Vec3<R>, b: Vec3<R>) -> LoopGeom<R> {
    LoopGeom {
        closed: false,
        nodes: vec![a, b],
        curves: vec![CurveGeom::line(a, b - a)],
        edges: vec![EdgeGeom {
            curve: 0,
            range: [cst(0.0), cst(1.0)],
            nodes: vec![0, 1],
        }],
        plane: None,
    }
}

pub fn line_two_points<R: Real>(p: &[R]) -> ShapeGeom<R> {
    ShapeGeom::Loop(segment(vec_at(p, 0), vec_at(p, 3)))
}

/// `[point(3), direction(3), t0, t1]`.
pub fn line_point_dir<R: Real>(p: &[R]) -> Result<ShapeGeom<R>> {
    let (origin, dir) = (vec_at(p, 0), vec_at(p, 3));
    let range = [p[6], p[7]];
    if !(range[0].value() < range[1].value()) {
        return Err(HarnessError::Config("line range must increase".into()));
    }
    let curve = CurveGeom::line(origin, dir);
    Ok(ShapeGeom::Loop(LoopGeom {
        closed: false,
        nodes: vec![curve.point_at(range[0])?, curve.point_at(range[1])?],
        curves: vec![curve],
        edges: vec![EdgeGeom {
            curve: 0,
            range,
            nodes: vec![0, 1],
        }],
        plane: None,
    }))
}

fn circle_curve<R: Real>(p: &[R]) -> CurveGeom<R> {
    CurveGeom {
        kind: CurveKind::Circle,
        header: vec![],
        payload: p[..10].to_vec(),
    }
}

fn circle_plane<R: Real>(p: &[R]) -> [Vec3<R>; 3] {
    [vec_at(p, 0), vec_at(p, 3), vec_at(p, 6)]
}

/// `[center(3), x axis(3), y axis(3), radius]` as one closed edge.
pub fn circle_one_edge<R: Real>(p: &[R]) -> Result<ShapeGeom<R>> {
    let curve = circle_curve(p);
    Ok(ShapeGeom::Loop(LoopGeom {
        closed: true,
        nodes: vec![curve.point_at(cst(0.0))?],
        curves: vec![curve],
        edges: vec![EdgeGeom {
            curve: 0,
            range: [cst(0.0), cst(std::f64::consts::TAU)],
            nodes: vec![0],
        }],
        plane: Some(circle_plane(p)),
    }))
}

/// Same circle split into two half edges on one curve.
pub fn circle_two_edge<R: Real>(p: &[R]) -> Result<ShapeGeom<R>> {
    use std::f64::consts::{PI, TAU};
    let curve = circle_curve(p);
    Ok(ShapeGeom::Loop(LoopGeom {
        closed: true,
        nodes: vec![curve.point_at(cst(0.0))?, curve.point_at(cst(PI))?],
        curves: vec![curve],
        edges: vec![
            EdgeGeom {
                curve: 0,
                range: [cst(0.0), cst(PI)],
                nodes: vec![0, 1],
            },
            EdgeGeom {
                curve: 0,
                range: [cst(PI), cst(TAU)],
                nodes: vec![1, 0],
            },
        ],
        plane: Some(circle_plane(p)),
    }))
}

fn polygon<R: Real>(corners: Vec<Vec3<R>>, plane: [Vec3<R>; 3]) -> ShapeGeom<R> {
    let n = corners.len();
    let curves = (0..n)
        .map(|k| CurveGeom::line(corners[k], corners[(k + 1) % n] - corners[k]))
        .collect();
    let edges = (0..n)
        .map(|k| EdgeGeom {
            curve: k,
            range: [cst(0.0), cst(1.0)],
            nodes: vec![k, (k + 1) % n],
        })
        .collect();
    ShapeGeom::Loop(LoopGeom {
        closed: true,
        nodes: corners,
        curves,
        edges,
        plane: Some(plane),
    })
}

/// `[center(3), half side along x(3), half side along y(3)]`.
pub fn square<R: Real>(p: &[R]) -> ShapeGeom<R> {
    let (c, a, b) = (vec_at(p, 0), vec_at(p, 3), vec_at(p, 6));
    polygon(vec![c - a - b, c + a - b, c + a + b, c - a + b], [c, a, b])
}

/// Three corners.
pub fn triangle<R: Real>(p: &[R]) -> ShapeGeom<R> {
    let (a, b, c) = (vec_at(p, 0), vec_at(p, 3), vec_at(p, 6));
    polygon(vec![a, b, c], [a, b - a, c - a])
}

/// Thickness distribution of a four-digit airfoil at unit thickness.
fn naca_thickness(x: f64, sharp: bool) -> f64 {
    let last = if sharp { -0.1036 } else { -0.1015 };
    5.0 * (0.2969 * x.sqrt() - 0.1260 * x - 0.3516 * x * x + 0.2843 * x.powi(3) + last * x.powi(4))
}

fn naca_camber<R: Real>(x: f64, m: R, p: R) -> R {
    let xr = R::cst(x);
    let one = R::cst(1.0);
    if x < p.value() {
        m / (p * p) * (R::cst(2.0) * p * xr - xr * xr)
    } else {
        let q = one - p;
        m / (q * q) * (one - R::cst(2.0) * p + R::cst(2.0) * p * xr - xr * xr)
    }
}

/// `[max camber, max camber location, thickness]` of a four-digit airfoil
/// of unit chord in the xy plane, fitted by a cubic through cosine-spaced
/// stations from the upper trailing edge round to the lower one.
pub fn naca<R: Real>(p: &[R], sharp: bool) -> Result<ShapeGeom<R>> {
    let (m, loc, t) = (p[0], p[1], p[2]);
    if !(loc.value() > 0.0 && loc.value() < 1.0) || !(t.value() > 0.0) {
        return Err(HarnessError::Config(format!(
            "airfoil needs 0 < location < 1 and positive thickness, got {:?}",
            [loc.value(), t.value()]
        )));
    }
    let stations: Vec<f64> = (0..NACA_STATIONS)
        .map(|k| 0.5 * (1.0 - (std::f64::consts::PI * k as f64 / (NACA_STATIONS - 1) as f64).cos()))
        .collect();
    let at = |x: f64, side: f64| {
        let half = if sharp && x == 1.0 { 0.0 } else { side * naca_thickness(x, sharp) };
        Vec3::new(R::cst(x), naca_camber(x, m, loc) + t.scale(half), R::cst(0.0))
    };
    let mut points: Vec<Vec3<R>> = stations.iter().rev().map(|x| at(*x, 1.0)).collect();
    points.extend(stations.iter().skip(1).map(|x| at(*x, -1.0)));

    let fit = interpolate(&points, None, 3)?;
    let (kind, header, payload) = Curve::BSpline(fit).to_payload();
    let airfoil = CurveGeom { kind, header, payload };
    let plane = Some([
        Vec3::zero(),
        Vec3::new(R::cst(1.0), R::cst(0.0), R::cst(0.0)),
        Vec3::new(R::cst(0.0), R::cst(1.0), R::cst(0.0)),
    ]);
    let upper = points[0];
    let lower = points[points.len() - 1];

    Ok(ShapeGeom::Loop(if sharp {
        LoopGeom {
            closed: true,
            nodes: vec![upper],
            curves: vec![airfoil],
            edges: vec![EdgeGeom {
                curve: 0,
                range: [cst(0.0), cst(1.0)],
                nodes: vec![0],
            }],
            plane,
        }
    } else {
        LoopGeom {
            closed: true,
            nodes: vec![upper, lower],
            curves: vec![airfoil, CurveGeom::line(lower, upper - lower)],
            edges: vec![
                EdgeGeom {
                    curve: 0,
                    range: [cst(0.0), cst(1.0)],
                    nodes: vec![0, 1],
                },
                EdgeGeom {
                    curve: 1,
                    range: [cst(0.0), cst(1.0)],
                    nodes: vec![1, 0],
                },
            ],
            plane,
        }
    }))
}

/// `[center(3), x axis(3), y axis(3), offset]`: the point `offset` along
/// the normal of the circle with that center and axes.
pub fn nose_node<R: Real>(p: &[R]) -> ShapeGeom<R> {
    let (c, x, y) = (vec_at(p, 0), vec_at(p, 3), vec_at(p, 6));
    let xn = x.normalize();
    let yn = (y - xn * y.dot(&xn)).normalize();
    ShapeGeom::Point(c + xn.cross(&yn) * p[9])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cad_kernel::Dual;
    use cad_kernel::geometry::real::lift;

    const UNIT_CIRCLE: [f64; 10] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0];

    #[test]
    fn test_two_edge_circle_nodes_opposite() {
        let ShapeGeom::Loop(l) = circle_two_edge(&UNIT_CIRCLE).unwrap() else {
            panic!("circle is a loop");
        };
        assert_relative_eq!(l.nodes[0].x, 1.0, epsilon = 1e-15);
        assert_relative_eq!(l.nodes[1].x, -1.0, epsilon = 1e-15);
        assert_eq!(l.edges[1].nodes, vec![1, 0]);
    }

    #[test]
    fn test_square_corners() {
        let p = [0.0, 0.0, 1.0, 0.5, 0.0, 0.0, 0.0, 0.5, 0.0];
        let ShapeGeom::Loop(l) = square(&p) else {
            panic!("square is a loop");
        };
        assert_eq!(l.nodes[0], Vec3::new(-0.5, -0.5, 1.0));
        assert_eq!(l.nodes[2], Vec3::new(0.5, 0.5, 1.0));
        assert_eq!(l.edges[3].nodes, vec![3, 0]);
    }

    #[test]
    fn test_sharp_airfoil_closes() {
        let ShapeGeom::Loop(l) = naca(&[0.04, 0.4, 0.12], true).unwrap() else {
            panic!("airfoil is a loop");
        };
        let curve = l.curves[0].curve().unwrap();
        let start = curve.evaluate(0.0).pos;
        let end = curve.evaluate(1.0).pos;
        assert!(start.distance_to(&end) < 1e-12);
        assert_eq!(l.edges.len(), 1);
    }

    #[test]
    fn test_blunt_airfoil_has_trailing_edge() {
        let ShapeGeom::Loop(l) = naca(&[0.04, 0.4, 0.12], false).unwrap() else {
            panic!("airfoil is a loop");
        };
        assert_eq!(l.edges.len(), 2);
        assert!(l.nodes[0].y > l.nodes[1].y);
    }

    #[test]
    fn test_airfoil_thickness_derivative() {
        // Thickness enters linearly: d/dt of the upper trailing edge
        // offset is the unit-thickness distribution.
        let p = lift(&[0.0, 0.4, 0.12], &[0.0, 0.0, 1.0]);
        let ShapeGeom::Loop(l) = naca::<Dual>(&p, false).unwrap() else {
            panic!("airfoil is a loop");
        };
        assert_relative_eq!(l.nodes[0].y.dot, naca_thickness(1.0, false), epsilon = 1e-12);
    }

    #[test]
    fn test_nose_node_on_axis() {
        let mut p = UNIT_CIRCLE.to_vec();
        p[9] = -2.0;
        let ShapeGeom::Point(tip) = nose_node(&p) else {
            panic!("nose is a point");
        };
        assert_eq!(tip, Vec3::new(0.0, 0.0, -2.0));
    }

    #[test]
    fn test_transform_moves_plane_origin_only() {
        let xf = Xform::from_params(&[2.0, 0.0, 0.0, 1.0]).unwrap();
        let ShapeGeom::Loop(l) = circle_one_edge(&UNIT_CIRCLE).unwrap().transformed(&xf).unwrap() else {
            panic!("circle is a loop");
        };
        let [o, u, _] = l.plane.unwrap();
        assert_eq!(o, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(u, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(l.curves[0].payload[9], 2.0);
    }
}
