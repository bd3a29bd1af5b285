use nalgebra::{DMatrix, DVector, Dyn, LU};
use serde::{Deserialize, Serialize};

use super::real::Real;
use super::vector::Vec3;
use crate::error::KernelError;

// ─── Basis functions ────────────────────────────────────────────

/// Find the knot span index for parameter t using binary search.
pub fn find_span(knots: &[f64], degree: usize, n_cp: usize, t: f64) -> usize {
    let n = n_cp - 1;
    let p = degree;

    if t >= knots[n + 1] {
        return n;
    }
    if t <= knots[p] {
        return p;
    }

    let mut low = p;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while t < knots[mid] || t >= knots[mid + 1] {
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Nonzero basis functions and their derivatives up to order `n` at `t`.
///
/// `ders[k][j]` is the k-th derivative of `N_{span-p+j}`. Orders above
/// the degree are identically zero.
pub fn basis_derivs(knots: &[f64], p: usize, span: usize, t: f64, n: usize) -> Vec<Vec<f64>> {
    let mut ders = vec![vec![0.0; p + 1]; n + 1];
    let n_eff = n.min(p);

    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[0][0] = 1.0;
    for j in 1..=p {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = ndu[r][j - 1] / ndu[j][r];
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }

    for j in 0..=p {
        ders[0][j] = ndu[j][p];
    }

    let pi = p as isize;
    let mut a = vec![vec![0.0; p + 1]; 2];
    for r in 0..=p {
        let ri = r as isize;
        let (mut s1, mut s2) = (0usize, 1usize);
        a[0][0] = 1.0;
        for k in 1..=n_eff {
            let ki = k as isize;
            let rk = ri - ki;
            let pk = pi - ki;
            let mut d = 0.0;
            if ri >= ki {
                a[s2][0] = a[s1][0] / ndu[(pk + 1) as usize][rk as usize];
                d = a[s2][0] * ndu[rk as usize][pk as usize];
            }
            let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
            let j2 = if ri - 1 <= pk { k - 1 } else { p - r };
            for j in j1..=j2 {
                let col = (rk + j as isize) as usize;
                a[s2][j] = (a[s1][j] - a[s1][j - 1]) / ndu[(pk + 1) as usize][col];
                d += a[s2][j] * ndu[col][pk as usize];
            }
            if ri <= pk {
                a[s2][k] = -a[s1][k - 1] / ndu[(pk + 1) as usize][r];
                d += a[s2][k] * ndu[r][pk as usize];
            }
            ders[k][r] = d;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    let mut factor = p as f64;
    for k in 1..=n_eff {
        for j in 0..=p {
            ders[k][j] *= factor;
        }
        factor *= p as f64 - k as f64;
    }
    ders
}

fn check_knots(what: &'static str, degree: usize, n_cp: usize, knots: &[f64]) -> Result<(), KernelError> {
    if degree == 0 {
        return Err(KernelError::invalid(what, "degree must be at least 1"));
    }
    if n_cp < degree + 1 {
        return Err(KernelError::invalid(
            what,
            format!("{n_cp} control points cannot carry degree {degree}"),
        ));
    }
    if knots.len() != n_cp + degree + 1 {
        return Err(KernelError::invalid(
            what,
            format!("expected {} knots, got {}", n_cp + degree + 1, knots.len()),
        ));
    }
    if knots.windows(2).any(|w| w[1] < w[0]) {
        return Err(KernelError::invalid(what, "knots must be non-decreasing"));
    }
    if knots[n_cp] <= knots[degree] {
        return Err(KernelError::invalid(what, "empty parameter domain"));
    }
    Ok(())
}

// ─── Curves ─────────────────────────────────────────────────────

/// Position and first two parametric derivatives of a curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint<R = f64> {
    pub pos: Vec3<R>,
    pub d1: Vec3<R>,
    pub d2: Vec3<R>,
}

/// A non-rational B-spline curve. Knots are fixed; control points carry
/// the scalar type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BSplineCurve<R = f64> {
    pub degree: usize,
    pub knots: Vec<f64>,
    pub control_points: Vec<Vec3<R>>,
}

impl<R: Real> BSplineCurve<R> {
    pub fn new(degree: usize, knots: Vec<f64>, control_points: Vec<Vec3<R>>) -> Result<Self, KernelError> {
        check_knots("bspline curve", degree, control_points.len(), &knots)?;
        Ok(Self {
            degree,
            knots,
            control_points,
        })
    }

    pub fn num_control_points(&self) -> usize {
        self.control_points.len()
    }

    /// Parameter domain [t_min, t_max].
    pub fn domain(&self) -> [f64; 2] {
        [
            self.knots[self.degree],
            self.knots[self.knots.len() - self.degree - 1],
        ]
    }

    /// Evaluate position and derivatives.
    ///
    /// The basis is evaluated at the value of `t`; any derivative carried
    /// by `t` enters through one Taylor step along the next-higher
    /// derivative.
    pub fn evaluate(&self, t: R) -> CurvePoint<R> {
        let [t0, t1] = self.domain();
        let tv = t.value().clamp(t0, t1);
        let p = self.degree;
        let span = find_span(&self.knots, p, self.num_control_points(), tv);
        let ders = basis_derivs(&self.knots, p, span, tv, 3);

        let mut c = [Vec3::<R>::zero(); 4];
        for (k, row) in ders.iter().enumerate() {
            for (j, b) in row.iter().enumerate() {
                if *b != 0.0 {
                    c[k] = c[k] + self.control_points[span - p + j].scale(*b);
                }
            }
        }

        let dt = t - R::cst(tv);
        CurvePoint {
            pos: c[0] + c[1] * dt,
            d1: c[1] + c[2] * dt,
            d2: c[2] + c[3] * dt,
        }
    }

    pub fn value(&self) -> BSplineCurve {
        BSplineCurve {
            degree: self.degree,
            knots: self.knots.clone(),
            control_points: self.control_points.iter().map(|p| p.value()).collect(),
        }
    }

    /// Apply `f` to every control point.
    pub fn map_points(&self, f: impl Fn(&Vec3<R>) -> Vec3<R>) -> Self {
        Self {
            degree: self.degree,
            knots: self.knots.clone(),
            control_points: self.control_points.iter().map(f).collect(),
        }
    }

    /// Whether two curves share degree, knots and control point count.
    pub fn is_compatible(&self, other: &Self, tol: f64) -> bool {
        self.degree == other.degree
            && self.knots.len() == other.knots.len()
            && self.num_control_points() == other.num_control_points()
            && self
                .knots
                .iter()
                .zip(&other.knots)
                .all(|(a, b)| (a - b).abs() <= tol)
    }
}

// ─── Surfaces ───────────────────────────────────────────────────

/// Position and first parametric derivatives of a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint<R = f64> {
    pub pos: Vec3<R>,
    pub du: Vec3<R>,
    pub dv: Vec3<R>,
}

/// A non-rational tensor-product B-spline surface.
///
/// Control points are stored with u varying fastest:
/// `control_points[j * num_u + i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BSplineSurface<R = f64> {
    pub u_degree: usize,
    pub v_degree: usize,
    pub u_knots: Vec<f64>,
    pub v_knots: Vec<f64>,
    pub num_u: usize,
    pub num_v: usize,
    pub control_points: Vec<Vec3<R>>,
}

impl<R: Real> BSplineSurface<R> {
    pub fn new(
        u_degree: usize,
        u_knots: Vec<f64>,
        v_degree: usize,
        v_knots: Vec<f64>,
        num_u: usize,
        control_points: Vec<Vec3<R>>,
    ) -> Result<Self, KernelError> {
        if num_u == 0 || control_points.len() % num_u != 0 {
            return Err(KernelError::invalid(
                "bspline surface",
                "control net is not rectangular",
            ));
        }
        let num_v = control_points.len() / num_u;
        check_knots("bspline surface", u_degree, num_u, &u_knots)?;
        check_knots("bspline surface", v_degree, num_v, &v_knots)?;
        Ok(Self {
            u_degree,
            v_degree,
            u_knots,
            v_knots,
            num_u,
            num_v,
            control_points,
        })
    }

    pub fn control_point(&self, i: usize, j: usize) -> Vec3<R> {
        self.control_points[j * self.num_u + i]
    }

    pub fn u_domain(&self) -> [f64; 2] {
        [
            self.u_knots[self.u_degree],
            self.u_knots[self.u_knots.len() - self.u_degree - 1],
        ]
    }

    pub fn v_domain(&self) -> [f64; 2] {
        [
            self.v_knots[self.v_degree],
            self.v_knots[self.v_knots.len() - self.v_degree - 1],
        ]
    }

    pub fn evaluate(&self, u: R, v: R) -> SurfacePoint<R> {
        let [u0, u1] = self.u_domain();
        let [v0, v1] = self.v_domain();
        let uv = u.value().clamp(u0, u1);
        let vv = v.value().clamp(v0, v1);
        let (p, q) = (self.u_degree, self.v_degree);
        let su = find_span(&self.u_knots, p, self.num_u, uv);
        let sv = find_span(&self.v_knots, q, self.num_v, vv);
        let nu = basis_derivs(&self.u_knots, p, su, uv, 2);
        let nv = basis_derivs(&self.v_knots, q, sv, vv, 2);

        // s[a][b] = d^(a+b) S / du^a dv^b
        let mut s = [[Vec3::<R>::zero(); 3]; 3];
        for (a, nu_a) in nu.iter().enumerate() {
            for (b, nv_b) in nv.iter().enumerate() {
                if a + b > 2 {
                    continue;
                }
                let mut acc = Vec3::<R>::zero();
                for (j, bv) in nv_b.iter().enumerate() {
                    if *bv == 0.0 {
                        continue;
                    }
                    for (i, bu) in nu_a.iter().enumerate() {
                        if *bu == 0.0 {
                            continue;
                        }
                        let cp = self.control_point(su - p + i, sv - q + j);
                        acc = acc + cp.scale(bu * bv);
                    }
                }
                s[a][b] = acc;
            }
        }

        let du = u - R::cst(uv);
        let dv = v - R::cst(vv);
        SurfacePoint {
            pos: s[0][0] + s[1][0] * du + s[0][1] * dv,
            du: s[1][0] + s[2][0] * du + s[1][1] * dv,
            dv: s[0][1] + s[1][1] * du + s[0][2] * dv,
        }
    }

    /// The curve running in v at fixed `u`.
    pub fn iso_u(&self, u: f64) -> BSplineCurve<R> {
        let p = self.u_degree;
        let u = u.clamp(self.u_domain()[0], self.u_domain()[1]);
        let span = find_span(&self.u_knots, p, self.num_u, u);
        let basis = basis_derivs(&self.u_knots, p, span, u, 0);
        let control_points = (0..self.num_v)
            .map(|j| {
                basis[0].iter().enumerate().fold(Vec3::zero(), |acc, (i, b)| {
                    acc + self.control_point(span - p + i, j).scale(*b)
                })
            })
            .collect();
        BSplineCurve {
            degree: self.v_degree,
            knots: self.v_knots.clone(),
            control_points,
        }
    }

    /// The curve running in u at fixed `v`.
    pub fn iso_v(&self, v: f64) -> BSplineCurve<R> {
        let q = self.v_degree;
        let v = v.clamp(self.v_domain()[0], self.v_domain()[1]);
        let span = find_span(&self.v_knots, q, self.num_v, v);
        let basis = basis_derivs(&self.v_knots, q, span, v, 0);
        let control_points = (0..self.num_u)
            .map(|i| {
                basis[0].iter().enumerate().fold(Vec3::zero(), |acc, (j, b)| {
                    acc + self.control_point(i, span - q + j).scale(*b)
                })
            })
            .collect();
        BSplineCurve {
            degree: self.u_degree,
            knots: self.u_knots.clone(),
            control_points,
        }
    }

    pub fn map_points(&self, f: impl Fn(&Vec3<R>) -> Vec3<R>) -> Self {
        Self {
            control_points: self.control_points.iter().map(f).collect(),
            u_knots: self.u_knots.clone(),
            v_knots: self.v_knots.clone(),
            ..*self
        }
    }
}

// ─── Interpolation ──────────────────────────────────────────────

/// `n` parameters spread uniformly over [0, 1].
pub fn uniform_params(n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![0.0; n];
    }
    let last = (n - 1) as f64;
    (0..n).map(|k| k as f64 / last).collect()
}

/// Clamped knots by averaging `degree` consecutive parameters.
pub fn averaged_knots(params: &[f64], degree: usize) -> Vec<f64> {
    let n = params.len();
    let first = params[0];
    let last = params[n - 1];
    let mut knots = vec![first; degree + 1];
    for j in 1..n - degree {
        let sum: f64 = params[j..j + degree].iter().sum();
        knots.push(sum / degree as f64);
    }
    knots.extend(std::iter::repeat_n(last, degree + 1));
    knots
}

/// Clamped cubic knots for interpolation with both end derivatives given.
pub fn hermite_knots(params: &[f64]) -> Vec<f64> {
    let n = params.len();
    let mut knots = vec![params[0]; 4];
    knots.extend_from_slice(&params[1..n - 1]);
    knots.extend(std::iter::repeat_n(params[n - 1], 4));
    knots
}

/// An LU-factored collocation matrix, reused across right-hand sides.
pub struct Collocation {
    lu: LU<f64, Dyn, Dyn>,
    size: usize,
}

impl Collocation {
    pub fn new(matrix: DMatrix<f64>) -> Self {
        let size = matrix.nrows();
        Self {
            lu: matrix.lu(),
            size,
        }
    }

    /// Solve for one control point per equation. Values and derivatives
    /// are solved as separate right-hand sides against the same factors.
    pub fn solve<R: Real>(&self, rhs: &[Vec3<R>]) -> Result<Vec<Vec3<R>>, KernelError> {
        if rhs.len() != self.size {
            return Err(KernelError::invalid(
                "interpolation",
                format!("expected {} conditions, got {}", self.size, rhs.len()),
            ));
        }
        let mut columns: Vec<DVector<f64>> = Vec::with_capacity(6);
        for c in 0..6 {
            let b = DVector::from_iterator(
                self.size,
                rhs.iter().map(|p| {
                    let comp = match c % 3 {
                        0 => p.x,
                        1 => p.y,
                        _ => p.z,
                    };
                    if c < 3 { comp.value() } else { comp.deriv() }
                }),
            );
            let x = self
                .lu
                .solve(&b)
                .ok_or(KernelError::SingularFit { size: self.size })?;
            columns.push(x);
        }
        Ok((0..self.size)
            .map(|k| {
                Vec3::from_parts(
                    [columns[0][k], columns[1][k], columns[2][k]],
                    [columns[3][k], columns[4][k], columns[5][k]],
                )
            })
            .collect())
    }
}

fn basis_row(matrix: &mut DMatrix<f64>, row: usize, knots: &[f64], p: usize, n_cp: usize, t: f64, order: usize) {
    let span = find_span(knots, p, n_cp, t);
    let ders = basis_derivs(knots, p, span, t, order);
    for (j, b) in ders[order].iter().enumerate() {
        matrix[(row, span - p + j)] = *b;
    }
}

/// Collocation system for interpolating `params` at the given degree.
/// With `with_ends` the system is cubic and adds both end derivatives.
pub fn collocation(params: &[f64], degree: usize, with_ends: bool) -> (Vec<f64>, Collocation) {
    let n = params.len();
    if with_ends {
        let knots = hermite_knots(params);
        let n_cp = n + 2;
        let mut m = DMatrix::zeros(n_cp, n_cp);
        basis_row(&mut m, 0, &knots, 3, n_cp, params[0], 0);
        basis_row(&mut m, 1, &knots, 3, n_cp, params[0], 1);
        for k in 1..n - 1 {
            basis_row(&mut m, k + 1, &knots, 3, n_cp, params[k], 0);
        }
        basis_row(&mut m, n, &knots, 3, n_cp, params[n - 1], 1);
        basis_row(&mut m, n + 1, &knots, 3, n_cp, params[n - 1], 0);
        (knots, Collocation::new(m))
    } else {
        let knots = averaged_knots(params, degree);
        let mut m = DMatrix::zeros(n, n);
        for (k, t) in params.iter().enumerate() {
            basis_row(&mut m, k, &knots, degree, n, *t, 0);
        }
        (knots, Collocation::new(m))
    }
}

/// Interpolate points at uniform parameters on [0, 1].
///
/// With `ends` the result is cubic with `n + 2` control points and the
/// given first derivatives at both ends. Without, the degree is capped by
/// the point count and knots are placed by averaging.
pub fn interpolate<R: Real>(
    points: &[Vec3<R>],
    ends: Option<[Vec3<R>; 2]>,
    degree: usize,
) -> Result<BSplineCurve<R>, KernelError> {
    let n = points.len();
    if n < 2 {
        return Err(KernelError::invalid(
            "interpolation",
            "need at least two points",
        ));
    }
    let params = uniform_params(n);
    match ends {
        Some([d0, d1]) => {
            let (knots, system) = collocation(&params, 3, true);
            let mut rhs = Vec::with_capacity(n + 2);
            rhs.push(points[0]);
            rhs.push(d0);
            rhs.extend_from_slice(&points[1..n - 1]);
            rhs.push(d1);
            rhs.push(points[n - 1]);
            let cps = system.solve(&rhs)?;
            BSplineCurve::new(3, knots, cps)
        }
        None => {
            let degree = degree.clamp(1, n - 1);
            if degree == 1 {
                let mut knots = vec![0.0];
                knots.extend_from_slice(&params);
                knots.push(1.0);
                return BSplineCurve::new(1, knots, points.to_vec());
            }
            let (knots, system) = collocation(&params, degree, false);
            let cps = system.solve(points)?;
            BSplineCurve::new(degree, knots, cps)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::real::Dual;

    fn sample_curve() -> BSplineCurve {
        BSplineCurve::new(
            3,
            vec![0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 1.0],
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 2.0, 0.0),
                Vec3::new(2.0, -1.0, 1.0),
                Vec3::new(3.0, 0.5, 0.0),
                Vec3::new(4.0, 0.0, 2.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_partition_of_unity() {
        let knots = [0.0, 0.0, 0.0, 0.0, 0.3, 0.6, 1.0, 1.0, 1.0, 1.0];
        for k in 0..=20 {
            let t = k as f64 / 20.0;
            let span = find_span(&knots, 3, 6, t);
            let ders = basis_derivs(&knots, 3, span, t, 2);
            let sum: f64 = ders[0].iter().sum();
            let dsum: f64 = ders[1].iter().sum();
            assert!((sum - 1.0).abs() < 1e-12);
            assert!(dsum.abs() < 1e-10);
        }
    }

    #[test]
    fn test_endpoint_interpolation() {
        let c = sample_curve();
        let p0 = c.evaluate(0.0).pos;
        let p1 = c.evaluate(1.0).pos;
        assert!(p0.distance_to(&Vec3::ZERO) < 1e-12);
        assert!(p1.distance_to(&Vec3::new(4.0, 0.0, 2.0)) < 1e-12);
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let c = sample_curve();
        let t = 0.37;
        let h = 1e-6;
        let fd = (c.evaluate(t + h).pos - c.evaluate(t - h).pos).scale(0.5 / h);
        assert!(fd.distance_to(&c.evaluate(t).d1) < 1e-6);
        let fd2 = (c.evaluate(t + h).d1 - c.evaluate(t - h).d1).scale(0.5 / h);
        assert!(fd2.distance_to(&c.evaluate(t).d2) < 1e-5);
    }

    #[test]
    fn test_dual_parameter_carries_tangent() {
        let c = sample_curve();
        let lifted = BSplineCurve::new(
            c.degree,
            c.knots.clone(),
            c.control_points
                .iter()
                .map(|q| Vec3::new(Dual::constant(q.x), Dual::constant(q.y), Dual::constant(q.z)))
                .collect(),
        )
        .unwrap();
        let p = lifted.evaluate(Dual::new(0.61, 2.0));
        let d1 = c.evaluate(0.61).d1;
        assert!(p.pos.deriv().distance_to(&d1.scale(2.0)) < 1e-12);
    }

    #[test]
    fn test_interpolation_hits_points_and_tangents() {
        let pts: Vec<Vec3> = (0..6)
            .map(|k| {
                let a = k as f64 * 0.4;
                Vec3::new(a.cos(), a.sin(), 0.1 * k as f64)
            })
            .collect();
        let d0 = Vec3::new(0.0, 2.0, 0.5);
        let d1 = Vec3::new(-1.0, 1.0, 0.5);
        let c = interpolate(&pts, Some([d0, d1]), 3).unwrap();
        assert_eq!(c.num_control_points(), 8);
        for (k, t) in uniform_params(6).iter().enumerate() {
            assert!(c.evaluate(*t).pos.distance_to(&pts[k]) < 1e-10);
        }
        assert!(c.evaluate(0.0).d1.distance_to(&d0) < 1e-10);
        assert!(c.evaluate(1.0).d1.distance_to(&d1) < 1e-10);
    }

    #[test]
    fn test_interpolation_without_tangents() {
        let pts: Vec<Vec3> = (0..5)
            .map(|k| Vec3::new(k as f64, (k * k) as f64, 0.0))
            .collect();
        let c = interpolate(&pts, None, 3).unwrap();
        assert_eq!(c.degree, 3);
        for (k, t) in uniform_params(5).iter().enumerate() {
            assert!(c.evaluate(*t).pos.distance_to(&pts[k]) < 1e-10);
        }
    }

    #[test]
    fn test_dual_interpolation_values_match_plain() {
        let pts: Vec<Vec3> = (0..4).map(|k| Vec3::new(k as f64, 1.0, 0.0)).collect();
        let dual_pts: Vec<Vec3<Dual>> = pts
            .iter()
            .map(|p| Vec3::from_parts(p.to_array(), [0.0, 1.0, 0.0]))
            .collect();
        let plain = interpolate(&pts, None, 3).unwrap();
        let dual = interpolate(&dual_pts, None, 3).unwrap();
        for (a, b) in plain.control_points.iter().zip(&dual.control_points) {
            assert_eq!(*a, b.value());
            // Translating every point moves every control point equally.
            assert!((b.deriv().y - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_iso_curves_match_surface() {
        let cps: Vec<Vec3> = (0..3)
            .flat_map(|j| (0..4).map(move |i| Vec3::new(i as f64, j as f64, ((i + j) % 2) as f64)))
            .collect();
        let s = BSplineSurface::new(
            3,
            vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0],
            2,
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            4,
            cps,
        )
        .unwrap();
        let iu = s.iso_u(0.3);
        let iv = s.iso_v(0.8);
        let p = s.evaluate(0.3, 0.8).pos;
        assert!(iu.evaluate(0.8).pos.distance_to(&p) < 1e-12);
        assert!(iv.evaluate(0.3).pos.distance_to(&p) < 1e-12);
    }

    #[test]
    fn test_bad_knot_count_rejected() {
        let err = BSplineCurve::new(2, vec![0.0, 1.0], vec![Vec3::ZERO; 3]).unwrap_err();
        assert!(matches!(err, KernelError::InvalidPayload { .. }));
    }
}
