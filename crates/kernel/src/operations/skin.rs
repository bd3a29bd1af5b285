//! Skinning through section curves and isoparametric extraction.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::context::Context;
use crate::error::KernelError;
use crate::geometry::bspline::{interpolate, BSplineCurve, BSplineSurface};
use crate::geometry::curves::Curve;
use crate::geometry::real::{split, Dual, Real};
use crate::geometry::surfaces::Surface;
use crate::topology::{CurveId, SurfaceId};

/// Which parameter an isocurve holds fixed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Iso {
    /// Fixed u; the curve runs in v.
    U(f64),
    /// Fixed v; the curve runs in u.
    V(f64),
}

/// Surface through compatible curves, one v-interpolation per u control
/// point. Curve `k` lies on `v = k / (K - 1)`.
pub fn skin_geometry<R: Real>(curves: &[BSplineCurve<R>], degree: usize) -> Result<BSplineSurface<R>, KernelError> {
    let first = curves
        .first()
        .ok_or(KernelError::SectionMismatch("skinning needs curves".into()))?;
    if curves.len() < 2 {
        return Err(KernelError::SectionMismatch(
            "skinning needs at least two curves".into(),
        ));
    }
    if degree == 0 {
        return Err(KernelError::invalid("skin", "degree must be at least one"));
    }
    for (k, c) in curves.iter().enumerate().skip(1) {
        if !first.is_compatible(c, 1e-12) {
            return Err(KernelError::SectionMismatch(format!(
                "curve {k} differs from curve 0 in degree, knots or control point count"
            )));
        }
    }

    let num_u = first.num_control_points();
    let mut by_u = Vec::with_capacity(num_u);
    for i in 0..num_u {
        let column: Vec<_> = curves.iter().map(|c| c.control_points[i]).collect();
        by_u.push(interpolate(&column, None, degree)?);
    }
    let v_curve = &by_u[0];
    let num_v = v_curve.num_control_points();
    let mut cps = Vec::with_capacity(num_u * num_v);
    for j in 0..num_v {
        cps.extend(by_u.iter().map(|c| c.control_points[j]));
    }
    BSplineSurface::new(
        first.degree,
        first.knots.clone(),
        v_curve.degree,
        v_curve.knots.clone(),
        num_u,
        cps,
    )
}

fn as_bspline<R: Real>(curve: &Curve<R>) -> Result<BSplineCurve<R>, KernelError> {
    match curve {
        Curve::BSpline(b) => Ok(b.clone()),
        other => Err(KernelError::Unsupported(format!(
            "skinning through a {} curve",
            other.kind()
        ))),
    }
}

fn iso_geometry<R: Real>(surface: &Surface<R>, iso: Iso) -> Result<BSplineCurve<R>, KernelError> {
    let Surface::BSpline(s) = surface else {
        return Err(KernelError::Unsupported("isocurves of planes".into()));
    };
    Ok(match iso {
        Iso::U(u) => s.iso_u(u),
        Iso::V(v) => s.iso_v(v),
    })
}

impl Context {
    /// Skin a B-spline surface through `curves`. The caller holds one
    /// reference to the result.
    #[instrument(skip(self, curves), fields(curves = curves.len()))]
    pub fn skin(&mut self, curves: &[CurveId], degree: usize) -> Result<SurfaceId, KernelError> {
        let sections = curves
            .iter()
            .map(|c| as_bspline(&self.store.get_curve(*c)?.curve))
            .collect::<Result<Vec<_>, _>>()?;
        let surface = skin_geometry(&sections, degree)?;
        debug!(num_u = surface.num_u, num_v = surface.num_v, "skinned");
        let id = self.create_surface(Surface::BSpline(surface));
        self.store.incref(id.into())?;
        Ok(id)
    }

    /// Attach the sensitivity of a skinned surface from the sensitivities
    /// of the curves it was skinned through.
    pub fn skin_dot(&mut self, surface: SurfaceId, curves: &[CurveId]) -> Result<(), KernelError> {
        let Surface::BSpline(stored) = &self.store.get_surface(surface)?.surface else {
            return Err(KernelError::Unsupported("skin_dot on a plane".into()));
        };
        let degree = stored.v_degree;
        let mut sections = Vec::with_capacity(curves.len());
        for c in curves {
            let dual = self
                .store
                .get_curve(*c)?
                .sensitivity
                .as_ref()
                .ok_or(KernelError::NoDerivative { what: "curve" })?;
            sections.push(as_bspline::<Dual>(dual)?);
        }
        let skinned = skin_geometry(&sections, degree)?;
        let (_, _, data) = Surface::BSpline(skinned).to_payload();
        let (values, dots) = split(&data);
        self.set_surface_dot(surface, &values, &dots)
    }

    /// Extract an isoparametric curve of a B-spline surface as a new curve.
    pub fn isocurve(&mut self, surface: SurfaceId, iso: Iso) -> Result<CurveId, KernelError> {
        let curve = iso_geometry(&self.store.get_surface(surface)?.surface, iso)?;
        let id = self.create_curve(Curve::BSpline(curve));
        self.store.incref(id.into())?;
        Ok(id)
    }

    /// Attach to `curve` the sensitivity of the isocurve of `surface`.
    pub fn isocurve_dot(&mut self, surface: SurfaceId, iso: Iso, curve: CurveId) -> Result<(), KernelError> {
        let dual = self
            .store
            .get_surface(surface)?
            .sensitivity
            .as_ref()
            .ok_or(KernelError::NoDerivative { what: "surface" })?;
        let iso_curve = iso_geometry(dual, iso)?;
        let (_, _, data) = Curve::BSpline(iso_curve).to_payload();
        let (values, dots) = split(&data);
        self.set_curve_dot(curve, &values, &dots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::vector::Vec3;
    use approx::assert_relative_eq;

    fn line_curve(z: f64, bend: f64) -> BSplineCurve {
        BSplineCurve::new(
            2,
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            vec![
                Vec3::new(0.0, 0.0, z),
                Vec3::new(0.5, bend, z),
                Vec3::new(1.0, 0.0, z),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_skin_passes_through_sections() {
        let curves = vec![line_curve(0.0, 0.1), line_curve(1.0, 0.3), line_curve(2.0, 0.2)];
        let surface = skin_geometry(&curves, 3).unwrap();
        // Degree is capped by the section count.
        assert_eq!(surface.v_degree, 2);
        for (k, c) in curves.iter().enumerate() {
            let v = k as f64 / 2.0;
            for s in [0.0, 0.3, 0.8] {
                let on_surface = surface.evaluate(s, v).pos;
                let on_curve = c.evaluate(s).pos;
                assert_relative_eq!(on_surface.x, on_curve.x, epsilon = 1e-12);
                assert_relative_eq!(on_surface.y, on_curve.y, epsilon = 1e-12);
                assert_relative_eq!(on_surface.z, on_curve.z, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_skin_rejects_incompatible_curves() {
        let other = BSplineCurve::new(
            1,
            vec![0.0, 0.0, 1.0, 1.0],
            vec![Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 1.0)],
        )
        .unwrap();
        let err = skin_geometry(&[line_curve(0.0, 0.0), other], 1).unwrap_err();
        assert!(matches!(err, KernelError::SectionMismatch(_)));
    }

    #[test]
    fn test_isocurve_matches_surface() {
        let curves = vec![line_curve(0.0, 0.1), line_curve(1.0, 0.4)];
        let surface = Surface::BSpline(skin_geometry(&curves, 1).unwrap());
        let iso = iso_geometry(&surface, Iso::U(0.25)).unwrap();
        for v in [0.0, 0.5, 1.0] {
            let a = iso.evaluate(v).pos;
            let b = surface.evaluate(0.25, v).pos;
            assert!(a.distance_to(&b) < 1e-12);
        }
    }
}
