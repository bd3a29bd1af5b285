//! Area properties of faces and bodies.

use crate::context::Context;
use crate::error::KernelError;
use crate::geometry::vector::Vec3;
use crate::topology::*;

/// Gauss–Legendre abscissae and weights on [-1, 1].
const GAUSS: [(f64, f64); 4] = [
    (-0.861_136_311_594_052_6, 0.347_854_845_137_453_8),
    (-0.339_981_043_584_856_3, 0.652_145_154_862_546_1),
    (0.339_981_043_584_856_3, 0.652_145_154_862_546_1),
    (0.861_136_311_594_052_6, 0.347_854_845_137_453_8),
];

/// Subintervals per direction.
const CELLS: usize = 16;

/// Quadrature nodes and weights over `[a, b]`.
fn rule(a: f64, b: f64) -> impl Iterator<Item = (f64, f64)> {
    let h = (b - a) / CELLS as f64;
    (0..CELLS).flat_map(move |c| {
        let mid = a + (c as f64 + 0.5) * h;
        GAUSS.iter().map(move |(x, w)| (mid + 0.5 * h * x, 0.5 * h * w))
    })
}

impl Context {
    /// Area of a face.
    ///
    /// Faces whose outer loop carries p-curves are integrated over the
    /// rectangle those p-curves span; other faces must be planar and are
    /// measured from their boundary.
    pub fn face_area(&self, face: FaceId) -> Result<f64, KernelError> {
        let f = self.store.get_face(face)?;
        let outer = self.store.get_loop(f.loops[0])?;
        if outer.pcurves.is_empty() {
            self.planar_area(face)
        } else {
            self.parametric_area(face)
        }
    }

    /// Total face area of a body.
    pub fn body_area(&self, body: BodyId) -> Result<f64, KernelError> {
        self.body_faces(body)?
            .into_iter()
            .map(|f| self.face_area(f))
            .sum()
    }

    fn parametric_area(&self, face: FaceId) -> Result<f64, KernelError> {
        let f = self.store.get_face(face)?;
        let outer = self.store.get_loop(f.loops[0])?;
        let (mut lo, mut hi) = ([f64::INFINITY; 2], [f64::NEG_INFINITY; 2]);
        for (edge, pcurve) in outer.edges.iter().zip(&outer.pcurves) {
            let range = self.store.get_edge(*edge)?.range;
            let pc = self.store.get_pcurve(*pcurve)?;
            for t in range {
                let uv = pc.evaluate(t);
                for k in 0..2 {
                    lo[k] = lo[k].min(uv[k]);
                    hi[k] = hi[k].max(uv[k]);
                }
            }
        }
        let mut area = 0.0;
        for (u, wu) in rule(lo[0], hi[0]) {
            for (v, wv) in rule(lo[1], hi[1]) {
                let p = self.eval_surface(f.surface, [u, v])?;
                area += wu * wv * p.du.cross(&p.dv).length();
            }
        }
        Ok(area)
    }

    /// Green's theorem over every loop: `A n = 1/2 ∮ p × dp`.
    fn planar_area(&self, face: FaceId) -> Result<f64, KernelError> {
        let f = self.store.get_face(face)?;
        let mut moment = Vec3::ZERO;
        for lp in &f.loops {
            let l = self.store.get_loop(*lp)?;
            for (edge, sense) in l.edges.iter().zip(&l.senses) {
                let range = self.store.get_edge(*edge)?.range;
                let mut m = Vec3::ZERO;
                for (t, w) in rule(range[0], range[1]) {
                    let c = self.eval_edge(*edge, t)?;
                    m = m + c.pos.cross(&c.d1).scale(w);
                }
                moment = moment + m.scale(0.5 * sense.sign());
            }
        }
        let normal = match &self.store.get_surface(f.surface)?.surface {
            crate::geometry::surfaces::Surface::Plane(p) => p.normal(),
            _ => {
                return Err(KernelError::Unsupported(
                    "area of a curved face without p-curves".into(),
                ));
            }
        };
        Ok(moment.dot(&normal).abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::curves::CurveKind;
    use crate::geometry::surfaces::SurfaceKind;
    use approx::assert_relative_eq;

    #[test]
    fn test_disk_area() {
        let mut ctx = Context::new();
        let n = ctx.make_node([2.0, 0.0, 0.0]).unwrap();
        let circle = ctx
            .make_curve(
                CurveKind::Circle,
                &[],
                &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 2.0],
            )
            .unwrap();
        let e = ctx
            .make_edge(EdgeKind::OneNode, Some(circle), [0.0, std::f64::consts::TAU], &[n])
            .unwrap();
        let lp = ctx.make_loop(true, None, &[e], &[Sense::Forward], &[]).unwrap();
        let plane = ctx
            .make_surface(SurfaceKind::Plane, &[], &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
            .unwrap();
        let face = ctx.make_face(plane, &[lp], Sense::Forward).unwrap();
        assert_relative_eq!(ctx.face_area(face).unwrap(), 4.0 * std::f64::consts::PI, epsilon = 1e-10);
    }

    #[test]
    fn test_rule_integrates_cubic_exactly() {
        let integral: f64 = rule(0.0, 2.0).map(|(x, w)| w * x * x * x).sum();
        assert_relative_eq!(integral, 4.0, epsilon = 1e-12);
    }
}
