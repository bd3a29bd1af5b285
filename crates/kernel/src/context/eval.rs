use super::Context;
use crate::error::KernelError;
use crate::geometry::bspline::{CurvePoint, SurfacePoint};
use crate::geometry::real::Dual;
use crate::geometry::surfaces::Surface;
use crate::geometry::vector::Vec3;
use crate::topology::*;

impl Context {
    pub fn eval_curve(&self, curve: CurveId, t: f64) -> Result<CurvePoint, KernelError> {
        Ok(self.store.get_curve(curve)?.curve.evaluate(t))
    }

    /// Evaluate a curve together with its sensitivity. `t_dot` is the
    /// rate of change of the parameter itself.
    pub fn eval_curve_dot(&self, curve: CurveId, t: f64, t_dot: f64) -> Result<CurvePoint<Dual>, KernelError> {
        let record = self.store.get_curve(curve)?;
        let dual = record
            .sensitivity
            .as_ref()
            .ok_or(KernelError::NoDerivative { what: "curve" })?;
        Ok(dual.evaluate(Dual::new(t, t_dot)))
    }

    pub fn eval_surface(&self, surface: SurfaceId, uv: [f64; 2]) -> Result<SurfacePoint, KernelError> {
        Ok(self.store.get_surface(surface)?.surface.evaluate(uv[0], uv[1]))
    }

    pub fn eval_surface_dot(
        &self,
        surface: SurfaceId,
        uv: [f64; 2],
        uv_dot: [f64; 2],
    ) -> Result<SurfacePoint<Dual>, KernelError> {
        let record = self.store.get_surface(surface)?;
        let dual = record
            .sensitivity
            .as_ref()
            .ok_or(KernelError::NoDerivative { what: "surface" })?;
        Ok(dual.evaluate(Dual::new(uv[0], uv_dot[0]), Dual::new(uv[1], uv_dot[1])))
    }

    /// Evaluate an edge. Degenerate edges sit on their node.
    pub fn eval_edge(&self, edge: EdgeId, t: f64) -> Result<CurvePoint, KernelError> {
        let e = self.store.get_edge(edge)?;
        match e.curve {
            Some(c) => self.eval_curve(c, t),
            None => {
                let xyz = self.store.get_node(e.start_node())?.xyz;
                Ok(CurvePoint {
                    pos: xyz,
                    d1: Vec3::ZERO,
                    d2: Vec3::ZERO,
                })
            }
        }
    }

    pub fn eval_edge_dot(&self, edge: EdgeId, t: f64, t_dot: f64) -> Result<CurvePoint<Dual>, KernelError> {
        let e = self.store.get_edge(edge)?;
        match e.curve {
            Some(c) => self.eval_curve_dot(c, t, t_dot),
            None => {
                let node = self.store.get_node(e.start_node())?;
                let dot = node.dot.ok_or(KernelError::NoDerivative { what: "node" })?;
                Ok(CurvePoint {
                    pos: Vec3::from_parts(node.xyz.to_array(), dot.to_array()),
                    d1: Vec3::zero(),
                    d2: Vec3::zero(),
                })
            }
        }
    }

    pub fn eval_face(&self, face: FaceId, uv: [f64; 2]) -> Result<SurfacePoint, KernelError> {
        self.eval_surface(self.store.get_face(face)?.surface, uv)
    }

    pub fn eval_face_dot(&self, face: FaceId, uv: [f64; 2], uv_dot: [f64; 2]) -> Result<SurfacePoint<Dual>, KernelError> {
        self.eval_surface_dot(self.store.get_face(face)?.surface, uv, uv_dot)
    }

    /// Parameters of a point on a planar face.
    pub fn invert_face(&self, face: FaceId, xyz: &Vec3) -> Result<[f64; 2], KernelError> {
        let surface = self.store.get_face(face)?.surface;
        match &self.store.get_surface(surface)?.surface {
            Surface::Plane(p) => Ok(p.parameters_of(xyz)),
            Surface::BSpline(_) => Err(KernelError::Unsupported(
                "point inversion on bspline surfaces".into(),
            )),
        }
    }
}
