use tracing::trace;

use super::Context;
use crate::error::KernelError;
use crate::geometry::curves::Curve;
use crate::geometry::real::{lift, split};
use crate::geometry::surfaces::Surface;
use crate::geometry::vector::Vec3;
use crate::topology::*;

impl Context {
    fn check_payload(&self, what: &'static str, stored: &[f64], given: &[f64]) -> Result<(), KernelError> {
        if stored.len() != given.len() {
            return Err(KernelError::invalid(
                what,
                format!("expected {} values, got {}", stored.len(), given.len()),
            ));
        }
        let deviation = self.tolerance.payload_deviation(stored, given);
        if deviation > self.tolerance.payload {
            return Err(KernelError::PayloadMismatch { what, deviation });
        }
        Ok(())
    }

    /// Attach a sensitivity to a curve. `payload` must reproduce the
    /// stored geometry; `payload_dot` is its derivative.
    pub fn set_curve_dot(&mut self, curve: CurveId, payload: &[f64], payload_dot: &[f64]) -> Result<(), KernelError> {
        let (kind, header, stored) = self.store.get_curve(curve)?.curve.to_payload();
        self.check_payload("curve", &stored, payload)?;
        if payload_dot.len() != stored.len() {
            return Err(KernelError::invalid("curve sensitivity", "length differs from payload"));
        }
        let dual = Curve::from_payload(kind, &header, &lift(&stored, payload_dot))?;
        trace!(%kind, "set curve sensitivity");
        self.store.curve_mut(curve)?.sensitivity = Some(dual);
        Ok(())
    }

    /// Stored payload and its sensitivity.
    pub fn curve_dot(&self, curve: CurveId) -> Result<(Vec<f64>, Vec<f64>), KernelError> {
        let dual = self
            .store
            .get_curve(curve)?
            .sensitivity
            .as_ref()
            .ok_or(KernelError::NoDerivative { what: "curve" })?;
        let (_, _, data) = dual.to_payload();
        Ok(split(&data))
    }

    pub fn set_surface_dot(
        &mut self,
        surface: SurfaceId,
        payload: &[f64],
        payload_dot: &[f64],
    ) -> Result<(), KernelError> {
        let (kind, header, stored) = self.store.get_surface(surface)?.surface.to_payload();
        self.check_payload("surface", &stored, payload)?;
        if payload_dot.len() != stored.len() {
            return Err(KernelError::invalid("surface sensitivity", "length differs from payload"));
        }
        let dual = Surface::from_payload(kind, &header, &lift(&stored, payload_dot))?;
        trace!(%kind, "set surface sensitivity");
        self.store.surface_mut(surface)?.sensitivity = Some(dual);
        Ok(())
    }

    pub fn surface_dot(&self, surface: SurfaceId) -> Result<(Vec<f64>, Vec<f64>), KernelError> {
        let dual = self
            .store
            .get_surface(surface)?
            .sensitivity
            .as_ref()
            .ok_or(KernelError::NoDerivative { what: "surface" })?;
        let (_, _, data) = dual.to_payload();
        Ok(split(&data))
    }

    pub fn set_node_dot(&mut self, node: NodeId, xyz: [f64; 3], xyz_dot: [f64; 3]) -> Result<(), KernelError> {
        let stored = self.store.get_node(node)?.xyz.to_array();
        self.check_payload("node", &stored, &xyz)?;
        self.store.node_mut(node)?.dot = Some(Vec3::from_array(xyz_dot));
        Ok(())
    }

    pub fn node_dot(&self, node: NodeId) -> Result<[f64; 3], KernelError> {
        self.store
            .get_node(node)?
            .dot
            .map(|d| d.to_array())
            .ok_or(KernelError::NoDerivative { what: "node" })
    }

    pub fn set_range_dot(&mut self, edge: EdgeId, range: [f64; 2], range_dot: [f64; 2]) -> Result<(), KernelError> {
        let stored = self.store.get_edge(edge)?.range;
        self.check_payload("edge range", &stored, &range)?;
        self.store.edge_mut(edge)?.range_dot = Some(range_dot);
        Ok(())
    }

    pub fn range_dot(&self, edge: EdgeId) -> Result<[f64; 2], KernelError> {
        self.store
            .get_edge(edge)?
            .range_dot
            .ok_or(KernelError::NoDerivative { what: "edge range" })
    }

    /// Whether the entity and everything it references carry sensitivities.
    /// Parameter-space curves are not considered.
    pub fn has_geometry_dot(&self, entity: impl Into<Entity>) -> Result<bool, KernelError> {
        let entity = entity.into();
        let own = match entity {
            Entity::Curve(id) => self.store.get_curve(id)?.sensitivity.is_some(),
            Entity::Surface(id) => self.store.get_surface(id)?.sensitivity.is_some(),
            Entity::PCurve(id) => {
                self.store.get_pcurve(id)?;
                true
            }
            Entity::Node(id) => self.store.get_node(id)?.dot.is_some(),
            Entity::Edge(id) => self.store.get_edge(id)?.range_dot.is_some(),
            _ => true,
        };
        if !own {
            return Ok(false);
        }
        for child in self.store.children(entity)? {
            if matches!(child, Entity::PCurve(_)) {
                continue;
            }
            if !self.has_geometry_dot(child)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::curves::CurveKind;

    #[test]
    fn test_mismatched_payload_rejected() {
        let mut ctx = Context::new();
        let line = ctx
            .make_curve(CurveKind::Line, &[], &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0])
            .unwrap();
        let err = ctx
            .set_curve_dot(line, &[0.0, 0.0, 0.1, 1.0, 0.0, 0.0], &[0.0; 6])
            .unwrap_err();
        assert!(matches!(err, KernelError::PayloadMismatch { .. }));
        assert!(!ctx.has_geometry_dot(line).unwrap());
    }

    #[test]
    fn test_curve_dot_round_trip_and_eval() {
        let mut ctx = Context::new();
        let payload = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        let line = ctx.make_curve(CurveKind::Line, &[], &payload).unwrap();
        let dot = [0.0, 1.0, 0.0, 0.0, 0.0, 2.0];
        ctx.set_curve_dot(line, &payload, &dot).unwrap();
        let (values, dots) = ctx.curve_dot(line).unwrap();
        assert_eq!(values, payload.to_vec());
        assert_eq!(dots, dot.to_vec());
        // d/ds (o + t d) = o_dot + t d_dot + t_dot d
        let p = ctx.eval_curve_dot(line, 0.5, 0.25).unwrap();
        let d = p.pos.deriv();
        assert!((d.x - 0.25).abs() < 1e-12);
        assert!((d.y - 1.0).abs() < 1e-12);
        assert!((d.z - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_has_geometry_dot_covers_children() {
        let mut ctx = Context::new();
        let a = ctx.make_node([0.0, 0.0, 0.0]).unwrap();
        let b = ctx.make_node([1.0, 0.0, 0.0]).unwrap();
        let payload = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        let line = ctx.make_curve(CurveKind::Line, &[], &payload).unwrap();
        let e = ctx.make_edge(EdgeKind::TwoNode, Some(line), [0.0, 1.0], &[a, b]).unwrap();
        ctx.set_range_dot(e, [0.0, 1.0], [0.0, 0.0]).unwrap();
        assert!(!ctx.has_geometry_dot(e).unwrap());
        ctx.set_curve_dot(line, &payload, &[0.0; 6]).unwrap();
        ctx.set_node_dot(a, [0.0, 0.0, 0.0], [0.0; 3]).unwrap();
        assert!(!ctx.has_geometry_dot(e).unwrap());
        ctx.set_node_dot(b, [1.0, 0.0, 0.0], [0.0; 3]).unwrap();
        assert!(ctx.has_geometry_dot(e).unwrap());
    }

    #[test]
    fn test_missing_dot_is_reported() {
        let mut ctx = Context::new();
        let n = ctx.make_node([1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(
            ctx.node_dot(n),
            Err(KernelError::NoDerivative { what: "node" })
        ));
    }
}
