//! The kernel context: owns every entity, hands out typed handles and
//! counts references so that releasing a handle frees whatever is no
//! longer used.

mod data;
mod equivalence;
mod eval;
mod query;
mod sensitivity;

pub use data::{GeometryData, TopologyData};

use tracing::{debug, instrument};

use crate::error::KernelError;
use crate::geometry::curves::{Curve, CurveKind, PCurve};
use crate::geometry::surfaces::{Surface, SurfaceKind};
use crate::geometry::vector::Vec3;
use crate::operations::LoftConfig;
use crate::topology::*;
use crate::Tolerance;

pub struct Context {
    pub(crate) store: EntityStore,
    pub tolerance: Tolerance,
    pub loft: LoftConfig,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::with_tolerance(Tolerance::default())
    }

    pub fn with_tolerance(tolerance: Tolerance) -> Self {
        Self {
            store: EntityStore::new(),
            tolerance,
            loft: LoftConfig::default(),
        }
    }

    /// Read-only view of the underlying arenas.
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Number of entities still alive; zero once every handle is released.
    pub fn live_count(&self) -> usize {
        self.store.live_count()
    }

    pub fn refs(&self, entity: impl Into<Entity>) -> Result<u32, KernelError> {
        self.store.refs(entity.into())
    }

    /// Take an additional caller reference.
    pub fn retain(&mut self, entity: impl Into<Entity>) -> Result<(), KernelError> {
        self.store.incref(entity.into())
    }

    /// Give up one caller reference. Entities no longer referenced by
    /// anything are freed together with their unreferenced children.
    pub fn release(&mut self, entity: impl Into<Entity>) -> Result<(), KernelError> {
        let entity = entity.into();
        debug!(class = entity.class_name(), "release");
        self.store.release(entity)
    }

    // ─── Geometry ───────────────────────────────────────────────────────

    /// Create a curve from its flat payload; see [`Curve::from_payload`].
    pub fn make_curve(&mut self, kind: CurveKind, header: &[usize], payload: &[f64]) -> Result<CurveId, KernelError> {
        let curve = Curve::from_payload(kind, header, payload)?;
        let id = self.create_curve(curve);
        self.store.incref(id.into())?;
        Ok(id)
    }

    pub fn make_surface(
        &mut self,
        kind: SurfaceKind,
        header: &[usize],
        payload: &[f64],
    ) -> Result<SurfaceId, KernelError> {
        let surface = Surface::from_payload(kind, header, payload)?;
        let id = self.create_surface(surface);
        self.store.incref(id.into())?;
        Ok(id)
    }

    /// Create a parameter-space line, payload `[u0, v0, du, dv]`.
    pub fn make_pcurve(&mut self, payload: &[f64]) -> Result<PCurveId, KernelError> {
        let pcurve = PCurve::from_payload(payload)?;
        let id = self.store.insert_pcurve(pcurve);
        self.store.incref(id.into())?;
        Ok(id)
    }

    pub(crate) fn create_curve(&mut self, curve: Curve) -> CurveId {
        self.store.insert_curve(CurveRecord {
            curve,
            sensitivity: None,
        })
    }

    pub(crate) fn create_surface(&mut self, surface: Surface) -> SurfaceId {
        self.store.insert_surface(SurfaceRecord {
            surface,
            sensitivity: None,
        })
    }

    // ─── Topology ───────────────────────────────────────────────────────

    pub fn make_node(&mut self, xyz: [f64; 3]) -> Result<NodeId, KernelError> {
        let id = self.create_node(Vec3::from_array(xyz));
        self.store.incref(id.into())?;
        Ok(id)
    }

    /// Create an edge. Two-node edges take `[start, end]`, one-node and
    /// degenerate edges a single node; degenerate edges carry no curve.
    pub fn make_edge(
        &mut self,
        kind: EdgeKind,
        curve: Option<CurveId>,
        range: [f64; 2],
        nodes: &[NodeId],
    ) -> Result<EdgeId, KernelError> {
        let id = self.create_edge(kind, curve, range, nodes)?;
        self.store.incref(id.into())?;
        Ok(id)
    }

    /// Create a loop. `pcurves` is either empty or holds one entry per
    /// edge, in which case `surface` must be given.
    pub fn make_loop(
        &mut self,
        closed: bool,
        surface: Option<SurfaceId>,
        edges: &[EdgeId],
        senses: &[Sense],
        pcurves: &[PCurveId],
    ) -> Result<LoopId, KernelError> {
        let id = self.create_loop(closed, surface, edges, senses, pcurves)?;
        self.store.incref(id.into())?;
        Ok(id)
    }

    pub fn make_face(&mut self, surface: SurfaceId, loops: &[LoopId], sense: Sense) -> Result<FaceId, KernelError> {
        let id = self.create_face(surface, loops, sense)?;
        self.store.incref(id.into())?;
        Ok(id)
    }

    pub fn make_shell(&mut self, closed: bool, faces: &[FaceId]) -> Result<ShellId, KernelError> {
        let id = self.create_shell(closed, faces)?;
        self.store.incref(id.into())?;
        Ok(id)
    }

    #[instrument(skip(self, children))]
    pub fn make_body(&mut self, kind: BodyKind, children: BodyChildren) -> Result<BodyId, KernelError> {
        let id = self.create_body(kind, children, None)?;
        self.store.incref(id.into())?;
        Ok(id)
    }

    pub(crate) fn create_node(&mut self, xyz: Vec3) -> NodeId {
        self.store.insert_node(Node { xyz, dot: None })
    }

    pub(crate) fn create_edge(
        &mut self,
        kind: EdgeKind,
        curve: Option<CurveId>,
        range: [f64; 2],
        nodes: &[NodeId],
    ) -> Result<EdgeId, KernelError> {
        let expected_nodes = match kind {
            EdgeKind::TwoNode => 2,
            EdgeKind::OneNode | EdgeKind::Degenerate => 1,
        };
        if nodes.len() != expected_nodes {
            return Err(KernelError::InvalidTopology(format!(
                "{kind:?} edge needs {expected_nodes} node(s), got {}",
                nodes.len()
            )));
        }
        for n in nodes {
            self.store.get_node(*n)?;
        }
        match (kind, curve) {
            (EdgeKind::Degenerate, Some(_)) => {
                return Err(KernelError::InvalidTopology(
                    "degenerate edge cannot carry a curve".into(),
                ));
            }
            (EdgeKind::TwoNode | EdgeKind::OneNode, None) => {
                return Err(KernelError::InvalidTopology(format!(
                    "{kind:?} edge needs a curve"
                )));
            }
            (_, Some(c)) => {
                if let Some([t0, t1]) = self.store.get_curve(c)?.curve.domain() {
                    let tol = self.tolerance.parametric;
                    if range[0] < t0 - tol || range[1] > t1 + tol {
                        return Err(KernelError::InvalidTopology(format!(
                            "edge range {range:?} leaves curve domain [{t0}, {t1}]"
                        )));
                    }
                }
            }
            (EdgeKind::Degenerate, None) => {}
        }
        if !(range[0] < range[1]) {
            return Err(KernelError::InvalidTopology(format!(
                "edge range {range:?} is empty"
            )));
        }
        let id = self.store.insert_edge(Edge {
            kind,
            curve,
            range,
            range_dot: None,
            nodes: nodes.to_vec(),
        });
        self.store.adopt_children(id.into())?;
        Ok(id)
    }

    /// Start and end node of an edge as traversed with `sense`.
    pub(crate) fn oriented_nodes(&self, edge: EdgeId, sense: Sense) -> Result<(NodeId, NodeId), KernelError> {
        let e = self.store.get_edge(edge)?;
        Ok(match sense {
            Sense::Forward => (e.start_node(), e.end_node()),
            Sense::Reverse => (e.end_node(), e.start_node()),
        })
    }

    pub(crate) fn create_loop(
        &mut self,
        closed: bool,
        surface: Option<SurfaceId>,
        edges: &[EdgeId],
        senses: &[Sense],
        pcurves: &[PCurveId],
    ) -> Result<LoopId, KernelError> {
        if edges.is_empty() {
            return Err(KernelError::InvalidTopology("loop has no edges".into()));
        }
        if senses.len() != edges.len() {
            return Err(KernelError::InvalidTopology(format!(
                "loop has {} edges but {} senses",
                edges.len(),
                senses.len()
            )));
        }
        if !pcurves.is_empty() && (pcurves.len() != edges.len() || surface.is_none()) {
            return Err(KernelError::InvalidTopology(
                "pcurves need a reference surface and one entry per edge".into(),
            ));
        }
        if let Some(s) = surface {
            self.store.get_surface(s)?;
        }
        for p in pcurves {
            self.store.get_pcurve(*p)?;
        }

        let ends: Vec<(NodeId, NodeId)> = edges
            .iter()
            .zip(senses)
            .map(|(e, s)| self.oriented_nodes(*e, *s))
            .collect::<Result<_, _>>()?;
        let links = if closed { ends.len() } else { ends.len() - 1 };
        for i in 0..links {
            let next = (i + 1) % ends.len();
            if ends[i].1 != ends[next].0 {
                return Err(KernelError::InvalidTopology(format!(
                    "loop is not connected between edges {i} and {next}"
                )));
            }
        }

        let id = self.store.insert_loop(Loop {
            closed,
            surface,
            edges: edges.to_vec(),
            senses: senses.to_vec(),
            pcurves: pcurves.to_vec(),
        });
        self.store.adopt_children(id.into())?;
        Ok(id)
    }

    pub(crate) fn create_face(&mut self, surface: SurfaceId, loops: &[LoopId], sense: Sense) -> Result<FaceId, KernelError> {
        self.store.get_surface(surface)?;
        if loops.is_empty() {
            return Err(KernelError::InvalidTopology("face has no loops".into()));
        }
        for l in loops {
            if !self.store.get_loop(*l)?.closed {
                return Err(KernelError::InvalidTopology("face loops must be closed".into()));
            }
        }
        let id = self.store.insert_face(Face {
            surface,
            loops: loops.to_vec(),
            sense,
        });
        self.store.adopt_children(id.into())?;
        Ok(id)
    }

    pub(crate) fn create_shell(&mut self, closed: bool, faces: &[FaceId]) -> Result<ShellId, KernelError> {
        if faces.is_empty() {
            return Err(KernelError::InvalidTopology("shell has no faces".into()));
        }
        for f in faces {
            self.store.get_face(*f)?;
        }
        let id = self.store.insert_shell(Shell {
            closed,
            faces: faces.to_vec(),
        });
        self.store.adopt_children(id.into())?;
        Ok(id)
    }

    pub(crate) fn create_body(
        &mut self,
        kind: BodyKind,
        children: BodyChildren,
        loft: Option<crate::operations::loft::LoftLayout>,
    ) -> Result<BodyId, KernelError> {
        match (&kind, &children) {
            (BodyKind::Wire, BodyChildren::Wire(l)) => {
                self.store.get_loop(*l)?;
            }
            (BodyKind::Face, BodyChildren::Face(f)) => {
                self.store.get_face(*f)?;
            }
            (BodyKind::Sheet | BodyKind::Solid, BodyChildren::Shells(shells)) => {
                if shells.is_empty() {
                    return Err(KernelError::InvalidTopology("body has no shells".into()));
                }
                for s in shells {
                    let shell = self.store.get_shell(*s)?;
                    if kind == BodyKind::Solid && !shell.closed {
                        return Err(KernelError::InvalidTopology(
                            "solid bodies need closed shells".into(),
                        ));
                    }
                }
            }
            _ => {
                return Err(KernelError::InvalidTopology(format!(
                    "{kind:?} body cannot hold {children:?}"
                )));
            }
        }
        let id = self.store.insert_body(Body {
            kind,
            children,
            loft,
        });
        self.store.adopt_children(id.into())?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square(ctx: &mut Context) -> LoopId {
        let corners = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let nodes: Vec<NodeId> = corners.iter().map(|c| ctx.make_node(*c).unwrap()).collect();
        let mut edges = Vec::new();
        for i in 0..4 {
            let a = corners[i];
            let b = corners[(i + 1) % 4];
            let line = ctx
                .make_curve(
                    CurveKind::Line,
                    &[],
                    &[a[0], a[1], a[2], b[0] - a[0], b[1] - a[1], b[2] - a[2]],
                )
                .unwrap();
            let e = ctx
                .make_edge(EdgeKind::TwoNode, Some(line), [0.0, 1.0], &[nodes[i], nodes[(i + 1) % 4]])
                .unwrap();
            ctx.release(line).unwrap();
            edges.push(e);
        }
        for n in nodes {
            ctx.release(n).unwrap();
        }
        let lp = ctx
            .make_loop(true, None, &edges, &[Sense::Forward; 4], &[])
            .unwrap();
        for e in edges {
            ctx.release(e).unwrap();
        }
        lp
    }

    #[test]
    fn test_parent_keeps_children_alive() {
        let mut ctx = Context::new();
        let lp = unit_square(&mut ctx);
        // 4 nodes, 4 lines, 4 edges, 1 loop
        assert_eq!(ctx.live_count(), 13);
        ctx.release(lp).unwrap();
        assert_eq!(ctx.live_count(), 0);
    }

    #[test]
    fn test_disconnected_loop_rejected() {
        let mut ctx = Context::new();
        let a = ctx.make_node([0.0, 0.0, 0.0]).unwrap();
        let b = ctx.make_node([1.0, 0.0, 0.0]).unwrap();
        let line = ctx
            .make_curve(CurveKind::Line, &[], &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0])
            .unwrap();
        let e = ctx.make_edge(EdgeKind::TwoNode, Some(line), [0.0, 1.0], &[a, b]).unwrap();
        let err = ctx
            .make_loop(true, None, &[e, e], &[Sense::Forward, Sense::Forward], &[])
            .unwrap_err();
        assert!(matches!(err, KernelError::InvalidTopology(_)));
    }

    #[test]
    fn test_degenerate_edge_rejects_curve() {
        let mut ctx = Context::new();
        let a = ctx.make_node([0.0, 0.0, 0.0]).unwrap();
        let line = ctx
            .make_curve(CurveKind::Line, &[], &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0])
            .unwrap();
        assert!(ctx
            .make_edge(EdgeKind::Degenerate, Some(line), [0.0, 1.0], &[a])
            .is_err());
        assert!(ctx.make_edge(EdgeKind::Degenerate, None, [0.0, 1.0], &[a]).is_ok());
    }

    #[test]
    fn test_face_body_lifetime() {
        let mut ctx = Context::new();
        let lp = unit_square(&mut ctx);
        let plane = ctx
            .make_surface(SurfaceKind::Plane, &[], &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
            .unwrap();
        let face = ctx.make_face(plane, &[lp], Sense::Forward).unwrap();
        ctx.release(plane).unwrap();
        ctx.release(lp).unwrap();
        let body = ctx.make_body(BodyKind::Face, BodyChildren::Face(face)).unwrap();
        ctx.release(face).unwrap();
        assert_eq!(ctx.refs(body).unwrap(), 1);
        ctx.release(body).unwrap();
        assert_eq!(ctx.live_count(), 0);
    }
}
