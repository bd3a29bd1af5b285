use super::Context;
use crate::error::KernelError;
use crate::topology::*;

/// Parameters sampled along an edge when measuring or comparing it.
const EDGE_SAMPLES: usize = 5;

fn lerp(range: [f64; 2], s: f64) -> f64 {
    range[0] + s * (range[1] - range[0])
}

impl Context {
    /// Geometric tolerance of an entity: the largest gap between its
    /// pieces that are supposed to coincide, never below the coincidence
    /// tolerance.
    pub fn tolerance(&self, entity: impl Into<Entity>) -> Result<f64, KernelError> {
        let floor = self.tolerance.coincidence;
        let entity = entity.into();
        let own = match entity {
            Entity::Edge(id) => self.edge_gap(id)?,
            Entity::Loop(id) => self.pcurve_gap(id)?,
            _ => 0.0,
        };
        let mut tol = floor.max(own);
        if !entity.is_geometry() {
            for child in self.store.children(entity)? {
                if !child.is_geometry() {
                    tol = tol.max(self.tolerance(child)?);
                }
            }
        }
        Ok(tol)
    }

    fn edge_gap(&self, edge: EdgeId) -> Result<f64, KernelError> {
        let e = self.store.get_edge(edge)?;
        let Some(curve) = e.curve else {
            return Ok(0.0);
        };
        let start = self.store.get_node(e.start_node())?.xyz;
        let end = self.store.get_node(e.end_node())?.xyz;
        let p0 = self.eval_curve(curve, e.range[0])?.pos;
        let p1 = self.eval_curve(curve, e.range[1])?.pos;
        Ok(p0.distance_to(&start).max(p1.distance_to(&end)))
    }

    fn pcurve_gap(&self, lp: LoopId) -> Result<f64, KernelError> {
        let l = self.store.get_loop(lp)?;
        let Some(surface) = l.surface else {
            return Ok(0.0);
        };
        let mut gap: f64 = 0.0;
        for (edge, pcurve) in l.edges.iter().zip(&l.pcurves) {
            let e = self.store.get_edge(*edge)?;
            let pc = self.store.get_pcurve(*pcurve)?;
            for k in 0..EDGE_SAMPLES {
                let t = lerp(e.range, k as f64 / (EDGE_SAMPLES - 1) as f64);
                let on_surface = self.eval_surface(surface, pc.evaluate(t))?.pos;
                let on_edge = self.eval_edge(*edge, t)?.pos;
                gap = gap.max(on_surface.distance_to(&on_edge));
            }
        }
        Ok(gap)
    }

    /// Whether two entities describe the same shape within their combined
    /// tolerance.
    pub fn is_equivalent(&self, a: impl Into<Entity>, b: impl Into<Entity>) -> Result<bool, KernelError> {
        let (a, b) = (a.into(), b.into());
        let tol = 2.0 * self.tolerance(a)?.max(self.tolerance(b)?);
        self.equivalent_within(a, b, tol)
    }

    fn equivalent_within(&self, a: Entity, b: Entity, tol: f64) -> Result<bool, KernelError> {
        Ok(match (a, b) {
            (Entity::Node(x), Entity::Node(y)) => {
                let px = self.store.get_node(x)?.xyz;
                let py = self.store.get_node(y)?.xyz;
                px.distance_to(&py) <= tol
            }
            (Entity::Curve(_), Entity::Curve(_))
            | (Entity::Surface(_), Entity::Surface(_))
            | (Entity::PCurve(_), Entity::PCurve(_)) => {
                match (self.geometry_data(a)?, self.geometry_data(b)?) {
                    (
                        super::GeometryData::Curve { kind: ka, header: ha, payload: pa },
                        super::GeometryData::Curve { kind: kb, header: hb, payload: pb },
                    ) => ka == kb && ha == hb && self.tolerance.payload_deviation(&pa, &pb) <= tol,
                    (
                        super::GeometryData::Surface { kind: ka, header: ha, payload: pa },
                        super::GeometryData::Surface { kind: kb, header: hb, payload: pb },
                    ) => ka == kb && ha == hb && self.tolerance.payload_deviation(&pa, &pb) <= tol,
                    (super::GeometryData::PCurve { payload: pa }, super::GeometryData::PCurve { payload: pb }) => {
                        self.tolerance.payload_deviation(&pa, &pb) <= tol
                    }
                    _ => false,
                }
            }
            (Entity::Edge(x), Entity::Edge(y)) => {
                let (ex, ey) = (self.store.get_edge(x)?, self.store.get_edge(y)?);
                if ex.kind != ey.kind || ex.nodes.len() != ey.nodes.len() {
                    return Ok(false);
                }
                for (nx, ny) in ex.nodes.iter().zip(&ey.nodes) {
                    if !self.equivalent_within(Entity::Node(*nx), Entity::Node(*ny), tol)? {
                        return Ok(false);
                    }
                }
                for k in 0..EDGE_SAMPLES {
                    let s = k as f64 / (EDGE_SAMPLES - 1) as f64;
                    let px = self.eval_edge(x, lerp(ex.range, s))?.pos;
                    let py = self.eval_edge(y, lerp(ey.range, s))?.pos;
                    if px.distance_to(&py) > tol {
                        return Ok(false);
                    }
                }
                true
            }
            (Entity::Loop(x), Entity::Loop(y)) => {
                let (lx, ly) = (self.store.get_loop(x)?, self.store.get_loop(y)?);
                if lx.closed != ly.closed || lx.senses != ly.senses || lx.pcurves.len() != ly.pcurves.len() {
                    return Ok(false);
                }
                self.all_equivalent(
                    lx.edges.iter().map(|e| Entity::Edge(*e)),
                    ly.edges.iter().map(|e| Entity::Edge(*e)),
                    tol,
                )?
            }
            (Entity::Face(x), Entity::Face(y)) => {
                let (fx, fy) = (self.store.get_face(x)?, self.store.get_face(y)?);
                fx.sense == fy.sense
                    && fx.loops.len() == fy.loops.len()
                    && self.equivalent_within(Entity::Surface(fx.surface), Entity::Surface(fy.surface), tol)?
                    && self.all_equivalent(
                        fx.loops.iter().map(|l| Entity::Loop(*l)),
                        fy.loops.iter().map(|l| Entity::Loop(*l)),
                        tol,
                    )?
            }
            (Entity::Shell(x), Entity::Shell(y)) => {
                let (sx, sy) = (self.store.get_shell(x)?, self.store.get_shell(y)?);
                sx.closed == sy.closed
                    && sx.faces.len() == sy.faces.len()
                    && self.all_equivalent(
                        sx.faces.iter().map(|f| Entity::Face(*f)),
                        sy.faces.iter().map(|f| Entity::Face(*f)),
                        tol,
                    )?
            }
            (Entity::Body(x), Entity::Body(y)) => {
                let (bx, by) = (self.store.get_body(x)?, self.store.get_body(y)?);
                if bx.kind != by.kind {
                    return Ok(false);
                }
                let cx = self.store.children(a)?;
                let cy = self.store.children(b)?;
                cx.len() == cy.len() && self.all_equivalent(cx.into_iter(), cy.into_iter(), tol)?
            }
            _ => false,
        })
    }

    fn all_equivalent(
        &self,
        xs: impl Iterator<Item = Entity>,
        ys: impl Iterator<Item = Entity>,
        tol: f64,
    ) -> Result<bool, KernelError> {
        let xs: Vec<Entity> = xs.collect();
        let ys: Vec<Entity> = ys.collect();
        if xs.len() != ys.len() {
            return Ok(false);
        }
        for (x, y) in xs.into_iter().zip(ys) {
            if !self.equivalent_within(x, y, tol)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
