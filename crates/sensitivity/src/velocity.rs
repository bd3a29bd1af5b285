//! Section velocities computed straight from shape formulas.
//!
//! Bodies built through [`CaseVelocity`] never read stored sensitivities,
//! so they give an independent answer to compare the stored path against.

use cad_kernel::geometry::{Curve, CurvePoint};
use cad_kernel::{
    BSplineVelocity, Context, CurveKind, Dual, EdgeId, EdgeVelocity, Entity, KernelError, NodeId, PointVelocity,
    RangeVelocity, Section, SectionVelocity,
};

use crate::error::Result;
use crate::params::ParamSet;
use crate::shapes::{LoopGeom, SectionSpec, ShapeGeom};

fn callback(msg: impl Into<String>) -> KernelError {
    KernelError::Callback(msg.into())
}

/// Velocity provider for the sections of one case at one parameter seed.
pub struct CaseVelocity {
    sections: Vec<(Section, ShapeGeom<Dual>)>,
}

impl CaseVelocity {
    pub fn new(specs: &[SectionSpec], sections: &[Section], params: &ParamSet) -> Result<Self> {
        let sections = specs
            .iter()
            .zip(sections)
            .map(|(spec, section)| Ok((*section, spec.geometry(params)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sections })
    }

    fn section(&self, k: usize) -> std::result::Result<&(Section, ShapeGeom<Dual>), KernelError> {
        self.sections
            .get(k)
            .ok_or_else(|| callback(format!("no section {k}")))
    }

    /// The loop geometry of section `k` and the index of `edge` in it.
    fn locate(&self, ctx: &Context, k: usize, edge: EdgeId) -> std::result::Result<(&LoopGeom<Dual>, usize), KernelError> {
        let (section, geom) = self.section(k)?;
        let ShapeGeom::Loop(l) = geom else {
            return Err(callback(format!("section {k} has no edges")));
        };
        let lp = ctx.outer_loop(Entity::from(*section))?;
        let (edges, _) = ctx.loop_edges(lp)?;
        let i = edges
            .iter()
            .position(|e| *e == edge)
            .ok_or_else(|| callback(format!("edge not in section {k}")))?;
        l.edges
            .get(i)
            .map(|_| (l, i))
            .ok_or_else(|| callback(format!("section {k} has {} edges in its shape", l.edges.len())))
    }

    fn curve(l: &LoopGeom<Dual>, i: usize) -> std::result::Result<Curve<Dual>, KernelError> {
        let c = &l.curves[l.edges[i].curve];
        Curve::from_payload(c.kind, &c.header, &c.payload)
    }
}

fn point(p: &cad_kernel::Vec3<Dual>) -> PointVelocity {
    PointVelocity {
        xyz: p.to_array(),
        xyz_dot: p.deriv_array(),
    }
}

impl SectionVelocity for CaseVelocity {
    fn range_velocity(&self, ctx: &Context, section: usize, edge: EdgeId) -> std::result::Result<RangeVelocity, KernelError> {
        let (l, i) = self.locate(ctx, section, edge)?;
        let [a, b] = l.edges[i].range;
        Ok(RangeVelocity {
            range: [a.val, b.val],
            range_dot: [a.dot, b.dot],
        })
    }

    fn node_velocity(
        &self,
        ctx: &Context,
        section: usize,
        node: NodeId,
        edge: Option<EdgeId>,
    ) -> std::result::Result<PointVelocity, KernelError> {
        if let (_, ShapeGeom::Point(p)) = self.section(section)? {
            return Ok(point(p));
        }
        let edges = match edge {
            Some(e) => vec![e],
            None => {
                let (s, _) = self.section(section)?;
                ctx.loop_edges(ctx.outer_loop(Entity::from(*s))?)?.0
            }
        };
        for edge in edges {
            let (l, i) = self.locate(ctx, section, edge)?;
            let stored = ctx.store().get_edge(edge)?;
            if let Some(end) = stored.nodes.iter().position(|n| *n == node) {
                let index = l.edges[i].nodes[end];
                return Ok(point(&l.nodes[index]));
            }
        }
        Err(callback(format!("node not found in section {section}")))
    }

    fn edge_velocity(
        &self,
        ctx: &Context,
        section: usize,
        edge: EdgeId,
        ts: &[f64],
        t_dots: &[f64],
    ) -> std::result::Result<EdgeVelocity, KernelError> {
        if ts.len() != t_dots.len() {
            return Err(callback("parameter and rate counts differ"));
        }
        let (l, i) = self.locate(ctx, section, edge)?;
        let curve = Self::curve(l, i)?;
        let (xyz, xyz_dot) = ts
            .iter()
            .zip(t_dots)
            .map(|(t, dt)| {
                let p = curve.evaluate(Dual::new(*t, *dt)).pos;
                (p.to_array(), p.deriv_array())
            })
            .unzip();
        let ends: [CurvePoint<Dual>; 2] = l.edges[i].range.map(|t| curve.evaluate(t));
        Ok(EdgeVelocity {
            xyz,
            xyz_dot,
            tangents: [ends[0].d1.to_array(), ends[1].d1.to_array()],
            tangents_dot: [ends[0].d1.deriv_array(), ends[1].d1.deriv_array()],
        })
    }

    fn bspline_velocity(&self, ctx: &Context, section: usize, edge: EdgeId) -> std::result::Result<BSplineVelocity, KernelError> {
        let (l, i) = self.locate(ctx, section, edge)?;
        let c = &l.curves[l.edges[i].curve];
        if c.kind != CurveKind::BSpline {
            return Err(callback(format!("edge {i} of section {section} is a {}", c.kind)));
        }
        Ok(BSplineVelocity {
            header: c.header.clone(),
            payload: c.values(),
            payload_dot: c.dots(),
        })
    }
}
