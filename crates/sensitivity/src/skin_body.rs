//! Wrapping a skinned surface into a single-face body.
//!
//! The face is bounded by four isocurves: `v = v0` at the first section,
//! `u = u1` along the trailing edge, `v = v1` at the last section and
//! `u = u0` back to the start. With sharp sections the first and last
//! boundaries are closed one-node edges and the trailing edge is used
//! twice, once in each direction.

use cad_kernel::geometry::Surface;
use cad_kernel::{
    BodyChildren, BodyId, BodyKind, Context, CurveId, EdgeId, EdgeKind, Iso, NodeId, PCurveId, Sense, SurfaceId,
};
use tracing::{debug, instrument};

use crate::error::{HarnessError, Result};
use crate::scope::Scope;

/// A face body around a skinned surface, with the boundary it was built
/// from so its sensitivities can be attached later.
#[derive(Debug, Clone)]
pub struct SkinBody {
    pub body: BodyId,
    pub surface: SurfaceId,
    pub sharp: bool,
    /// Boundary curves with the isoparameter each was extracted at.
    pub curves: Vec<(Iso, CurveId)>,
    pub edges: Vec<EdgeId>,
}

fn domains(ctx: &Context, surface: SurfaceId) -> Result<([f64; 2], [f64; 2])> {
    match &ctx.store().get_surface(surface)?.surface {
        Surface::BSpline(s) => Ok((s.u_domain(), s.v_domain())),
        Surface::Plane(_) => Err(HarnessError::Config("skinned face needs a B-spline surface".into())),
    }
}

fn node_at(scope: &mut Scope, surface: SurfaceId, uv: [f64; 2]) -> Result<NodeId> {
    let p = scope.eval_surface(surface, uv)?.pos.to_array();
    let node = scope.make_node(p)?;
    Ok(scope.hold(node))
}

fn iso_edge(
    scope: &mut Scope,
    surface: SurfaceId,
    iso: Iso,
    range: [f64; 2],
    nodes: &[NodeId],
) -> Result<(CurveId, EdgeId)> {
    let curve = scope.isocurve(surface, iso)?;
    let curve = scope.hold(curve);
    let kind = if nodes.len() == 1 { EdgeKind::OneNode } else { EdgeKind::TwoNode };
    let edge = scope.make_edge(kind, Some(curve), range, nodes)?;
    Ok((curve, scope.hold(edge)))
}

/// Line pcurve `(u0 + t du, v0 + t dv)`.
fn pcurve(scope: &mut Scope, payload: [f64; 4]) -> Result<PCurveId> {
    let pc = scope.make_pcurve(&payload)?;
    Ok(scope.hold(pc))
}

/// Build the face body around `surface`. Everything made is held by `scope`.
#[instrument(skip(scope))]
pub fn wrap(scope: &mut Scope, surface: SurfaceId, sharp: bool) -> Result<SkinBody> {
    let ([u0, u1], [v0, v1]) = domains(scope, surface)?;

    let mut curves = Vec::with_capacity(4);
    let (edges, senses) = if sharp {
        let root = node_at(scope, surface, [u0, v0])?;
        let tip = node_at(scope, surface, [u0, v1])?;
        let (c0, bottom) = iso_edge(scope, surface, Iso::V(v0), [u0, u1], &[root])?;
        let (c1, trailing) = iso_edge(scope, surface, Iso::U(u1), [v0, v1], &[root, tip])?;
        let (c2, top) = iso_edge(scope, surface, Iso::V(v1), [u0, u1], &[tip])?;
        curves.extend([(Iso::V(v0), c0), (Iso::U(u1), c1), (Iso::V(v1), c2)]);
        (
            vec![bottom, trailing, top, trailing],
            vec![Sense::Forward, Sense::Forward, Sense::Reverse, Sense::Reverse],
        )
    } else {
        let corners = [[u0, v0], [u1, v0], [u1, v1], [u0, v1]];
        let mut n = Vec::with_capacity(4);
        for uv in corners {
            n.push(node_at(scope, surface, uv)?);
        }
        let (c0, bottom) = iso_edge(scope, surface, Iso::V(v0), [u0, u1], &[n[0], n[1]])?;
        let (c1, right) = iso_edge(scope, surface, Iso::U(u1), [v0, v1], &[n[1], n[2]])?;
        let (c2, top) = iso_edge(scope, surface, Iso::V(v1), [u0, u1], &[n[3], n[2]])?;
        let (c3, left) = iso_edge(scope, surface, Iso::U(u0), [v0, v1], &[n[0], n[3]])?;
        curves.extend([(Iso::V(v0), c0), (Iso::U(u1), c1), (Iso::V(v1), c2), (Iso::U(u0), c3)]);
        (
            vec![bottom, right, top, left],
            vec![Sense::Forward, Sense::Forward, Sense::Reverse, Sense::Reverse],
        )
    };

    let pcurves = [
        pcurve(scope, [0.0, v0, 1.0, 0.0])?,
        pcurve(scope, [u1, 0.0, 0.0, 1.0])?,
        pcurve(scope, [0.0, v1, 1.0, 0.0])?,
        pcurve(scope, [u0, 0.0, 0.0, 1.0])?,
    ];
    let lp = scope.make_loop(true, Some(surface), &edges, &senses, &pcurves)?;
    let lp = scope.hold(lp);
    let face = scope.make_face(surface, &[lp], Sense::Forward)?;
    let face = scope.hold(face);
    let body = scope.make_body(BodyKind::Face, BodyChildren::Face(face))?;
    let body = scope.hold(body);
    debug!(edges = edges.len(), "wrapped skinned surface");

    // The sharp trailing edge appears twice.
    let unique = if sharp { edges[..3].to_vec() } else { edges };
    Ok(SkinBody {
        body,
        surface,
        sharp,
        curves,
        edges: unique,
    })
}

/// Attach boundary sensitivities once the surface carries its own.
pub fn wrap_dot(ctx: &mut Context, skin: &SkinBody) -> Result<()> {
    for (iso, curve) in &skin.curves {
        ctx.isocurve_dot(skin.surface, *iso, *curve)?;
    }
    for edge in &skin.edges {
        let range = ctx.store().get_edge(*edge)?.range;
        ctx.set_range_dot(*edge, range, [0.0, 0.0])?;
    }
    for edge in &skin.edges {
        let e = ctx.store().get_edge(*edge)?.clone();
        for (end, node) in e.nodes.iter().enumerate() {
            let at = ctx.eval_edge_dot(*edge, e.range[end], 0.0)?.pos;
            let xyz = ctx.node_position(*node)?;
            ctx.set_node_dot(*node, xyz, at.deriv_array())?;
        }
    }
    Ok(())
}
