//! Turning shape geometry into kernel entities.

use cad_kernel::{EdgeKind, Section, Sense, SurfaceKind};

use super::geometry::ShapeGeom;
use crate::error::Result;
use crate::scope::Scope;

pub fn build(scope: &mut Scope, geom: &ShapeGeom<f64>, cap: bool) -> Result<Section> {
    let l = match geom {
        ShapeGeom::Point(p) => {
            let node = scope.make_node(p.to_array())?;
            return Ok(Section::Node(scope.hold(node)));
        }
        ShapeGeom::Loop(l) => l,
    };

    let mut nodes = Vec::with_capacity(l.nodes.len());
    for p in &l.nodes {
        let node = scope.make_node(p.to_array())?;
        nodes.push(scope.hold(node));
    }
    let mut curves = Vec::with_capacity(l.curves.len());
    for c in &l.curves {
        let curve = scope.make_curve(c.kind, &c.header, &c.payload)?;
        curves.push(scope.hold(curve));
    }
    let mut edges = Vec::with_capacity(l.edges.len());
    for e in &l.edges {
        let kind = if e.nodes.len() == 1 { EdgeKind::OneNode } else { EdgeKind::TwoNode };
        let ends: Vec<_> = e.nodes.iter().map(|i| nodes[*i]).collect();
        let edge = scope.make_edge(kind, Some(curves[e.curve]), e.range, &ends)?;
        edges.push(scope.hold(edge));
    }
    let senses = vec![Sense::Forward; edges.len()];
    let lp = scope.make_loop(l.closed, None, &edges, &senses, &[])?;
    let lp = scope.hold(lp);

    if !cap {
        return Ok(Section::Loop(lp));
    }
    let Some(plane) = l.plane_payload() else {
        return Err(crate::HarnessError::Config("shape has no plane to cap".into()));
    };
    let surface = scope.make_surface(SurfaceKind::Plane, &[], &plane)?;
    let surface = scope.hold(surface);
    let face = scope.make_face(surface, &[lp], Sense::Forward)?;
    Ok(Section::Face(scope.hold(face)))
}
