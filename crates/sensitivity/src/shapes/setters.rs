//! Pushing shape sensitivities into built entities.
//!
//! Sub-entities are found again through the section's topology. Curves
//! and ranges go first; node sensitivities are then read back from the
//! edges they bound, so they always agree with the curve they sit on.

use std::collections::HashSet;

use cad_kernel::{Context, Dual, Entity, Section};
use tracing::trace;

use super::geometry::ShapeGeom;
use crate::error::{HarnessError, Result};

fn split(payload: &[Dual]) -> (Vec<f64>, Vec<f64>) {
    payload.iter().map(|d| (d.val, d.dot)).unzip()
}

pub fn set_dots(ctx: &mut Context, section: Section, geom: &ShapeGeom<Dual>) -> Result<()> {
    let l = match (section, geom) {
        (Section::Node(node), ShapeGeom::Point(p)) => {
            ctx.set_node_dot(node, p.to_array(), p.deriv_array())?;
            return Ok(());
        }
        (Section::Loop(_) | Section::Face(_), ShapeGeom::Loop(l)) => l,
        _ => {
            return Err(HarnessError::Mismatch {
                what: "section",
                detail: format!("{section:?} does not match its shape"),
            });
        }
    };

    let lp = ctx.outer_loop(Entity::from(section))?;
    let (edges, _) = ctx.loop_edges(lp)?;
    if edges.len() != l.edges.len() {
        return Err(HarnessError::Mismatch {
            what: "section edges",
            detail: format!("loop has {}, shape has {}", edges.len(), l.edges.len()),
        });
    }

    for (edge, eg) in edges.iter().zip(&l.edges) {
        let curve = ctx
            .store()
            .get_edge(*edge)?
            .curve
            .ok_or_else(|| HarnessError::Mismatch {
                what: "section edge",
                detail: "edge has no curve".into(),
            })?;
        let (values, dots) = split(&l.curves[eg.curve].payload);
        ctx.set_curve_dot(curve, &values, &dots)?;
    }

    for (edge, eg) in edges.iter().zip(&l.edges) {
        let (range, range_dot) = split(&eg.range);
        ctx.set_range_dot(*edge, [range[0], range[1]], [range_dot[0], range_dot[1]])?;
    }

    let mut done = HashSet::new();
    for edge in &edges {
        let e = ctx.store().get_edge(*edge)?.clone();
        let range_dot = ctx.range_dot(*edge)?;
        for (end, node) in e.nodes.iter().enumerate() {
            if !done.insert(*node) {
                continue;
            }
            let at = ctx.eval_edge_dot(*edge, e.range[end], range_dot[end])?.pos;
            let xyz = ctx.node_position(*node)?;
            ctx.set_node_dot(*node, xyz, at.deriv_array())?;
        }
    }

    if let Section::Face(face) = section {
        let surface = ctx.store().get_face(face)?.surface;
        let payload = l.plane_payload().ok_or_else(|| HarnessError::Mismatch {
            what: "cap",
            detail: "capped shape has no plane".into(),
        })?;
        let (values, dots) = split(&payload);
        ctx.set_surface_dot(surface, &values, &dots)?;
    }
    trace!(edges = edges.len(), "section sensitivities set");
    Ok(())
}
