//! Integration tests for the lofting operators.

use approx::assert_relative_eq;

use cad_kernel::velocity::{BSplineVelocity, EdgeVelocity, PointVelocity, RangeVelocity};
use cad_kernel::*;

/// Line through `a` and `b` on [0, 1].
fn line_payload(a: [f64; 3], b: [f64; 3]) -> [f64; 6] {
    [a[0], a[1], a[2], b[0] - a[0], b[1] - a[1], b[2] - a[2]]
}

fn corners(z: f64, half: f64) -> Vec<[f64; 3]> {
    vec![
        [-half, -half, z],
        [half, -half, z],
        [half, half, z],
        [-half, half, z],
    ]
}

/// Closed loop of straight edges through `pts`. The caller holds only the
/// returned loop.
fn polygon(ctx: &mut Context, pts: &[[f64; 3]]) -> LoopId {
    let n = pts.len();
    let nodes: Vec<NodeId> = pts.iter().map(|p| ctx.make_node(*p).unwrap()).collect();
    let mut edges = Vec::new();
    for i in 0..n {
        let line = ctx
            .make_curve(CurveKind::Line, &[], &line_payload(pts[i], pts[(i + 1) % n]))
            .unwrap();
        let e = ctx
            .make_edge(EdgeKind::TwoNode, Some(line), [0.0, 1.0], &[nodes[i], nodes[(i + 1) % n]])
            .unwrap();
        ctx.release(line).unwrap();
        edges.push(e);
    }
    let lp = ctx
        .make_loop(true, None, &edges, &vec![Sense::Forward; n], &[])
        .unwrap();
    for e in edges {
        ctx.release(e).unwrap();
    }
    for n in nodes {
        ctx.release(n).unwrap();
    }
    lp
}

fn planar_face(ctx: &mut Context, pts: &[[f64; 3]]) -> FaceId {
    let lp = polygon(ctx, pts);
    let z = pts[0][2];
    let plane = ctx
        .make_surface(SurfaceKind::Plane, &[], &[0.0, 0.0, z, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
        .unwrap();
    let face = ctx.make_face(plane, &[lp], Sense::Forward).unwrap();
    ctx.release(plane).unwrap();
    ctx.release(lp).unwrap();
    face
}

/// Attach a rigid translation `velocity` to every entity of a polygon loop.
fn translate_dots(ctx: &mut Context, lp: LoopId, velocity: [f64; 3]) {
    let (edges, _) = ctx.loop_edges(lp).unwrap();
    for e in edges {
        let edge = ctx.store().get_edge(e).unwrap().clone();
        let curve = edge.curve.unwrap();
        let GeometryData::Curve { payload, .. } = ctx.geometry_data(curve).unwrap() else {
            unreachable!()
        };
        let dot = [velocity[0], velocity[1], velocity[2], 0.0, 0.0, 0.0];
        ctx.set_curve_dot(curve, &payload, &dot).unwrap();
        ctx.set_range_dot(e, edge.range, [0.0, 0.0]).unwrap();
        for n in &edge.nodes {
            let xyz = ctx.node_position(*n).unwrap();
            ctx.set_node_dot(*n, xyz, velocity).unwrap();
        }
    }
}

#[test]
fn test_ruled_through_nodes_is_a_wire() {
    let mut ctx = Context::new();
    let pts = [[0.0, 0.0, 0.0], [1.0, 0.2, 0.1], [1.0, 1.2, 0.1], [1.0, 1.2, 1.1]];
    let nodes: Vec<NodeId> = pts.iter().map(|p| ctx.make_node(*p).unwrap()).collect();
    let sections: Vec<Section> = nodes.iter().map(|n| Section::Node(*n)).collect();

    let body = ctx.ruled(&sections).unwrap();
    assert_eq!(ctx.body_kind(body).unwrap(), BodyKind::Wire);
    let edges = ctx.body_edges(body).unwrap();
    assert_eq!(edges.len(), 3);
    let mid = ctx.eval_edge(edges[1], 0.5).unwrap().pos;
    assert!(mid.distance_to(&Vec3::new(1.0, 0.7, 0.1)) < 1e-12);

    ctx.release(body).unwrap();
    for n in nodes {
        ctx.release(n).unwrap();
    }
    assert_eq!(ctx.live_count(), 0);
}

#[test]
fn test_ruled_between_loops_is_a_sheet() {
    let mut ctx = Context::new();
    let a = polygon(&mut ctx, &corners(0.0, 0.5));
    let b = polygon(&mut ctx, &corners(1.0, 0.5));
    let body = ctx.ruled(&[Section::Loop(a), Section::Loop(b)]).unwrap();

    assert_eq!(ctx.body_kind(body).unwrap(), BodyKind::Sheet);
    let faces = ctx.body_faces(body).unwrap();
    assert_eq!(faces.len(), 4);
    // First face spans the first edge of both squares.
    let p = ctx.eval_face(faces[0], [0.25, 0.5]).unwrap().pos;
    assert_relative_eq!(p.x, -0.25, epsilon = 1e-12);
    assert_relative_eq!(p.y, -0.5, epsilon = 1e-12);
    assert_relative_eq!(p.z, 0.5, epsilon = 1e-12);
    assert_relative_eq!(ctx.body_area(body).unwrap(), 4.0, epsilon = 1e-10);

    for e in [Entity::Body(body), Entity::Loop(a), Entity::Loop(b)] {
        ctx.release(e).unwrap();
    }
    assert_eq!(ctx.live_count(), 0);
}

#[test]
fn test_ruled_between_faces_is_a_capped_solid() {
    let mut ctx = Context::new();
    let a = planar_face(&mut ctx, &corners(0.0, 0.5));
    let b = planar_face(&mut ctx, &corners(2.0, 0.5));
    let body = ctx.ruled(&[Section::Face(a), Section::Face(b)]).unwrap();

    assert_eq!(ctx.body_kind(body).unwrap(), BodyKind::Solid);
    assert_eq!(ctx.body_faces(body).unwrap().len(), 6);
    assert_relative_eq!(ctx.body_area(body).unwrap(), 10.0, epsilon = 1e-9);
    assert_eq!(ctx.tolerance(body).unwrap(), ctx.tolerance.coincidence);
}

#[test]
fn test_blend_passes_through_inner_sections() {
    let mut ctx = Context::new();
    let loops: Vec<LoopId> = [0.0, 1.0, 2.0]
        .iter()
        .map(|z| polygon(&mut ctx, &corners(*z, 0.5)))
        .collect();
    let sections: Vec<Section> = loops.iter().map(|l| Section::Loop(*l)).collect();
    let body = ctx.blend(&sections, None, None).unwrap();

    let faces = ctx.body_faces(body).unwrap();
    assert_eq!(faces.len(), 4);
    let p = ctx.eval_face(faces[1], [0.5, 0.5]).unwrap().pos;
    assert_relative_eq!(p.x, 0.5, epsilon = 1e-12);
    assert_relative_eq!(p.y, 0.0, epsilon = 1e-12);
    assert_relative_eq!(p.z, 1.0, epsilon = 1e-12);
}

#[test]
fn test_blend_with_noses_is_a_solid() {
    let mut ctx = Context::new();
    let tip0 = ctx.make_node([0.0, 0.0, -1.0]).unwrap();
    let square = polygon(&mut ctx, &corners(0.0, 0.5));
    let tip1 = ctx.make_node([0.0, 0.0, 1.0]).unwrap();
    let rc1 = NoseCurvature::new([0.3, 1.0, 0.0, 0.0, 0.2, 0.0, 1.0, 0.0]);
    let rcn = NoseCurvature::new([0.3, 1.0, 0.0, 0.0, 0.2, 0.0, 1.0, 0.0]);
    let sections = [Section::Node(tip0), Section::Loop(square), Section::Node(tip1)];

    let body = ctx.blend(&sections, Some(&rc1), Some(&rcn)).unwrap();
    assert_eq!(ctx.body_kind(body).unwrap(), BodyKind::Solid);
    let edges = ctx.body_edges(body).unwrap();
    let degenerate = edges
        .iter()
        .filter(|e| ctx.store().get_edge(**e).unwrap().is_degenerate())
        .count();
    assert_eq!(degenerate, 8);
}

#[test]
fn test_nose_curvature_needs_node_end() {
    let mut ctx = Context::new();
    let a = polygon(&mut ctx, &corners(0.0, 0.5));
    let b = polygon(&mut ctx, &corners(1.0, 0.5));
    let rc = NoseCurvature::new([0.3, 1.0, 0.0, 0.0, 0.2, 0.0, 1.0, 0.0]);
    let before = ctx.live_count();
    let err = ctx
        .blend(&[Section::Loop(a), Section::Loop(b)], Some(&rc), None)
        .unwrap_err();
    assert!(matches!(err, KernelError::InvalidPayload { .. }));
    assert_eq!(ctx.live_count(), before);
}

#[test]
fn test_mismatched_sections_rejected() {
    let mut ctx = Context::new();
    let square = polygon(&mut ctx, &corners(0.0, 0.5));
    let triangle = polygon(&mut ctx, &[[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0]]);
    let before = ctx.live_count();
    let err = ctx
        .ruled(&[Section::Loop(square), Section::Loop(triangle)])
        .unwrap_err();
    assert!(matches!(err, KernelError::SectionMismatch(_)));
    assert_eq!(ctx.live_count(), before);
}

#[test]
fn test_ruled_dot_needs_section_sensitivities() {
    let mut ctx = Context::new();
    let a = polygon(&mut ctx, &corners(0.0, 0.5));
    let b = polygon(&mut ctx, &corners(1.0, 0.5));
    let sections = [Section::Loop(a), Section::Loop(b)];
    let body = ctx.ruled(&sections).unwrap();

    translate_dots(&mut ctx, a, [0.0, 0.0, 1.0]);
    let err = ctx.ruled_dot(body, &sections).unwrap_err();
    assert!(matches!(err, KernelError::NoDerivative { .. }));

    let err = ctx.blend_dot(body, &sections, None, None).unwrap_err();
    assert!(matches!(err, KernelError::NotLoftBody { .. }));
}

#[test]
fn test_ruled_dot_follows_moving_section() {
    let mut ctx = Context::new();
    let a = polygon(&mut ctx, &corners(0.0, 0.5));
    let b = polygon(&mut ctx, &corners(1.0, 0.5));
    let sections = [Section::Loop(a), Section::Loop(b)];
    let body = ctx.ruled(&sections).unwrap();
    translate_dots(&mut ctx, a, [0.0, 0.0, 1.0]);
    translate_dots(&mut ctx, b, [0.0, 0.0, 0.0]);
    ctx.ruled_dot(body, &sections).unwrap();

    assert!(ctx.has_geometry_dot(body).unwrap());
    for face in ctx.body_faces(body).unwrap() {
        for v in [0.0, 0.25, 1.0] {
            let d = ctx.eval_face_dot(face, [0.4, v], [0.0, 0.0]).unwrap().pos.deriv();
            assert_relative_eq!(d.x, 0.0, epsilon = 1e-12);
            assert_relative_eq!(d.y, 0.0, epsilon = 1e-12);
            assert_relative_eq!(d.z, 1.0 - v, epsilon = 1e-12);
        }
    }
}

/// Moves section 0 rigidly along z.
struct LiftFirst;

impl LiftFirst {
    fn velocity(section: usize) -> [f64; 3] {
        if section == 0 { [0.0, 0.0, 1.0] } else { [0.0; 3] }
    }
}

impl SectionVelocity for LiftFirst {
    fn range_velocity(&self, ctx: &Context, _: usize, edge: EdgeId) -> Result<RangeVelocity, KernelError> {
        Ok(RangeVelocity {
            range: ctx.store().get_edge(edge)?.range,
            range_dot: [0.0, 0.0],
        })
    }

    fn node_velocity(&self, ctx: &Context, section: usize, node: NodeId, _: Option<EdgeId>) -> Result<PointVelocity, KernelError> {
        Ok(PointVelocity {
            xyz: ctx.node_position(node)?,
            xyz_dot: Self::velocity(section),
        })
    }

    fn edge_velocity(
        &self,
        ctx: &Context,
        section: usize,
        edge: EdgeId,
        ts: &[f64],
        _: &[f64],
    ) -> Result<EdgeVelocity, KernelError> {
        let range = ctx.store().get_edge(edge)?.range;
        let mut xyz = Vec::with_capacity(ts.len());
        for t in ts {
            xyz.push(ctx.eval_edge(edge, *t)?.pos.to_array());
        }
        Ok(EdgeVelocity {
            xyz_dot: vec![Self::velocity(section); ts.len()],
            xyz,
            tangents: [
                ctx.eval_edge(edge, range[0])?.d1.to_array(),
                ctx.eval_edge(edge, range[1])?.d1.to_array(),
            ],
            tangents_dot: [[0.0; 3]; 2],
        })
    }

    fn bspline_velocity(&self, _: &Context, _: usize, _: EdgeId) -> Result<BSplineVelocity, KernelError> {
        Err(KernelError::Callback("sections are straight".into()))
    }
}

#[test]
fn test_ruled_vels_matches_ruled_dot() {
    let mut ctx = Context::new();
    let a = polygon(&mut ctx, &corners(0.0, 0.5));
    let b = polygon(&mut ctx, &corners(1.0, 0.5));
    let sections = [Section::Loop(a), Section::Loop(b)];

    let by_dots = ctx.ruled(&sections).unwrap();
    translate_dots(&mut ctx, a, [0.0, 0.0, 1.0]);
    translate_dots(&mut ctx, b, [0.0, 0.0, 0.0]);
    ctx.ruled_dot(by_dots, &sections).unwrap();
    let by_vels = ctx.ruled_vels(&sections, &LiftFirst).unwrap();

    let fa = ctx.body_faces(by_dots).unwrap();
    let fb = ctx.body_faces(by_vels).unwrap();
    for (x, y) in fa.iter().zip(&fb) {
        for uv in [[0.1, 0.2], [0.5, 0.5], [0.9, 0.7]] {
            let dx = ctx.eval_face_dot(*x, uv, [0.0, 0.0]).unwrap().pos.deriv();
            let dy = ctx.eval_face_dot(*y, uv, [0.0, 0.0]).unwrap().pos.deriv();
            assert!(dx.distance_to(&dy) < 1e-12);
        }
    }
}
