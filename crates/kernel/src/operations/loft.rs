//! Ruled and blended lofts through an ordered list of sections.
//!
//! Every section edge is sampled, refit as a cubic B-spline in u, and the
//! fitted curves are joined in v: linearly between neighbouring sections
//! (ruled) or by one cubic interpolation through all of them (blend).
//! The same geometry code runs over `f64` for the body itself and over
//! [`Dual`] for its sensitivities, so the derivative pass differentiates
//! exactly what the value pass built.

use tracing::{debug, info, instrument};

use crate::context::Context;
use crate::error::KernelError;
use crate::geometry::bspline::{collocation, hermite_knots, interpolate, uniform_params, BSplineCurve, BSplineSurface};
use crate::geometry::curves::{Curve, CurveKind, PCurve};
use crate::geometry::real::{lift, split, Dual, Real};
use crate::geometry::surfaces::{Plane, Surface};
use crate::geometry::vector::Vec3;
use crate::operations::{NoseCurvature, Section};
use crate::topology::*;
use crate::velocity::SectionVelocity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoftMode {
    Ruled,
    Blend,
}

impl LoftMode {
    fn name(&self) -> &'static str {
        match self {
            LoftMode::Ruled => "ruled",
            LoftMode::Blend => "blend",
        }
    }
}

/// Entities of a lofted body, indexed the way the geometry is built.
#[derive(Debug, Clone)]
pub(crate) struct LoftLayout {
    pub mode: LoftMode,
    pub sections: Vec<Section>,
    /// Per section: column nodes (a single node for node sections).
    pub row_nodes: Vec<Vec<NodeId>>,
    /// Per section: one edge per section edge index; degenerate edges for
    /// node sections.
    pub row_edges: Vec<Vec<EdgeId>>,
    /// `[column][segment]`
    pub columns: Vec<Vec<EdgeId>>,
    /// `[edge][segment]`
    pub faces: Vec<Vec<FaceId>>,
    /// Section index and cap face.
    pub caps: Vec<(usize, FaceId)>,
}

// ─── Section topology ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum SectionShape {
    Point(NodeId),
    Loop {
        closed: bool,
        capped: bool,
        edges: Vec<EdgeId>,
        senses: Vec<Sense>,
        /// Start node of every edge, plus the final end node when open.
        columns: Vec<NodeId>,
    },
}

/// Column index at the start and end of edge `i`.
fn edge_columns(i: usize, n_columns: usize, closed: bool) -> (usize, usize) {
    if closed { (i, (i + 1) % n_columns) } else { (i, i + 1) }
}

fn section_shape(ctx: &Context, section: Section) -> Result<SectionShape, KernelError> {
    let (lp, capped) = match section {
        Section::Node(n) => {
            ctx.store.get_node(n)?;
            return Ok(SectionShape::Point(n));
        }
        Section::Loop(l) => (l, false),
        Section::Face(f) => (ctx.store.get_face(f)?.loops[0], true),
    };
    let l = ctx.store.get_loop(lp)?;
    let mut columns = Vec::with_capacity(l.edges.len() + 1);
    for (e, s) in l.edges.iter().zip(&l.senses) {
        let edge = ctx.store.get_edge(*e)?;
        if edge.curve.is_none() {
            return Err(KernelError::Unsupported(
                "section loops with degenerate edges".into(),
            ));
        }
        columns.push(ctx.oriented_nodes(*e, *s)?.0);
    }
    if !l.closed {
        let last = l.edges.len() - 1;
        columns.push(ctx.oriented_nodes(l.edges[last], l.senses[last])?.1);
    }
    Ok(SectionShape::Loop {
        closed: l.closed,
        capped,
        edges: l.edges.clone(),
        senses: l.senses.clone(),
        columns,
    })
}

/// Shared dimensions of a compatible section list.
#[derive(Debug, Clone, Copy)]
struct Dimensions {
    edges: usize,
    columns: usize,
    closed: bool,
}

fn check_sections(mode: LoftMode, shapes: &[SectionShape]) -> Result<Dimensions, KernelError> {
    let k = shapes.len();
    if k < 2 {
        return Err(KernelError::SectionMismatch(format!(
            "{} needs at least two sections, got {k}",
            mode.name()
        )));
    }
    let wire = shapes.iter().all(|s| matches!(s, SectionShape::Point(_)));
    if wire {
        return Ok(Dimensions {
            edges: 0,
            columns: 1,
            closed: false,
        });
    }
    let mut dims: Option<Dimensions> = None;
    for (i, shape) in shapes.iter().enumerate() {
        match shape {
            SectionShape::Point(_) => {
                if i != 0 && i != k - 1 {
                    return Err(KernelError::SectionMismatch(format!(
                        "node section {i} is not at an end"
                    )));
                }
            }
            SectionShape::Loop { closed, edges, .. } => {
                let here = Dimensions {
                    edges: edges.len(),
                    columns: if *closed { edges.len() } else { edges.len() + 1 },
                    closed: *closed,
                };
                if let Some(d) = dims {
                    if d.edges != here.edges || d.closed != here.closed {
                        return Err(KernelError::SectionMismatch(format!(
                            "section {i} has {} {} edges, expected {} {}",
                            here.edges,
                            if here.closed { "closed" } else { "open" },
                            d.edges,
                            if d.closed { "closed" } else { "open" },
                        )));
                    }
                }
                dims = Some(here);
            }
        }
    }
    dims.ok_or(KernelError::SectionMismatch("no loop sections".into()))
}

// ─── Sampling ───────────────────────────────────────────────────────────────

/// Samples along one section edge in loop traversal order, with the
/// derivative with respect to the normalised parameter u in [0, 1].
#[derive(Debug, Clone)]
struct EdgeSamples<R> {
    points: Vec<Vec3<R>>,
    tangents: [Vec3<R>; 2],
}

#[derive(Debug, Clone)]
enum SectionData<R> {
    Point(Vec3<R>),
    Loop {
        nodes: Vec<Vec3<R>>,
        edges: Vec<EdgeSamples<R>>,
    },
}

fn params_along<R: Real>(range: [R; 2], sense: Sense, n: usize) -> Vec<R> {
    let span = range[1] - range[0];
    let last = (n - 1) as f64;
    (0..n)
        .map(|k| {
            let u = k as f64 / last;
            match sense {
                Sense::Forward => range[0] + span.scale(u),
                Sense::Reverse => range[1] - span.scale(u),
            }
        })
        .collect()
}

fn oriented_tangents<R: Real>(at_start: Vec3<R>, at_end: Vec3<R>, span: R, sense: Sense) -> [Vec3<R>; 2] {
    match sense {
        Sense::Forward => [at_start * span, at_end * span],
        Sense::Reverse => [-(at_end * span), -(at_start * span)],
    }
}

fn sample_curve<R: Real>(curve: &Curve<R>, range: [R; 2], sense: Sense, n: usize) -> EdgeSamples<R> {
    let points = params_along(range, sense, n)
        .into_iter()
        .map(|t| curve.evaluate(t).pos)
        .collect();
    let span = range[1] - range[0];
    let tangents = oriented_tangents(
        curve.evaluate(range[0]).d1,
        curve.evaluate(range[1]).d1,
        span,
        sense,
    );
    EdgeSamples { points, tangents }
}

/// Where section positions and sensitivities come from.
trait SampleSource<R: Real> {
    fn node(&self, ctx: &Context, section: usize, node: NodeId, edge: Option<EdgeId>) -> Result<Vec3<R>, KernelError>;
    fn edge(&self, ctx: &Context, section: usize, edge: EdgeId, sense: Sense, n: usize) -> Result<EdgeSamples<R>, KernelError>;
}

/// The stored section geometry.
struct Values;

impl SampleSource<f64> for Values {
    fn node(&self, ctx: &Context, _: usize, node: NodeId, _: Option<EdgeId>) -> Result<Vec3, KernelError> {
        Ok(ctx.store.get_node(node)?.xyz)
    }

    fn edge(&self, ctx: &Context, _: usize, edge: EdgeId, sense: Sense, n: usize) -> Result<EdgeSamples<f64>, KernelError> {
        let e = ctx.store.get_edge(edge)?;
        let curve = e.curve.ok_or(KernelError::Degenerate("section edge without curve".into()))?;
        Ok(sample_curve(&ctx.store.get_curve(curve)?.curve, e.range, sense, n))
    }
}

/// Sensitivities previously attached to the section geometry.
struct StoredDots;

impl SampleSource<Dual> for StoredDots {
    fn node(&self, ctx: &Context, _: usize, node: NodeId, _: Option<EdgeId>) -> Result<Vec3<Dual>, KernelError> {
        let n = ctx.store.get_node(node)?;
        let dot = n.dot.ok_or(KernelError::NoDerivative { what: "node" })?;
        Ok(Vec3::from_parts(n.xyz.to_array(), dot.to_array()))
    }

    fn edge(&self, ctx: &Context, _: usize, edge: EdgeId, sense: Sense, n: usize) -> Result<EdgeSamples<Dual>, KernelError> {
        let e = ctx.store.get_edge(edge)?;
        let curve = e.curve.ok_or(KernelError::Degenerate("section edge without curve".into()))?;
        let range_dot = e.range_dot.ok_or(KernelError::NoDerivative { what: "edge range" })?;
        let dual = ctx
            .store
            .get_curve(curve)?
            .sensitivity
            .as_ref()
            .ok_or(KernelError::NoDerivative { what: "curve" })?;
        let range = [
            Dual::new(e.range[0], range_dot[0]),
            Dual::new(e.range[1], range_dot[1]),
        ];
        Ok(sample_curve(dual, range, sense, n))
    }
}

/// Sensitivities supplied by a caller-side callback.
struct Callbacks<'a>(&'a dyn SectionVelocity);

impl SampleSource<Dual> for Callbacks<'_> {
    fn node(&self, ctx: &Context, section: usize, node: NodeId, edge: Option<EdgeId>) -> Result<Vec3<Dual>, KernelError> {
        let v = self.0.node_velocity(ctx, section, node, edge)?;
        Ok(Vec3::from_parts(v.xyz, v.xyz_dot))
    }

    fn edge(&self, ctx: &Context, section: usize, edge: EdgeId, sense: Sense, n: usize) -> Result<EdgeSamples<Dual>, KernelError> {
        let rv = self.0.range_velocity(ctx, section, edge)?;
        let range = [
            Dual::new(rv.range[0], rv.range_dot[0]),
            Dual::new(rv.range[1], rv.range_dot[1]),
        ];
        let curve = ctx
            .store
            .get_edge(edge)?
            .curve
            .ok_or(KernelError::Degenerate("section edge without curve".into()))?;
        if ctx.store.get_curve(curve)?.curve.kind() == CurveKind::BSpline {
            let bv = self.0.bspline_velocity(ctx, section, edge)?;
            let dual = Curve::from_payload(CurveKind::BSpline, &bv.header, &lift(&bv.payload, &bv.payload_dot))?;
            return Ok(sample_curve(&dual, range, sense, n));
        }

        let (ts, t_dots) = split(&params_along(range, sense, n));
        let ev = self.0.edge_velocity(ctx, section, edge, &ts, &t_dots)?;
        if ev.xyz.len() != n || ev.xyz_dot.len() != n {
            return Err(KernelError::Callback(format!(
                "edge velocity returned {} points for {n} parameters",
                ev.xyz.len()
            )));
        }
        let points = ev
            .xyz
            .iter()
            .zip(&ev.xyz_dot)
            .map(|(x, d)| Vec3::from_parts(*x, *d))
            .collect();
        let tangents = oriented_tangents(
            Vec3::from_parts(ev.tangents[0], ev.tangents_dot[0]),
            Vec3::from_parts(ev.tangents[1], ev.tangents_dot[1]),
            range[1] - range[0],
            sense,
        );
        Ok(EdgeSamples { points, tangents })
    }
}

fn sample_sections<R: Real>(
    ctx: &Context,
    source: &dyn SampleSource<R>,
    shapes: &[SectionShape],
    n: usize,
) -> Result<Vec<SectionData<R>>, KernelError> {
    let mut out = Vec::with_capacity(shapes.len());
    for (k, shape) in shapes.iter().enumerate() {
        out.push(match shape {
            SectionShape::Point(node) => SectionData::Point(source.node(ctx, k, *node, None)?),
            SectionShape::Loop {
                closed,
                edges,
                senses,
                columns,
                ..
            } => {
                let m = edges.len();
                let mut nodes = Vec::with_capacity(columns.len());
                for (c, node) in columns.iter().enumerate() {
                    let edge = edges[c.min(m - 1)];
                    nodes.push(source.node(ctx, k, *node, Some(edge))?);
                }
                let mut samples = Vec::with_capacity(m);
                for (i, (e, s)) in edges.iter().zip(senses).enumerate() {
                    let mut es = source.edge(ctx, k, *e, *s, n)?;
                    let (c0, c1) = edge_columns(i, columns.len(), *closed);
                    es.points[0] = nodes[c0];
                    es.points[n - 1] = nodes[c1];
                    samples.push(es);
                }
                SectionData::Loop { nodes, edges: samples }
            }
        });
    }
    Ok(out)
}

// ─── Geometry ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Row<R> {
    Point(Vec3<R>),
    Loop {
        nodes: Vec<Vec3<R>>,
        curves: Vec<BSplineCurve<R>>,
        /// Closed polygon through the samples, used for caps.
        boundary: Vec<Vec3<R>>,
    },
}

impl<R: Real> Row<R> {
    fn node(&self, column: usize) -> Vec3<R> {
        match self {
            Row::Point(p) => *p,
            Row::Loop { nodes, .. } => nodes[column],
        }
    }

    fn control_points(&self, edge: usize, n_cp: usize) -> Vec<Vec3<R>> {
        match self {
            Row::Point(p) => vec![*p; n_cp],
            Row::Loop { curves, .. } => curves[edge].control_points.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct LoftGeometry<R> {
    rows: Vec<Row<R>>,
    /// `[column][segment]`
    columns: Vec<Vec<BSplineCurve<R>>>,
    /// `[edge][segment]`
    surfaces: Vec<Vec<BSplineSurface<R>>>,
    caps: Vec<(usize, Plane<R>)>,
}

/// Blend tangent leaving a node section toward the next section point.
///
/// The section is treated as the tip of a surface with principal radii
/// `r1`, `r2` along the two given tangent-plane directions. For a next
/// point at height `h` above the tangent plane the tangent lies in that
/// plane, toward the point, with length `sqrt(2 rho h)` where `rho` is the
/// normal radius of curvature in that direction.
fn nose_tangent<R: Real>(tip: Vec3<R>, next: Vec3<R>, rc: &[R; 8]) -> Vec3<R> {
    let e1 = Vec3::new(rc[1], rc[2], rc[3]).normalize();
    let d2 = Vec3::new(rc[5], rc[6], rc[7]);
    let e2 = (d2 - e1 * d2.dot(&e1)).normalize();
    let axis = e1.cross(&e2);
    let w = next - tip;
    let a = w.dot(&e1);
    let b = w.dot(&e2);
    let h = w.dot(&axis).abs();
    let s2 = a * a + b * b;
    let curvature = (a * a / rc[0] + b * b / rc[4]) / s2;
    let length = (R::cst(2.0) * h / curvature).sqrt();
    (e1 * a + e2 * b) * (length / s2.sqrt())
}

fn check_nose(rc: &NoseCurvature) -> Result<(), KernelError> {
    let v = &rc.values;
    if v[0] <= 0.0 || v[4] <= 0.0 {
        return Err(KernelError::invalid("nose curvature", "radii must be positive"));
    }
    let d1 = Vec3::new(v[1], v[2], v[3]);
    let d2 = Vec3::new(v[5], v[6], v[7]);
    if d1.cross(&d2).length() <= 1e-12 * d1.length() * d2.length() || d1.length() == 0.0 {
        return Err(KernelError::invalid("nose curvature", "directions are parallel or zero"));
    }
    Ok(())
}

fn nose_values<R: Real>(rc: &NoseCurvature) -> [R; 8] {
    std::array::from_fn(|i| R::from_parts(rc.values[i], rc.dots[i]))
}

/// Right-hand side for cubic interpolation in v through `data` with end
/// derivatives, rounding node ends where curvature data is given.
fn v_conditions<R: Real>(data: &[Vec3<R>], noses: &[Option<[R; 8]>; 2]) -> Vec<Vec3<R>> {
    let k = data.len();
    let scale = (k - 1) as f64;
    let start = match &noses[0] {
        Some(rc) => nose_tangent(data[0], data[1], rc),
        None => data[1] - data[0],
    }
    .scale(scale);
    let end = match &noses[1] {
        Some(rc) => -nose_tangent(data[k - 1], data[k - 2], rc),
        None => data[k - 1] - data[k - 2],
    }
    .scale(scale);
    let mut rhs = Vec::with_capacity(k + 2);
    rhs.push(data[0]);
    rhs.push(start);
    rhs.extend_from_slice(&data[1..k - 1]);
    rhs.push(end);
    rhs.push(data[k - 1]);
    rhs
}

fn cap_plane<R: Real>(boundary: &[Vec3<R>]) -> Result<Plane<R>, KernelError> {
    let inv = R::cst(1.0 / boundary.len() as f64);
    let centroid = boundary.iter().fold(Vec3::zero(), |acc, p| acc + *p) * inv;
    let mut normal = Vec3::zero();
    for i in 0..boundary.len() {
        let a = boundary[i] - centroid;
        let b = boundary[(i + 1) % boundary.len()] - centroid;
        normal = normal + a.cross(&b);
    }
    let first = boundary[0] - centroid;
    if normal.value().length() <= 1e-14 || first.value().length() <= 1e-14 {
        return Err(KernelError::Degenerate("cap section encloses no area".into()));
    }
    let x = first.normalize();
    let y = normal.normalize().cross(&x);
    Ok(Plane {
        origin: centroid,
        u_axis: x,
        v_axis: y,
    })
}

fn linear_curve<R: Real>(a: Vec3<R>, b: Vec3<R>) -> Result<BSplineCurve<R>, KernelError> {
    BSplineCurve::new(1, vec![0.0, 0.0, 1.0, 1.0], vec![a, b])
}

fn loft_geometry<R: Real>(
    mode: LoftMode,
    dims: Dimensions,
    shapes: &[SectionShape],
    data: &[SectionData<R>],
    noses: [Option<[R; 8]>; 2],
) -> Result<LoftGeometry<R>, KernelError> {
    let k = data.len();
    let mut rows = Vec::with_capacity(k);
    for d in data {
        rows.push(match d {
            SectionData::Point(p) => Row::Point(*p),
            SectionData::Loop { nodes, edges } => {
                let curves = edges
                    .iter()
                    .map(|e| interpolate(&e.points, Some(e.tangents), 3))
                    .collect::<Result<Vec<_>, _>>()?;
                let boundary = edges
                    .iter()
                    .flat_map(|e| e.points[..e.points.len() - 1].iter().copied())
                    .collect();
                Row::Loop {
                    nodes: nodes.clone(),
                    curves,
                    boundary,
                }
            }
        });
    }

    let (n_cp, u_knots) = rows
        .iter()
        .find_map(|r| match r {
            Row::Loop { curves, .. } => Some((curves[0].num_control_points(), curves[0].knots.clone())),
            Row::Point(_) => None,
        })
        .unwrap_or((0, vec![]));

    let mut columns = Vec::with_capacity(dims.columns);
    let mut surfaces = Vec::with_capacity(dims.edges);
    match mode {
        LoftMode::Ruled => {
            for c in 0..dims.columns {
                let segs = (0..k - 1)
                    .map(|s| linear_curve(rows[s].node(c), rows[s + 1].node(c)))
                    .collect::<Result<Vec<_>, _>>()?;
                columns.push(segs);
            }
            for i in 0..dims.edges {
                let mut segs = Vec::with_capacity(k - 1);
                for s in 0..k - 1 {
                    let mut cps = rows[s].control_points(i, n_cp);
                    cps.extend(rows[s + 1].control_points(i, n_cp));
                    segs.push(BSplineSurface::new(
                        3,
                        u_knots.clone(),
                        1,
                        vec![0.0, 0.0, 1.0, 1.0],
                        n_cp,
                        cps,
                    )?);
                }
                surfaces.push(segs);
            }
        }
        LoftMode::Blend => {
            let params = uniform_params(k);
            let v_knots = hermite_knots(&params);
            let (_, system) = collocation(&params, 3, true);
            for c in 0..dims.columns {
                let data: Vec<Vec3<R>> = rows.iter().map(|r| r.node(c)).collect();
                let cps = system.solve(&v_conditions(&data, &noses))?;
                columns.push(vec![BSplineCurve::new(3, v_knots.clone(), cps)?]);
            }
            for i in 0..dims.edges {
                let per_row: Vec<Vec<Vec3<R>>> = rows.iter().map(|r| r.control_points(i, n_cp)).collect();
                let mut by_u = Vec::with_capacity(n_cp);
                for ju in 0..n_cp {
                    let data: Vec<Vec3<R>> = per_row.iter().map(|cps| cps[ju]).collect();
                    by_u.push(system.solve(&v_conditions(&data, &noses))?);
                }
                let n_v = k + 2;
                let mut cps = Vec::with_capacity(n_cp * n_v);
                for jv in 0..n_v {
                    for column in &by_u {
                        cps.push(column[jv]);
                    }
                }
                surfaces.push(vec![BSplineSurface::new(
                    3,
                    u_knots.clone(),
                    3,
                    v_knots.clone(),
                    n_cp,
                    cps,
                )?]);
            }
        }
    }

    let mut caps = Vec::new();
    for end in [0, k - 1] {
        if let (SectionShape::Loop { capped: true, .. }, Row::Loop { boundary, .. }) = (&shapes[end], &rows[end]) {
            caps.push((end, cap_plane(boundary)?));
        }
    }

    Ok(LoftGeometry {
        rows,
        columns,
        surfaces,
        caps,
    })
}

// ─── Emission ───────────────────────────────────────────────────────────────

const BOTTOM: [f64; 4] = [0.0, 0.0, 1.0, 0.0];
const RIGHT: [f64; 4] = [1.0, 0.0, 0.0, 1.0];
const TOP: [f64; 4] = [0.0, 1.0, 1.0, 0.0];
const LEFT: [f64; 4] = [0.0, 0.0, 0.0, 1.0];

fn solid_or_sheet(shapes: &[SectionShape], dims: Dimensions) -> BodyKind {
    let capped = |s: &SectionShape| match s {
        SectionShape::Point(_) => true,
        SectionShape::Loop { capped, .. } => *capped,
    };
    if dims.edges == 0 {
        BodyKind::Wire
    } else if dims.closed && capped(&shapes[0]) && capped(&shapes[shapes.len() - 1]) {
        BodyKind::Solid
    } else {
        BodyKind::Sheet
    }
}

impl Context {
    fn track<T: Into<Entity> + Copy>(created: &mut Vec<Entity>, id: T) -> T {
        created.push(id.into());
        id
    }

    /// Free entities made by a failed operation that nothing references.
    fn rollback(&mut self, created: &[Entity]) {
        for e in created.iter().rev() {
            if self.store.contains(*e) {
                let _ = self.store.discard(*e);
            }
        }
    }

    fn emit_loft(
        &mut self,
        mode: LoftMode,
        sections: &[Section],
        shapes: &[SectionShape],
        dims: Dimensions,
        geom: &LoftGeometry<f64>,
        created: &mut Vec<Entity>,
    ) -> Result<BodyId, KernelError> {
        let k = sections.len();
        let segments = geom.columns.first().map(|c| c.len()).unwrap_or(0);
        let mut row_nodes = Vec::with_capacity(k);
        let mut row_edges = Vec::with_capacity(k);

        for (r, row) in geom.rows.iter().enumerate() {
            // Blends span all sections with one face per edge; inner
            // sections leave no topology behind.
            if mode == LoftMode::Blend && r != 0 && r != k - 1 {
                row_nodes.push(vec![]);
                row_edges.push(vec![]);
                continue;
            }
            match row {
                Row::Point(p) => {
                    let node = Self::track(created, self.create_node(*p));
                    let mut edges = Vec::with_capacity(dims.edges);
                    for _ in 0..dims.edges {
                        edges.push(Self::track(
                            created,
                            self.create_edge(EdgeKind::Degenerate, None, [0.0, 1.0], &[node])?,
                        ));
                    }
                    row_nodes.push(vec![node]);
                    row_edges.push(edges);
                }
                Row::Loop { nodes, curves, .. } => {
                    let ids: Vec<NodeId> = nodes
                        .iter()
                        .map(|p| Self::track(created, self.create_node(*p)))
                        .collect();
                    let mut edges = Vec::with_capacity(curves.len());
                    for (i, c) in curves.iter().enumerate() {
                        let (c0, c1) = edge_columns(i, dims.columns, dims.closed);
                        let curve = Self::track(created, self.create_curve(Curve::BSpline(c.clone())));
                        let edge = if c0 == c1 {
                            self.create_edge(EdgeKind::OneNode, Some(curve), [0.0, 1.0], &[ids[c0]])?
                        } else {
                            self.create_edge(EdgeKind::TwoNode, Some(curve), [0.0, 1.0], &[ids[c0], ids[c1]])?
                        };
                        edges.push(Self::track(created, edge));
                    }
                    row_nodes.push(ids);
                    row_edges.push(edges);
                }
            }
        }

        // Rows of each segment.
        let seg_rows = |s: usize| -> (usize, usize) {
            match mode {
                LoftMode::Ruled => (s, s + 1),
                LoftMode::Blend => (0, k - 1),
            }
        };
        let node_at = |row: usize, col: usize| -> NodeId {
            let nodes: &Vec<NodeId> = &row_nodes[row];
            nodes[col.min(nodes.len() - 1)]
        };

        let mut columns = Vec::with_capacity(dims.columns);
        for (c, segs) in geom.columns.iter().enumerate() {
            let mut ids = Vec::with_capacity(segs.len());
            for (s, seg) in segs.iter().enumerate() {
                let (a, b) = seg_rows(s);
                let curve = Self::track(created, self.create_curve(Curve::BSpline(seg.clone())));
                let edge = self.create_edge(
                    EdgeKind::TwoNode,
                    Some(curve),
                    [0.0, 1.0],
                    &[node_at(a, c), node_at(b, c)],
                )?;
                ids.push(Self::track(created, edge));
            }
            columns.push(ids);
        }

        let kind = solid_or_sheet(shapes, dims);
        if kind == BodyKind::Wire {
            let senses = vec![Sense::Forward; columns[0].len()];
            let lp = Self::track(created, self.create_loop(false, None, &columns[0], &senses, &[])?);
            let layout = LoftLayout {
                mode,
                sections: sections.to_vec(),
                row_nodes,
                row_edges,
                columns,
                faces: vec![],
                caps: vec![],
            };
            return self.create_body(BodyKind::Wire, BodyChildren::Wire(lp), Some(layout));
        }

        let mut faces = Vec::with_capacity(dims.edges);
        for (i, segs) in geom.surfaces.iter().enumerate() {
            let (c0, c1) = edge_columns(i, dims.columns, dims.closed);
            let mut ids = Vec::with_capacity(segments);
            for (s, surface) in segs.iter().enumerate() {
                let (a, b) = seg_rows(s);
                let sid = Self::track(created, self.create_surface(Surface::BSpline(surface.clone())));
                let edges = [row_edges[a][i], columns[c1][s], row_edges[b][i], columns[c0][s]];
                let senses = [Sense::Forward, Sense::Forward, Sense::Reverse, Sense::Reverse];
                let mut pcurves = Vec::with_capacity(4);
                for p in [BOTTOM, RIGHT, TOP, LEFT] {
                    let pc = PCurve::from_payload(&p)?;
                    pcurves.push(Self::track(created, self.store.insert_pcurve(pc)));
                }
                let lp = Self::track(created, self.create_loop(true, Some(sid), &edges, &senses, &pcurves)?);
                ids.push(Self::track(created, self.create_face(sid, &[lp], Sense::Forward)?));
            }
            faces.push(ids);
        }

        let mut caps = Vec::with_capacity(geom.caps.len());
        for (end, plane) in &geom.caps {
            let sid = Self::track(created, self.create_surface(Surface::Plane(*plane)));
            let (edges, senses, sense) = if *end == 0 {
                let edges: Vec<EdgeId> = row_edges[0].iter().rev().copied().collect();
                let senses = vec![Sense::Reverse; edges.len()];
                (edges, senses, Sense::Reverse)
            } else {
                let edges = row_edges[*end].clone();
                let senses = vec![Sense::Forward; edges.len()];
                (edges, senses, Sense::Forward)
            };
            let lp = Self::track(created, self.create_loop(true, None, &edges, &senses, &[])?);
            caps.push((*end, Self::track(created, self.create_face(sid, &[lp], sense)?)));
        }

        let mut all_faces: Vec<FaceId> = faces.iter().flatten().copied().collect();
        if let Some((_, f)) = caps.iter().find(|(end, _)| *end == 0) {
            all_faces.insert(0, *f);
        }
        if let Some((_, f)) = caps.iter().find(|(end, _)| *end != 0) {
            all_faces.push(*f);
        }
        let shell = Self::track(created, self.create_shell(kind == BodyKind::Solid, &all_faces)?);
        let layout = LoftLayout {
            mode,
            sections: sections.to_vec(),
            row_nodes,
            row_edges,
            columns,
            faces,
            caps,
        };
        self.create_body(kind, BodyChildren::Shells(vec![shell]), Some(layout))
    }

    /// Attach sensitivities computed over duals to a lofted body.
    fn write_loft_dots(&mut self, layout: &LoftLayout, geom: &LoftGeometry<Dual>) -> Result<(), KernelError> {
        for (k, row) in geom.rows.iter().enumerate() {
            for (c, node) in layout.row_nodes[k].iter().enumerate() {
                let p = row.node(c);
                self.set_node_dot(*node, p.to_array(), p.deriv_array())?;
            }
            for (i, edge) in layout.row_edges[k].iter().enumerate() {
                self.set_range_dot(*edge, [0.0, 1.0], [0.0, 0.0])?;
                if let Row::Loop { curves, .. } = row {
                    self.write_curve_dot(*edge, &curves[i])?;
                }
            }
        }
        for (c, segs) in geom.columns.iter().enumerate() {
            for (s, seg) in segs.iter().enumerate() {
                let edge = layout.columns[c][s];
                self.set_range_dot(edge, [0.0, 1.0], [0.0, 0.0])?;
                self.write_curve_dot(edge, seg)?;
            }
        }
        for (i, segs) in geom.surfaces.iter().enumerate() {
            for (s, surface) in segs.iter().enumerate() {
                let face = layout.faces[i][s];
                let sid = self.store.get_face(face)?.surface;
                let (_, _, data) = Surface::BSpline(surface.clone()).to_payload();
                let (values, dots) = split(&data);
                self.set_surface_dot(sid, &values, &dots)?;
            }
        }
        for ((_, face), (_, plane)) in layout.caps.iter().zip(&geom.caps) {
            let sid = self.store.get_face(*face)?.surface;
            let (_, _, data) = Surface::Plane(*plane).to_payload();
            let (values, dots) = split(&data);
            self.set_surface_dot(sid, &values, &dots)?;
        }
        Ok(())
    }

    fn write_curve_dot(&mut self, edge: EdgeId, curve: &BSplineCurve<Dual>) -> Result<(), KernelError> {
        let cid = self
            .store
            .get_edge(edge)?
            .curve
            .ok_or(KernelError::Degenerate("loft edge without curve".into()))?;
        let (_, _, data) = Curve::BSpline(curve.clone()).to_payload();
        let (values, dots) = split(&data);
        self.set_curve_dot(cid, &values, &dots)
    }

    fn prepare_loft(
        &self,
        mode: LoftMode,
        sections: &[Section],
        noses: [Option<&NoseCurvature>; 2],
    ) -> Result<(Vec<SectionShape>, Dimensions), KernelError> {
        let shapes = sections
            .iter()
            .map(|s| section_shape(self, *s))
            .collect::<Result<Vec<_>, _>>()?;
        let dims = check_sections(mode, &shapes)?;
        for (end, rc) in [(0, noses[0]), (shapes.len() - 1, noses[1])] {
            if let Some(rc) = rc {
                if !matches!(shapes[end], SectionShape::Point(_)) || dims.edges == 0 {
                    return Err(KernelError::invalid(
                        "nose curvature",
                        format!("section {end} is not a node end of a surface loft"),
                    ));
                }
                check_nose(rc)?;
            }
        }
        Ok((shapes, dims))
    }

    #[instrument(skip(self, sections, noses), fields(sections = sections.len()))]
    fn loft(
        &mut self,
        mode: LoftMode,
        sections: &[Section],
        noses: [Option<&NoseCurvature>; 2],
    ) -> Result<BodyId, KernelError> {
        let (shapes, dims) = self.prepare_loft(mode, sections, noses)?;
        let n = self.loft.edge_samples.max(2);
        let data = sample_sections::<f64>(self, &Values, &shapes, n)?;
        let geom = loft_geometry(mode, dims, &shapes, &data, [noses[0].map(nose_values), noses[1].map(nose_values)])?;

        let mut created = Vec::new();
        match self.emit_loft(mode, sections, &shapes, dims, &geom, &mut created) {
            Ok(body) => {
                self.store.incref(body.into())?;
                info!(
                    mode = mode.name(),
                    kind = ?self.store.get_body(body)?.kind,
                    faces = geom.surfaces.iter().map(|s| s.len()).sum::<usize>() + geom.caps.len(),
                    "loft complete"
                );
                Ok(body)
            }
            Err(e) => {
                self.rollback(&created);
                Err(e)
            }
        }
    }

    fn loft_layout(&self, body: BodyId, mode: LoftMode, sections: &[Section]) -> Result<LoftLayout, KernelError> {
        let layout = self
            .store
            .get_body(body)?
            .loft
            .as_ref()
            .filter(|l| l.mode == mode)
            .ok_or(KernelError::NotLoftBody { expected: mode.name() })?;
        if layout.sections != sections {
            return Err(KernelError::SectionMismatch(
                "sections differ from those the body was built from".into(),
            ));
        }
        Ok(layout.clone())
    }

    #[instrument(skip(self, sections, noses))]
    fn loft_dot(
        &mut self,
        mode: LoftMode,
        body: BodyId,
        sections: &[Section],
        noses: [Option<&NoseCurvature>; 2],
    ) -> Result<(), KernelError> {
        let layout = self.loft_layout(body, mode, sections)?;
        for (k, s) in sections.iter().enumerate() {
            if !self.has_geometry_dot(*s)? {
                debug!(section = k, "section has no sensitivity");
                return Err(KernelError::NoDerivative { what: "section" });
            }
        }
        let (shapes, dims) = self.prepare_loft(mode, sections, noses)?;
        let n = self.loft.edge_samples.max(2);
        let data = sample_sections::<Dual>(self, &StoredDots, &shapes, n)?;
        let geom = loft_geometry(mode, dims, &shapes, &data, [noses[0].map(nose_values), noses[1].map(nose_values)])?;
        self.write_loft_dots(&layout, &geom)
    }

    #[instrument(skip(self, sections, noses, vels))]
    fn loft_vels(
        &mut self,
        mode: LoftMode,
        sections: &[Section],
        noses: [Option<&NoseCurvature>; 2],
        vels: &dyn SectionVelocity,
    ) -> Result<BodyId, KernelError> {
        let body = self.loft(mode, sections, noses)?;
        match self.callback_dots(mode, body, sections, noses, vels) {
            Ok(()) => Ok(body),
            Err(e) => {
                self.release(body)?;
                Err(e)
            }
        }
    }

    fn callback_dots(
        &mut self,
        mode: LoftMode,
        body: BodyId,
        sections: &[Section],
        noses: [Option<&NoseCurvature>; 2],
        vels: &dyn SectionVelocity,
    ) -> Result<(), KernelError> {
        let (shapes, dims) = self.prepare_loft(mode, sections, noses)?;
        let n = self.loft.edge_samples.max(2);
        let data = sample_sections::<Dual>(self, &Callbacks(vels), &shapes, n)?;
        let geom = loft_geometry(mode, dims, &shapes, &data, [noses[0].map(nose_values), noses[1].map(nose_values)])?;
        let layout = self.loft_layout(body, mode, sections)?;
        self.write_loft_dots(&layout, &geom)
    }

    // ─── Public operators ───────────────────────────────────────────────

    /// Ruled body through the sections: one face per section edge and
    /// section pair, linear between neighbouring sections.
    pub fn ruled(&mut self, sections: &[Section]) -> Result<BodyId, KernelError> {
        self.loft(LoftMode::Ruled, sections, [None, None])
    }

    /// Attach sensitivities to a body made by [`Context::ruled`] from the
    /// sensitivities stored on its sections.
    pub fn ruled_dot(&mut self, body: BodyId, sections: &[Section]) -> Result<(), KernelError> {
        self.loft_dot(LoftMode::Ruled, body, sections, [None, None])
    }

    /// Build a ruled body whose sensitivities come from `vels`.
    pub fn ruled_vels(&mut self, sections: &[Section], vels: &dyn SectionVelocity) -> Result<BodyId, KernelError> {
        self.loft_vels(LoftMode::Ruled, sections, [None, None], vels)
    }

    /// Smooth body through the sections, cubic across them. Node ends may
    /// be rounded with nose curvature data.
    pub fn blend(
        &mut self,
        sections: &[Section],
        rc1: Option<&NoseCurvature>,
        rcn: Option<&NoseCurvature>,
    ) -> Result<BodyId, KernelError> {
        self.loft(LoftMode::Blend, sections, [rc1, rcn])
    }

    pub fn blend_dot(
        &mut self,
        body: BodyId,
        sections: &[Section],
        rc1: Option<&NoseCurvature>,
        rcn: Option<&NoseCurvature>,
    ) -> Result<(), KernelError> {
        self.loft_dot(LoftMode::Blend, body, sections, [rc1, rcn])
    }

    pub fn blend_vels(
        &mut self,
        sections: &[Section],
        rc1: Option<&NoseCurvature>,
        rcn: Option<&NoseCurvature>,
        vels: &dyn SectionVelocity,
    ) -> Result<BodyId, KernelError> {
        self.loft_vels(LoftMode::Blend, sections, [rc1, rcn], vels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nose_tangent_lies_in_tangent_plane() {
        let rc = [2.0, 1.0, 0.0, 0.0, 0.5, 0.0, 1.0, 0.0];
        let t = nose_tangent(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.3, 0.4, 1.0), &rc);
        assert!(t.z.abs() < 1e-12);
        // Direction follows the in-plane offset of the next point.
        assert!((t.x * 0.4 - t.y * 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_nose_tangent_isotropic_length() {
        // Equal radii: length is sqrt(2 r h).
        let rc = [3.0, 1.0, 0.0, 0.0, 3.0, 0.0, 1.0, 0.0];
        let t = nose_tangent(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.5), &rc);
        assert!((t.length() - (2.0f64 * 3.0 * 0.5).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_cap_plane_of_square() {
        let pts = vec![
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(2.0, 0.0, 1.0),
            Vec3::new(2.0, 2.0, 1.0),
            Vec3::new(0.0, 2.0, 1.0),
        ];
        let plane = cap_plane(&pts).unwrap();
        assert!(plane.origin.distance_to(&Vec3::new(1.0, 1.0, 1.0)) < 1e-12);
        assert!(plane.normal().distance_to(&Vec3::Z) < 1e-12);
    }

    #[test]
    fn test_params_along_reverse() {
        let ts = params_along([1.0, 3.0], Sense::Reverse, 3);
        assert_eq!(ts, vec![3.0, 2.0, 1.0]);
    }
}
