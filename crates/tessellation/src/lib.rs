//! Sampling of bodies into index-stable point sets.
//!
//! A tessellation records, per edge, parameters and points along it and,
//! per face, parameter pairs, points and triangles. [`map_tess`] replays
//! the same index structure on another body with the same topology, so
//! sample `i` of both tessellations describes the same parametric spot.

use cad_kernel::geometry::vector::Vec3;
use cad_kernel::{BodyId, Context, EdgeId, FaceId, KernelError, NodeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum TessError {
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("tessellation does not fit body: {0}")]
    Mismatch(String),

    #[error("invalid tessellation parameters: {0}")]
    Params(String),
}

pub type Result<T> = std::result::Result<T, TessError>;

/// Segment limits. A non-positive value switches that limit off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TessParams {
    pub max_edge_len: f64,
    /// Largest distance between a segment and the geometry it spans.
    pub max_sag: f64,
    /// Largest turning angle per segment, in degrees.
    pub max_angle: f64,
}

impl Default for TessParams {
    fn default() -> Self {
        Self {
            max_edge_len: 0.1,
            max_sag: 0.01,
            max_angle: 15.0,
        }
    }
}

impl TessParams {
    fn validate(&self) -> Result<()> {
        if [self.max_edge_len, self.max_sag, self.max_angle].iter().any(|v| v.is_nan()) {
            return Err(TessError::Params("NaN limit".into()));
        }
        if self.max_edge_len <= 0.0 && self.max_sag <= 0.0 && self.max_angle <= 0.0 {
            return Err(TessError::Params("every limit is switched off".into()));
        }
        Ok(())
    }

    /// Segments needed for a curve sampled densely as `probe`.
    fn segments(&self, probe: &[Vec3], min: usize, max: usize) -> usize {
        let mut length = 0.0;
        let mut turning = 0.0;
        for w in probe.windows(2) {
            length += w[0].distance_to(&w[1]);
        }
        for w in probe.windows(3) {
            let a = w[1] - w[0];
            let b = w[2] - w[1];
            let (la, lb) = (a.length(), b.length());
            if la > 0.0 && lb > 0.0 {
                turning += (a.dot(&b) / (la * lb)).clamp(-1.0, 1.0).acos();
            }
        }

        let mut n = min;
        if self.max_edge_len > 0.0 {
            n = n.max((length / self.max_edge_len).ceil() as usize);
        }
        if self.max_angle > 0.0 {
            n = n.max((turning / self.max_angle.to_radians()).ceil() as usize);
        }
        if self.max_sag > 0.0 && turning > 1e-12 {
            let radius = length / turning;
            let ratio = (1.0 - self.max_sag / radius).max(-1.0);
            let per_segment = 2.0 * ratio.acos();
            if per_segment > 0.0 {
                n = n.max((turning / per_segment).ceil() as usize);
            }
        }
        n.clamp(min, max)
    }
}

const PROBE: usize = 17;
const EDGE_SEGMENTS: (usize, usize) = (2, 64);
const FACE_SEGMENTS: (usize, usize) = (1, 32);
const MAX_RINGS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeTess {
    pub edge: EdgeId,
    pub degenerate: bool,
    pub ts: Vec<f64>,
    pub xyz: Vec<[f64; 3]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceLayout {
    /// `(nu + 1) * (nv + 1)` points, u fastest.
    Grid { nu: usize, nv: usize },
    /// Concentric copies of the boundary polygon shrinking to a centre
    /// point, `rings * boundary + 1` points.
    Rings { rings: usize, boundary: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceTess {
    pub face: FaceId,
    pub layout: FaceLayout,
    pub uv: Vec<[f64; 2]>,
    pub xyz: Vec<[f64; 3]>,
    pub tris: Vec<[u32; 3]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tessellation {
    pub body: BodyId,
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeTess>,
    pub faces: Vec<FaceTess>,
}

impl Tessellation {
    pub fn edge(&self, index: usize) -> Option<&EdgeTess> {
        self.edges.get(index)
    }

    pub fn face(&self, index: usize) -> Option<&FaceTess> {
        self.faces.get(index)
    }

    pub fn num_points(&self) -> usize {
        self.nodes.len()
            + self.edges.iter().map(|e| e.ts.len()).sum::<usize>()
            + self.faces.iter().map(|f| f.uv.len()).sum::<usize>()
    }

    /// Total area of the face triangles.
    pub fn area(&self) -> f64 {
        self.faces
            .iter()
            .flat_map(|f| {
                f.tris.iter().map(move |[a, b, c]| {
                    let p = |i: &u32| Vec3::from_array(f.xyz[*i as usize]);
                    let (a, b, c) = (p(a), p(b), p(c));
                    0.5 * (b - a).cross(&(c - a)).length()
                })
            })
            .sum()
    }
}

fn lerp(a: f64, b: f64, s: f64) -> f64 {
    a + s * (b - a)
}

fn probe_edge(ctx: &Context, edge: EdgeId, range: [f64; 2]) -> Result<Vec<Vec3>> {
    (0..PROBE)
        .map(|k| {
            let t = lerp(range[0], range[1], k as f64 / (PROBE - 1) as f64);
            Ok(ctx.eval_edge(edge, t)?.pos)
        })
        .collect()
}

fn sample_edge(ctx: &Context, edge: EdgeId, ts: Vec<f64>, degenerate: bool) -> Result<EdgeTess> {
    let xyz = ts
        .iter()
        .map(|t| Ok(ctx.eval_edge(edge, *t)?.pos.to_array()))
        .collect::<Result<Vec<_>>>()?;
    Ok(EdgeTess {
        edge,
        degenerate,
        ts,
        xyz,
    })
}

fn tessellate_edge(ctx: &Context, edge: EdgeId, params: &TessParams) -> Result<EdgeTess> {
    let e = ctx.store().get_edge(edge)?;
    let range = e.range;
    if e.is_degenerate() {
        return sample_edge(ctx, edge, range.to_vec(), true);
    }
    let probe = probe_edge(ctx, edge, range)?;
    let n = params.segments(&probe, EDGE_SEGMENTS.0, EDGE_SEGMENTS.1);
    let ts = (0..=n).map(|k| lerp(range[0], range[1], k as f64 / n as f64)).collect();
    sample_edge(ctx, edge, ts, false)
}

/// Parameter rectangle spanned by the p-curves of a face's outer loop.
fn pcurve_box(ctx: &Context, face: FaceId) -> Result<Option<[[f64; 2]; 2]>> {
    let f = ctx.store().get_face(face)?;
    let outer = ctx.store().get_loop(f.loops[0])?;
    if outer.pcurves.is_empty() {
        return Ok(None);
    }
    let (mut lo, mut hi) = ([f64::INFINITY; 2], [f64::NEG_INFINITY; 2]);
    for (edge, pcurve) in outer.edges.iter().zip(&outer.pcurves) {
        let range = ctx.store().get_edge(*edge)?.range;
        let pc = ctx.store().get_pcurve(*pcurve)?;
        for t in range {
            let uv = pc.evaluate(t);
            for k in 0..2 {
                lo[k] = lo[k].min(uv[k]);
                hi[k] = hi[k].max(uv[k]);
            }
        }
    }
    Ok(Some([lo, hi]))
}

fn grid_tris(nu: usize, nv: usize) -> Vec<[u32; 3]> {
    let idx = |i: usize, j: usize| (j * (nu + 1) + i) as u32;
    let mut tris = Vec::with_capacity(2 * nu * nv);
    for j in 0..nv {
        for i in 0..nu {
            tris.push([idx(i, j), idx(i + 1, j), idx(i + 1, j + 1)]);
            tris.push([idx(i, j), idx(i + 1, j + 1), idx(i, j + 1)]);
        }
    }
    tris
}

fn ring_tris(rings: usize, boundary: usize) -> Vec<[u32; 3]> {
    let idx = |r: usize, i: usize| (r * boundary + i % boundary) as u32;
    let centre = (rings * boundary) as u32;
    let mut tris = Vec::new();
    for r in 0..rings - 1 {
        for i in 0..boundary {
            tris.push([idx(r, i), idx(r, i + 1), idx(r + 1, i + 1)]);
            tris.push([idx(r, i), idx(r + 1, i + 1), idx(r + 1, i)]);
        }
    }
    for i in 0..boundary {
        tris.push([idx(rings - 1, i), idx(rings - 1, i + 1), centre]);
    }
    tris
}

fn grid_face(ctx: &Context, face: FaceId, bounds: [[f64; 2]; 2], params: &TessParams) -> Result<FaceTess> {
    let [lo, hi] = bounds;
    let mid = [lerp(lo[0], hi[0], 0.5), lerp(lo[1], hi[1], 0.5)];
    let mut along_u = Vec::with_capacity(PROBE);
    let mut along_v = Vec::with_capacity(PROBE);
    for k in 0..PROBE {
        let s = k as f64 / (PROBE - 1) as f64;
        along_u.push(ctx.eval_face(face, [lerp(lo[0], hi[0], s), mid[1]])?.pos);
        along_v.push(ctx.eval_face(face, [mid[0], lerp(lo[1], hi[1], s)])?.pos);
    }
    let nu = params.segments(&along_u, FACE_SEGMENTS.0, FACE_SEGMENTS.1);
    let nv = params.segments(&along_v, FACE_SEGMENTS.0, FACE_SEGMENTS.1);

    let mut uv = Vec::with_capacity((nu + 1) * (nv + 1));
    for j in 0..=nv {
        for i in 0..=nu {
            uv.push([
                lerp(lo[0], hi[0], i as f64 / nu as f64),
                lerp(lo[1], hi[1], j as f64 / nv as f64),
            ]);
        }
    }
    finish_face(ctx, face, FaceLayout::Grid { nu, nv }, uv)
}

/// Boundary polygon of a face in loop order, one point per edge sample
/// except each edge's last.
fn boundary_polygon(ctx: &Context, face: FaceId, params: &TessParams) -> Result<Vec<Vec3>> {
    let f = ctx.store().get_face(face)?;
    let outer = ctx.store().get_loop(f.loops[0])?;
    let mut polygon = Vec::new();
    for (edge, sense) in outer.edges.iter().zip(&outer.senses) {
        let mut tess = tessellate_edge(ctx, *edge, params)?;
        if *sense == cad_kernel::Sense::Reverse {
            tess.xyz.reverse();
        }
        let n = tess.xyz.len();
        polygon.extend(tess.xyz[..n - 1].iter().map(|p| Vec3::from_array(*p)));
    }
    Ok(polygon)
}

fn ring_face(ctx: &Context, face: FaceId, params: &TessParams) -> Result<FaceTess> {
    let polygon = boundary_polygon(ctx, face, params)?;
    if polygon.len() < 3 {
        return Err(TessError::Mismatch(format!(
            "planar face boundary has {} points",
            polygon.len()
        )));
    }
    let outline = polygon
        .iter()
        .map(|p| ctx.invert_face(face, p))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let n = outline.len() as f64;
    let centre = outline
        .iter()
        .fold([0.0, 0.0], |acc, p| [acc[0] + p[0] / n, acc[1] + p[1] / n]);
    let middle = ctx.eval_face(face, centre)?.pos;
    let reach = polygon.iter().map(|p| p.distance_to(&middle)).fold(0.0, f64::max);
    let rings = if params.max_edge_len > 0.0 {
        ((reach / params.max_edge_len).ceil() as usize).clamp(1, MAX_RINGS)
    } else {
        1
    };

    let mut uv = Vec::with_capacity(rings * outline.len() + 1);
    for r in 0..rings {
        let shrink = 1.0 - r as f64 / rings as f64;
        uv.extend(outline.iter().map(|p| {
            [
                centre[0] + shrink * (p[0] - centre[0]),
                centre[1] + shrink * (p[1] - centre[1]),
            ]
        }));
    }
    uv.push(centre);
    let layout = FaceLayout::Rings {
        rings,
        boundary: outline.len(),
    };
    finish_face(ctx, face, layout, uv)
}

fn finish_face(ctx: &Context, face: FaceId, layout: FaceLayout, uv: Vec<[f64; 2]>) -> Result<FaceTess> {
    let xyz = uv
        .iter()
        .map(|p| Ok(ctx.eval_face(face, *p)?.pos.to_array()))
        .collect::<Result<Vec<_>>>()?;
    let tris = match layout {
        FaceLayout::Grid { nu, nv } => grid_tris(nu, nv),
        FaceLayout::Rings { rings, boundary } => ring_tris(rings, boundary),
    };
    Ok(FaceTess {
        face,
        layout,
        uv,
        xyz,
        tris,
    })
}

/// Tessellate every edge and face of a body.
#[instrument(skip(ctx, params))]
pub fn tessellate(ctx: &Context, body: BodyId, params: &TessParams) -> Result<Tessellation> {
    params.validate()?;
    let nodes = ctx.body_nodes(body)?;
    let edges = ctx
        .body_edges(body)?
        .into_iter()
        .map(|e| tessellate_edge(ctx, e, params))
        .collect::<Result<Vec<_>>>()?;
    let mut faces = Vec::new();
    for face in ctx.body_faces(body)? {
        let tess = match pcurve_box(ctx, face)? {
            Some(bounds) => grid_face(ctx, face, bounds, params)?,
            None => ring_face(ctx, face, params)?,
        };
        debug!(points = tess.uv.len(), tris = tess.tris.len(), "face tessellated");
        faces.push(tess);
    }
    let tess = Tessellation {
        body,
        nodes,
        edges,
        faces,
    };
    debug!(points = tess.num_points(), "body tessellated");
    Ok(tess)
}

/// Sample `body` with the index structure of `tess`. Edge parameters keep
/// their relative position in the edge range; face parameters are reused.
#[instrument(skip(ctx, tess))]
pub fn map_tess(ctx: &Context, tess: &Tessellation, body: BodyId) -> Result<Tessellation> {
    let nodes = ctx.body_nodes(body)?;
    let edge_ids = ctx.body_edges(body)?;
    let face_ids = ctx.body_faces(body)?;
    if nodes.len() != tess.nodes.len() || edge_ids.len() != tess.edges.len() || face_ids.len() != tess.faces.len() {
        return Err(TessError::Mismatch(format!(
            "body has {}/{}/{} nodes/edges/faces, tessellation {}/{}/{}",
            nodes.len(),
            edge_ids.len(),
            face_ids.len(),
            tess.nodes.len(),
            tess.edges.len(),
            tess.faces.len()
        )));
    }

    let mut edges = Vec::with_capacity(edge_ids.len());
    for (src, edge) in tess.edges.iter().zip(edge_ids) {
        let new = ctx.store().get_edge(edge)?;
        if new.is_degenerate() != src.degenerate {
            return Err(TessError::Mismatch("edge degeneracy differs".into()));
        }
        let new_range = new.range;
        let (t0, t1) = (src.ts[0], src.ts[src.ts.len() - 1]);
        let ts = src
            .ts
            .iter()
            .map(|t| lerp(new_range[0], new_range[1], (t - t0) / (t1 - t0)))
            .collect();
        edges.push(sample_edge(ctx, edge, ts, src.degenerate)?);
    }

    let mut faces = Vec::with_capacity(face_ids.len());
    for (src, face) in tess.faces.iter().zip(face_ids) {
        faces.push(finish_face(ctx, face, src.layout, src.uv.clone())?);
    }
    Ok(Tessellation {
        body,
        nodes,
        edges,
        faces,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cad_kernel::{BodyChildren, BodyKind, CurveKind, EdgeKind, Sense, SurfaceKind};

    fn unit_disk(ctx: &mut Context, radius: f64) -> BodyId {
        let n = ctx.make_node([radius, 0.0, 0.0]).unwrap();
        let circle = ctx
            .make_curve(
                CurveKind::Circle,
                &[],
                &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, radius],
            )
            .unwrap();
        let e = ctx
            .make_edge(EdgeKind::OneNode, Some(circle), [0.0, std::f64::consts::TAU], &[n])
            .unwrap();
        let lp = ctx.make_loop(true, None, &[e], &[Sense::Forward], &[]).unwrap();
        let plane = ctx
            .make_surface(SurfaceKind::Plane, &[], &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
            .unwrap();
        let face = ctx.make_face(plane, &[lp], Sense::Forward).unwrap();
        ctx.make_body(BodyKind::Face, BodyChildren::Face(face)).unwrap()
    }

    #[test]
    fn test_segments_respect_angle_limit() {
        let params = TessParams {
            max_edge_len: 0.0,
            max_sag: 0.0,
            max_angle: 10.0,
        };
        // Quarter circle probe.
        let probe: Vec<Vec3> = (0..PROBE)
            .map(|k| {
                let a = std::f64::consts::FRAC_PI_2 * k as f64 / (PROBE - 1) as f64;
                Vec3::new(a.cos(), a.sin(), 0.0)
            })
            .collect();
        let n = params.segments(&probe, 2, 64);
        // 90 degrees of turning at 10 per segment, less the probe's own
        // chord offset at the ends.
        assert!((8..=9).contains(&n), "got {n}");
    }

    #[test]
    fn test_disk_rings() {
        let mut ctx = Context::new();
        let body = unit_disk(&mut ctx, 1.0);
        let tess = tessellate(&ctx, body, &TessParams::default()).unwrap();
        assert_eq!(tess.faces.len(), 1);
        let face = &tess.faces[0];
        let FaceLayout::Rings { rings, boundary } = face.layout else {
            panic!("planar face without pcurves uses rings");
        };
        assert_eq!(face.uv.len(), rings * boundary + 1);
        // Every point lies inside the disk.
        for p in &face.xyz {
            assert!(Vec3::from_array(*p).length() <= 1.0 + 1e-12);
        }
        // The inscribed polygon is slightly smaller than the disk.
        let area = tess.area();
        assert!(area < std::f64::consts::PI && area > 0.99 * std::f64::consts::PI);
        for tri in &face.tris {
            assert!(tri.iter().all(|i| (*i as usize) < face.uv.len()));
        }
    }

    #[test]
    fn test_map_tess_keeps_indices() {
        let mut ctx = Context::new();
        let small = unit_disk(&mut ctx, 1.0);
        let large = unit_disk(&mut ctx, 2.0);
        let tess = tessellate(&ctx, small, &TessParams::default()).unwrap();
        let mapped = map_tess(&ctx, &tess, large).unwrap();
        assert_eq!(mapped.num_points(), tess.num_points());
        assert_eq!(mapped.faces[0].uv, tess.faces[0].uv);
        // Circle edges map onto the same angles.
        for (a, b) in tess.edges[0].xyz.iter().zip(&mapped.edges[0].xyz) {
            assert_relative_eq!(2.0 * a[0], b[0], epsilon = 1e-12);
            assert_relative_eq!(2.0 * a[1], b[1], epsilon = 1e-12);
        }
    }
}
