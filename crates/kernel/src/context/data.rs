use serde::{Deserialize, Serialize};

use super::Context;
use crate::error::KernelError;
use crate::geometry::curves::CurveKind;
use crate::geometry::surfaces::SurfaceKind;
use crate::topology::*;

/// Everything needed to recreate a geometry entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeometryData {
    Curve {
        kind: CurveKind,
        header: Vec<usize>,
        payload: Vec<f64>,
    },
    Surface {
        kind: SurfaceKind,
        header: Vec<usize>,
        payload: Vec<f64>,
    },
    PCurve {
        payload: Vec<f64>,
    },
}

/// Everything needed to recreate a topology entity from its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TopologyData {
    Node {
        xyz: [f64; 3],
    },
    Edge {
        kind: EdgeKind,
        curve: Option<CurveId>,
        range: [f64; 2],
        nodes: Vec<NodeId>,
    },
    Loop {
        closed: bool,
        surface: Option<SurfaceId>,
        edges: Vec<EdgeId>,
        senses: Vec<Sense>,
        pcurves: Vec<PCurveId>,
    },
    Face {
        surface: SurfaceId,
        loops: Vec<LoopId>,
        sense: Sense,
    },
    Shell {
        closed: bool,
        faces: Vec<FaceId>,
    },
    Body {
        kind: BodyKind,
        children: BodyChildren,
    },
}

impl TopologyData {
    /// Referenced entities, geometry first.
    pub fn children(&self) -> Vec<Entity> {
        match self {
            TopologyData::Node { .. } => vec![],
            TopologyData::Edge { curve, nodes, .. } => curve
                .iter()
                .map(|c| Entity::Curve(*c))
                .chain(nodes.iter().map(|n| Entity::Node(*n)))
                .collect(),
            TopologyData::Loop {
                surface,
                edges,
                pcurves,
                ..
            } => surface
                .iter()
                .map(|s| Entity::Surface(*s))
                .chain(pcurves.iter().map(|p| Entity::PCurve(*p)))
                .chain(edges.iter().map(|e| Entity::Edge(*e)))
                .collect(),
            TopologyData::Face { surface, loops, .. } => std::iter::once(Entity::Surface(*surface))
                .chain(loops.iter().map(|l| Entity::Loop(*l)))
                .collect(),
            TopologyData::Shell { faces, .. } => faces.iter().map(|f| Entity::Face(*f)).collect(),
            TopologyData::Body { children, .. } => match children {
                BodyChildren::Wire(l) => vec![Entity::Loop(*l)],
                BodyChildren::Face(f) => vec![Entity::Face(*f)],
                BodyChildren::Shells(s) => s.iter().map(|s| Entity::Shell(*s)).collect(),
            },
        }
    }

    /// Substitute children through `map`; unmapped children stay as they are.
    pub fn remap(&self, map: impl Fn(Entity) -> Entity) -> Self {
        let curve = |c: CurveId| match map(Entity::Curve(c)) {
            Entity::Curve(n) => n,
            _ => c,
        };
        let surface = |s: SurfaceId| match map(Entity::Surface(s)) {
            Entity::Surface(n) => n,
            _ => s,
        };
        let pcurve = |p: PCurveId| match map(Entity::PCurve(p)) {
            Entity::PCurve(n) => n,
            _ => p,
        };
        let node = |x: NodeId| match map(Entity::Node(x)) {
            Entity::Node(n) => n,
            _ => x,
        };
        let edge = |x: EdgeId| match map(Entity::Edge(x)) {
            Entity::Edge(n) => n,
            _ => x,
        };
        let lp = |x: LoopId| match map(Entity::Loop(x)) {
            Entity::Loop(n) => n,
            _ => x,
        };
        let face = |x: FaceId| match map(Entity::Face(x)) {
            Entity::Face(n) => n,
            _ => x,
        };
        let shell = |x: ShellId| match map(Entity::Shell(x)) {
            Entity::Shell(n) => n,
            _ => x,
        };
        match self {
            TopologyData::Node { xyz } => TopologyData::Node { xyz: *xyz },
            TopologyData::Edge {
                kind,
                curve: c,
                range,
                nodes,
            } => TopologyData::Edge {
                kind: *kind,
                curve: c.map(curve),
                range: *range,
                nodes: nodes.iter().map(|n| node(*n)).collect(),
            },
            TopologyData::Loop {
                closed,
                surface: s,
                edges,
                senses,
                pcurves,
            } => TopologyData::Loop {
                closed: *closed,
                surface: s.map(surface),
                edges: edges.iter().map(|e| edge(*e)).collect(),
                senses: senses.clone(),
                pcurves: pcurves.iter().map(|p| pcurve(*p)).collect(),
            },
            TopologyData::Face {
                surface: s,
                loops,
                sense,
            } => TopologyData::Face {
                surface: surface(*s),
                loops: loops.iter().map(|l| lp(*l)).collect(),
                sense: *sense,
            },
            TopologyData::Shell { closed, faces } => TopologyData::Shell {
                closed: *closed,
                faces: faces.iter().map(|f| face(*f)).collect(),
            },
            TopologyData::Body { kind, children } => TopologyData::Body {
                kind: *kind,
                children: match children {
                    BodyChildren::Wire(l) => BodyChildren::Wire(lp(*l)),
                    BodyChildren::Face(f) => BodyChildren::Face(face(*f)),
                    BodyChildren::Shells(s) => BodyChildren::Shells(s.iter().map(|x| shell(*x)).collect()),
                },
            },
        }
    }
}

impl Context {
    pub fn geometry_data(&self, entity: impl Into<Entity>) -> Result<GeometryData, KernelError> {
        match entity.into() {
            Entity::Curve(id) => {
                let (kind, header, payload) = self.store.get_curve(id)?.curve.to_payload();
                Ok(GeometryData::Curve { kind, header, payload })
            }
            Entity::Surface(id) => {
                let (kind, header, payload) = self.store.get_surface(id)?.surface.to_payload();
                Ok(GeometryData::Surface { kind, header, payload })
            }
            Entity::PCurve(id) => Ok(GeometryData::PCurve {
                payload: self.store.get_pcurve(id)?.to_payload(),
            }),
            other => Err(KernelError::WrongClass {
                expected: "geometry",
                found: other.class_name(),
            }),
        }
    }

    pub fn make_geometry(&mut self, data: &GeometryData) -> Result<Entity, KernelError> {
        Ok(match data {
            GeometryData::Curve { kind, header, payload } => self.make_curve(*kind, header, payload)?.into(),
            GeometryData::Surface { kind, header, payload } => self.make_surface(*kind, header, payload)?.into(),
            GeometryData::PCurve { payload } => self.make_pcurve(payload)?.into(),
        })
    }

    pub fn topology_data(&self, entity: impl Into<Entity>) -> Result<TopologyData, KernelError> {
        Ok(match entity.into() {
            Entity::Node(id) => TopologyData::Node {
                xyz: self.store.get_node(id)?.xyz.to_array(),
            },
            Entity::Edge(id) => {
                let e = self.store.get_edge(id)?;
                TopologyData::Edge {
                    kind: e.kind,
                    curve: e.curve,
                    range: e.range,
                    nodes: e.nodes.clone(),
                }
            }
            Entity::Loop(id) => {
                let l = self.store.get_loop(id)?;
                TopologyData::Loop {
                    closed: l.closed,
                    surface: l.surface,
                    edges: l.edges.clone(),
                    senses: l.senses.clone(),
                    pcurves: l.pcurves.clone(),
                }
            }
            Entity::Face(id) => {
                let f = self.store.get_face(id)?;
                TopologyData::Face {
                    surface: f.surface,
                    loops: f.loops.clone(),
                    sense: f.sense,
                }
            }
            Entity::Shell(id) => {
                let s = self.store.get_shell(id)?;
                TopologyData::Shell {
                    closed: s.closed,
                    faces: s.faces.clone(),
                }
            }
            Entity::Body(id) => {
                let b = self.store.get_body(id)?;
                TopologyData::Body {
                    kind: b.kind,
                    children: b.children.clone(),
                }
            }
            other => {
                return Err(KernelError::WrongClass {
                    expected: "topology",
                    found: other.class_name(),
                });
            }
        })
    }

    /// Create a topology entity from its data; the caller holds one reference.
    pub fn make_topology(&mut self, data: &TopologyData) -> Result<Entity, KernelError> {
        Ok(match data {
            TopologyData::Node { xyz } => self.make_node(*xyz)?.into(),
            TopologyData::Edge {
                kind,
                curve,
                range,
                nodes,
            } => self.make_edge(*kind, *curve, *range, nodes)?.into(),
            TopologyData::Loop {
                closed,
                surface,
                edges,
                senses,
                pcurves,
            } => self.make_loop(*closed, *surface, edges, senses, pcurves)?.into(),
            TopologyData::Face { surface, loops, sense } => self.make_face(*surface, loops, *sense)?.into(),
            TopologyData::Shell { closed, faces } => self.make_shell(*closed, faces)?.into(),
            TopologyData::Body { kind, children } => self.make_body(*kind, children.clone())?.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_record_survives_json() {
        let mut ctx = Context::new();
        let a = ctx.make_node([0.0, 0.0, 0.0]).unwrap();
        let b = ctx.make_node([2.0, 0.0, 0.0]).unwrap();
        let line = ctx
            .make_curve(CurveKind::Line, &[], &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0])
            .unwrap();
        let edge = ctx.make_edge(EdgeKind::TwoNode, Some(line), [0.0, 2.0], &[a, b]).unwrap();

        let data = ctx.topology_data(edge).unwrap();
        let text = serde_json::to_string(&data).unwrap();
        let back: TopologyData = serde_json::from_str(&text).unwrap();
        assert_eq!(back, data);
        assert_eq!(
            back.children(),
            vec![Entity::Curve(line), Entity::Node(a), Entity::Node(b)]
        );

        let copy = ctx.make_topology(&back).unwrap();
        assert!(ctx.is_equivalent(edge, copy).unwrap());
    }
}
