use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::geometry::curves::Curve;
use crate::geometry::real::Dual;
use crate::geometry::surfaces::Surface;
use crate::geometry::vector::Vec3;

// ─── Entity Keys ─────────────────────────────────────────────────────────────

new_key_type! {
    pub struct CurveId;
    pub struct SurfaceId;
    pub struct PCurveId;
    pub struct NodeId;
    pub struct EdgeId;
    pub struct LoopId;
    pub struct FaceId;
    pub struct ShellId;
    pub struct BodyId;
}

/// Any handle issued by a [`Context`](crate::Context).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Entity {
    Curve(CurveId),
    Surface(SurfaceId),
    PCurve(PCurveId),
    Node(NodeId),
    Edge(EdgeId),
    Loop(LoopId),
    Face(FaceId),
    Shell(ShellId),
    Body(BodyId),
}

impl Entity {
    pub fn class_name(&self) -> &'static str {
        match self {
            Entity::Curve(_) => "curve",
            Entity::Surface(_) => "surface",
            Entity::PCurve(_) => "pcurve",
            Entity::Node(_) => "node",
            Entity::Edge(_) => "edge",
            Entity::Loop(_) => "loop",
            Entity::Face(_) => "face",
            Entity::Shell(_) => "shell",
            Entity::Body(_) => "body",
        }
    }

    pub fn is_geometry(&self) -> bool {
        matches!(self, Entity::Curve(_) | Entity::Surface(_) | Entity::PCurve(_))
    }
}

macro_rules! entity_from {
    ($($id:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$id> for Entity {
                fn from(id: $id) -> Self {
                    Entity::$variant(id)
                }
            }
        )*
    };
}

entity_from! {
    CurveId => Curve,
    SurfaceId => Surface,
    PCurveId => PCurve,
    NodeId => Node,
    EdgeId => Edge,
    LoopId => Loop,
    FaceId => Face,
    ShellId => Shell,
    BodyId => Body,
}

// ─── Geometry Records ───────────────────────────────────────────────────────

/// A stored curve and, once set, its sensitivity.
#[derive(Debug, Clone)]
pub struct CurveRecord {
    pub curve: Curve,
    pub sensitivity: Option<Curve<Dual>>,
}

#[derive(Debug, Clone)]
pub struct SurfaceRecord {
    pub surface: Surface,
    pub sensitivity: Option<Surface<Dual>>,
}

// ─── Topological Entities ───────────────────────────────────────────────────

/// Traversal direction of an edge within a loop, or of a face relative to
/// its surface normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sense {
    Forward,
    Reverse,
}

impl Sense {
    pub fn sign(&self) -> f64 {
        match self {
            Sense::Forward => 1.0,
            Sense::Reverse => -1.0,
        }
    }

    pub fn flip(&self) -> Self {
        match self {
            Sense::Forward => Sense::Reverse,
            Sense::Reverse => Sense::Forward,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub xyz: Vec3,
    pub dot: Option<Vec3>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Open edge between two distinct nodes.
    TwoNode,
    /// Closed edge that starts and ends on the same node.
    OneNode,
    /// Zero-length edge collapsed onto a node; carries no curve.
    Degenerate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub kind: EdgeKind,
    pub curve: Option<CurveId>,
    pub range: [f64; 2],
    pub range_dot: Option<[f64; 2]>,
    /// Start then end node; a single node for one-node and degenerate edges.
    pub nodes: Vec<NodeId>,
}

impl Edge {
    pub fn start_node(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn end_node(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }

    pub fn is_degenerate(&self) -> bool {
        self.kind == EdgeKind::Degenerate
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loop {
    pub closed: bool,
    /// Reference surface for the pcurves, if any.
    pub surface: Option<SurfaceId>,
    pub edges: Vec<EdgeId>,
    pub senses: Vec<Sense>,
    /// One per edge when `surface` is set, otherwise empty.
    pub pcurves: Vec<PCurveId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Face {
    pub surface: SurfaceId,
    /// Outer loop first.
    pub loops: Vec<LoopId>,
    pub sense: Sense,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shell {
    pub closed: bool,
    pub faces: Vec<FaceId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyKind {
    Wire,
    Face,
    Sheet,
    Solid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BodyChildren {
    Wire(LoopId),
    Face(FaceId),
    Shells(Vec<ShellId>),
}

#[derive(Debug, Clone)]
pub struct Body {
    pub kind: BodyKind,
    pub children: BodyChildren,
    /// Set on bodies made by ruled/blend so the sensitivity pass can
    /// address the same entities.
    pub(crate) loft: Option<crate::operations::loft::LoftLayout>,
}
