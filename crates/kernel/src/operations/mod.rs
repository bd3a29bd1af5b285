pub mod copy;
pub mod loft;
pub mod skin;

use serde::{Deserialize, Serialize};

use crate::topology::{Entity, FaceId, LoopId, NodeId};

/// Tuning for the lofting operators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoftConfig {
    /// Points sampled along every section edge before fitting.
    pub edge_samples: usize,
}

impl Default for LoftConfig {
    fn default() -> Self {
        Self { edge_samples: 11 }
    }
}

/// One cross-section of a loft.
///
/// Node sections are only allowed first or last. A face section behaves
/// like its outer loop and, at either end, also caps the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    Node(NodeId),
    Loop(LoopId),
    Face(FaceId),
}

impl From<Section> for Entity {
    fn from(s: Section) -> Self {
        match s {
            Section::Node(n) => Entity::Node(n),
            Section::Loop(l) => Entity::Loop(l),
            Section::Face(f) => Entity::Face(f),
        }
    }
}

impl TryFrom<Entity> for Section {
    type Error = crate::KernelError;

    fn try_from(e: Entity) -> Result<Self, Self::Error> {
        match e {
            Entity::Node(n) => Ok(Section::Node(n)),
            Entity::Loop(l) => Ok(Section::Loop(l)),
            Entity::Face(f) => Ok(Section::Face(f)),
            other => Err(crate::KernelError::WrongClass {
                expected: "node, loop or face",
                found: other.class_name(),
            }),
        }
    }
}

/// Principal curvature data that rounds a blend at a node section:
/// `[r1, d1x, d1y, d1z, r2, d2x, d2y, d2z]`, two radii with their
/// tangent-plane directions. `dots` is only read by the sensitivity passes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoseCurvature {
    pub values: [f64; 8],
    pub dots: [f64; 8],
}

impl NoseCurvature {
    pub fn new(values: [f64; 8]) -> Self {
        Self {
            values,
            dots: [0.0; 8],
        }
    }

    pub fn with_dots(values: [f64; 8], dots: [f64; 8]) -> Self {
        Self { values, dots }
    }
}
