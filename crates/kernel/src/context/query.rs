use std::collections::HashSet;

use super::Context;
use crate::error::KernelError;
use crate::topology::*;

impl Context {
    pub fn body_kind(&self, body: BodyId) -> Result<BodyKind, KernelError> {
        Ok(self.store.get_body(body)?.kind)
    }

    /// Faces of a body in shell order. Wire bodies have none.
    pub fn body_faces(&self, body: BodyId) -> Result<Vec<FaceId>, KernelError> {
        Ok(match &self.store.get_body(body)?.children {
            BodyChildren::Wire(_) => vec![],
            BodyChildren::Face(f) => vec![*f],
            BodyChildren::Shells(shells) => {
                let mut faces = Vec::new();
                for s in shells {
                    faces.extend_from_slice(&self.store.get_shell(*s)?.faces);
                }
                faces
            }
        })
    }

    /// Loops of a body: the wire loop, or every face loop in face order.
    pub fn body_loops(&self, body: BodyId) -> Result<Vec<LoopId>, KernelError> {
        if let BodyChildren::Wire(l) = &self.store.get_body(body)?.children {
            return Ok(vec![*l]);
        }
        let mut loops = Vec::new();
        for f in self.body_faces(body)? {
            loops.extend_from_slice(&self.store.get_face(f)?.loops);
        }
        Ok(loops)
    }

    /// Distinct edges of a body in first-visited order.
    pub fn body_edges(&self, body: BodyId) -> Result<Vec<EdgeId>, KernelError> {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for l in self.body_loops(body)? {
            for e in &self.store.get_loop(l)?.edges {
                if seen.insert(*e) {
                    edges.push(*e);
                }
            }
        }
        Ok(edges)
    }

    /// Distinct nodes of a body in first-visited order.
    pub fn body_nodes(&self, body: BodyId) -> Result<Vec<NodeId>, KernelError> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for e in self.body_edges(body)? {
            for n in &self.store.get_edge(e)?.nodes {
                if seen.insert(*n) {
                    nodes.push(*n);
                }
            }
        }
        Ok(nodes)
    }

    /// Edges and senses of a loop.
    pub fn loop_edges(&self, lp: LoopId) -> Result<(Vec<EdgeId>, Vec<Sense>), KernelError> {
        let l = self.store.get_loop(lp)?;
        Ok((l.edges.clone(), l.senses.clone()))
    }

    /// The loop a section-like entity is bounded by: the loop itself, or
    /// the outer loop of a face.
    pub fn outer_loop(&self, entity: Entity) -> Result<LoopId, KernelError> {
        match entity {
            Entity::Loop(l) => {
                self.store.get_loop(l)?;
                Ok(l)
            }
            Entity::Face(f) => Ok(self.store.get_face(f)?.loops[0]),
            other => Err(KernelError::WrongClass {
                expected: "loop or face",
                found: other.class_name(),
            }),
        }
    }

    pub fn node_position(&self, node: NodeId) -> Result<[f64; 3], KernelError> {
        Ok(self.store.get_node(node)?.xyz.to_array())
    }
}
