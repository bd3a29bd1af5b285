use slotmap::{Key, SlotMap};

use super::entities::*;
use crate::error::KernelError;
use crate::geometry::curves::PCurve;

/// A stored item plus the number of references held on it, counting both
/// caller handles and parent entities.
#[derive(Debug, Clone)]
pub(crate) struct Entry<T> {
    pub item: T,
    pub refs: u32,
}

// ─── Entity Store ────────────────────────────────────────────────────────────

/// Arena-based storage for all geometric and topological entities.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    pub(crate) curves: SlotMap<CurveId, Entry<CurveRecord>>,
    pub(crate) surfaces: SlotMap<SurfaceId, Entry<SurfaceRecord>>,
    pub(crate) pcurves: SlotMap<PCurveId, Entry<PCurve>>,
    pub(crate) nodes: SlotMap<NodeId, Entry<Node>>,
    pub(crate) edges: SlotMap<EdgeId, Entry<Edge>>,
    pub(crate) loops: SlotMap<LoopId, Entry<Loop>>,
    pub(crate) faces: SlotMap<FaceId, Entry<Face>>,
    pub(crate) shells: SlotMap<ShellId, Entry<Shell>>,
    pub(crate) bodies: SlotMap<BodyId, Entry<Body>>,
}

fn fetch<'a, K: Key, T>(map: &'a SlotMap<K, Entry<T>>, id: K, class: &'static str) -> Result<&'a T, KernelError> {
    map.get(id)
        .map(|e| &e.item)
        .ok_or(KernelError::StaleHandle { class })
}

fn fetch_mut<'a, K: Key, T>(
    map: &'a mut SlotMap<K, Entry<T>>,
    id: K,
    class: &'static str,
) -> Result<&'a mut T, KernelError> {
    map.get_mut(id)
        .map(|e| &mut e.item)
        .ok_or(KernelError::StaleHandle { class })
}

fn fresh<T>(item: T) -> Entry<T> {
    Entry { item, refs: 0 }
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of live entities of every class.
    pub fn live_count(&self) -> usize {
        self.curves.len()
            + self.surfaces.len()
            + self.pcurves.len()
            + self.nodes.len()
            + self.edges.len()
            + self.loops.len()
            + self.faces.len()
            + self.shells.len()
            + self.bodies.len()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        match entity {
            Entity::Curve(id) => self.curves.contains_key(id),
            Entity::Surface(id) => self.surfaces.contains_key(id),
            Entity::PCurve(id) => self.pcurves.contains_key(id),
            Entity::Node(id) => self.nodes.contains_key(id),
            Entity::Edge(id) => self.edges.contains_key(id),
            Entity::Loop(id) => self.loops.contains_key(id),
            Entity::Face(id) => self.faces.contains_key(id),
            Entity::Shell(id) => self.shells.contains_key(id),
            Entity::Body(id) => self.bodies.contains_key(id),
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────────

    pub fn get_curve(&self, id: CurveId) -> Result<&CurveRecord, KernelError> {
        fetch(&self.curves, id, "curve")
    }

    pub fn get_surface(&self, id: SurfaceId) -> Result<&SurfaceRecord, KernelError> {
        fetch(&self.surfaces, id, "surface")
    }

    pub fn get_pcurve(&self, id: PCurveId) -> Result<&PCurve, KernelError> {
        fetch(&self.pcurves, id, "pcurve")
    }

    pub fn get_node(&self, id: NodeId) -> Result<&Node, KernelError> {
        fetch(&self.nodes, id, "node")
    }

    pub fn get_edge(&self, id: EdgeId) -> Result<&Edge, KernelError> {
        fetch(&self.edges, id, "edge")
    }

    pub fn get_loop(&self, id: LoopId) -> Result<&Loop, KernelError> {
        fetch(&self.loops, id, "loop")
    }

    pub fn get_face(&self, id: FaceId) -> Result<&Face, KernelError> {
        fetch(&self.faces, id, "face")
    }

    pub fn get_shell(&self, id: ShellId) -> Result<&Shell, KernelError> {
        fetch(&self.shells, id, "shell")
    }

    pub fn get_body(&self, id: BodyId) -> Result<&Body, KernelError> {
        fetch(&self.bodies, id, "body")
    }

    pub(crate) fn curve_mut(&mut self, id: CurveId) -> Result<&mut CurveRecord, KernelError> {
        fetch_mut(&mut self.curves, id, "curve")
    }

    pub(crate) fn surface_mut(&mut self, id: SurfaceId) -> Result<&mut SurfaceRecord, KernelError> {
        fetch_mut(&mut self.surfaces, id, "surface")
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, KernelError> {
        fetch_mut(&mut self.nodes, id, "node")
    }

    pub(crate) fn edge_mut(&mut self, id: EdgeId) -> Result<&mut Edge, KernelError> {
        fetch_mut(&mut self.edges, id, "edge")
    }

    // ─── Insertion (unreferenced) ───────────────────────────────────────

    pub(crate) fn insert_curve(&mut self, record: CurveRecord) -> CurveId {
        self.curves.insert(fresh(record))
    }

    pub(crate) fn insert_surface(&mut self, record: SurfaceRecord) -> SurfaceId {
        self.surfaces.insert(fresh(record))
    }

    pub(crate) fn insert_pcurve(&mut self, pcurve: PCurve) -> PCurveId {
        self.pcurves.insert(fresh(pcurve))
    }

    pub(crate) fn insert_node(&mut self, node: Node) -> NodeId {
        self.nodes.insert(fresh(node))
    }

    pub(crate) fn insert_edge(&mut self, edge: Edge) -> EdgeId {
        self.edges.insert(fresh(edge))
    }

    pub(crate) fn insert_loop(&mut self, lp: Loop) -> LoopId {
        self.loops.insert(fresh(lp))
    }

    pub(crate) fn insert_face(&mut self, face: Face) -> FaceId {
        self.faces.insert(fresh(face))
    }

    pub(crate) fn insert_shell(&mut self, shell: Shell) -> ShellId {
        self.shells.insert(fresh(shell))
    }

    pub(crate) fn insert_body(&mut self, body: Body) -> BodyId {
        self.bodies.insert(fresh(body))
    }

    // ─── Reference counting ─────────────────────────────────────────────

    fn refs_mut(&mut self, entity: Entity) -> Result<&mut u32, KernelError> {
        let class = entity.class_name();
        let refs = match entity {
            Entity::Curve(id) => self.curves.get_mut(id).map(|e| &mut e.refs),
            Entity::Surface(id) => self.surfaces.get_mut(id).map(|e| &mut e.refs),
            Entity::PCurve(id) => self.pcurves.get_mut(id).map(|e| &mut e.refs),
            Entity::Node(id) => self.nodes.get_mut(id).map(|e| &mut e.refs),
            Entity::Edge(id) => self.edges.get_mut(id).map(|e| &mut e.refs),
            Entity::Loop(id) => self.loops.get_mut(id).map(|e| &mut e.refs),
            Entity::Face(id) => self.faces.get_mut(id).map(|e| &mut e.refs),
            Entity::Shell(id) => self.shells.get_mut(id).map(|e| &mut e.refs),
            Entity::Body(id) => self.bodies.get_mut(id).map(|e| &mut e.refs),
        };
        refs.ok_or(KernelError::StaleHandle { class })
    }

    pub fn refs(&self, entity: Entity) -> Result<u32, KernelError> {
        let class = entity.class_name();
        let refs = match entity {
            Entity::Curve(id) => self.curves.get(id).map(|e| e.refs),
            Entity::Surface(id) => self.surfaces.get(id).map(|e| e.refs),
            Entity::PCurve(id) => self.pcurves.get(id).map(|e| e.refs),
            Entity::Node(id) => self.nodes.get(id).map(|e| e.refs),
            Entity::Edge(id) => self.edges.get(id).map(|e| e.refs),
            Entity::Loop(id) => self.loops.get(id).map(|e| e.refs),
            Entity::Face(id) => self.faces.get(id).map(|e| e.refs),
            Entity::Shell(id) => self.shells.get(id).map(|e| e.refs),
            Entity::Body(id) => self.bodies.get(id).map(|e| e.refs),
        };
        refs.ok_or(KernelError::StaleHandle { class })
    }

    pub(crate) fn incref(&mut self, entity: Entity) -> Result<(), KernelError> {
        *self.refs_mut(entity)? += 1;
        Ok(())
    }

    /// Entities directly referenced by `entity`, one entry per reference.
    pub fn children(&self, entity: Entity) -> Result<Vec<Entity>, KernelError> {
        let mut out = Vec::new();
        match entity {
            Entity::Curve(id) => {
                self.get_curve(id)?;
            }
            Entity::Surface(id) => {
                self.get_surface(id)?;
            }
            Entity::PCurve(id) => {
                self.get_pcurve(id)?;
            }
            Entity::Node(id) => {
                self.get_node(id)?;
            }
            Entity::Edge(id) => {
                let edge = self.get_edge(id)?;
                out.extend(edge.curve.map(Entity::Curve));
                out.extend(edge.nodes.iter().map(|n| Entity::Node(*n)));
            }
            Entity::Loop(id) => {
                let lp = self.get_loop(id)?;
                out.extend(lp.surface.map(Entity::Surface));
                out.extend(lp.edges.iter().map(|e| Entity::Edge(*e)));
                out.extend(lp.pcurves.iter().map(|p| Entity::PCurve(*p)));
            }
            Entity::Face(id) => {
                let face = self.get_face(id)?;
                out.push(Entity::Surface(face.surface));
                out.extend(face.loops.iter().map(|l| Entity::Loop(*l)));
            }
            Entity::Shell(id) => {
                let shell = self.get_shell(id)?;
                out.extend(shell.faces.iter().map(|f| Entity::Face(*f)));
            }
            Entity::Body(id) => match &self.get_body(id)?.children {
                BodyChildren::Wire(l) => out.push(Entity::Loop(*l)),
                BodyChildren::Face(f) => out.push(Entity::Face(*f)),
                BodyChildren::Shells(s) => out.extend(s.iter().map(|s| Entity::Shell(*s))),
            },
        }
        Ok(out)
    }

    /// Take one reference for each child of a newly inserted parent.
    pub(crate) fn adopt_children(&mut self, parent: Entity) -> Result<(), KernelError> {
        for child in self.children(parent)? {
            self.incref(child)?;
        }
        Ok(())
    }

    fn remove(&mut self, entity: Entity) {
        match entity {
            Entity::Curve(id) => drop(self.curves.remove(id)),
            Entity::Surface(id) => drop(self.surfaces.remove(id)),
            Entity::PCurve(id) => drop(self.pcurves.remove(id)),
            Entity::Node(id) => drop(self.nodes.remove(id)),
            Entity::Edge(id) => drop(self.edges.remove(id)),
            Entity::Loop(id) => drop(self.loops.remove(id)),
            Entity::Face(id) => drop(self.faces.remove(id)),
            Entity::Shell(id) => drop(self.shells.remove(id)),
            Entity::Body(id) => drop(self.bodies.remove(id)),
        }
    }

    /// Drop one reference; entities reaching zero are removed along with
    /// the references they held on their children.
    pub(crate) fn release(&mut self, entity: Entity) -> Result<(), KernelError> {
        let mut pending = vec![entity];
        while let Some(e) = pending.pop() {
            let refs = self.refs_mut(e)?;
            *refs = refs.saturating_sub(1);
            if *refs == 0 {
                pending.extend(self.children(e)?);
                self.remove(e);
            }
        }
        Ok(())
    }

    /// Remove an entity that nothing references. Used to roll back partial
    /// construction.
    pub(crate) fn discard(&mut self, entity: Entity) -> Result<(), KernelError> {
        if self.refs(entity)? == 0 {
            self.incref(entity)?;
            self.release(entity)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::vector::Vec3;

    fn node(store: &mut EntityStore) -> NodeId {
        store.insert_node(Node {
            xyz: Vec3::ZERO,
            dot: None,
        })
    }

    #[test]
    fn test_release_cascades_to_children() {
        let mut store = EntityStore::new();
        let a = node(&mut store);
        let edge = store.insert_edge(Edge {
            kind: EdgeKind::Degenerate,
            curve: None,
            range: [0.0, 1.0],
            range_dot: None,
            nodes: vec![a],
        });
        store.adopt_children(edge.into()).unwrap();
        store.incref(edge.into()).unwrap();
        assert_eq!(store.live_count(), 2);
        store.release(edge.into()).unwrap();
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_shared_child_survives_one_parent() {
        let mut store = EntityStore::new();
        let a = node(&mut store);
        let mut edges = Vec::new();
        for _ in 0..2 {
            let e = store.insert_edge(Edge {
                kind: EdgeKind::Degenerate,
                curve: None,
                range: [0.0, 1.0],
                range_dot: None,
                nodes: vec![a],
            });
            store.adopt_children(e.into()).unwrap();
            store.incref(e.into()).unwrap();
            edges.push(e);
        }
        store.release(edges[0].into()).unwrap();
        assert!(store.contains(a.into()));
        assert_eq!(store.refs(a.into()).unwrap(), 1);
        store.release(edges[1].into()).unwrap();
        assert!(!store.contains(a.into()));
    }

    #[test]
    fn test_stale_handle_is_an_error() {
        let mut store = EntityStore::new();
        let a = node(&mut store);
        store.discard(a.into()).unwrap();
        assert!(matches!(
            store.get_node(a),
            Err(KernelError::StaleHandle { class: "node" })
        ));
    }
}
