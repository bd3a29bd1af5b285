//! Deep copies under a uniform scale and offset.

use std::collections::HashMap;

use tracing::instrument;

use crate::context::{Context, TopologyData};
use crate::error::KernelError;
use crate::geometry::curves::{Curve, CurveKind};
use crate::geometry::real::Real;
use crate::geometry::surfaces::{Surface, SurfaceKind};
use crate::geometry::transform::Xform;
use crate::topology::*;

/// Transform a curve payload. Works for values and, over duals, for the
/// payload sensitivity under a moving transform.
pub fn transform_curve_payload<R: Real>(
    xform: &Xform<R>,
    kind: CurveKind,
    header: &[usize],
    payload: &[R],
) -> Result<Vec<R>, KernelError> {
    let curve = Curve::from_payload(kind, header, payload)?;
    Ok(xform.apply_curve(&curve).to_payload().2)
}

pub fn transform_surface_payload<R: Real>(
    xform: &Xform<R>,
    kind: SurfaceKind,
    header: &[usize],
    payload: &[R],
) -> Result<Vec<R>, KernelError> {
    let surface = Surface::from_payload(kind, header, payload)?;
    Ok(xform.apply_surface(&surface).to_payload().2)
}

impl Context {
    /// Copy `entity` and everything below it, moved by `xform`. Edge
    /// ranges and p-curves carry over unchanged. Sensitivities are not
    /// copied. The caller holds one reference to the copy.
    #[instrument(skip_all)]
    pub fn copy_transformed(&mut self, entity: impl Into<Entity>, xform: &Xform) -> Result<Entity, KernelError> {
        let entity = entity.into();
        let mut memo = HashMap::new();
        let mut created = Vec::new();
        match self.copy_entity(entity, xform, &mut memo, &mut created) {
            Ok(copy) => {
                self.store.incref(copy)?;
                Ok(copy)
            }
            Err(e) => {
                for c in created.iter().rev() {
                    if self.store.contains(*c) {
                        let _ = self.store.discard(*c);
                    }
                }
                Err(e)
            }
        }
    }

    fn copy_entity(
        &mut self,
        entity: Entity,
        xform: &Xform,
        memo: &mut HashMap<Entity, Entity>,
        created: &mut Vec<Entity>,
    ) -> Result<Entity, KernelError> {
        if let Some(done) = memo.get(&entity) {
            return Ok(*done);
        }
        let copy: Entity = match entity {
            Entity::Curve(id) => {
                let moved = xform.apply_curve(&self.store.get_curve(id)?.curve);
                self.create_curve(moved).into()
            }
            Entity::Surface(id) => {
                let moved = xform.apply_surface(&self.store.get_surface(id)?.surface);
                self.create_surface(moved).into()
            }
            Entity::PCurve(id) => {
                let pc = self.store.get_pcurve(id)?.clone();
                self.store.insert_pcurve(pc).into()
            }
            Entity::Node(id) => {
                let xyz = xform.apply_point(&self.store.get_node(id)?.xyz);
                self.create_node(xyz).into()
            }
            _ => {
                let data = self.topology_data(entity)?;
                for child in data.children() {
                    self.copy_entity(child, xform, memo, created)?;
                }
                let data = data.remap(|c| memo.get(&c).copied().unwrap_or(c));
                self.create_topology(&data)?
            }
        };
        created.push(copy);
        memo.insert(entity, copy);
        Ok(copy)
    }

    fn create_topology(&mut self, data: &TopologyData) -> Result<Entity, KernelError> {
        Ok(match data {
            TopologyData::Node { xyz } => self.create_node(crate::Vec3::from_array(*xyz)).into(),
            TopologyData::Edge {
                kind,
                curve,
                range,
                nodes,
            } => self.create_edge(*kind, *curve, *range, nodes)?.into(),
            TopologyData::Loop {
                closed,
                surface,
                edges,
                senses,
                pcurves,
            } => self.create_loop(*closed, *surface, edges, senses, pcurves)?.into(),
            TopologyData::Face { surface, loops, sense } => self.create_face(*surface, loops, *sense)?.into(),
            TopologyData::Shell { closed, faces } => self.create_shell(*closed, faces)?.into(),
            TopologyData::Body { kind, children } => self.create_body(*kind, children.clone(), None)?.into(),
        })
    }
}
