//! Rebuild an entity tree from its data records and check the copy.

use std::collections::HashMap;

use cad_kernel::{Context, Entity};
use tracing::{debug, instrument};

use crate::error::{HarnessError, Result};
use crate::scope::Scope;

/// Allowed growth of an entity's tolerance when rebuilt.
const TOLERANCE_SLACK: f64 = 1.001;

struct Rebuild<'s, 'c> {
    scope: &'s mut Scope<'c>,
    map: HashMap<Entity, Entity>,
}

impl Rebuild<'_, '_> {
    fn entity(&mut self, original: Entity) -> Result<Entity> {
        if let Some(done) = self.map.get(&original) {
            return Ok(*done);
        }
        let rebuilt = if original.is_geometry() {
            let data = self.scope.geometry_data(original)?;
            self.scope.make_geometry(&data)?
        } else {
            let data = self.scope.topology_data(original)?;
            for child in data.children() {
                self.entity(child)?;
            }
            let map = &self.map;
            let data = data.remap(|c| map.get(&c).copied().unwrap_or(c));
            self.scope.make_topology(&data)?
        };
        self.scope.hold(rebuilt);
        self.check(original, rebuilt)?;
        self.map.insert(original, rebuilt);
        Ok(rebuilt)
    }

    fn check(&self, original: Entity, rebuilt: Entity) -> Result<()> {
        let class = original.class_name();
        if !self.scope.is_equivalent(original, rebuilt)? {
            return Err(HarnessError::NotEquivalent { class });
        }
        let (before, after) = (self.scope.tolerance(original)?, self.scope.tolerance(rebuilt)?);
        if after > before * TOLERANCE_SLACK {
            return Err(HarnessError::ToleranceRegression {
                class,
                original: before,
                rebuilt: after,
            });
        }
        Ok(())
    }
}

/// Recreate `root` and everything under it from data records, checking
/// every rebuilt entity for equivalence and tolerance. The copies are
/// released before returning. Returns the number of entities rebuilt.
#[instrument(skip(ctx, root))]
pub fn remake_topology(ctx: &mut Context, root: impl Into<Entity>) -> Result<usize> {
    let root = root.into();
    let mut scope = Scope::new(ctx);
    let mut rebuild = Rebuild {
        scope: &mut scope,
        map: HashMap::new(),
    };
    rebuild.entity(root)?;
    let count = rebuild.map.len();
    debug!(class = root.class_name(), count, "round trip ok");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cad_kernel::{BodyChildren, BodyKind, CurveKind, EdgeKind, Sense};

    #[test]
    fn test_wire_round_trip_releases_copies() {
        let mut ctx = Context::new();
        let a = ctx.make_node([0.0, 0.0, 0.0]).unwrap();
        let b = ctx.make_node([1.0, 0.0, 0.0]).unwrap();
        let line = ctx
            .make_curve(CurveKind::Line, &[], &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0])
            .unwrap();
        let edge = ctx.make_edge(EdgeKind::TwoNode, Some(line), [0.0, 1.0], &[a, b]).unwrap();
        let lp = ctx.make_loop(false, None, &[edge], &[Sense::Forward], &[]).unwrap();
        let body = ctx.make_body(BodyKind::Wire, BodyChildren::Wire(lp)).unwrap();
        let live = ctx.live_count();

        // body, loop, edge, curve, two nodes
        assert_eq!(remake_topology(&mut ctx, body).unwrap(), 6);
        assert_eq!(ctx.live_count(), live);
    }
}
