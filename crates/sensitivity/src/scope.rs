//! Scoped ownership of kernel handles.

use std::ops::{Deref, DerefMut};

use cad_kernel::{Context, Entity};
use tracing::warn;

/// Borrows the context and releases every handle it holds, newest first,
/// when dropped. Early returns through `?` therefore never leak.
pub struct Scope<'c> {
    ctx: &'c mut Context,
    held: Vec<Entity>,
}

impl<'c> Scope<'c> {
    pub fn new(ctx: &'c mut Context) -> Self {
        Self { ctx, held: Vec::new() }
    }

    /// Take ownership of one caller reference to `entity`.
    pub fn hold<T: Into<Entity> + Copy>(&mut self, entity: T) -> T {
        self.held.push(entity.into());
        entity
    }

    /// A child scope on the same context, released before this one.
    pub fn nested(&mut self) -> Scope<'_> {
        Scope::new(self.ctx)
    }

    pub fn held(&self) -> usize {
        self.held.len()
    }
}

impl Deref for Scope<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.ctx
    }
}

impl DerefMut for Scope<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        while let Some(entity) = self.held.pop() {
            if let Err(err) = self.ctx.release(entity) {
                warn!(entity = entity.class_name(), %err, "release failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_on_drop() {
        let mut ctx = Context::new();
        {
            let mut scope = Scope::new(&mut ctx);
            let n = scope.make_node([0.0, 0.0, 0.0]).unwrap();
            scope.hold(n);
            assert_eq!(scope.live_count(), 1);
        }
        assert_eq!(ctx.live_count(), 0);
    }

    #[test]
    fn test_nested_scope_released_first() {
        let mut ctx = Context::new();
        {
            let mut outer = Scope::new(&mut ctx);
            let a = outer.make_node([0.0, 0.0, 0.0]).unwrap();
            outer.hold(a);
            {
                let mut inner = outer.nested();
                let b = inner.make_node([1.0, 0.0, 0.0]).unwrap();
                inner.hold(b);
                assert_eq!(inner.live_count(), 2);
            }
            assert_eq!(outer.live_count(), 1);
        }
        assert_eq!(ctx.live_count(), 0);
    }

    #[test]
    fn test_early_return_releases() {
        fn fails(ctx: &mut Context) -> Result<(), cad_kernel::KernelError> {
            let mut scope = Scope::new(ctx);
            let n = scope.make_node([0.0, 0.0, 0.0])?;
            scope.hold(n);
            scope.make_edge(cad_kernel::EdgeKind::TwoNode, None, [0.0, 1.0], &[n])?;
            Ok(())
        }
        let mut ctx = Context::new();
        assert!(fails(&mut ctx).is_err());
        assert_eq!(ctx.live_count(), 0);
    }
}
