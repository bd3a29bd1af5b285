//! Parametric section shapes: how each is built, and how its
//! sensitivities are pushed into the built entities.

pub mod builders;
pub mod geometry;
pub mod setters;

use cad_kernel::{Context, Dual, Entity, Real, Section, Xform};
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};
use crate::params::{resolve, Bind, ParamSet};
use crate::scope::Scope;

pub use geometry::{CurveGeom, EdgeGeom, LoopGeom, ShapeGeom};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Node,
    LineTwoPoints,
    LinePointDir,
    CircleOneEdge,
    CircleTwoEdge,
    Square,
    Triangle,
    Naca { sharp: bool },
    NoseNode,
    /// The inner shape's parameters followed by `[scale, ox, oy, oz]`.
    Transformed(Box<Shape>),
}

impl Shape {
    pub fn transformed(self) -> Self {
        Shape::Transformed(Box::new(self))
    }

    /// Number of local parameters.
    pub fn arity(&self) -> usize {
        match self {
            Shape::Node => 3,
            Shape::LineTwoPoints => 6,
            Shape::LinePointDir => 8,
            Shape::CircleOneEdge | Shape::CircleTwoEdge => 10,
            Shape::Square | Shape::Triangle => 9,
            Shape::Naca { .. } => 3,
            Shape::NoseNode => 10,
            Shape::Transformed(inner) => inner.arity() + 4,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Shape::Node => "node".into(),
            Shape::LineTwoPoints => "line".into(),
            Shape::LinePointDir => "line-dir".into(),
            Shape::CircleOneEdge => "circle".into(),
            Shape::CircleTwoEdge => "circle2".into(),
            Shape::Square => "square".into(),
            Shape::Triangle => "triangle".into(),
            Shape::Naca { sharp: true } => "naca-sharp".into(),
            Shape::Naca { sharp: false } => "naca-blunt".into(),
            Shape::NoseNode => "nose".into(),
            Shape::Transformed(inner) => format!("xform({})", inner.name()),
        }
    }

    fn check_arity<R>(&self, p: &[R]) -> Result<()> {
        if p.len() != self.arity() {
            return Err(HarnessError::Config(format!(
                "{} takes {} parameters, got {}",
                self.name(),
                self.arity(),
                p.len()
            )));
        }
        Ok(())
    }

    /// Geometry of the shape at `p`.
    pub fn geometry<R: Real>(&self, p: &[R]) -> Result<ShapeGeom<R>> {
        self.check_arity(p)?;
        match self {
            Shape::Node => Ok(geometry::node(p)),
            Shape::LineTwoPoints => Ok(geometry::line_two_points(p)),
            Shape::LinePointDir => geometry::line_point_dir(p),
            Shape::CircleOneEdge => geometry::circle_one_edge(p),
            Shape::CircleTwoEdge => geometry::circle_two_edge(p),
            Shape::Square => Ok(geometry::square(p)),
            Shape::Triangle => Ok(geometry::triangle(p)),
            Shape::Naca { sharp } => geometry::naca(p, *sharp),
            Shape::NoseNode => Ok(geometry::nose_node(p)),
            Shape::Transformed(inner) => {
                let n = inner.arity();
                let xform = Xform::from_params(&p[n..])?;
                inner.geometry(&p[..n])?.transformed(&xform)
            }
        }
    }

    /// Build the shape at `p`. Every entity made is held by `scope`.
    /// Transformed shapes are built untransformed and then copied.
    pub fn build(&self, scope: &mut Scope, p: &[f64], cap: bool) -> Result<Section> {
        self.check_arity(p)?;
        if let Shape::Transformed(inner) = self {
            let n = inner.arity();
            let original = inner.build(scope, &p[..n], cap)?;
            let copy = scope.copy_transformed(Entity::from(original), &Xform::from_params(&p[n..])?)?;
            scope.hold(copy);
            return Ok(Section::try_from(copy)?);
        }
        builders::build(scope, &self.geometry(p)?, cap)
    }

    /// Attach the sensitivities of the shape at `p` to `section`.
    pub fn set_dots(&self, ctx: &mut Context, section: Section, p: &[Dual]) -> Result<()> {
        setters::set_dots(ctx, section, &self.geometry(p)?)
    }
}

/// One section of a case: a shape, where its parameters come from, and
/// whether it is capped by a planar face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub shape: Shape,
    pub binds: Vec<Bind>,
    pub cap: bool,
}

impl SectionSpec {
    pub fn new(shape: Shape, binds: Vec<Bind>) -> Self {
        Self {
            shape,
            binds,
            cap: false,
        }
    }

    pub fn capped(mut self) -> Self {
        self.cap = true;
        self
    }

    pub fn local(&self, params: &ParamSet) -> Vec<Dual> {
        resolve(&self.binds, params)
    }

    pub fn values(&self, params: &ParamSet) -> Vec<f64> {
        self.local(params).iter().map(|d| d.val).collect()
    }

    pub fn build(&self, scope: &mut Scope, params: &ParamSet) -> Result<Section> {
        self.shape.build(scope, &self.values(params), self.cap)
    }

    pub fn set_dots(&self, ctx: &mut Context, section: Section, params: &ParamSet) -> Result<()> {
        self.shape.set_dots(ctx, section, &self.local(params))
    }

    pub fn geometry(&self, params: &ParamSet) -> Result<ShapeGeom<Dual>> {
        self.shape.geometry(&self.local(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transformed_arity() {
        let shape = Shape::CircleOneEdge.transformed();
        assert_eq!(shape.arity(), 14);
        assert_eq!(shape.name(), "xform(circle)");
    }

    #[test]
    fn test_wrong_arity_is_config_error() {
        let err = Shape::Square.geometry(&[0.0; 4]).unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }
}
