pub mod real;
pub mod vector;
pub mod bspline;
pub mod curves;
pub mod surfaces;
pub mod transform;

pub use bspline::{BSplineCurve, BSplineSurface, CurvePoint, SurfacePoint};
pub use curves::{Circle3d, Curve, CurveKind, Line3d, PCurve};
pub use real::{Dual, Real};
pub use surfaces::{Plane, Surface, SurfaceKind};
pub use transform::Xform;
pub use vector::Vec3;
