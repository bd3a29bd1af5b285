pub mod context;
pub mod error;
pub mod geometry;
pub mod operations;
pub mod properties;
pub mod topology;
pub mod velocity;

pub use context::{Context, GeometryData, TopologyData};
pub use error::KernelError;
pub use geometry::{CurveKind, Dual, Real, SurfaceKind, Vec3, Xform};
pub use operations::copy::{transform_curve_payload, transform_surface_payload};
pub use operations::skin::{skin_geometry, Iso};
pub use operations::{LoftConfig, NoseCurvature, Section};
pub use topology::{
    BodyChildren, BodyId, BodyKind, CurveId, EdgeId, EdgeKind, Entity, FaceId, LoopId, NodeId,
    PCurveId, Sense, ShellId, SurfaceId,
};
pub use velocity::{BSplineVelocity, EdgeVelocity, PointVelocity, RangeVelocity, SectionVelocity};

/// Global tolerance configuration for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Points closer than this are considered coincident (model units).
    /// Also the floor of every reported entity tolerance.
    pub coincidence: f64,
    /// Parameter-space tolerance for range and domain checks.
    pub parametric: f64,
    /// Relative deviation allowed between a supplied payload and the
    /// stored one when attaching sensitivities.
    pub payload: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            coincidence: 1e-7,
            parametric: 1e-9,
            payload: 1e-10,
        }
    }
}

impl Tolerance {
    /// Largest deviation between two payloads, scaled by magnitude.
    pub fn payload_deviation(&self, stored: &[f64], given: &[f64]) -> f64 {
        stored
            .iter()
            .zip(given)
            .map(|(a, b)| (a - b).abs() / (1.0 + a.abs()))
            .fold(0.0, f64::max)
    }
}
