//! Callback interface for supplying section sensitivities to the lofting
//! operators directly, instead of reading them from stored geometry.
//!
//! The operators query only what they need, section by section, and never
//! look at stored sensitivities while a velocity provider is in use.

use crate::context::Context;
use crate::error::KernelError;
use crate::topology::{EdgeId, NodeId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeVelocity {
    pub range: [f64; 2],
    pub range_dot: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointVelocity {
    pub xyz: [f64; 3],
    pub xyz_dot: [f64; 3],
}

/// Positions along an edge plus the curve's first derivative at both ends
/// of its range, each with sensitivity.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeVelocity {
    pub xyz: Vec<[f64; 3]>,
    pub xyz_dot: Vec<[f64; 3]>,
    /// `dC/dt` at `range[0]` and `range[1]`.
    pub tangents: [[f64; 3]; 2],
    pub tangents_dot: [[f64; 3]; 2],
}

/// A B-spline edge curve in payload form with its sensitivity.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineVelocity {
    pub header: Vec<usize>,
    pub payload: Vec<f64>,
    pub payload_dot: Vec<f64>,
}

/// Supplies the sensitivities of lofting sections on demand.
///
/// `section` indexes the section list passed to the operator. Edges and
/// nodes are those of the section's own topology.
pub trait SectionVelocity {
    fn range_velocity(&self, ctx: &Context, section: usize, edge: EdgeId) -> Result<RangeVelocity, KernelError>;

    /// Velocity of a node. `edge` is the section edge the node bounds, or
    /// `None` for a node section.
    fn node_velocity(
        &self,
        ctx: &Context,
        section: usize,
        node: NodeId,
        edge: Option<EdgeId>,
    ) -> Result<PointVelocity, KernelError>;

    /// Positions at parameters `ts` moving at `t_dots`.
    fn edge_velocity(
        &self,
        ctx: &Context,
        section: usize,
        edge: EdgeId,
        ts: &[f64],
        t_dots: &[f64],
    ) -> Result<EdgeVelocity, KernelError>;

    /// Only called for edges whose curve is a B-spline.
    fn bspline_velocity(&self, ctx: &Context, section: usize, edge: EdgeId) -> Result<BSplineVelocity, KernelError>;
}
