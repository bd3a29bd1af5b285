//! Sensitivity verification for the geometry kernel.
//!
//! Every case builds a body from parametric sections, attaches analytic
//! sensitivities for one parameter at a time and checks them against a
//! finite difference taken on a perturbed rebuild. Where an operator can
//! also be driven by velocity callbacks, both routes are compared.
//!
//! # Key Components
//!
//! - [`shapes`]: Section shapes: builders, sensitivity setters, formulas
//! - [`operators`]: Ruled, blended, skinned and single-face bodies
//! - [`compare`]: Compensated finite differences and route equivalence
//! - [`driver`]: Per-parameter sweep, round trip, area and leak checks
//! - [`cases`]: The built-in battery
//! - [`report`]: Text and JSON run summaries

pub mod cases;
pub mod compare;
pub mod config;
pub mod driver;
pub mod error;
pub mod operators;
pub mod params;
pub mod report;
pub mod roundtrip;
pub mod scope;
pub mod shapes;
pub mod skin_body;
pub mod velocity;

pub use cases::{battery, Case};
pub use compare::{equiv_dot_vels, ping_bodies, CompareStats, Probe};
pub use config::{HarnessConfig, Tolerances};
pub use driver::{run_battery, run_case, CaseOutcome};
pub use error::{HarnessError, Result};
pub use operators::Op;
pub use params::{Bind, ParamSet};
pub use report::{CaseReport, RunReport};
pub use roundtrip::remake_topology;
pub use scope::Scope;
pub use shapes::{SectionSpec, Shape};
pub use velocity::CaseVelocity;
