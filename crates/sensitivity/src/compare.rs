//! Comparing analytic sensitivities against finite differences, and two
//! sensitivity routes against each other.
//!
//! Numerical disagreements are counted and logged, never raised; only
//! structural problems (mismatched tessellations, kernel failures) abort.
//!
//! # Compensation
//!
//! A perturbed body is sampled at the mapped parameters of the baseline,
//! which are not the same parameters when an edge range moves. The plain
//! difference quotient then mixes in parameter motion, so it is corrected
//! with the baseline Jacobian:
//!
//! ```text
//! fd = (P(x + dx, s') - P(x, s)) / dx - sum_k dP/ds_k * (s'_k - s_k) / dx
//! ```

use cad_kernel::{Context, Vec3};
use cad_tessellation::Tessellation;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Tolerances;
use crate::error::{HarnessError, Result};

/// Counters for one comparison pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareStats {
    /// Scalar components compared.
    pub checks: usize,
    /// Components outside tolerance.
    pub errors: usize,
    /// Degenerate edges left out.
    pub skipped_degenerate: usize,
}

impl CompareStats {
    pub fn absorb(&mut self, other: CompareStats) {
        self.checks += other.checks;
        self.errors += other.errors;
        self.skipped_degenerate += other.skipped_degenerate;
    }
}

/// Labels attached to every logged mismatch.
#[derive(Debug, Clone, Copy)]
pub struct Probe<'a> {
    pub case: &'a str,
    pub param: usize,
}

struct Checker<'a> {
    probe: Probe<'a>,
    stats: CompareStats,
}

impl<'a> Checker<'a> {
    fn new(probe: Probe<'a>) -> Self {
        Self {
            probe,
            stats: CompareStats::default(),
        }
    }

    fn check(&mut self, entity: &str, index: usize, sample: usize, analytic: &[f64], reference: &[f64], tol: f64) {
        for (component, (a, r)) in analytic.iter().zip(reference).enumerate() {
            self.stats.checks += 1;
            let diff = (a - r).abs();
            if diff > tol || !diff.is_finite() {
                self.stats.errors += 1;
                warn!(
                    shape = self.probe.case,
                    entity,
                    index,
                    sample,
                    param = self.probe.param,
                    component,
                    analytic = *a,
                    reference = *r,
                    diff,
                    tol,
                    "sensitivity mismatch"
                );
            }
        }
    }
}

fn structure(base: &Tessellation, other: &Tessellation) -> Result<()> {
    let same = base.nodes.len() == other.nodes.len()
        && base.edges.len() == other.edges.len()
        && base.faces.len() == other.faces.len()
        && base.edges.iter().zip(&other.edges).all(|(a, b)| a.ts.len() == b.ts.len())
        && base.faces.iter().zip(&other.faces).all(|(a, b)| a.uv.len() == b.uv.len());
    if same {
        Ok(())
    } else {
        Err(HarnessError::Mismatch {
            what: "tessellation",
            detail: "sample structure differs between bodies".into(),
        })
    }
}

/// Difference quotient corrected for parameter motion.
fn compensated(p1: &Vec3, p2: &Vec3, jacobian: &[Vec3], ds: &[f64], dx: f64) -> [f64; 3] {
    let raw = (*p2 - *p1).scale(1.0 / dx);
    jacobian
        .iter()
        .zip(ds)
        .fold(raw, |acc, (j, d)| acc - j.scale(d / dx))
        .to_array()
}

fn quotient(a: &[f64], b: &[f64], dx: f64) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| (y - x) / dx).collect()
}

/// Check the sensitivities stored on `base.body` against the finite
/// difference to `pert.body`, a copy built at parameter step `dx`.
pub fn ping_bodies(
    ctx: &Context,
    base: &Tessellation,
    pert: &Tessellation,
    dx: f64,
    tol: &Tolerances,
    probe: Probe<'_>,
) -> Result<CompareStats> {
    structure(base, pert)?;
    let mut c = Checker::new(probe);

    for (fi, (fa, fb)) in base.faces.iter().zip(&pert.faces).enumerate() {
        for (k, (uv1, uv2)) in fa.uv.iter().zip(&fb.uv).enumerate() {
            let analytic = ctx.eval_face_dot(fa.face, *uv1, [0.0, 0.0])?.pos.deriv_array();
            let s1 = ctx.eval_face(fa.face, *uv1)?;
            let p2 = ctx.eval_face(fb.face, *uv2)?.pos;
            let ds = [uv2[0] - uv1[0], uv2[1] - uv1[1]];
            let fd = compensated(&s1.pos, &p2, &[s1.du, s1.dv], &ds, dx);
            c.check("face", fi, k, &analytic, &fd, tol.face);
        }
    }

    for (ei, (ea, eb)) in base.edges.iter().zip(&pert.edges).enumerate() {
        if ea.degenerate {
            c.stats.skipped_degenerate += 1;
            continue;
        }
        for (k, (t1, t2)) in ea.ts.iter().zip(&eb.ts).enumerate() {
            let analytic = ctx.eval_edge_dot(ea.edge, *t1, 0.0)?.pos.deriv_array();
            let c1 = ctx.eval_edge(ea.edge, *t1)?;
            let p2 = ctx.eval_edge(eb.edge, *t2)?.pos;
            let fd = compensated(&c1.pos, &p2, &[c1.d1], &[t2 - t1], dx);
            c.check("edge", ei, k, &analytic, &fd, tol.edge);
        }
        let ra = ctx.store().get_edge(ea.edge)?.range;
        let rb = ctx.store().get_edge(eb.edge)?.range;
        let analytic = ctx.range_dot(ea.edge)?;
        c.check("range", ei, 0, &analytic, &quotient(&ra, &rb, dx), tol.edge);
    }

    for (ni, (na, nb)) in base.nodes.iter().zip(&pert.nodes).enumerate() {
        let analytic = ctx.node_dot(*na)?;
        let fd = quotient(&ctx.node_position(*na)?, &ctx.node_position(*nb)?, dx);
        c.check("node", ni, 0, &analytic, &fd, tol.node);
    }

    debug!(checks = c.stats.checks, errors = c.stats.errors, "ping done");
    Ok(c.stats)
}

/// Compare the sensitivities of two bodies with the same topology, one
/// from stored section sensitivities and one from velocity callbacks.
pub fn equiv_dot_vels(
    ctx: &Context,
    stored: &Tessellation,
    vels: &Tessellation,
    tol: &Tolerances,
    probe: Probe<'_>,
) -> Result<CompareStats> {
    structure(stored, vels)?;
    let mut c = Checker::new(probe);

    for (fi, (fa, fb)) in stored.faces.iter().zip(&vels.faces).enumerate() {
        for (k, (uv1, uv2)) in fa.uv.iter().zip(&fb.uv).enumerate() {
            let a = ctx.eval_face_dot(fa.face, *uv1, [0.0, 0.0])?.pos.deriv_array();
            let b = ctx.eval_face_dot(fb.face, *uv2, [0.0, 0.0])?.pos.deriv_array();
            c.check("face", fi, k, &a, &b, tol.face);
        }
    }

    for (ei, (ea, eb)) in stored.edges.iter().zip(&vels.edges).enumerate() {
        if ea.degenerate {
            c.stats.skipped_degenerate += 1;
            continue;
        }
        for (k, (t1, t2)) in ea.ts.iter().zip(&eb.ts).enumerate() {
            let a = ctx.eval_edge_dot(ea.edge, *t1, 0.0)?.pos.deriv_array();
            let b = ctx.eval_edge_dot(eb.edge, *t2, 0.0)?.pos.deriv_array();
            c.check("edge", ei, k, &a, &b, tol.edge);
        }
        c.check("range", ei, 0, &ctx.range_dot(ea.edge)?, &ctx.range_dot(eb.edge)?, tol.edge);
    }

    for (ni, (na, nb)) in stored.nodes.iter().zip(&vels.nodes).enumerate() {
        c.check("node", ni, 0, &ctx.node_dot(*na)?, &ctx.node_dot(*nb)?, tol.node);
    }

    debug!(checks = c.stats.checks, errors = c.stats.errors, "equivalence done");
    Ok(c.stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compensation_removes_parameter_motion() {
        // P(x, s) = (s, x, 0): moving s by 0.5 with dx = 0.1 must not show up.
        let p1 = Vec3::new(1.0, 2.0, 0.0);
        let p2 = Vec3::new(1.5, 2.1, 0.0);
        let fd = compensated(&p1, &p2, &[Vec3::new(1.0, 0.0, 0.0)], &[0.5], 0.1);
        approx::assert_relative_eq!(fd[0], 0.0, epsilon = 1e-12);
        approx::assert_relative_eq!(fd[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_checker_counts_components() {
        let mut c = Checker::new(Probe { case: "unit", param: 0 });
        c.check("node", 0, 0, &[1.0, 2.0, 3.0], &[1.0, 2.5, f64::NAN], 1e-3);
        assert_eq!(c.stats.checks, 3);
        assert_eq!(c.stats.errors, 2);
    }
}
