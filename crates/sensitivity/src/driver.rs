//! Runs cases: per swept parameter, build, attach sensitivities, perturb,
//! rebuild, map the tessellation and compare.

use std::time::Instant;

use cad_kernel::{Context, Section};
use cad_tessellation::{map_tess, tessellate};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::cases::{Case, REFERENCE_AREA_TOL};
use crate::compare::{equiv_dot_vels, ping_bodies, CompareStats, Probe};
use crate::error::{HarnessError, Result};
use crate::operators::OpBody;
use crate::params::ParamSet;
use crate::report::{CaseReport, RunReport};
use crate::roundtrip::remake_topology;
use crate::scope::Scope;
use crate::velocity::CaseVelocity;

/// Body area by quadrature against the area of its triangles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaCheck {
    pub quadrature: f64,
    pub mesh: f64,
}

impl AreaCheck {
    pub fn relative_gap(&self) -> f64 {
        (self.quadrature - self.mesh).abs() / self.quadrature.abs().max(f64::MIN_POSITIVE)
    }
}

/// Everything measured while running one case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub swept: Vec<usize>,
    pub ping: CompareStats,
    pub equiv: CompareStats,
    pub rebuilt: usize,
    pub area: Option<AreaCheck>,
    /// Mismatches outside the comparison passes.
    pub other_errors: usize,
}

impl CaseOutcome {
    pub fn errors(&self) -> usize {
        self.ping.errors + self.equiv.errors + self.other_errors
    }

    pub fn passed(&self) -> bool {
        self.errors() == 0
    }
}

pub fn build_sections(scope: &mut Scope, case: &Case, params: &ParamSet) -> Result<Vec<Section>> {
    let mut sections = Vec::with_capacity(case.sections.len());
    for spec in &case.sections {
        sections.push(spec.build(scope, params)?);
    }
    Ok(sections)
}

pub fn build_body(scope: &mut Scope, case: &Case, params: &ParamSet) -> Result<OpBody> {
    let sections = build_sections(scope, case, params)?;
    case.op.build(scope, &sections, params)
}

/// Push section sensitivities in, then let the operator carry them to
/// the body.
pub fn attach_dots(ctx: &mut Context, case: &Case, built: &OpBody, params: &ParamSet) -> Result<()> {
    for (spec, section) in case.sections.iter().zip(&built.sections) {
        spec.set_dots(ctx, *section, params)?;
    }
    case.op.propagate(ctx, built, params)
}

fn sweep_param(ctx: &mut Context, case: &Case, base: &ParamSet, i: usize) -> Result<(CompareStats, CompareStats)> {
    let cfg = &case.config;
    let probe = Probe { case: &case.name, param: i };
    let seeded = base.unit(i);

    let mut scope = Scope::new(ctx);
    let baseline = build_body(&mut scope, case, &seeded)?;
    attach_dots(&mut scope, case, &baseline, &seeded)?;
    let tess = tessellate(&scope, baseline.body, &cfg.tess)?;

    let ping = {
        let mut inner = scope.nested();
        let perturbed = build_body(&mut inner, case, &seeded.perturbed(i, cfg.step))?;
        let mapped = map_tess(&inner, &tess, perturbed.body)?;
        ping_bodies(&inner, &tess, &mapped, cfg.step, &cfg.ping, probe)?
    };

    let equiv = if case.check_vels && case.op.has_vels() {
        let mut inner = scope.nested();
        let sections = build_sections(&mut inner, case, &seeded)?;
        let vels = CaseVelocity::new(&case.sections, &sections, &seeded)?;
        let body = case.op.build_vels(&mut inner, &sections, &seeded, &vels)?;
        let mapped = map_tess(&inner, &tess, body)?;
        equiv_dot_vels(&inner, &tess, &mapped, &cfg.equiv, probe)?
    } else {
        CompareStats::default()
    };
    Ok((ping, equiv))
}

/// Round trip and area of the unseeded body. The quadrature area must
/// agree with the mesh and, when the case pins one, with its reference.
fn check_baseline(ctx: &mut Context, case: &Case, base: &ParamSet, outcome: &mut CaseOutcome) -> Result<()> {
    let mut scope = Scope::new(ctx);
    let built = build_body(&mut scope, case, base)?;
    outcome.rebuilt = remake_topology(&mut scope, built.body)?;

    let tess = tessellate(&scope, built.body, &case.config.tess)?;
    if tess.faces.is_empty() {
        return Ok(());
    }
    let area = AreaCheck {
        quadrature: scope.body_area(built.body)?,
        mesh: tess.area(),
    };
    if area.relative_gap() > case.config.area_rel {
        outcome.other_errors += 1;
        warn!(
            shape = %case.name,
            quadrature = area.quadrature,
            mesh = area.mesh,
            tol = case.config.area_rel,
            "area mismatch"
        );
    }
    if let Some(reference) = case.reference_area {
        if (area.quadrature - reference).abs() > REFERENCE_AREA_TOL {
            outcome.other_errors += 1;
            warn!(
                shape = %case.name,
                quadrature = area.quadrature,
                reference,
                diff = area.quadrature - reference,
                tol = REFERENCE_AREA_TOL,
                "area differs from reference"
            );
        }
    }
    outcome.area = Some(area);
    Ok(())
}

/// Run every swept parameter of `case`, then the round trip and area
/// checks. Entities made along the way are all released again.
#[instrument(skip(ctx, case), fields(case = %case.name))]
pub fn run_case(ctx: &mut Context, case: &Case) -> Result<CaseOutcome> {
    case.validate()?;
    let live = ctx.live_count();
    let base = ParamSet::new(case.values.clone());
    let mut outcome = CaseOutcome::default();

    let swept = case.swept();
    for &i in &swept {
        let (ping, equiv) = sweep_param(ctx, case, &base, i)?;
        outcome.ping.absorb(ping);
        outcome.equiv.absorb(equiv);
    }
    outcome.swept = swept;
    check_baseline(ctx, case, &base, &mut outcome)?;

    let leaked = ctx.live_count().saturating_sub(live);
    if leaked > 0 {
        return Err(HarnessError::Leak {
            case: case.name.clone(),
            count: leaked,
        });
    }
    info!(
        params = outcome.swept.len(),
        checks = outcome.ping.checks + outcome.equiv.checks,
        errors = outcome.errors(),
        "case done"
    );
    Ok(outcome)
}

/// Run `cases` in order, stopping after the first failure.
#[instrument(skip_all, fields(cases = cases.len()))]
pub fn run_battery(ctx: &mut Context, cases: &[Case]) -> RunReport {
    let mut report = RunReport::default();
    for case in cases {
        let start = Instant::now();
        let result = run_case(ctx, case);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1e3;
        let entry = match result {
            Ok(outcome) => CaseReport::from_outcome(&case.name, &outcome, elapsed_ms),
            Err(e) => {
                error!(case = %case.name, error = %e, "case aborted");
                CaseReport::aborted(&case.name, &e, elapsed_ms)
            }
        };
        let passed = entry.passed;
        report.cases.push(entry);
        if !passed {
            break;
        }
    }
    report
}
