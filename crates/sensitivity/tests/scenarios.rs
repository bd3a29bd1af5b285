//! End-to-end runs of battery cases.

use cad_kernel::Context;
use cad_sensitivity::cases::{self, REFERENCE_AREA_TOL};
use cad_sensitivity::driver::{attach_dots, build_body};
use cad_sensitivity::{
    battery, ping_bodies, run_battery, run_case, Case, Op, ParamSet, Probe, Scope, SectionSpec, Shape,
};
use cad_tessellation::{map_tess, tessellate};

fn run_clean(case: &Case) -> cad_sensitivity::CaseOutcome {
    let mut ctx = Context::new();
    let outcome = run_case(&mut ctx, case).unwrap_or_else(|e| panic!("{} aborted: {e}", case.name));
    assert_eq!(ctx.live_count(), 0, "{} left entities behind", case.name);
    outcome
}

// ── Ping scenarios ──────────────────────────────────────────────────────

#[test]
fn four_node_ruled_wire_matches_finite_differences() {
    let case = cases::ruled_nodes();
    let outcome = run_clean(&case);
    assert_eq!(outcome.swept.len(), 12);
    assert!(outcome.ping.checks > 0);
    assert_eq!(outcome.ping.errors, 0, "ping mismatches: {:?}", outcome.ping);
    assert!(outcome.rebuilt > 0);
    // A wire has no faces to measure.
    assert!(outcome.area.is_none());
}

#[test]
fn transformed_circles_match_finite_differences() {
    let case = cases::ruled_circles();
    let outcome = run_clean(&case);
    assert_eq!(outcome.swept.len(), 18);
    assert!(outcome.passed(), "errors: {}", outcome.errors());
}

#[test]
fn capped_squares_make_a_passing_solid() {
    let outcome = run_clean(&cases::ruled_square_solid());
    assert!(outcome.passed(), "errors: {}", outcome.errors());
    assert!(outcome.area.is_some());
}

#[test]
fn single_face_body_passes() {
    let outcome = run_clean(&cases::face_square());
    assert!(outcome.passed());
    let area = outcome.area.unwrap();
    approx::assert_relative_eq!(area.quadrature, 1.0, epsilon = 1e-9);
}

// ── Equivalence of sensitivity routes ───────────────────────────────────

#[test]
fn velocity_callbacks_agree_with_stored_sensitivities() {
    for case in [cases::ruled_nodes(), cases::ruled_lines(), cases::blend_circles()] {
        let outcome = run_clean(&case);
        assert!(outcome.equiv.checks > 0, "{} compared nothing", case.name);
        assert_eq!(outcome.equiv.errors, 0, "{}: {:?}", case.name, outcome.equiv);
    }
}

#[test]
fn operators_without_callbacks_skip_equivalence() {
    let outcome = run_clean(&cases::face_square());
    assert_eq!(outcome.equiv.checks, 0);
}

#[test]
fn ping_flags_sensitivities_of_the_wrong_parameter() {
    let case = cases::ruled_lines();
    let cfg = case.config;
    let mut ctx = Context::new();
    {
        // Sensitivities for parameter 1, finite difference along parameter 0.
        let seeded = ParamSet::new(case.values.clone()).unit(1);
        let mut scope = Scope::new(&mut ctx);
        let built = build_body(&mut scope, &case, &seeded).unwrap();
        attach_dots(&mut scope, &case, &built, &seeded).unwrap();
        let tess = tessellate(&scope, built.body, &cfg.tess).unwrap();

        let mut inner = scope.nested();
        let perturbed = build_body(&mut inner, &case, &seeded.perturbed(0, cfg.step)).unwrap();
        let mapped = map_tess(&inner, &tess, perturbed.body).unwrap();
        let probe = Probe { case: &case.name, param: 0 };
        let stats = ping_bodies(&inner, &tess, &mapped, cfg.step, &cfg.ping, probe).unwrap();
        assert!(stats.checks > 0);
        assert!(stats.errors > 0, "{stats:?}");
    }
    assert_eq!(ctx.live_count(), 0);
}

// ── Exclusions ──────────────────────────────────────────────────────────

#[test]
fn nose_blend_skips_axes_and_degenerate_edges() {
    let case = cases::blend_nose();
    let outcome = run_clean(&case);
    assert_eq!(outcome.swept, case.swept());
    assert_eq!(outcome.swept.len(), 14);
    assert!(outcome.ping.skipped_degenerate > 0);
    assert!(outcome.passed(), "errors: {}", outcome.errors());
}

// ── Area oracle ─────────────────────────────────────────────────────────

#[test]
fn skinned_airfoil_areas_match_reference() {
    for (sharp, expected) in [(true, 5.206054996944718), (false, 5.205350078000297)] {
        let case = cases::skin_naca(sharp);
        assert_eq!(case.reference_area, Some(expected));
        let outcome = run_clean(&case);
        assert!(outcome.passed(), "{} errors: {}", case.name, outcome.errors());
        let area = outcome.area.unwrap();
        assert!(
            (area.quadrature - expected).abs() <= REFERENCE_AREA_TOL,
            "{}: area {} vs {expected}",
            case.name,
            area.quadrature
        );
    }
}

#[test]
fn wrong_reference_area_fails_the_case() {
    let case = cases::skin_naca(true).with_reference_area(5.2060549);
    let outcome = run_clean(&case);
    assert_eq!(outcome.ping.errors + outcome.equiv.errors, 0);
    assert_eq!(outcome.other_errors, 1);
    assert!(!outcome.passed());
}

// ── Battery control ─────────────────────────────────────────────────────

#[test]
fn full_battery_passes() {
    let cases = battery();
    let mut ctx = Context::new();
    let report = run_battery(&mut ctx, &cases);
    assert_eq!(report.cases.len(), cases.len(), "{report}");
    assert!(report.passed(), "{report}");
    assert_eq!(report.total_errors(), 0);
    assert_eq!(ctx.live_count(), 0);
}

#[test]
fn battery_stops_at_first_failing_case() {
    let broken = Case::new(
        "broken",
        Op::Ruled,
        vec![SectionSpec::new(Shape::Node, cad_sensitivity::params::params(0, 3))],
        vec![0.0, 0.0],
    );
    let mut ctx = Context::new();
    let report = run_battery(&mut ctx, &[broken, cases::ruled_nodes()]);
    assert_eq!(report.cases.len(), 1);
    assert!(!report.passed());
    assert!(report.cases[0].error.as_deref().unwrap_or("").contains("configuration error"));
    assert_eq!(ctx.live_count(), 0);
}

#[test]
fn report_of_a_passing_run_serialises() {
    let mut ctx = Context::new();
    let report = run_battery(&mut ctx, &[cases::ruled_lines()]);
    assert!(report.passed());
    let json = report.to_json().unwrap();
    assert!(json.contains("\"name\": \"ruled-lines\""));
    assert!(json.contains("\"passed\": true"));
}
