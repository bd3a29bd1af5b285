//! Run summaries, as text for people and JSON for tooling.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::driver::CaseOutcome;
use crate::error::{HarnessError, Result};

/// How one case went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseReport {
    pub name: String,
    pub passed: bool,
    pub errors: usize,
    pub params_swept: usize,
    pub checks: usize,
    pub skipped_degenerate: usize,
    pub area: Option<f64>,
    pub elapsed_ms: f64,
    /// Set when the case aborted instead of finishing.
    pub error: Option<String>,
}

impl CaseReport {
    pub fn from_outcome(name: &str, outcome: &CaseOutcome, elapsed_ms: f64) -> Self {
        Self {
            name: name.into(),
            passed: outcome.passed(),
            errors: outcome.errors(),
            params_swept: outcome.swept.len(),
            checks: outcome.ping.checks + outcome.equiv.checks,
            skipped_degenerate: outcome.ping.skipped_degenerate,
            area: outcome.area.map(|a| a.quadrature),
            elapsed_ms,
            error: None,
        }
    }

    pub fn aborted(name: &str, error: &HarnessError, elapsed_ms: f64) -> Self {
        Self {
            name: name.into(),
            passed: false,
            errors: 1,
            params_swept: 0,
            checks: 0,
            skipped_degenerate: 0,
            area: None,
            elapsed_ms,
            error: Some(error.to_string()),
        }
    }
}

/// Results of a battery run, in run order. Cases after the first failure
/// are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub cases: Vec<CaseReport>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.cases.iter().all(|c| c.passed)
    }

    pub fn total_errors(&self) -> usize {
        self.cases.iter().map(|c| c.errors).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| HarnessError::Config(e.to_string()))
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("=== Sensitivity Battery ===\n\n");

        for case in &self.cases {
            let status = if case.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!(
                "  [{}] {:<24} params={:<3} checks={:<7} errors={:<4} {:>9.1} ms\n",
                status, case.name, case.params_swept, case.checks, case.errors, case.elapsed_ms,
            ));
            if case.skipped_degenerate > 0 {
                out.push_str(&format!("      skipped {} degenerate edges\n", case.skipped_degenerate));
            }
            if let Some(area) = case.area {
                out.push_str(&format!("      area {area:.12}\n"));
            }
            if let Some(err) = &case.error {
                out.push_str(&format!("      aborted: {err}\n"));
            }
        }

        let passed = self.cases.iter().filter(|c| c.passed).count();
        out.push_str(&format!(
            "\n{} of {} cases passed, {} errors\n",
            passed,
            self.cases.len(),
            self.total_errors(),
        ));
        out
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunReport {
        RunReport {
            cases: vec![
                CaseReport::from_outcome("ruled-nodes", &CaseOutcome::default(), 1.5),
                CaseReport::aborted("broken", &HarnessError::Config("bad".into()), 0.25),
            ],
        }
    }

    #[test]
    fn test_text_marks_failures() {
        let text = sample().to_text();
        assert!(text.contains("[PASS] ruled-nodes"));
        assert!(text.contains("[FAIL] broken"));
        assert!(text.contains("aborted: configuration error: bad"));
        assert!(text.contains("1 of 2 cases passed, 1 errors"));
    }

    #[test]
    fn test_json_round_trip() {
        let report = sample();
        let back: RunReport = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(back, report);
        assert!(!back.passed());
    }
}
