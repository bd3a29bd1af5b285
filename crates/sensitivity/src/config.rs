//! Tolerances, finite step and tessellation settings of a case.

use std::path::Path;

use cad_tessellation::TessParams;
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

/// Absolute limits on `|analytic - reference|` per sample component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    pub face: f64,
    pub edge: f64,
    pub node: f64,
}

impl Tolerances {
    pub const fn uniform(tol: f64) -> Self {
        Self {
            face: tol,
            edge: tol,
            node: tol,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub tess: TessParams,
    /// Finite-difference step applied to one parameter at a time.
    pub step: f64,
    /// Analytic against finite difference.
    pub ping: Tolerances,
    /// Stored sensitivities against velocity callbacks.
    pub equiv: Tolerances,
    /// Relative gap allowed between quadrature and mesh area.
    pub area_rel: f64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::linear()
    }
}

impl HarnessConfig {
    /// Shapes whose samples move linearly with every single parameter.
    pub fn linear() -> Self {
        Self {
            tess: TessParams {
                max_edge_len: 0.25,
                max_sag: 0.01,
                max_angle: 15.0,
            },
            step: 1e-7,
            ping: Tolerances::uniform(1e-7),
            equiv: Tolerances::uniform(1e-7),
            area_rel: 1e-2,
        }
    }

    /// Normalised axes, curved sections and planar caps.
    pub fn curved() -> Self {
        Self {
            ping: Tolerances::uniform(5e-7),
            ..Self::linear()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.step > 0.0) {
            return Err(HarnessError::Config(format!("step must be positive, got {}", self.step)));
        }
        for (name, t) in [("ping", self.ping), ("equiv", self.equiv)] {
            if !(t.face > 0.0 && t.edge > 0.0 && t.node > 0.0) {
                return Err(HarnessError::Config(format!("{name} tolerances must be positive")));
            }
        }
        Ok(())
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| HarnessError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| HarnessError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip() {
        let config = HarnessConfig::curved();
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(HarnessConfig::from_json(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_zero_step() {
        let mut config = HarnessConfig::linear();
        config.step = 0.0;
        let text = serde_json::to_string(&config).unwrap();
        assert!(matches!(HarnessConfig::from_json(&text), Err(HarnessError::Config(_))));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(HarnessConfig::from_json("{\"step\": 1e-7").is_err());
    }
}
