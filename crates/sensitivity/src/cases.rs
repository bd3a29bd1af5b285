//! Data-driven test cases and the built-in battery.

use cad_tessellation::TessParams;
use serde::{Deserialize, Serialize};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::operators::Op;
use crate::params::{fixed, params, Bind};
use crate::shapes::{SectionSpec, Shape};

/// One sensitivity scenario: sections built from a shared parameter
/// vector, an operator applied to them, and which parameters to sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub name: String,
    pub op: Op,
    pub sections: Vec<SectionSpec>,
    pub values: Vec<f64>,
    /// Parameter indices left out of the sweep.
    #[serde(default)]
    pub skip: Vec<usize>,
    #[serde(default)]
    pub config: HarnessConfig,
    /// Also build through velocity callbacks and compare.
    #[serde(default)]
    pub check_vels: bool,
    /// Expected body area, checked to [`REFERENCE_AREA_TOL`].
    #[serde(default)]
    pub reference_area: Option<f64>,
}

pub const REFERENCE_AREA_TOL: f64 = 1e-9;

impl Case {
    pub fn new(name: &str, op: Op, sections: Vec<SectionSpec>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            op,
            sections,
            values,
            skip: Vec::new(),
            config: HarnessConfig::linear(),
            check_vels: false,
            reference_area: None,
        }
    }

    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_skip(mut self, skip: Vec<usize>) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_reference_area(mut self, area: f64) -> Self {
        self.reference_area = Some(area);
        self
    }

    pub fn with_vels(mut self) -> Self {
        self.check_vels = true;
        self
    }

    /// Parameter indices the driver perturbs, in order.
    pub fn swept(&self) -> Vec<usize> {
        (0..self.values.len()).filter(|i| !self.skip.contains(i)).collect()
    }

    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        let n = self.values.len();
        let bad = |what: String| Err(HarnessError::Config(format!("case {}: {what}", self.name)));
        if self.sections.is_empty() {
            return bad("no sections".into());
        }
        for (k, s) in self.sections.iter().enumerate() {
            if s.binds.len() != s.shape.arity() {
                return bad(format!(
                    "section {k} ({}) binds {} of {} parameters",
                    s.shape.name(),
                    s.binds.len(),
                    s.shape.arity()
                ));
            }
        }
        let binds = self.sections.iter().flat_map(|s| &s.binds).chain(self.op.binds());
        for b in binds {
            if let Bind::Param(i) = b {
                if *i >= n {
                    return bad(format!("parameter {i} out of {n}"));
                }
            }
        }
        if let Some(i) = self.skip.iter().find(|i| **i >= n) {
            return bad(format!("skipped parameter {i} out of {n}"));
        }
        if let Some(area) = self.reference_area {
            if !(area > 0.0) {
                return bad(format!("reference area {area} is not positive"));
            }
        }
        Ok(())
    }
}

const UNIT_CIRCLE: [f64; 10] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0];

fn cat(parts: &[&[f64]]) -> Vec<f64> {
    parts.concat()
}

fn joined(parts: Vec<Vec<Bind>>) -> Vec<Bind> {
    parts.concat()
}

fn section(shape: Shape, binds: Vec<Bind>) -> SectionSpec {
    SectionSpec::new(shape, binds)
}

/// Circle at parameters 0..10, then copies moved by the transforms that
/// follow it.
fn stacked_circles(shape: Shape, copies: usize) -> Vec<SectionSpec> {
    let mut sections = vec![section(shape.clone(), params(0, 10))];
    for k in 0..copies {
        sections.push(section(
            shape.clone().transformed(),
            joined(vec![params(0, 10), params(10 + 4 * k, 4)]),
        ));
    }
    sections
}

pub fn ruled_nodes() -> Case {
    let sections = (0..4).map(|k| section(Shape::Node, params(3 * k, 3))).collect();
    let values = cat(&[&[0.0, 0.0, 0.0], &[1.0, 0.2, 0.1], &[1.0, 1.2, 0.1], &[1.0, 1.2, 1.1]]);
    Case::new("ruled-nodes", Op::Ruled, sections, values).with_vels()
}

pub fn face_square() -> Case {
    let sections = vec![section(Shape::Square, params(0, 9)).capped()];
    let values = cat(&[&[0.0, 0.0, 0.0], &[0.5, 0.0, 0.0], &[0.0, 0.5, 0.0]]);
    Case::new("face-square", Op::FaceBody, sections, values).with_config(HarnessConfig::curved())
}

pub fn ruled_lines() -> Case {
    let sections = (0..3).map(|k| section(Shape::LineTwoPoints, params(6 * k, 6))).collect();
    let values = cat(&[
        &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        &[0.0, 0.1, 0.5, 1.2, 0.0, 0.6],
        &[0.1, 0.0, 1.0, 1.0, 0.2, 1.1],
    ]);
    Case::new("ruled-lines", Op::Ruled, sections, values).with_vels()
}

pub fn ruled_line_dir() -> Case {
    let sections = (0..2).map(|k| section(Shape::LinePointDir, params(8 * k, 8))).collect();
    let values = cat(&[
        &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.5],
        &[0.0, 0.2, 1.0, 1.0, 0.1, 0.0, 0.2, 1.4],
    ]);
    Case::new("ruled-line-dir", Op::Ruled, sections, values).with_vels()
}

pub fn ruled_square_solid() -> Case {
    let sections = vec![
        section(Shape::Square, params(0, 9)).capped(),
        section(Shape::Square.transformed(), params(0, 13)).capped(),
    ];
    let values = cat(&[&[0.0, 0.0, 0.0], &[0.5, 0.0, 0.0], &[0.0, 0.5, 0.0], &[0.8, 0.1, 0.0, 1.0]]);
    Case::new("ruled-square-solid", Op::Ruled, sections, values).with_config(HarnessConfig::curved())
}

pub fn ruled_triangles() -> Case {
    let sections = (0..2).map(|k| section(Shape::Triangle, params(9 * k, 9))).collect();
    let values = cat(&[
        &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        &[0.1, 0.1, 1.0, 1.1, 0.0, 1.0, 0.0, 0.9, 1.2],
    ]);
    Case::new("ruled-triangles", Op::Ruled, sections, values).with_vels()
}

pub fn ruled_circles() -> Case {
    let values = cat(&[&UNIT_CIRCLE, &[1.0, 0.0, 0.0, 1.0], &[0.8, 0.0, 0.1, 2.0]]);
    Case::new("ruled-circles", Op::Ruled, stacked_circles(Shape::CircleOneEdge, 2), values)
        .with_config(HarnessConfig::curved())
        .with_vels()
}

pub fn ruled_circles_two_edge() -> Case {
    let values = cat(&[&UNIT_CIRCLE, &[1.2, 0.1, 0.0, 1.0]]);
    Case::new("ruled-circles-two-edge", Op::Ruled, stacked_circles(Shape::CircleTwoEdge, 1), values)
        .with_config(HarnessConfig::curved())
        .with_vels()
}

pub fn blend_circles() -> Case {
    let values = cat(&[&UNIT_CIRCLE, &[0.9, 0.0, 0.0, 1.0], &[1.1, 0.2, 0.0, 2.0]]);
    let op = Op::Blend { rc1: None, rcn: None };
    Case::new("blend-circles", op, stacked_circles(Shape::CircleOneEdge, 2), values)
        .with_config(HarnessConfig::curved())
        .with_vels()
}

pub fn blend_square_faces() -> Case {
    let sections = vec![
        section(Shape::Square, params(0, 9)).capped(),
        section(Shape::Square.transformed(), params(0, 13)).capped(),
        section(Shape::Square.transformed(), joined(vec![params(0, 9), params(13, 4)])).capped(),
    ];
    let values = cat(&[
        &[0.0, 0.0, 0.0],
        &[0.5, 0.0, 0.0],
        &[0.0, 0.5, 0.0],
        &[0.8, 0.0, 0.0, 1.0],
        &[1.0, 0.1, 0.0, 2.0],
    ]);
    let op = Op::Blend { rc1: None, rcn: None };
    Case::new("blend-square-faces", op, sections, values)
        .with_config(HarnessConfig::curved())
        .with_vels()
}

/// Curvature group at parameters `start..start + 8`.
fn nose_group(start: usize) -> Option<[Bind; 8]> {
    Some(std::array::from_fn(|i| Bind::Param(start + i)))
}

/// A circle between two nose points, blended with curvature at both
/// ends. Parameters: circle (10), then one curvature group per nose.
pub fn blend_nose() -> Case {
    let lift = [1.0, 0.0, 0.0, 1.0];
    let sections = vec![
        section(Shape::NoseNode, joined(vec![params(0, 9), fixed(&[-0.4])])),
        section(Shape::CircleOneEdge, params(0, 10)),
        section(Shape::CircleOneEdge.transformed(), joined(vec![params(0, 10), fixed(&lift)])),
        section(
            Shape::NoseNode.transformed(),
            joined(vec![params(0, 9), fixed(&[0.4]), fixed(&lift)]),
        ),
    ];
    let group = [0.5, 1.0, 0.0, 0.0, 0.5, 0.0, 1.0, 0.0];
    let values = cat(&[&UNIT_CIRCLE, &group, &group]);
    let op = Op::Blend {
        rc1: nose_group(10),
        rcn: nose_group(18),
    };
    // Curvature directions must stay orthonormal; only the radii move.
    let skip = [11, 12, 13, 15, 16, 17, 19, 20, 21, 23, 24, 25].to_vec();
    // The tips curve tighter than the circles; mesh finer to keep the
    // chordal area loss inside the area check.
    let mut config = HarnessConfig::curved();
    config.tess = TessParams {
        max_edge_len: 0.08,
        max_sag: 0.002,
        max_angle: 6.0,
    };
    Case::new("blend-nose", op, sections, values)
        .with_config(config)
        .with_skip(skip)
        .with_vels()
}

/// Four airfoils stacked one chord apart, each shrunk and swept back a
/// little. The airfoil parameters are shared.
pub fn skin_naca(sharp: bool) -> Case {
    let sections = (0..4)
        .map(|k| {
            let k = k as f64;
            let xform = [1.0 - 0.1 * k, 0.05 * k, 0.0, k];
            section(Shape::Naca { sharp }.transformed(), joined(vec![params(0, 3), fixed(&xform)]))
        })
        .collect();
    let (name, area) = if sharp {
        ("skin-naca-sharp", 5.206054996944718)
    } else {
        ("skin-naca-blunt", 5.205350078000297)
    };
    Case::new(name, Op::Skin { degree: 3, sharp }, sections, vec![0.02, 0.4, 0.12])
        .with_config(HarnessConfig::curved())
        .with_reference_area(area)
}

/// The built-in battery, in run order.
pub fn battery() -> Vec<Case> {
    vec![
        ruled_nodes(),
        face_square(),
        ruled_lines(),
        ruled_line_dir(),
        ruled_square_solid(),
        ruled_triangles(),
        ruled_circles(),
        ruled_circles_two_edge(),
        blend_circles(),
        blend_square_faces(),
        blend_nose(),
        skin_naca(true),
        skin_naca(false),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_cases_validate() {
        for case in battery() {
            case.validate().unwrap_or_else(|e| panic!("{}: {e}", case.name));
        }
    }

    #[test]
    fn test_nose_sweep_skips_axes() {
        let case = blend_nose();
        assert_eq!(case.values.len(), 26);
        let swept = case.swept();
        assert_eq!(swept.len(), 14);
        assert!(swept.contains(&10) && swept.contains(&14));
        assert!(!swept.contains(&11) && !swept.contains(&25));
    }

    #[test]
    fn test_capped_and_curved_cases_use_wider_ping_tolerance() {
        let curved = HarnessConfig::curved().ping;
        for case in [face_square(), ruled_square_solid(), blend_square_faces(), blend_nose()] {
            assert_eq!(case.config.ping, curved, "{}", case.name);
        }
        assert!(blend_nose().config.tess.max_sag < HarnessConfig::curved().tess.max_sag);
    }

    #[test]
    fn test_only_skinned_cases_pin_area() {
        for case in battery() {
            assert_eq!(case.reference_area.is_some(), matches!(case.op, Op::Skin { .. }), "{}", case.name);
        }
    }

    #[test]
    fn test_out_of_range_bind_rejected() {
        let mut case = ruled_nodes();
        case.values.pop();
        assert!(matches!(case.validate(), Err(HarnessError::Config(_))));
    }
}
