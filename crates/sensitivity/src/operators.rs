//! The operators a case exercises, and the three ways each attaches
//! sensitivities: stored section dots, velocity callbacks, or nothing
//! beyond the sections themselves.

use cad_kernel::{
    BodyChildren, BodyId, BodyKind, Context, CurveId, EdgeKind, Entity, NoseCurvature, Section, SectionVelocity,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HarnessError, Result};
use crate::params::{resolve, Bind, ParamSet};
use crate::scope::Scope;
use crate::skin_body::{self, SkinBody};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// A face body around a single capped section.
    FaceBody,
    Ruled,
    /// Cubic blend, optionally rounded at node ends.
    Blend {
        rc1: Option<[Bind; 8]>,
        rcn: Option<[Bind; 8]>,
    },
    /// Skin through the first edge of every section, wrapped as a face body.
    Skin { degree: usize, sharp: bool },
}

/// A body made by an [`Op`], with what its sensitivity pass needs.
#[derive(Debug, Clone)]
pub struct OpBody {
    pub body: BodyId,
    pub sections: Vec<Section>,
    skin: Option<(SkinBody, Vec<CurveId>)>,
}

fn nose(binds: &Option<[Bind; 8]>, params: &ParamSet) -> Option<NoseCurvature> {
    binds.as_ref().map(|b| {
        let rc = resolve(b, params);
        NoseCurvature::with_dots(std::array::from_fn(|i| rc[i].val), std::array::from_fn(|i| rc[i].dot))
    })
}

/// First-edge curve of each section, checking the trailing edge shape.
fn section_curves(ctx: &Context, sections: &[Section], sharp: bool) -> Result<Vec<CurveId>> {
    let mut curves = Vec::with_capacity(sections.len());
    for section in sections {
        let lp = ctx.outer_loop(Entity::from(*section))?;
        let (edges, _) = ctx.loop_edges(lp)?;
        let first = edges
            .first()
            .ok_or_else(|| HarnessError::Config("skin section has no edges".into()))?;
        let first = ctx.store().get_edge(*first)?;
        if sharp != (edges.len() == 1 && first.kind == EdgeKind::OneNode) {
            return Err(HarnessError::Config(format!(
                "skin sections do not match a {} trailing edge",
                if sharp { "sharp" } else { "blunt" }
            )));
        }
        curves.push(first.curve.ok_or_else(|| HarnessError::Config("section edge has no curve".into()))?);
    }
    Ok(curves)
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::FaceBody => "face-body",
            Op::Ruled => "ruled",
            Op::Blend { .. } => "blend",
            Op::Skin { .. } => "skin",
        }
    }

    /// Whether the operator can also be driven by velocity callbacks.
    pub fn has_vels(&self) -> bool {
        matches!(self, Op::Ruled | Op::Blend { .. })
    }

    /// Parameter bindings used by the operator itself.
    pub fn binds(&self) -> Vec<&Bind> {
        match self {
            Op::Blend { rc1, rcn } => rc1.iter().chain(rcn).flatten().collect(),
            _ => Vec::new(),
        }
    }

    pub fn build(&self, scope: &mut Scope, sections: &[Section], params: &ParamSet) -> Result<OpBody> {
        let (body, skin) = match self {
            Op::FaceBody => match sections {
                [Section::Face(face)] => {
                    let body = scope.make_body(BodyKind::Face, BodyChildren::Face(*face))?;
                    (scope.hold(body), None)
                }
                _ => return Err(HarnessError::Config("face body takes one capped section".into())),
            },
            Op::Ruled => {
                let body = scope.ruled(sections)?;
                (scope.hold(body), None)
            }
            Op::Blend { rc1, rcn } => {
                let (rc1, rcn) = (nose(rc1, params), nose(rcn, params));
                let body = scope.blend(sections, rc1.as_ref(), rcn.as_ref())?;
                (scope.hold(body), None)
            }
            Op::Skin { degree, sharp } => {
                let curves = section_curves(scope, sections, *sharp)?;
                let surface = scope.skin(&curves, *degree)?;
                let surface = scope.hold(surface);
                let wrapped = skin_body::wrap(scope, surface, *sharp)?;
                (wrapped.body, Some((wrapped, curves)))
            }
        };
        debug!(op = self.name(), "built");
        Ok(OpBody {
            body,
            sections: sections.to_vec(),
            skin,
        })
    }

    /// Attach sensitivities from those already stored on the sections.
    pub fn propagate(&self, ctx: &mut Context, built: &OpBody, params: &ParamSet) -> Result<()> {
        match self {
            Op::FaceBody => {}
            Op::Ruled => ctx.ruled_dot(built.body, &built.sections)?,
            Op::Blend { rc1, rcn } => {
                let (rc1, rcn) = (nose(rc1, params), nose(rcn, params));
                ctx.blend_dot(built.body, &built.sections, rc1.as_ref(), rcn.as_ref())?;
            }
            Op::Skin { .. } => {
                let Some((wrapped, curves)) = &built.skin else {
                    return Err(HarnessError::Config("skin body built by another operator".into()));
                };
                ctx.skin_dot(wrapped.surface, curves)?;
                skin_body::wrap_dot(ctx, wrapped)?;
            }
        }
        if !ctx.has_geometry_dot(built.body)? {
            return Err(HarnessError::Mismatch {
                what: "sensitivity",
                detail: format!("{} body is missing sensitivities", self.name()),
            });
        }
        Ok(())
    }

    /// Build the body with sensitivities taken from `vels`.
    pub fn build_vels(
        &self,
        scope: &mut Scope,
        sections: &[Section],
        params: &ParamSet,
        vels: &dyn SectionVelocity,
    ) -> Result<BodyId> {
        let body = match self {
            Op::Ruled => scope.ruled_vels(sections, vels)?,
            Op::Blend { rc1, rcn } => {
                let (rc1, rcn) = (nose(rc1, params), nose(rcn, params));
                scope.blend_vels(sections, rc1.as_ref(), rcn.as_ref(), vels)?
            }
            _ => {
                return Err(HarnessError::Config(format!(
                    "{} has no velocity variant",
                    self.name()
                )));
            }
        };
        Ok(scope.hold(body))
    }
}
