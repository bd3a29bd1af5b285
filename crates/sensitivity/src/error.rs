use cad_kernel::KernelError;
use cad_tessellation::TessError;

/// Unified error type for the sensitivity harness.
///
/// Kernel and tessellation failures abort the current case. Numerical
/// mismatches are counted instead, see [`crate::compare`].
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Tessellation(#[from] TessError),

    #[error("{class} tolerance regressed on rebuild: {original:.3e} -> {rebuilt:.3e}")]
    ToleranceRegression {
        class: &'static str,
        original: f64,
        rebuilt: f64,
    },

    #[error("rebuilt {class} is not equivalent to the original")]
    NotEquivalent { class: &'static str },

    #[error("{what}: {detail}")]
    Mismatch { what: &'static str, detail: String },

    #[error("case {case} leaked {count} entities")]
    Leak { case: String, count: usize },

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
