use thiserror::Error;

/// Errors returned by kernel operations.
///
/// Every fallible call in the kernel reports one of these; none of them
/// leave partially created entities behind.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    #[error("{class} handle is stale or was never issued")]
    StaleHandle { class: &'static str },

    #[error("expected a {expected}, got a {found}")]
    WrongClass {
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid {what} payload: {reason}")]
    InvalidPayload { what: &'static str, reason: String },

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("{what} carries no sensitivity")]
    NoDerivative { what: &'static str },

    #[error("{what} payload does not match the stored geometry (max deviation {deviation:.3e})")]
    PayloadMismatch { what: &'static str, deviation: f64 },

    #[error("sections are not compatible: {0}")]
    SectionMismatch(String),

    #[error("collocation matrix of size {size} is singular")]
    SingularFit { size: usize },

    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("body was not created by {expected}")]
    NotLoftBody { expected: &'static str },

    #[error("section velocity callback failed: {0}")]
    Callback(String),
}

impl KernelError {
    pub fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            what,
            reason: reason.into(),
        }
    }
}
