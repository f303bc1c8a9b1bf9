//! Error types for well model operations.

use thiserror::Error;
use wf_core::WfError;
use wf_fluids::FluidError;

/// Errors that can occur while assembling, solving or controlling wells.
///
/// Local non-convergence is not an error; see
/// [`WellSolveReport`](crate::WellSolveReport).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WellError {
    /// Non-finite or excessively large residual, singular well block.
    /// The caller must restart the step with a smaller time step.
    #[error("Numerical problem: {what}")]
    NumericalProblem { what: String },

    /// Inconsistent model state that upstream validation should have caught.
    #[error("Logic error: {what}")]
    Logic { what: String },

    /// Rejected input while setting up wells, controls or tables.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    /// A fatal condition was raised on at least one process.
    #[error("Step aborted: {what}")]
    StepAborted { what: String },

    #[error("Fluid error: {0}")]
    Fluid(#[from] FluidError),
}

impl From<WfError> for WellError {
    fn from(err: WfError) -> Self {
        match err {
            WfError::NonFinite { .. } => WellError::numerical(err.to_string()),
        }
    }
}

pub type WellResult<T> = Result<T, WellError>;

impl WellError {
    pub(crate) fn numerical(what: impl Into<String>) -> Self {
        WellError::NumericalProblem { what: what.into() }
    }

    pub(crate) fn logic(what: impl Into<String>) -> Self {
        WellError::Logic { what: what.into() }
    }

    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        WellError::InvalidArg { what: what.into() }
    }

    /// Whether this error must abort the current step on every process.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, WellError::InvalidArg { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(WellError::numerical("NaN residual for phase oil").is_fatal());
        assert!(WellError::logic("missing table").is_fatal());
        assert!(!WellError::invalid("no connections").is_fatal());
        let fluid: WellError = FluidError::NonPhysical { what: "pressure" }.into();
        assert!(fluid.is_fatal());
    }

    #[test]
    fn non_finite_core_value_is_numerical() {
        let err: WellError = wf_core::ensure_finite(f64::INFINITY, "thp").unwrap_err().into();
        assert!(matches!(err, WellError::NumericalProblem { .. }));
    }

    #[test]
    fn message_is_carried() {
        let err = WellError::numerical("Too large residual for phase gas");
        assert!(err.to_string().contains("Too large residual for phase gas"));
    }
}
