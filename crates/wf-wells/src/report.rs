//! Iteration reports returned to the nonlinear driver.

/// Outcome of assembling wells for one outer iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WellSolveReport {
    /// False when the local well solve exhausted its iteration budget; the
    /// well state has then been restored to its pre-iteration value.
    pub converged: bool,
    /// Local well iterations performed.
    pub total_well_iterations: usize,
}

impl WellSolveReport {
    pub fn converged(iterations: usize) -> Self {
        Self {
            converged: true,
            total_well_iterations: iterations,
        }
    }
}
