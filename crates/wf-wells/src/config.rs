//! Well model parameters.

use serde::{Deserialize, Serialize};
use wf_core::constants::{G0_MPS2, WELLBORE_STORAGE_M3};

/// Tuning parameters of the well model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WellModelConfig {
    /// Tolerance for the normalized per-phase well residual
    pub tolerance_wells: f64,
    /// Residuals above this abort the step
    pub max_residual_allowed: f64,
    /// Maximum relative BHP change per update under rate control
    pub dbhp_max_rel: f64,
    /// Maximum absolute change of a phase fraction per update
    pub dwell_fraction_max: f64,
    /// Iteration cap of the local well solve
    pub max_local_iterations: usize,
    /// Solve the well equations before the first outer iteration of a step
    pub solve_welleq_initially: bool,
    /// Wellbore storage volume in the accumulation term [m³]
    pub well_accumulation_volume: f64,
    /// Gravity [m/s²]
    pub gravity: f64,
    /// BHP floor under rate control [Pa]
    pub min_rate_control_bhp: f64,
    /// Whether this process may emit log output
    pub terminal_output: bool,
}

impl Default for WellModelConfig {
    fn default() -> Self {
        Self {
            tolerance_wells: 1e-4,
            max_residual_allowed: 1e7,
            dbhp_max_rel: 1.0,
            dwell_fraction_max: 0.2,
            max_local_iterations: 15,
            solve_welleq_initially: true,
            well_accumulation_volume: WELLBORE_STORAGE_M3,
            gravity: G0_MPS2,
            min_rate_control_bhp: 1e5,
            terminal_output: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = WellModelConfig::default();
        assert_eq!(cfg.max_local_iterations, 15);
        assert_eq!(cfg.dwell_fraction_max, 0.2);
        assert!(cfg.solve_welleq_initially);
    }
}
