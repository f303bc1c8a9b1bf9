//! Per-cell differentiable fluid state.

use crate::error::{FluidError, FluidResult};
use crate::model::PvtModel;
use crate::phase::{NUM_PHASES, Phase, PhaseUsage};
use wf_core::{CellEval, WellEval};

/// Intensive quantities of one reservoir cell at the current time level.
///
/// All derivative-carrying fields are w.r.t. the cell's own primary unknowns.
/// Inactive phases keep `inv_b = 1` and `mobility = 0`.
#[derive(Clone, Debug)]
pub struct CellState {
    /// Oil-phase pressure [Pa]
    pub pressure: CellEval,
    /// Temperature [K]
    pub temperature: f64,
    /// Inverse formation volume factor per phase [-]
    pub inv_b: [CellEval; NUM_PHASES],
    /// Phase mobility (relperm / viscosity) [1/(Pa·s)]
    pub mobility: [CellEval; NUM_PHASES],
    /// Dissolved gas-oil ratio [-]
    pub rs: CellEval,
    /// Vaporized oil-gas ratio [-]
    pub rv: CellEval,
    pub pvt_region: usize,
}

impl CellState {
    pub fn new(pressure: CellEval, temperature: f64) -> Self {
        Self {
            pressure,
            temperature,
            inv_b: [CellEval::constant(1.0); NUM_PHASES],
            mobility: [CellEval::constant(0.0); NUM_PHASES],
            rs: CellEval::constant(0.0),
            rv: CellEval::constant(0.0),
            pvt_region: 0,
        }
    }

    pub fn with_phase(mut self, phase: Phase, inv_b: CellEval, mobility: CellEval) -> Self {
        self.inv_b[phase.index()] = inv_b;
        self.mobility[phase.index()] = mobility;
        self
    }

    pub fn with_ratios(mut self, rs: CellEval, rv: CellEval) -> Self {
        self.rs = rs;
        self.rv = rv;
        self
    }

    pub fn with_region(mut self, region: usize) -> Self {
        self.pvt_region = region;
        self
    }

    /// Build a saturated cell state from a PVT model.
    ///
    /// Pressure is seeded as cell unknown 0; formation volume factors and
    /// Rs/Rv inherit their pressure sensitivity from the PVT model.
    pub fn from_pvt(
        pvt: &dyn PvtModel,
        usage: PhaseUsage,
        pressure: f64,
        temperature: f64,
        mobility: [f64; NUM_PHASES],
        region: usize,
    ) -> FluidResult<Self> {
        if !(pressure.is_finite() && pressure > 0.0) {
            return Err(FluidError::NonPhysical { what: "cell pressure" });
        }
        let p = WellEval::variable(pressure, 0);
        let mut state = Self::new(p.cell_part(), temperature).with_region(region);
        let ratio = if usage.has_oil_and_gas() {
            None
        } else {
            Some(WellEval::constant(0.0))
        };
        for phase in usage.active_phases() {
            let inv_b = pvt.inverse_fvf(phase, region, temperature, p, ratio)?;
            state = state.with_phase(
                phase,
                inv_b.cell_part(),
                CellEval::constant(mobility[phase.index()]),
            );
        }
        if usage.has_oil_and_gas() {
            let rs = pvt.saturated_gas_dissolution(region, temperature, p)?;
            let rv = pvt.saturated_oil_vaporization(region, temperature, p)?;
            state = state.with_ratios(rs.cell_part(), rv.cell_part());
        }
        Ok(state)
    }
}
