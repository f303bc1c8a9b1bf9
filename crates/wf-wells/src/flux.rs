//! Inflow relation between a reservoir cell and the well bore.

use crate::error::{WellError, WellResult};
use crate::well::WellType;
use wf_core::WellEval;
use wf_fluids::{CellState, NUM_PHASES, Phase, PhaseUsage, PvtModel};

/// Volume ratios below this are treated as no flowing volume.
const VOLUME_RATIO_EPS: f64 = 1e-12;

/// Inputs for the flux through one connection.
#[derive(Clone, Copy, Debug)]
pub struct ConnectionFluxInput<'a> {
    pub cell: &'a CellState,
    pub transmissibility: f64,
    pub bhp: WellEval,
    /// Hydrostatic pressure difference from the BHP reference depth
    pub pressure_diff: f64,
    pub well_type: WellType,
    pub allow_cross_flow: bool,
    /// Volume fractions of the well stream (water, oil, gas)
    pub mix: &'a [WellEval; NUM_PHASES],
}

/// Surface volume rate per component through one connection.
///
/// Positive drawdown (cell pressure above well-bore pressure) gives negative
/// rates, i.e. production. Inflow uses the cell's mobilities, outflow the
/// well-bore mix. Rates are zero when the flow direction contradicts the
/// well type and cross flow is disallowed.
pub fn compute_connection_flux(
    input: &ConnectionFluxInput<'_>,
    usage: PhaseUsage,
    pvt: &dyn PvtModel,
) -> WellResult<[WellEval; NUM_PHASES]> {
    let cell = input.cell;
    let (iw, io, ig) = (
        Phase::Water.index(),
        Phase::Oil.index(),
        Phase::Gas.index(),
    );
    let mut cq = [WellEval::constant(0.0); NUM_PHASES];
    let well_pressure = input.bhp + input.pressure_diff;
    let drawdown = WellEval::extend_cell(cell.pressure) - well_pressure;
    let inv_b = |p: usize| WellEval::extend_cell(cell.inv_b[p]);
    let mobility = |p: usize| WellEval::extend_cell(cell.mobility[p]);

    if drawdown.value() > 0.0 {
        // Flow from the reservoir into the well
        if !input.allow_cross_flow && input.well_type.is_injector() {
            return Ok(cq);
        }
        for phase in usage.active_phases() {
            let p = phase.index();
            cq[p] = inv_b(p) * (mobility(p) * drawdown * -input.transmissibility);
        }
        if usage.has_oil_and_gas() {
            let oil = cq[io];
            let gas = cq[ig];
            cq[ig] += WellEval::extend_cell(cell.rs) * oil;
            cq[io] += WellEval::extend_cell(cell.rv) * gas;
        }
        return Ok(cq);
    }

    // Flow from the well into the reservoir
    if !input.allow_cross_flow && input.well_type.is_producer() {
        return Ok(cq);
    }
    let mut total_mobility = WellEval::constant(0.0);
    for phase in usage.active_phases() {
        total_mobility += mobility(phase.index());
    }
    let total_rate = total_mobility * drawdown * -input.transmissibility;

    let mix = input.mix;
    let mut volume_ratio = WellEval::constant(0.0);
    if usage.is_active(Phase::Water) {
        volume_ratio += mix[iw] / inv_b(iw);
    }
    if usage.has_oil_and_gas() {
        let rs_sat =
            pvt.saturated_gas_dissolution(cell.pvt_region, cell.temperature, well_pressure)?;
        let rv_sat =
            pvt.saturated_oil_vaporization(cell.pvt_region, cell.temperature, well_pressure)?;
        let mut rs = WellEval::constant(0.0);
        if mix[io].value() > 0.0 {
            rs = mix[ig] / mix[io];
        }
        if rs.value() > rs_sat.value() {
            rs = rs_sat;
        }
        let mut rv = WellEval::constant(0.0);
        if mix[ig].value() > 0.0 {
            rv = mix[io] / mix[ig];
        }
        if rv.value() > rv_sat.value() {
            rv = rv_sat;
        }
        let d = 1.0 - rv * rs;
        if d.value().abs() < VOLUME_RATIO_EPS {
            return Ok(cq);
        }
        let free_oil = (mix[io] - rv * mix[ig]) / d;
        let free_gas = (mix[ig] - rs * mix[io]) / d;
        volume_ratio += free_oil / inv_b(io);
        volume_ratio += free_gas / inv_b(ig);
    } else {
        for phase in [Phase::Oil, Phase::Gas] {
            if usage.is_active(phase) {
                let p = phase.index();
                volume_ratio += mix[p] / inv_b(p);
            }
        }
    }

    if volume_ratio.value().abs() < VOLUME_RATIO_EPS {
        return Ok(cq);
    }
    let surface_total = total_rate / volume_ratio;
    for phase in usage.active_phases() {
        let p = phase.index();
        cq[p] = mix[p] * surface_total;
    }
    if cq.iter().any(|q| !q.is_finite()) {
        return Err(WellError::numerical(
            "non-finite connection rate in well-bore outflow",
        ));
    }
    Ok(cq)
}
