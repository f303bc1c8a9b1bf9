//! Segmented well-bore densities and hydrostatic pressure differences.
//!
//! Connections are assumed ordered from the top of the well bore (nearest the
//! BHP reference) to the bottom. The fluid in the segment above each
//! connection carries everything that enters below it.

use crate::error::{WellError, WellResult};
use crate::well::Wells;
use crate::well_state::WellState;
use wf_core::WellEval;
use wf_fluids::{CellState, NUM_PHASES, Phase, PhaseUsage, PvtModel};

/// Fluid properties at each connection, evaluated at well-bore pressure.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectionProperties {
    /// Inverse formation volume factors, `[connection][phase]`
    pub inv_b: Vec<[f64; NUM_PHASES]>,
    /// Saturated dissolved gas-oil ratio; empty unless oil and gas are active
    pub rs_max: Vec<f64>,
    /// Saturated vaporized oil-gas ratio; empty unless oil and gas are active
    pub rv_max: Vec<f64>,
    pub surface_density: Vec<[f64; NUM_PHASES]>,
}

/// Evaluate connection properties at the average of the connection pressure
/// and the pressure at the connection above (the BHP for the top one).
pub fn connection_properties(
    wells: &Wells,
    state: &WellState,
    cells: &[CellState],
    usage: PhaseUsage,
    pvt: &dyn PvtModel,
) -> WellResult<ConnectionProperties> {
    let nperf = wells.num_connections();
    let mut props = ConnectionProperties {
        inv_b: vec![[1.0; NUM_PHASES]; nperf],
        surface_density: vec![[0.0; NUM_PHASES]; nperf],
        ..Default::default()
    };
    if usage.has_oil_and_gas() {
        props.rs_max = vec![0.0; nperf];
        props.rv_max = vec![0.0; nperf];
    }
    let (iw, io, ig) = (
        Phase::Water.index(),
        Phase::Oil.index(),
        Phase::Gas.index(),
    );

    for (w, well) in wells.iter().enumerate() {
        let perfs = wells.connection_range(w);
        let rates = state.rates(w);
        for (k, perf) in perfs.clone().enumerate() {
            let cell_index = well.connections[k].cell;
            let cell = cells.get(cell_index).ok_or_else(|| {
                WellError::logic(format!("connection cell {cell_index} outside reservoir state"))
            })?;
            let region = cell.pvt_region;
            let t = cell.temperature;
            let above = if perf == perfs.start {
                state.bhp[w]
            } else {
                state.perf_press[perf - 1]
            };
            let p_avg = WellEval::constant((state.perf_press[perf] + above) / 2.0);

            if usage.is_active(Phase::Water) {
                props.inv_b[perf][iw] = pvt.inverse_fvf(Phase::Water, region, t, p_avg, None)?.value();
            }
            if usage.has_oil_and_gas() {
                let rs_sat = pvt.saturated_gas_dissolution(region, t, p_avg)?.value();
                let rv_sat = pvt.saturated_oil_vaporization(region, t, p_avg)?.value();
                props.rs_max[perf] = rs_sat;
                props.rv_max[perf] = rv_sat;

                // Ratios from the well's own rates, capped at saturation;
                // without the partner phase the fluid is saturated
                let (oil_rate, gas_rate) = (rates[io].abs(), rates[ig].abs());
                let rs = if gas_rate > 0.0 {
                    let rs = if oil_rate > 0.0 { gas_rate / oil_rate } else { 0.0 };
                    Some(WellEval::constant(rs.min(rs_sat)))
                } else {
                    None
                };
                let rv = if oil_rate > 0.0 {
                    let rv = if gas_rate > 0.0 { oil_rate / gas_rate } else { 0.0 };
                    Some(WellEval::constant(rv.min(rv_sat)))
                } else {
                    None
                };
                props.inv_b[perf][io] = pvt.inverse_fvf(Phase::Oil, region, t, p_avg, rs)?.value();
                props.inv_b[perf][ig] = pvt.inverse_fvf(Phase::Gas, region, t, p_avg, rv)?.value();
            } else {
                let dead = Some(WellEval::constant(0.0));
                for phase in [Phase::Oil, Phase::Gas] {
                    if usage.is_active(phase) {
                        props.inv_b[perf][phase.index()] =
                            pvt.inverse_fvf(phase, region, t, p_avg, dead)?.value();
                    }
                }
            }
            for phase in usage.active_phases() {
                props.surface_density[perf][phase.index()] = pvt.surface_density(phase, region)?;
            }
        }
    }
    Ok(props)
}

/// Density of the well-bore fluid in the segment above each connection.
pub fn connection_densities(
    wells: &Wells,
    state: &WellState,
    usage: PhaseUsage,
    props: &ConnectionProperties,
) -> Vec<f64> {
    let nperf = wells.num_connections();
    let (io, ig) = (Phase::Oil.index(), Phase::Gas.index());

    // Surface flow leaving each connection upwards: inflow through it plus
    // everything entering below
    let mut q_out = vec![[0.0; NUM_PHASES]; nperf];
    for w in 0..wells.len() {
        let perfs = wells.connection_range(w);
        for perf in perfs.clone().rev() {
            let below = if perf + 1 == perfs.end {
                [0.0; NUM_PHASES]
            } else {
                q_out[perf + 1]
            };
            let through = state.perf_rates(perf);
            for p in 0..NUM_PHASES {
                q_out[perf][p] = below[p] - through[p];
            }
        }
    }

    let mut dens = vec![0.0; nperf];
    for (w, well) in wells.iter().enumerate() {
        for perf in wells.connection_range(w) {
            let total: f64 = q_out[perf].iter().sum();
            let mix = if total != 0.0 {
                q_out[perf].map(|q| (q / total).abs())
            } else {
                well.comp_frac
            };

            let mut x = mix;
            let mut rs = 0.0;
            let mut rv = 0.0;
            if !props.rs_max.is_empty() && mix[io] > 0.0 {
                rs = (mix[ig] / mix[io]).min(props.rs_max[perf]);
            }
            if !props.rv_max.is_empty() && mix[ig] > 0.0 {
                rv = (mix[io] / mix[ig]).min(props.rv_max[perf]);
            }
            if rs != 0.0 {
                // Gas dissolved in the oil is not free gas
                x[ig] = (mix[ig] - mix[io] * rs) / (1.0 - rs * rv);
            }
            if rv != 0.0 {
                x[io] = (mix[io] - mix[ig] * rv) / (1.0 - rs * rv);
            }
            let mut volume_ratio = 0.0;
            let mut mass = 0.0;
            for phase in usage.active_phases() {
                let p = phase.index();
                volume_ratio += x[p] / props.inv_b[perf][p];
                mass += props.surface_density[perf][p] * mix[p];
            }
            dens[perf] = if volume_ratio != 0.0 { mass / volume_ratio } else { 0.0 };
        }
    }
    dens
}

/// Pressure difference from the BHP reference depth to each connection.
pub fn connection_pressure_diffs(wells: &Wells, densities: &[f64], gravity: f64) -> Vec<f64> {
    let mut dp = vec![0.0; wells.num_connections()];
    for (w, well) in wells.iter().enumerate() {
        let perfs = wells.connection_range(w);
        let mut z_above = well.ref_depth;
        let mut acc = 0.0;
        for (k, perf) in perfs.enumerate() {
            let z = well.connections[k].depth;
            acc += (z - z_above) * densities[perf] * gravity;
            dp[perf] = acc;
            z_above = z;
        }
    }
    dp
}
