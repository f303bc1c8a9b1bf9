//! Persistent per-well solution state.

use crate::controls::ControlKind;
use crate::error::{WellError, WellResult};
use crate::well::{Well, Wells};
use wf_core::{NUM_EQ, ensure_finite};
use wf_fluids::{CellState, NUM_PHASES, Phase, PhaseUsage};

/// Total-rate proxy, or bottom-hole pressure under rate control.
pub const XVAR_WELL: usize = 0;
/// Water fraction of the well stream.
pub const WFRAC: usize = 1;
/// Gas fraction of the well stream.
pub const GFRAC: usize = 2;

/// Solution state of all wells, owned by the caller and persisted across
/// iterations and time steps.
///
/// Rates are in surface volume per second with the flux sign convention
/// `q = -T λ (p_cell - p_well) b`: injection is positive and production is
/// negative, so flow into the well bore carries a negative sign. Rate
/// targets and connection rates use the same sign. Per-phase arrays use a
/// stride of [`NUM_PHASES`] with zeros for inactive phases.
#[derive(Clone, Debug, PartialEq)]
pub struct WellState {
    pub bhp: Vec<f64>,
    pub thp: Vec<f64>,
    /// `[well * NUM_PHASES + phase]`
    pub well_rates: Vec<f64>,
    /// Primary variables, `[well * NUM_EQ + var]`
    pub well_solutions: Vec<f64>,
    /// Index into each well's control list; overrides the initial control
    pub current_controls: Vec<usize>,
    /// Wellbore pressure at each connection
    pub perf_press: Vec<f64>,
    /// `[connection * NUM_PHASES + phase]`
    pub perf_phase_rates: Vec<f64>,
    /// Potential rates, `[connection * NUM_PHASES + phase]`
    pub well_potentials: Vec<f64>,
    revision: u64,
}

impl WellState {
    /// Initial state from the wells' initial controls and the reservoir state.
    pub fn init(wells: &Wells, cells: &[CellState], usage: PhaseUsage) -> WellResult<Self> {
        let nw = wells.len();
        let nperf = wells.num_connections();
        let mut state = Self {
            bhp: vec![0.0; nw],
            thp: vec![0.0; nw],
            well_rates: vec![0.0; nw * NUM_PHASES],
            well_solutions: vec![0.0; nw * NUM_EQ],
            current_controls: vec![0; nw],
            perf_press: vec![0.0; nperf],
            perf_phase_rates: vec![0.0; nperf * NUM_PHASES],
            well_potentials: vec![0.0; nperf * NUM_PHASES],
            revision: 0,
        };

        for (w, well) in wells.iter().enumerate() {
            let current = well.controls.initial();
            let control = *well.controls.get(current)?;
            state.current_controls[w] = current;

            let perfs = wells.connection_range(w);
            for (k, perf) in perfs.clone().enumerate() {
                let cell = cell_of(cells, well, k)?;
                state.perf_press[perf] = cell.pressure.value();
            }
            let top_pressure = state.perf_press[perfs.start];

            state.bhp[w] = match control.kind {
                ControlKind::Bhp => control.target,
                _ if well.well_type.is_injector() => 1.01 * top_pressure,
                _ => 0.99 * top_pressure,
            };
            if let ControlKind::Thp { .. } = control.kind {
                state.thp[w] = control.target;
            }

            let mut rates = [0.0; NUM_PHASES];
            if control.kind == ControlKind::SurfaceRate {
                if well.well_type.is_injector() {
                    for p in 0..NUM_PHASES {
                        rates[p] = control.target * well.comp_frac[p];
                    }
                } else {
                    let weighted = control.num_weighted_phases().max(1) as f64;
                    for p in 0..NUM_PHASES {
                        if control.distr[p] > 0.0 {
                            rates[p] = control.target / (control.distr[p] * weighted);
                        }
                    }
                }
            }
            state.set_rates(w, rates);
            let share = 1.0 / perfs.len() as f64;
            for perf in perfs {
                for p in 0..NUM_PHASES {
                    state.perf_phase_rates[perf * NUM_PHASES + p] = rates[p] * share;
                }
            }
            state.seed_primary_variables(w, well, usage)?;
        }
        Ok(state)
    }

    pub fn num_wells(&self) -> usize {
        self.bhp.len()
    }

    pub fn rates(&self, w: usize) -> [f64; NUM_PHASES] {
        let mut out = [0.0; NUM_PHASES];
        out.copy_from_slice(&self.well_rates[w * NUM_PHASES..(w + 1) * NUM_PHASES]);
        out
    }

    pub fn set_rates(&mut self, w: usize, rates: [f64; NUM_PHASES]) {
        self.well_rates[w * NUM_PHASES..(w + 1) * NUM_PHASES].copy_from_slice(&rates);
    }

    pub fn solution(&self, w: usize) -> [f64; NUM_EQ] {
        let mut out = [0.0; NUM_EQ];
        out.copy_from_slice(&self.well_solutions[w * NUM_EQ..(w + 1) * NUM_EQ]);
        out
    }

    pub fn set_solution(&mut self, w: usize, solution: [f64; NUM_EQ]) {
        self.well_solutions[w * NUM_EQ..(w + 1) * NUM_EQ].copy_from_slice(&solution);
    }

    pub fn perf_rates(&self, perf: usize) -> [f64; NUM_PHASES] {
        let mut out = [0.0; NUM_PHASES];
        out.copy_from_slice(&self.perf_phase_rates[perf * NUM_PHASES..(perf + 1) * NUM_PHASES]);
        out
    }

    /// Counter bumped whenever the model mutates the state.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn bump_revision(&mut self) {
        self.revision += 1;
    }

    /// Derive the primary variables of well `w` from its rates, BHP and
    /// current control.
    pub fn seed_primary_variables(
        &mut self,
        w: usize,
        well: &Well,
        usage: PhaseUsage,
    ) -> WellResult<()> {
        let control = well.controls.get(self.current_controls[w])?;
        let g = control.fraction_scaling();
        let rates = self.rates(w);

        let xvar = if control.kind.is_pressure() {
            if well.well_type.is_injector() {
                (0..NUM_PHASES).map(|p| rates[p] * well.comp_frac[p]).sum()
            } else {
                (0..NUM_PHASES).map(|p| g[p] * rates[p]).sum()
            }
        } else {
            self.bhp[w]
        };

        let total: f64 = (0..NUM_PHASES).map(|p| g[p] * rates[p]).sum();
        let fraction = |phase: Phase| {
            if !usage.is_active(phase) {
                0.0
            } else if total != 0.0 {
                g[phase.index()] * rates[phase.index()] / total
            } else {
                well.comp_frac[phase.index()]
            }
        };
        let [wfrac, _, gfrac] =
            normalize_fractions(fraction(Phase::Water), fraction(Phase::Gas), usage);
        let mut solution = [0.0; NUM_EQ];
        solution[XVAR_WELL] = ensure_finite(xvar, "well rate or bhp unknown")?;
        solution[WFRAC] = ensure_finite(wfrac, "well water fraction")?;
        solution[GFRAC] = ensure_finite(gfrac, "well gas fraction")?;
        self.set_solution(w, solution);
        Ok(())
    }
}

fn cell_of<'a>(cells: &'a [CellState], well: &Well, k: usize) -> WellResult<&'a CellState> {
    let cell = well.connections[k].cell;
    cells.get(cell).ok_or_else(|| {
        WellError::logic(format!(
            "well {} connects to cell {cell} outside the reservoir state ({} cells)",
            well.name,
            cells.len()
        ))
    })
}

/// Close the fractions with oil and remove negative entries.
///
/// Negative fractions are zeroed in the order water, gas, oil; each time the
/// remaining fractions are rescaled so that the sum stays one.
pub fn normalize_fractions(water: f64, gas: f64, usage: PhaseUsage) -> [f64; NUM_PHASES] {
    let (iw, io, ig) = (
        Phase::Water.index(),
        Phase::Oil.index(),
        Phase::Gas.index(),
    );
    let mut f = [0.0; NUM_PHASES];
    if usage.is_active(Phase::Water) {
        f[iw] = water;
    }
    if usage.is_active(Phase::Gas) {
        f[ig] = gas;
    }
    f[io] = 1.0 - f[iw] - f[ig];

    for neg in [iw, ig, io] {
        if f[neg] < 0.0 {
            let scale = 1.0 - f[neg];
            for (p, v) in f.iter_mut().enumerate() {
                if p != neg {
                    *v /= scale;
                }
            }
            f[neg] = 0.0;
        }
    }
    f
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{Control, WellControls};
    use crate::well::Connection;
    use proptest::prelude::*;
    use wf_core::{CellEval, bar};

    fn cells(p: f64, n: usize) -> Vec<CellState> {
        (0..n)
            .map(|_| CellState::new(CellEval::constant(p), 350.0))
            .collect()
    }

    #[test]
    fn renormalizes_negative_water() {
        let f = normalize_fractions(-0.2, 0.3, PhaseUsage::three_phase());
        assert_eq!(f[0], 0.0);
        assert!((f[1] - 0.9 / 1.2).abs() < 1e-12);
        assert!((f[2] - 0.3 / 1.2).abs() < 1e-12);
    }

    #[test]
    fn negative_oil_is_removed_last() {
        let f = normalize_fractions(0.7, 0.6, PhaseUsage::three_phase());
        assert_eq!(f[1], 0.0);
        assert!((f[0] - 0.7 / 1.3).abs() < 1e-12);
        assert!((f[2] - 0.6 / 1.3).abs() < 1e-12);
    }

    #[test]
    fn inactive_phases_stay_zero() {
        let f = normalize_fractions(0.4, 0.9, PhaseUsage::oil_water());
        assert_eq!(f, [0.4, 0.6, 0.0]);
    }

    proptest! {
        #[test]
        fn fractions_are_closed_and_non_negative(w in -1.0f64..2.0, g in -1.0f64..2.0) {
            let f = normalize_fractions(w, g, PhaseUsage::three_phase());
            prop_assert!(f.iter().all(|v| *v >= 0.0));
            prop_assert!((f.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn init_bhp_controlled_producer() {
        let controls = WellControls::new(vec![Control::bhp(bar(150.0))]).unwrap();
        let well = Well::producer("P", 1000.0, controls)
            .with_connection(Connection::new(0, 1e-12, 1000.0))
            .with_connection(Connection::new(1, 1e-12, 1005.0));
        let usage = PhaseUsage::three_phase();
        let wells = Wells::new(vec![well], usage, 2).unwrap();
        let state = WellState::init(&wells, &cells(200e5, 2), usage).unwrap();

        assert_eq!(state.bhp, vec![150e5]);
        assert_eq!(state.perf_press, vec![200e5, 200e5]);
        assert_eq!(state.rates(0), [0.0; 3]);
        // No flow: fractions come from the even producer mix
        let sol = state.solution(0);
        assert_eq!(sol[XVAR_WELL], 0.0);
        assert!((sol[WFRAC] - 1.0 / 3.0).abs() < 1e-12);
        assert!((sol[GFRAC] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn init_rate_controlled_injector() {
        let controls = WellControls::new(vec![
            Control {
                kind: ControlKind::SurfaceRate,
                target: 0.01,
                distr: [1.0, 0.0, 0.0],
            },
            Control::bhp(bar(400.0)),
        ])
        .unwrap();
        let well = Well::injector("I", 1000.0, Phase::Water, controls)
            .with_connection(Connection::new(0, 1e-12, 1000.0));
        let usage = PhaseUsage::oil_water();
        let wells = Wells::new(vec![well], usage, 1).unwrap();
        let state = WellState::init(&wells, &cells(100e5, 1), usage).unwrap();

        assert!((state.bhp[0] - 101e5).abs() < 1e-6);
        assert_eq!(state.rates(0), [0.01, 0.0, 0.0]);
        assert_eq!(state.perf_rates(0), [0.01, 0.0, 0.0]);
        let sol = state.solution(0);
        assert_eq!(sol[XVAR_WELL], state.bhp[0]);
        assert_eq!(sol[WFRAC], 1.0);
        assert_eq!(sol[GFRAC], 0.0);
    }
}
