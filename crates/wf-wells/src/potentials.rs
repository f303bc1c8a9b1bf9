//! Well potentials: connection rates at the most limiting pressure.

use crate::controls::ControlKind;
use crate::error::{WellError, WellResult};
use crate::flux::{ConnectionFluxInput, compute_connection_flux};
use crate::model::{StandardWells, cell_at};
use crate::well_state::WellState;
use wf_core::WellEval;
use wf_fluids::{CellState, NUM_PHASES, Phase};

impl StandardWells {
    /// Connection rates each well would flow at its most restrictive
    /// pressure limit, written to `state.well_potentials`.
    ///
    /// The BHP limit is the tightest BHP constraint, further tightened by
    /// any THP constraint converted to BHP at the current rates. A well with
    /// neither kind of constraint is a logic error.
    pub fn compute_well_potentials(
        &self,
        cells: &[CellState],
        state: &mut WellState,
    ) -> WellResult<()> {
        self.check_state(state)?;
        let zero = WellEval::constant(0.0);
        for (w, well) in self.wells.iter().enumerate() {
            let injector = well.well_type.is_injector();
            let tighter = |a: f64, b: f64| if injector { a.min(b) } else { a.max(b) };

            let rates = state.rates(w).map(WellEval::constant);
            let mut bhp: Option<f64> = None;
            for control in well.controls.iter() {
                let limit = match control.kind {
                    ControlKind::Bhp => control.target,
                    ControlKind::Thp { vfp_table, alq } => self
                        .bhp_from_thp(w, &rates, control.target, vfp_table, alq)?
                        .value(),
                    _ => continue,
                };
                bhp = Some(bhp.map_or(limit, |b| tighter(b, limit)));
            }
            let bhp = bhp.ok_or_else(|| {
                WellError::logic(format!(
                    "could not find bhp value for well {} to compute potentials",
                    well.name
                ))
            })?;

            let allow_cross_flow = self.allow_cross_flow(w, cells, state)?;
            let mix = Phase::ALL.map(|phase| {
                if self.usage.is_active(phase) {
                    self.well_volume_fraction(w, phase)
                } else {
                    zero
                }
            });
            for (k, perf) in self.wells.connection_range(w).enumerate() {
                let connection = &well.connections[k];
                let input = ConnectionFluxInput {
                    cell: cell_at(cells, connection.cell)?,
                    transmissibility: connection.transmissibility,
                    bhp: WellEval::constant(bhp),
                    pressure_diff: self.perf_pressure_diffs[perf],
                    well_type: well.well_type,
                    allow_cross_flow,
                    mix: &mix,
                };
                let cq = compute_connection_flux(&input, self.usage, self.pvt.as_ref())?;
                for p in 0..NUM_PHASES {
                    state.well_potentials[perf * NUM_PHASES + p] = cq[p].value();
                }
            }
        }
        Ok(())
    }
}
