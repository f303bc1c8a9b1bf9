//! Assembly of the well equations and convergence checking.

use crate::blocks::{Block, BlockVector, WellBlocks};
use crate::controls::ControlKind;
use crate::error::{WellError, WellResult};
use crate::flux::{ConnectionFluxInput, compute_connection_flux};
use crate::logger::DeferredLogger;
use crate::model::{ConnectionContribution, StandardWells, WellContext, cell_at};
use crate::parallel::reduce_failure;
use crate::report::WellSolveReport;
use crate::well_state::{GFRAC, WFRAC, WellState};
use rayon::prelude::*;
use wf_core::{NUM_EQ, WellEval};
use wf_fluids::{CellState, NUM_PHASES, Phase};

/// Everything one well writes during assembly.
struct WellAssembly {
    blocks: WellBlocks,
    contributions: Vec<ConnectionContribution>,
    perf_rates: Vec<[f64; NUM_PHASES]>,
    perf_press: Vec<f64>,
}

impl StandardWells {
    /// Prepare and assemble the wells for outer iteration `iteration`.
    ///
    /// On the first iteration of a time step the connection pressures and the
    /// start-of-step fractions are refreshed and, if configured, the well
    /// equations are solved locally with the reservoir held fixed. The
    /// returned report describes that local solve.
    pub fn assemble(
        &mut self,
        ctx: &mut WellContext<'_>,
        dt: f64,
        iteration: usize,
        state: &mut WellState,
    ) -> WellResult<WellSolveReport> {
        let result = self.assemble_impl(ctx, dt, iteration, state);
        reduce_failure(self.comm.as_ref(), result)
    }

    fn assemble_impl(
        &mut self,
        ctx: &mut WellContext<'_>,
        dt: f64,
        iteration: usize,
        state: &mut WellState,
    ) -> WellResult<WellSolveReport> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(WellError::invalid(format!("time step must be positive, got {dt}")));
        }
        self.check_state(state)?;

        if iteration == 0 {
            self.calculate_efficiency_factors(&*ctx.groups);
        }
        self.update_well_controls(ctx, state)?;
        self.set_well_variables(state);
        if iteration == 0 {
            self.compute_well_connection_pressures(ctx.cells, state)?;
            self.compute_accum_wells();
        }
        self.warn_unverified_controls(state, ctx.logger);

        let mut report = WellSolveReport::converged(0);
        if self.config.solve_welleq_initially && iteration == 0 {
            report = self.solve_well_eq(ctx, dt, state)?;
        }
        self.assemble_well_eq(ctx.cells, dt, state)?;
        state.bump_revision();
        Ok(report)
    }

    /// Producers on a surface-rate control weighting all three phases use a
    /// rate split that has not been verified against reference results.
    fn warn_unverified_controls(&self, state: &WellState, logger: &mut DeferredLogger) {
        for (w, well) in self.wells.iter().enumerate() {
            if !well.well_type.is_producer() {
                continue;
            }
            let Ok(control) = well.controls.get(state.current_controls[w]) else {
                continue;
            };
            let weighted = self
                .usage
                .active_phases()
                .filter(|p| control.distr[p.index()] > 0.0)
                .count();
            if control.kind == ControlKind::SurfaceRate && weighted >= 3 {
                logger.warning(
                    "UNVERIFIED_THREE_PHASE_RATE",
                    format!(
                        "three-phase surface rate control of well {} is not verified",
                        well.name
                    ),
                );
            }
        }
    }

    /// Assemble and eliminate every well, in parallel over wells.
    pub(crate) fn assemble_well_eq(
        &mut self,
        cells: &[CellState],
        dt: f64,
        state: &mut WellState,
    ) -> WellResult<()> {
        let assembled = {
            let this = &*self;
            let state = &*state;
            (0..this.wells.len())
                .into_par_iter()
                .map(|w| this.assemble_single_well(w, cells, dt, state))
                .collect::<WellResult<Vec<_>>>()?
        };

        self.contributions.clear();
        for (w, out) in assembled.into_iter().enumerate() {
            for (k, perf) in self.wells.connection_range(w).enumerate() {
                state.perf_press[perf] = out.perf_press[k];
                state.perf_phase_rates[perf * NUM_PHASES..(perf + 1) * NUM_PHASES]
                    .copy_from_slice(&out.perf_rates[k]);
            }
            self.contributions.extend(out.contributions);
            self.blocks[w] = out.blocks;
        }
        Ok(())
    }

    fn assemble_single_well(
        &self,
        w: usize,
        cells: &[CellState],
        dt: f64,
        state: &WellState,
    ) -> WellResult<WellAssembly> {
        let well = self.wells.get(w)?;
        let perfs = self.wells.connection_range(w);
        let bhp = self.get_bhp(w, state)?;
        let allow_cross_flow = self.allow_cross_flow(w, cells, state)?;
        let zero = WellEval::constant(0.0);
        let mix = Phase::ALL.map(|phase| {
            if self.usage.is_active(phase) {
                self.well_volume_fraction(w, phase)
            } else {
                zero
            }
        });

        let mut blocks = WellBlocks::new(well.connections.iter().map(|c| c.cell).collect());
        let mut out_contributions = Vec::with_capacity(perfs.len());
        let mut perf_rates = Vec::with_capacity(perfs.len());
        let mut perf_press = Vec::with_capacity(perfs.len());

        for (k, perf) in perfs.enumerate() {
            let connection = &well.connections[k];
            let cell = cell_at(cells, connection.cell)?;
            let input = ConnectionFluxInput {
                cell,
                transmissibility: connection.transmissibility,
                bhp,
                pressure_diff: self.perf_pressure_diffs[perf],
                well_type: well.well_type,
                allow_cross_flow,
                mix: &mix,
            };
            let cq = compute_connection_flux(&input, self.usage, self.pvt.as_ref())?;
            let efficiency = self.perf_efficiency[perf];

            let mut contribution = ConnectionContribution {
                cell: connection.cell,
                residual: BlockVector::zeros(),
                jacobian: Block::zeros(),
            };
            let mut rates = [0.0; NUM_PHASES];
            for phase in self.usage.active_phases() {
                let c = phase.index();
                let cq_eff = cq[c] * efficiency;
                contribution.residual[c] -= cq_eff.value();
                blocks.residual_mut()[c] -= cq[c].value();
                for v in 0..NUM_EQ {
                    contribution.jacobian[(c, v)] -= cq_eff.cell_derivative(v);
                    blocks.b_mut(k)[(c, v)] -= cq_eff.well_derivative(v);
                    blocks.c_mut(k)[(c, v)] -= cq[c].cell_derivative(v);
                    blocks.d_mut()[(c, v)] -= cq[c].well_derivative(v);
                }
                rates[c] = cq[c].value();
            }
            out_contributions.push(contribution);
            perf_rates.push(rates);
            perf_press.push(state.bhp[w] + self.perf_pressure_diffs[perf]);
        }

        // Well-bore storage and the surface rate implied by the control
        let storage = self.config.well_accumulation_volume / dt;
        for phase in self.usage.active_phases() {
            let c = phase.index();
            let mut term = (self.well_volume_fraction(w, phase) - self.f0[w][c]) * storage;
            term += self.get_qs(w, phase, state)?;
            for v in 0..NUM_EQ {
                blocks.d_mut()[(c, v)] += term.well_derivative(v);
            }
            blocks.residual_mut()[c] += term.value();
        }
        // Inactive phases pin their fraction variable
        if !self.usage.is_active(Phase::Water) {
            blocks.d_mut()[(Phase::Water.index(), WFRAC)] = 1.0;
        }
        if !self.usage.is_active(Phase::Gas) {
            blocks.d_mut()[(Phase::Gas.index(), GFRAC)] = 1.0;
        }

        blocks.eliminate().map_err(|e| match e {
            WellError::NumericalProblem { what } => {
                WellError::numerical(format!("{what} for well {}", well.name))
            }
            other => other,
        })?;

        Ok(WellAssembly {
            blocks,
            contributions: out_contributions,
            perf_rates,
            perf_press,
        })
    }

    /// Whether the well residuals meet the tolerance.
    ///
    /// Residuals are scaled by the average formation volume factor of each
    /// phase. Non-finite or excessive residuals are fatal.
    pub fn get_well_convergence(
        &self,
        cells: &[CellState],
        iteration: usize,
        logger: &mut DeferredLogger,
    ) -> WellResult<bool> {
        let mut b_avg = [0.0; NUM_PHASES];
        for cell in cells {
            for phase in self.usage.active_phases() {
                b_avg[phase.index()] += 1.0 / cell.inv_b[phase.index()].value();
            }
        }
        let global_cells = self.comm.sum(cells.len() as f64);
        for b in &mut b_avg {
            let total = self.comm.sum(*b);
            *b = if global_cells > 0.0 { total / global_cells } else { 1.0 };
        }

        let mut max_norm = [0.0_f64; NUM_PHASES];
        let mut local_bad = false;
        for blocks in &self.blocks {
            for phase in self.usage.active_phases() {
                let r = blocks.residual()[phase.index()];
                if !r.is_finite() {
                    local_bad = true;
                } else {
                    max_norm[phase.index()] = max_norm[phase.index()].max(r.abs());
                }
            }
        }
        let any_bad = self.comm.max(if local_bad { 1.0 } else { 0.0 }) > 0.0;

        let mut flux = [0.0; NUM_PHASES];
        let mut converged = true;
        for phase in self.usage.active_phases() {
            let p = phase.index();
            flux[p] = b_avg[p] * self.comm.max(max_norm[p]);
            converged = converged && flux[p] < self.config.tolerance_wells;
        }
        for phase in self.usage.active_phases() {
            let p = phase.index();
            if any_bad || !flux[p].is_finite() {
                return Err(WellError::numerical(format!(
                    "NaN residual for phase {}",
                    phase.name()
                )));
            }
            if flux[p] > self.config.max_residual_allowed {
                return Err(WellError::numerical(format!(
                    "Too large residual for phase {}",
                    phase.name()
                )));
            }
        }

        if self.terminal_output() {
            if iteration == 0 {
                let mut header = String::from("Iter");
                for phase in self.usage.active_phases() {
                    header.push_str(&format!("   W-FLUX({})", phase.name()));
                }
                logger.note(header);
            }
            let mut row = format!("{iteration:4}");
            for phase in self.usage.active_phases() {
                row.push_str(&format!("{:11.3e}", flux[phase.index()]));
            }
            logger.note(row);
        }
        Ok(converged)
    }
}
