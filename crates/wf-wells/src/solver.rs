//! Local well solve and well state updates.

use crate::blocks::BlockVector;
use crate::controls::ControlKind;
use crate::error::{WellError, WellResult};
use crate::model::{StandardWells, WellContext};
use crate::report::WellSolveReport;
use crate::well_state::{GFRAC, WFRAC, WellState, XVAR_WELL, normalize_fractions};
use wf_core::{WellEval, limited_update};
use wf_fluids::{NUM_PHASES, Phase};

impl StandardWells {
    /// Solve the well equations with the reservoir state held fixed.
    ///
    /// Iterates assembly, convergence check and state update until converged
    /// or the iteration cap is reached. When the solve does not converge, or
    /// fails with an error, the well state is restored to its value on entry.
    pub fn solve_well_eq(
        &mut self,
        ctx: &mut WellContext<'_>,
        dt: f64,
        state: &mut WellState,
    ) -> WellResult<WellSolveReport> {
        let saved = state.clone();
        match self.local_solve(ctx, dt, state) {
            Ok(report) if report.converged => {
                ctx.logger.debug(format!(
                    "Well equation solution gets converged with {} iterations",
                    report.total_well_iterations
                ));
                Ok(report)
            }
            Ok(report) => {
                ctx.logger.debug(format!(
                    "Well equation solution failed in getting converged with {} iterations",
                    report.total_well_iterations
                ));
                *state = saved;
                self.set_well_variables(state);
                Ok(report)
            }
            Err(e) => {
                *state = saved;
                self.set_well_variables(state);
                Err(e)
            }
        }
    }

    fn local_solve(
        &mut self,
        ctx: &mut WellContext<'_>,
        dt: f64,
        state: &mut WellState,
    ) -> WellResult<WellSolveReport> {
        let mut iteration = 0;
        loop {
            self.assemble_well_eq(ctx.cells, dt, state)?;
            let mut converged = self.get_well_convergence(ctx.cells, iteration, ctx.logger)?;
            if ctx.groups.group_control_active() {
                converged = converged && ctx.groups.group_target_converged(&state.well_rates);
            }
            if converged {
                return Ok(WellSolveReport::converged(iteration));
            }
            iteration += 1;

            let dwells = self
                .blocks
                .iter()
                .map(|b| b.well_update())
                .collect::<WellResult<Vec<_>>>()?;
            self.update_well_state(&dwells, state)?;
            self.update_well_controls(ctx, state)?;
            self.set_well_variables(state);

            if iteration >= self.config.max_local_iterations {
                return Ok(WellSolveReport {
                    converged: false,
                    total_well_iterations: iteration,
                });
            }
        }
    }

    /// Apply Newton updates to the well unknowns (`x_new = x - dx`).
    ///
    /// Fraction changes are limited to `dwell_fraction_max`; under rate
    /// control BHP changes are limited relative to the current BHP and
    /// floored at `min_rate_control_bhp`. Rates, BHP and THP are refreshed
    /// from the new unknowns.
    pub fn update_well_state(
        &self,
        dwells: &[BlockVector],
        state: &mut WellState,
    ) -> WellResult<()> {
        self.check_state(state)?;
        if dwells.len() != self.wells.len() {
            return Err(WellError::logic(format!(
                "{} well updates for {} wells",
                dwells.len(),
                self.wells.len()
            )));
        }
        let (iw, ig) = (Phase::Water.index(), Phase::Gas.index());
        let frac_max = self.config.dwell_fraction_max;

        for (w, well) in self.wells.iter().enumerate() {
            let dx = &dwells[w];
            if dx.iter().any(|v| !v.is_finite()) {
                return Err(WellError::numerical(format!(
                    "non-finite update for well {}",
                    well.name
                )));
            }
            let control = *well.controls.get(state.current_controls[w])?;
            let old = state.solution(w);

            let water = if self.usage.is_active(Phase::Water) {
                old[WFRAC] - limited_update(dx[WFRAC], frac_max)
            } else {
                0.0
            };
            let gas = if self.usage.is_active(Phase::Gas) {
                old[GFRAC] - limited_update(dx[GFRAC], frac_max)
            } else {
                0.0
            };
            let f = normalize_fractions(water, gas, self.usage);
            let mut new = old;
            new[WFRAC] = f[iw];
            new[GFRAC] = f[ig];

            let g = control.fraction_scaling();
            let mut scaled = [0.0; NUM_PHASES];
            for phase in self.usage.active_phases() {
                let p = phase.index();
                if g[p] != 0.0 {
                    scaled[p] = f[p] / g[p];
                }
            }

            let mut rates = state.rates(w);
            match control.kind {
                ControlKind::Bhp | ControlKind::Thp { .. } => {
                    new[XVAR_WELL] = old[XVAR_WELL] - dx[XVAR_WELL];
                    for phase in self.usage.active_phases() {
                        let p = phase.index();
                        rates[p] = if well.well_type.is_injector() {
                            well.comp_frac[p] * new[XVAR_WELL]
                        } else {
                            new[XVAR_WELL] * scaled[p]
                        };
                    }
                    match control.kind {
                        ControlKind::Thp { vfp_table, alq } => {
                            let q = rates.map(WellEval::constant);
                            state.bhp[w] = self
                                .bhp_from_thp(w, &q, control.target, vfp_table, alq)?
                                .value();
                        }
                        _ => state.bhp[w] = control.target,
                    }
                }
                ControlKind::SurfaceRate | ControlKind::ReservoirRate => {
                    let max_change = old[XVAR_WELL].abs() * self.config.dbhp_max_rel;
                    let dbhp = limited_update(dx[XVAR_WELL], max_change);
                    new[XVAR_WELL] = (old[XVAR_WELL] - dbhp).max(self.config.min_rate_control_bhp);
                    state.bhp[w] = new[XVAR_WELL];

                    if control.kind == ControlKind::SurfaceRate {
                        if well.well_type.is_injector() {
                            for p in 0..NUM_PHASES {
                                rates[p] = well.comp_frac[p] * control.target;
                            }
                        } else {
                            let total: f64 = self
                                .usage
                                .active_phases()
                                .map(|ph| control.distr[ph.index()] * scaled[ph.index()])
                                .sum();
                            if total != 0.0 {
                                for phase in self.usage.active_phases() {
                                    let p = phase.index();
                                    rates[p] = scaled[p] * control.target / total;
                                }
                            }
                        }
                    } else {
                        for phase in self.usage.active_phases() {
                            let p = phase.index();
                            rates[p] = scaled[p] * control.target;
                        }
                    }
                }
            }

            state.set_solution(w, new);
            state.set_rates(w, rates);
            self.refresh_thp(w, &control.kind, state)?;
        }
        state.bump_revision();
        Ok(())
    }

    /// Keep the reported THP consistent with the current rates and BHP.
    pub(crate) fn refresh_thp(
        &self,
        w: usize,
        current: &ControlKind,
        state: &mut WellState,
    ) -> WellResult<()> {
        let well = self.wells.get(w)?;
        if let ControlKind::Thp { .. } = current {
            state.thp[w] = well.controls.get(state.current_controls[w])?.target;
            return Ok(());
        }
        let thp_control = well.controls.iter().find_map(|c| match c.kind {
            ControlKind::Thp { vfp_table, alq } => Some((vfp_table, alq)),
            _ => None,
        });
        if let Some((vfp_table, alq)) = thp_control {
            state.thp[w] = self.thp_from_bhp(w, &state.rates(w), state.bhp[w], vfp_table, alq)?;
        }
        Ok(())
    }
}
