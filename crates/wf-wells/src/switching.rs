//! Control switching and group voidage replacement.

use crate::controls::{ControlKind, constraint_broken};
use crate::error::{WellError, WellResult};
use crate::group::WellCollection;
use crate::model::{StandardWells, WellContext, cell_at};
use crate::well_state::WellState;
use rayon::prelude::*;
use wf_core::WellEval;
use wf_fluids::{CellState, NUM_PHASES};

impl StandardWells {
    /// Switch wells whose non-current constraints are violated.
    ///
    /// Voidage replacement group targets are applied first, so injectors
    /// taken over by their group are already on the group control when the
    /// per-well scan runs. Each remaining well switches to the first broken
    /// constraint in list order. Switched wells get their state reseeded from
    /// the new target.
    pub fn update_well_controls(
        &mut self,
        ctx: &mut WellContext<'_>,
        state: &mut WellState,
    ) -> WellResult<()> {
        self.check_state(state)?;
        let previous = state.current_controls.clone();
        let group_active = ctx.groups.group_control_active();

        if group_active && ctx.groups.has_voidage_replacement() {
            self.apply_vrep_group_control(ctx.cells, ctx.groups, state)?;
        }

        let group_index: Vec<Option<usize>> = self
            .wells
            .iter()
            .map(|well| {
                if group_active {
                    ctx.groups.group_control_index(&well.name)
                } else {
                    None
                }
            })
            .collect();

        let decisions: Vec<(usize, bool)> = {
            let state = &*state;
            self.wells
                .as_slice()
                .par_iter()
                .enumerate()
                .map(|(w, well)| {
                    let current = state.current_controls[w];
                    if group_index[w] == Some(current) {
                        return (current, true);
                    }
                    let rates = state.rates(w);
                    let broken = well.controls.iter().enumerate().find(|(i, control)| {
                        *i != current
                            && constraint_broken(
                                well.well_type,
                                control,
                                state.bhp[w],
                                state.thp[w],
                                &rates,
                            )
                    });
                    match broken {
                        Some((i, _)) => (i, group_index[w] == Some(i)),
                        None => (current, false),
                    }
                })
                .collect()
        };

        for (w, (control, under_group)) in decisions.into_iter().enumerate() {
            state.current_controls[w] = control;
            if group_active {
                let name = &self.wells.as_slice()[w].name;
                ctx.groups.set_individual_control(name, !under_group);
            }
        }

        if group_active {
            for update in ctx.groups.update_well_targets(&state.well_rates) {
                let w = self.wells.index_of(&update.well).ok_or_else(|| {
                    WellError::logic(format!("group target for unknown well {}", update.well))
                })?;
                self.wells
                    .controls_mut(w)?
                    .set_target(update.control, update.target)?;
            }
        }

        for w in 0..self.wells.len() {
            let (from, to) = (previous[w], state.current_controls[w]);
            if from == to {
                continue;
            }
            let well = self.wells.get(w)?;
            ctx.logger.info(format!(
                "    Switching control mode for well {} from {} to {}",
                well.name,
                well.controls.get(from)?.kind.name(),
                well.controls.get(to)?.kind.name()
            ));
            self.update_well_state_with_target(w, state)?;
        }
        state.bump_revision();
        Ok(())
    }

    /// Move the state of well `w` onto the target of its current control and
    /// reseed its primary variables.
    pub fn update_well_state_with_target(
        &self,
        w: usize,
        state: &mut WellState,
    ) -> WellResult<()> {
        let well = self.wells.get(w)?;
        let control = *well.controls.get(state.current_controls[w])?;
        match control.kind {
            ControlKind::Bhp => state.bhp[w] = control.target,
            ControlKind::Thp { vfp_table, alq } => {
                let rates = state.rates(w).map(WellEval::constant);
                state.bhp[w] = self
                    .bhp_from_thp(w, &rates, control.target, vfp_table, alq)?
                    .value();
                state.thp[w] = control.target;
            }
            // Reservoir rate acts on the aggregate only; current rates are
            // kept as the starting point
            ControlKind::ReservoirRate => {}
            ControlKind::SurfaceRate => {
                let mut rates = state.rates(w);
                if well.well_type.is_injector() {
                    for p in 0..NUM_PHASES {
                        rates[p] = control.target * well.comp_frac[p];
                    }
                } else if control.num_weighted_phases() == 1 {
                    for p in 0..NUM_PHASES {
                        if control.distr[p] > 0.0 {
                            // weighted rate meets the target
                            rates[p] = control.target / control.distr[p];
                        }
                    }
                }
                state.set_rates(w, rates);
            }
        }
        state.seed_primary_variables(w, well, self.usage)
    }

    /// Push producer voidage to the group tree and move injectors taken
    /// over by their group onto the group's control.
    fn apply_vrep_group_control(
        &self,
        cells: &[CellState],
        groups: &mut dyn WellCollection,
        state: &mut WellState,
    ) -> WellResult<()> {
        let (voidage, conversion) = self.compute_well_voidage_rates(cells, state)?;
        groups.apply_vrep_group_controls(&voidage, &conversion);

        for (w, well) in self.wells.iter().enumerate() {
            if !well.well_type.is_injector() || groups.is_individual_control(&well.name) {
                continue;
            }
            if let Some(index) = groups.group_control_index(&well.name) {
                well.controls.get(index)?;
                state.current_controls[w] = index;
            }
        }
        Ok(())
    }

    /// Reservoir voidage rate per well and voidage coefficients per well.
    ///
    /// Producers report positive voidage; injectors report zero voidage but
    /// their coefficients are used to convert group targets back to surface
    /// rates.
    pub fn compute_well_voidage_rates(
        &self,
        cells: &[CellState],
        state: &WellState,
    ) -> WellResult<(Vec<f64>, Vec<[f64; NUM_PHASES]>)> {
        let converter = self.rate_converter.as_ref().ok_or_else(|| {
            WellError::logic("voidage replacement requires a rate converter")
        })?;
        let nw = self.wells.len();
        let mut voidage = vec![0.0; nw];
        let mut conversion = vec![[0.0; NUM_PHASES]; nw];
        for (w, well) in self.wells.iter().enumerate() {
            let region = cell_at(cells, well.connections[0].cell)?.pvt_region;
            let rates = state.rates(w);
            let coeff = converter.calc_coeff(&rates, region)?;
            if well.well_type.is_producer() {
                voidage[w] = -(0..NUM_PHASES).map(|p| rates[p] * coeff[p]).sum::<f64>();
            }
            conversion[w] = coeff;
        }
        Ok((voidage, conversion))
    }
}
