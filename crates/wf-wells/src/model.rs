//! The standard-well model: state, primary variables and reservoir coupling.

use crate::blocks::{Block, BlockVector, SchurEntry, WellBlocks};
use crate::config::WellModelConfig;
use crate::controls::{Control, ControlKind};
use crate::density::{connection_densities, connection_pressure_diffs, connection_properties};
use crate::econ::{EconLimitedList, EconSchedule, update_list_econ_limited};
use crate::error::{WellError, WellResult};
use crate::group::WellCollection;
use crate::logger::DeferredLogger;
use crate::parallel::{Communicator, SerialCommunicator};
use crate::vfp::{VfpProperties, VfpTable, hydrostatic_correction};
use crate::well::Wells;
use crate::well_state::{GFRAC, WFRAC, WellState, XVAR_WELL};
use std::sync::Arc;
use wf_core::{NUM_EQ, WellEval};
use wf_fluids::{CellState, NUM_PHASES, Phase, PhaseUsage, PvtModel, RateConverter};

/// Scaled fractions below this make a single-phase rate split meaningless.
const MIN_CONTROLLED_FRACTION: f64 = 1e-6;

/// Reservoir-side inputs and collaborators for one model operation.
pub struct WellContext<'a> {
    pub cells: &'a [CellState],
    pub groups: &'a mut dyn WellCollection,
    pub logger: &'a mut DeferredLogger,
}

impl<'a> WellContext<'a> {
    pub fn new(
        cells: &'a [CellState],
        groups: &'a mut dyn WellCollection,
        logger: &'a mut DeferredLogger,
    ) -> Self {
        Self {
            cells,
            groups,
            logger,
        }
    }
}

/// Source terms one connection adds to its cell's reservoir equations.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionContribution {
    pub cell: usize,
    /// Added to the cell residual, per component
    pub residual: BlockVector,
    /// Added to the cell's diagonal Jacobian block
    pub jacobian: Block,
}

/// Implicit standard wells coupled to a black-oil reservoir.
pub struct StandardWells {
    pub(crate) wells: Wells,
    pub(crate) usage: PhaseUsage,
    pub(crate) config: WellModelConfig,
    pub(crate) pvt: Arc<dyn PvtModel>,
    pub(crate) vfp: VfpProperties,
    pub(crate) rate_converter: Option<Arc<dyn RateConverter>>,
    pub(crate) comm: Arc<dyn Communicator>,
    pub(crate) variables: Vec<[WellEval; NUM_EQ]>,
    /// Well-bore fractions at the start of the time step
    pub(crate) f0: Vec<[f64; NUM_PHASES]>,
    pub(crate) perf_densities: Vec<f64>,
    pub(crate) perf_pressure_diffs: Vec<f64>,
    pub(crate) perf_efficiency: Vec<f64>,
    pub(crate) blocks: Vec<WellBlocks>,
    pub(crate) contributions: Vec<ConnectionContribution>,
}

impl StandardWells {
    pub fn new(
        wells: Wells,
        usage: PhaseUsage,
        pvt: Arc<dyn PvtModel>,
        vfp: VfpProperties,
        config: WellModelConfig,
    ) -> WellResult<Self> {
        for well in wells.iter() {
            for control in well.controls.iter() {
                if let ControlKind::Thp { vfp_table, .. } = control.kind {
                    if !vfp.contains(vfp_table) {
                        return Err(WellError::invalid(format!(
                            "well {} refers to missing VFP table {vfp_table}",
                            well.name
                        )));
                    }
                }
            }
        }
        if config.max_local_iterations == 0 {
            return Err(WellError::invalid("max_local_iterations must be positive"));
        }
        if !(config.tolerance_wells > 0.0 && config.well_accumulation_volume > 0.0) {
            return Err(WellError::invalid(
                "well tolerance and accumulation volume must be positive",
            ));
        }

        let nw = wells.len();
        let nperf = wells.num_connections();
        let blocks = (0..nw)
            .map(|w| {
                let cells = wells.as_slice()[w].connections.iter().map(|c| c.cell).collect();
                WellBlocks::new(cells)
            })
            .collect();
        let perf_efficiency = wells
            .iter()
            .flat_map(|w| w.connections.iter().map(|c| c.efficiency))
            .collect();
        Ok(Self {
            wells,
            usage,
            config,
            pvt,
            vfp,
            rate_converter: None,
            comm: Arc::new(SerialCommunicator),
            variables: vec![[WellEval::constant(0.0); NUM_EQ]; nw],
            f0: vec![[0.0; NUM_PHASES]; nw],
            perf_densities: vec![0.0; nperf],
            perf_pressure_diffs: vec![0.0; nperf],
            perf_efficiency,
            blocks,
            contributions: Vec::with_capacity(nperf),
        })
    }

    /// Converter used for reservoir voidage under group control.
    pub fn with_rate_converter(mut self, converter: Arc<dyn RateConverter>) -> Self {
        self.rate_converter = Some(converter);
        self
    }

    pub fn with_communicator(mut self, comm: Arc<dyn Communicator>) -> Self {
        self.comm = comm;
        self
    }

    pub fn wells(&self) -> &Wells {
        &self.wells
    }

    pub fn num_wells(&self) -> usize {
        self.wells.len()
    }

    pub fn usage(&self) -> PhaseUsage {
        self.usage
    }

    pub fn config(&self) -> &WellModelConfig {
        &self.config
    }

    /// Whether this process may write log output.
    pub fn terminal_output(&self) -> bool {
        self.config.terminal_output && self.comm.is_output_rank()
    }

    pub fn perf_densities(&self) -> &[f64] {
        &self.perf_densities
    }

    pub fn perf_pressure_diffs(&self) -> &[f64] {
        &self.perf_pressure_diffs
    }

    pub fn well_blocks(&self, w: usize) -> Option<&WellBlocks> {
        self.blocks.get(w)
    }

    /// Residuals of the well equations from the last assembly.
    pub fn well_residuals(&self) -> Vec<[f64; NUM_EQ]> {
        self.blocks
            .iter()
            .map(|b| {
                let r = b.residual();
                [r[0], r[1], r[2]]
            })
            .collect()
    }

    /// Reservoir source terms from the last assembly, one per connection.
    pub fn reservoir_contributions(&self) -> &[ConnectionContribution] {
        &self.contributions
    }

    /// Initial well state consistent with this model's wells.
    pub fn init_well_state(&mut self, cells: &[CellState]) -> WellResult<WellState> {
        let state = WellState::init(&self.wells, cells, self.usage)?;
        self.set_well_variables(&state);
        Ok(state)
    }

    pub(crate) fn check_state(&self, state: &WellState) -> WellResult<()> {
        if state.num_wells() != self.wells.len()
            || state.perf_press.len() != self.wells.num_connections()
        {
            return Err(WellError::logic(format!(
                "well state sized for {} wells and {} connections, model has {} and {}",
                state.num_wells(),
                state.perf_press.len(),
                self.wells.len(),
                self.wells.num_connections()
            )));
        }
        Ok(())
    }

    /// Seed the differentiable well unknowns from the state.
    pub fn set_well_variables(&mut self, state: &WellState) {
        for (w, vars) in self.variables.iter_mut().enumerate() {
            let solution = state.solution(w);
            for (var, v) in vars.iter_mut().enumerate() {
                *v = WellEval::well_variable(solution[var], var);
            }
        }
    }

    /// Record the well-bore fractions at the start of the time step.
    pub fn compute_accum_wells(&mut self) {
        for w in 0..self.wells.len() {
            for phase in Phase::ALL {
                self.f0[w][phase.index()] = self.well_volume_fraction(w, phase).value();
            }
        }
    }

    /// Combine static connection efficiencies with group efficiency factors.
    pub fn calculate_efficiency_factors(&mut self, groups: &dyn WellCollection) {
        for (w, well) in self.wells.iter().enumerate() {
            let factor = groups.accumulated_efficiency_factor(&well.name);
            for (k, perf) in self.wells.connection_range(w).enumerate() {
                self.perf_efficiency[perf] = well.connections[k].efficiency * factor;
            }
        }
    }

    /// Refresh well-bore densities and connection pressure differences from
    /// the current well state.
    pub fn compute_well_connection_pressures(
        &mut self,
        cells: &[CellState],
        state: &WellState,
    ) -> WellResult<()> {
        let props = connection_properties(&self.wells, state, cells, self.usage, self.pvt.as_ref())?;
        self.perf_densities = connection_densities(&self.wells, state, self.usage, &props);
        self.perf_pressure_diffs =
            connection_pressure_diffs(&self.wells, &self.perf_densities, self.config.gravity);
        Ok(())
    }

    /// Volume fraction of `phase` in the well stream; oil closes the sum.
    pub(crate) fn well_volume_fraction(&self, w: usize, phase: Phase) -> WellEval {
        let vars = &self.variables[w];
        match phase {
            Phase::Water => vars[WFRAC],
            Phase::Gas => vars[GFRAC],
            Phase::Oil => {
                let mut oil = WellEval::constant(1.0);
                if self.usage.is_active(Phase::Water) {
                    oil -= vars[WFRAC];
                }
                if self.usage.is_active(Phase::Gas) {
                    oil -= vars[GFRAC];
                }
                oil
            }
        }
    }

    /// Fraction divided by the control's rate scaling.
    pub(crate) fn well_volume_fraction_scaled(
        &self,
        w: usize,
        phase: Phase,
        control: &Control,
    ) -> WellEval {
        let scale = control.fraction_scaling()[phase.index()];
        if scale == 0.0 {
            return WellEval::constant(0.0);
        }
        self.well_volume_fraction(w, phase) / scale
    }

    /// Hydrostatic correction between the well reference depth and the
    /// datum depth of a lift-curve table.
    pub(crate) fn vfp_correction(&self, w: usize, table: &dyn VfpTable) -> f64 {
        let first = self.wells.connection_range(w).start;
        let rho = self.perf_densities.get(first).copied().unwrap_or(0.0);
        let ref_depth = self.wells.as_slice()[w].ref_depth;
        hydrostatic_correction(ref_depth, table.datum_depth(), rho, self.config.gravity)
    }

    /// BHP implied by a THP target at the given surface rates.
    pub(crate) fn bhp_from_thp(
        &self,
        w: usize,
        rates: &[WellEval; NUM_PHASES],
        thp: f64,
        vfp_table: u32,
        alq: f64,
    ) -> WellResult<WellEval> {
        let table = self.vfp.get(vfp_table)?;
        Ok(table.bhp(rates, thp, alq)? - self.vfp_correction(w, table))
    }

    /// THP implied by a BHP at the given surface rates.
    pub(crate) fn thp_from_bhp(
        &self,
        w: usize,
        rates: &[f64; NUM_PHASES],
        bhp: f64,
        vfp_table: u32,
        alq: f64,
    ) -> WellResult<f64> {
        let table = self.vfp.get(vfp_table)?;
        table.thp(rates, bhp + self.vfp_correction(w, table), alq)
    }

    /// Bottom-hole pressure of well `w` under its current control.
    pub(crate) fn get_bhp(&self, w: usize, state: &WellState) -> WellResult<WellEval> {
        let well = self.wells.get(w)?;
        let control = well.controls.get(state.current_controls[w])?;
        match control.kind {
            ControlKind::Bhp => Ok(WellEval::constant(control.target)),
            ControlKind::Thp { vfp_table, alq } => {
                let mut rates = [WellEval::constant(0.0); NUM_PHASES];
                for phase in self.usage.active_phases() {
                    rates[phase.index()] = self.get_qs(w, phase, state)?;
                }
                self.bhp_from_thp(w, &rates, control.target, vfp_table, alq)
            }
            ControlKind::SurfaceRate | ControlKind::ReservoirRate => {
                Ok(self.variables[w][XVAR_WELL])
            }
        }
    }

    /// Surface rate of `phase` for well `w` under its current control.
    pub(crate) fn get_qs(&self, w: usize, phase: Phase, state: &WellState) -> WellResult<WellEval> {
        let well = self.wells.get(w)?;
        let control = well.controls.get(state.current_controls[w])?;
        let p = phase.index();
        let xvar = self.variables[w][XVAR_WELL];
        let target = control.target;
        let zero = WellEval::constant(0.0);

        if well.well_type.is_injector() {
            if well.comp_frac[p] == 0.0 {
                return Ok(zero);
            }
            return Ok(if control.kind.is_pressure() {
                xvar
            } else {
                WellEval::constant(target)
            });
        }

        if control.kind.is_pressure() {
            return Ok(xvar * self.well_volume_fraction_scaled(w, phase, control));
        }

        if control.kind == ControlKind::SurfaceRate {
            let weighted: Vec<Phase> = self
                .usage
                .active_phases()
                .filter(|ph| control.distr[ph.index()] > 0.0)
                .collect();
            if weighted.len() == 1 {
                let controlled = weighted[0];
                if controlled == phase {
                    return Ok(WellEval::constant(target));
                }
                let f_controlled = self.well_volume_fraction_scaled(w, controlled, control);
                if f_controlled.value() < MIN_CONTROLLED_FRACTION {
                    return Ok(zero);
                }
                return Ok(self.well_volume_fraction_scaled(w, phase, control) * target / f_controlled);
            }
            // Combined limits (e.g. liquid rate); the three-phase case is
            // flagged by assemble as unverified
            let mut combined = zero;
            for ph in &weighted {
                combined += self.well_volume_fraction_scaled(w, *ph, control);
            }
            if combined.value().abs() < MIN_CONTROLLED_FRACTION {
                return Ok(zero);
            }
            return Ok(self.well_volume_fraction_scaled(w, phase, control) * target / combined);
        }

        Ok(self.well_volume_fraction_scaled(w, phase, control) * target)
    }

    /// Cross flow is allowed when the well permits it, or when every
    /// connection flows against the well type.
    pub(crate) fn allow_cross_flow(
        &self,
        w: usize,
        cells: &[CellState],
        state: &WellState,
    ) -> WellResult<bool> {
        let well = self.wells.get(w)?;
        if well.allow_cross_flow {
            return Ok(true);
        }
        let bhp = self.get_bhp(w, state)?.value();
        for (k, perf) in self.wells.connection_range(w).enumerate() {
            let cell = cell_at(cells, well.connections[k].cell)?;
            let drawdown = cell.pressure.value() - (bhp + self.perf_pressure_diffs[perf]);
            if well.well_type.is_injector() && drawdown < 0.0 {
                return Ok(false);
            }
            if well.well_type.is_producer() && drawdown > 0.0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// `r -= B D⁻¹ r_w` for every well.
    pub fn apply_residual(&self, r: &mut [BlockVector]) -> WellResult<()> {
        for blocks in &self.blocks {
            blocks.apply_residual(r)?;
        }
        Ok(())
    }

    /// `ax -= B D⁻¹ C x` for every well.
    pub fn apply(&self, x: &[BlockVector], ax: &mut [BlockVector]) -> WellResult<()> {
        for blocks in &self.blocks {
            blocks.apply(x, ax)?;
        }
        Ok(())
    }

    /// `ax -= alpha B D⁻¹ C x` for every well.
    pub fn apply_scale_add(
        &self,
        alpha: f64,
        x: &[BlockVector],
        ax: &mut [BlockVector],
    ) -> WellResult<()> {
        for blocks in &self.blocks {
            blocks.apply_scaled(alpha, x, ax)?;
        }
        Ok(())
    }

    /// Explicit blocks to subtract from the reservoir matrix.
    pub fn schur_contributions(&self) -> WellResult<Vec<SchurEntry>> {
        let mut out = Vec::new();
        for blocks in &self.blocks {
            out.extend(blocks.schur_entries()?);
        }
        Ok(out)
    }

    /// Well unknown updates `D⁻¹ (r_w - C x)` for a reservoir update `x`.
    pub fn recover_variable(&self, x: &[BlockVector]) -> WellResult<Vec<BlockVector>> {
        self.blocks.iter().map(|b| b.recover(x)).collect()
    }

    /// Recover the well updates for `x` and apply them to the well state.
    pub fn recover_and_update(
        &mut self,
        x: &[BlockVector],
        state: &mut WellState,
    ) -> WellResult<()> {
        let dwells = self.recover_variable(x)?;
        self.update_well_state(&dwells, state)
    }

    /// Check economic limits for the report step `step`.
    pub fn update_list_econ_limited(
        &self,
        schedule: &EconSchedule,
        step: usize,
        state: &WellState,
        list: &mut EconLimitedList,
        logger: &mut DeferredLogger,
    ) -> WellResult<()> {
        update_list_econ_limited(&self.wells, state, schedule, step, list, logger)
    }
}

pub(crate) fn cell_at(cells: &[CellState], cell: usize) -> WellResult<&CellState> {
    cells.get(cell).ok_or_else(|| {
        WellError::logic(format!(
            "connection cell {cell} outside the reservoir state ({} cells)",
            cells.len()
        ))
    })
}
