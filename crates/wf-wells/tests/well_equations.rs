//! Integration tests for assembling and locally solving the well equations.

use std::sync::Arc;
use wf_core::{CellEval, bar};
use wf_fluids::{BlackOilPvt, CellState, Phase, PhaseUsage, PvtModel, RegionPvt};
use wf_wells::{
    BilinearVfpTable, Connection, Control, ControlKind, DeferredLogger, FlowRateKind,
    NoGroupControl, StandardWells, VfpProperties, Well, WellContext, WellControls, WellError,
    WellModelConfig, Wells,
};

const DT: f64 = 86_400.0;
const TRANS: f64 = 1e-12;
const OIL_MOBILITY: f64 = 1000.0;

fn pvt() -> Arc<dyn PvtModel> {
    Arc::new(BlackOilPvt::single_region(RegionPvt::default()).unwrap())
}

fn cells(pvt: &dyn PvtModel, usage: PhaseUsage, pressures: &[f64]) -> Vec<CellState> {
    pressures
        .iter()
        .map(|p| CellState::from_pvt(pvt, usage, *p, 350.0, [500.0, OIL_MOBILITY, 0.0], 0).unwrap())
        .collect()
}

fn build_model(
    wells: Vec<Well>,
    usage: PhaseUsage,
    num_cells: usize,
    pvt: Arc<dyn PvtModel>,
    vfp: VfpProperties,
    config: WellModelConfig,
) -> StandardWells {
    let wells = Wells::new(wells, usage, num_cells).unwrap();
    StandardWells::new(wells, usage, pvt, vfp, config).unwrap()
}

fn oil_rate(target: f64) -> Control {
    Control {
        kind: ControlKind::SurfaceRate,
        target,
        distr: [0.0, 1.0, 0.0],
    }
}

/// bhp = 1e9 * |q_oil| + thp + 50 bar on the nodes
fn lift_table() -> BilinearVfpTable {
    let flow = vec![0.0, 0.01, 0.02];
    let thp = vec![10e5, 30e5];
    let bhp = flow
        .iter()
        .map(|f| thp.iter().map(|t| 1e9 * f + t + 50e5).collect())
        .collect();
    BilinearVfpTable::new(1, 2000.0, FlowRateKind::Oil, flow, thp, bhp).unwrap()
}

fn rel_close(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol * b.abs().max(1e-30)
}

#[test]
fn bhp_producer_converges_to_inflow_rate() {
    let pvt = pvt();
    let usage = PhaseUsage::single(Phase::Oil);
    let cells = cells(pvt.as_ref(), usage, &[200e5]);
    let controls = WellControls::new(vec![Control::bhp(bar(100.0))]).unwrap();
    let well = Well::producer("P1", 2000.0, controls)
        .with_connection(Connection::new(0, TRANS, 2000.0));
    let mut model = build_model(
        vec![well],
        usage,
        1,
        pvt,
        VfpProperties::new(),
        WellModelConfig::default(),
    );
    let mut state = model.init_well_state(&cells).unwrap();
    let mut groups = NoGroupControl;
    let mut logger = DeferredLogger::new();
    let mut ctx = WellContext::new(&cells, &mut groups, &mut logger);

    let report = model.assemble(&mut ctx, DT, 0, &mut state).unwrap();
    assert!(report.converged);
    assert_eq!(report.total_well_iterations, 1);

    let b = cells[0].inv_b[Phase::Oil.index()].value();
    let expected = -TRANS * OIL_MOBILITY * 100e5 * b;
    assert!(rel_close(state.rates(0)[1], expected, 1e-9));
    assert!(rel_close(state.perf_rates(0)[1], expected, 1e-9));
    assert_eq!(state.perf_press[0], 100e5);

    // Production is a positive source term in the reservoir residual
    let contribution = &model.reservoir_contributions()[0];
    assert_eq!(contribution.cell, 0);
    assert!(rel_close(contribution.residual[1], -expected, 1e-9));
    assert!(contribution.jacobian[(1, 0)] > 0.0);

    assert!(
        logger
            .entries()
            .iter()
            .any(|e| e.message.contains("W-FLUX(oil)"))
    );
}

#[test]
fn injector_at_reservoir_pressure_has_zero_rates() {
    let pvt = pvt();
    let usage = PhaseUsage::oil_water();
    let cells = cells(pvt.as_ref(), usage, &[200e5]);
    let controls = WellControls::new(vec![Control::bhp(bar(200.0))]).unwrap();
    let well = Well::injector("I1", 2000.0, Phase::Water, controls)
        .with_connection(Connection::new(0, TRANS, 2000.0));
    let mut model = build_model(
        vec![well],
        usage,
        1,
        pvt,
        VfpProperties::new(),
        WellModelConfig::default(),
    );
    let mut state = model.init_well_state(&cells).unwrap();
    let mut groups = NoGroupControl;
    let mut logger = DeferredLogger::new();
    let mut ctx = WellContext::new(&cells, &mut groups, &mut logger);

    let report = model.assemble(&mut ctx, DT, 0, &mut state).unwrap();
    assert!(report.converged);
    assert_eq!(report.total_well_iterations, 0);
    assert_eq!(state.rates(0), [0.0; 3]);
    assert!(state.perf_rates(0).iter().all(|q| q.abs() == 0.0));
}

#[test]
fn rate_controlled_producer_finds_bhp() {
    let pvt = pvt();
    let usage = PhaseUsage::single(Phase::Oil);
    let cells = cells(pvt.as_ref(), usage, &[200e5]);
    let controls = WellControls::new(vec![oil_rate(-5e-3), Control::bhp(bar(50.0))]).unwrap();
    let well = Well::producer("P1", 2000.0, controls)
        .with_connection(Connection::new(0, TRANS, 2000.0));
    let mut model = build_model(
        vec![well],
        usage,
        1,
        pvt,
        VfpProperties::new(),
        WellModelConfig::default(),
    );
    let mut state = model.init_well_state(&cells).unwrap();
    let mut groups = NoGroupControl;
    let mut logger = DeferredLogger::new();
    let mut ctx = WellContext::new(&cells, &mut groups, &mut logger);

    let report = model.assemble(&mut ctx, DT, 0, &mut state).unwrap();
    assert!(report.converged);
    assert_eq!(state.current_controls[0], 0);

    let b = cells[0].inv_b[Phase::Oil.index()].value();
    let expected_bhp = 200e5 - 5e-3 / (TRANS * OIL_MOBILITY * b);
    assert!(rel_close(state.bhp[0], expected_bhp, 1e-9));
    assert!(rel_close(state.rates(0)[1], -5e-3, 1e-12));
    assert!(rel_close(state.perf_rates(0)[1], -5e-3, 1e-9));
}

#[test]
fn thp_controlled_producer_follows_lift_curve() {
    let pvt = pvt();
    let usage = PhaseUsage::single(Phase::Oil);
    let cells = cells(pvt.as_ref(), usage, &[200e5]);
    let controls = WellControls::new(vec![Control::thp(bar(20.0), 1, 0.0)]).unwrap();
    let well = Well::producer("P1", 2000.0, controls)
        .with_connection(Connection::new(0, TRANS, 2000.0));
    let vfp = VfpProperties::new().with_table(Arc::new(lift_table()));
    let mut model = build_model(vec![well], usage, 1, pvt, vfp, WellModelConfig::default());
    let mut state = model.init_well_state(&cells).unwrap();
    let mut groups = NoGroupControl;
    let mut logger = DeferredLogger::new();
    let mut ctx = WellContext::new(&cells, &mut groups, &mut logger);

    let report = model.assemble(&mut ctx, DT, 0, &mut state).unwrap();
    assert!(report.converged);
    assert!(report.total_well_iterations <= 3);

    // q = -c (p - A) / (1 + c S) with c = T mob b, A = thp + 50 bar, S = 1e9
    let b = cells[0].inv_b[Phase::Oil.index()].value();
    let c = TRANS * OIL_MOBILITY * b;
    let expected_q = -c * (200e5 - 70e5) / (1.0 + c * 1e9);
    assert!(rel_close(state.rates(0)[1], expected_q, 1e-8));
    assert!(rel_close(state.bhp[0], 70e5 + 1e9 * expected_q.abs(), 1e-8));
    assert_eq!(state.thp[0], 20e5);
}

#[test]
fn failed_local_solve_restores_state() {
    let pvt = pvt();
    let usage = PhaseUsage::single(Phase::Oil);
    let cells = cells(pvt.as_ref(), usage, &[200e5]);
    let controls = WellControls::new(vec![Control::thp(bar(20.0), 1, 0.0)]).unwrap();
    let well = Well::producer("P1", 2000.0, controls)
        .with_connection(Connection::new(0, TRANS, 2000.0));
    let vfp = VfpProperties::new().with_table(Arc::new(lift_table()));
    let config = WellModelConfig {
        max_local_iterations: 1,
        ..Default::default()
    };
    let mut model = build_model(vec![well], usage, 1, pvt, vfp, config);
    let mut state = model.init_well_state(&cells).unwrap();
    model.compute_well_connection_pressures(&cells, &state).unwrap();
    model.compute_accum_wells();
    let before = state.clone();

    let mut groups = NoGroupControl;
    let mut logger = DeferredLogger::new();
    let mut ctx = WellContext::new(&cells, &mut groups, &mut logger);
    let report = model.solve_well_eq(&mut ctx, DT, &mut state).unwrap();
    assert!(!report.converged);
    assert_eq!(report.total_well_iterations, 1);
    assert_eq!(state, before);
}

#[test]
fn non_finite_mobility_is_fatal() {
    let pvt = pvt();
    let usage = PhaseUsage::single(Phase::Oil);
    let cells = vec![CellState::new(CellEval::constant(200e5), 350.0).with_phase(
        Phase::Oil,
        CellEval::constant(0.8),
        CellEval::constant(f64::NAN),
    )];
    let controls = WellControls::new(vec![Control::bhp(bar(100.0))]).unwrap();
    let well = Well::producer("P1", 2000.0, controls)
        .with_connection(Connection::new(0, TRANS, 2000.0));
    let mut model = build_model(
        vec![well],
        usage,
        1,
        pvt,
        VfpProperties::new(),
        WellModelConfig::default(),
    );
    let mut state = model.init_well_state(&cells).unwrap();
    let before = state.clone();
    let mut groups = NoGroupControl;
    let mut logger = DeferredLogger::new();
    let mut ctx = WellContext::new(&cells, &mut groups, &mut logger);

    let err = model.assemble(&mut ctx, DT, 0, &mut state).unwrap_err();
    assert!(matches!(err, WellError::NumericalProblem { .. }));
    assert!(err.is_fatal());
    assert_eq!(state.rates(0), before.rates(0));
    assert_eq!(state.well_solutions, before.well_solutions);
}

#[test]
fn invalid_time_step_rejected() {
    let pvt = pvt();
    let usage = PhaseUsage::single(Phase::Oil);
    let cells = cells(pvt.as_ref(), usage, &[200e5]);
    let controls = WellControls::new(vec![Control::bhp(bar(100.0))]).unwrap();
    let well = Well::producer("P1", 2000.0, controls)
        .with_connection(Connection::new(0, TRANS, 2000.0));
    let mut model = build_model(
        vec![well],
        usage,
        1,
        pvt,
        VfpProperties::new(),
        WellModelConfig::default(),
    );
    let mut state = model.init_well_state(&cells).unwrap();
    let mut groups = NoGroupControl;
    let mut logger = DeferredLogger::new();
    let mut ctx = WellContext::new(&cells, &mut groups, &mut logger);
    let err = model.assemble(&mut ctx, 0.0, 0, &mut state).unwrap_err();
    assert!(matches!(err, WellError::InvalidArg { .. }));
}

#[test]
fn missing_vfp_table_rejected_at_construction() {
    let usage = PhaseUsage::single(Phase::Oil);
    let controls = WellControls::new(vec![Control::thp(bar(20.0), 9, 0.0)]).unwrap();
    let well = Well::producer("P1", 2000.0, controls)
        .with_connection(Connection::new(0, TRANS, 2000.0));
    let wells = Wells::new(vec![well], usage, 1).unwrap();
    let result = StandardWells::new(
        wells,
        usage,
        pvt(),
        VfpProperties::new(),
        WellModelConfig::default(),
    );
    assert!(matches!(result, Err(WellError::InvalidArg { .. })));
}

#[test]
fn potentials_use_most_restrictive_bhp() {
    let pvt = pvt();
    let usage = PhaseUsage::single(Phase::Oil);
    let cells = cells(pvt.as_ref(), usage, &[200e5]);
    let controls = WellControls::new(vec![
        oil_rate(-1e-3),
        Control::bhp(bar(100.0)),
        Control::bhp(bar(120.0)),
    ])
    .unwrap();
    let well = Well::producer("P1", 2000.0, controls)
        .with_connection(Connection::new(0, TRANS, 2000.0));
    let mut model = build_model(
        vec![well],
        usage,
        1,
        pvt,
        VfpProperties::new(),
        WellModelConfig::default(),
    );
    let mut state = model.init_well_state(&cells).unwrap();
    model.compute_well_potentials(&cells, &mut state).unwrap();

    let b = cells[0].inv_b[Phase::Oil.index()].value();
    let expected = -TRANS * OIL_MOBILITY * 80e5 * b;
    assert!(rel_close(state.well_potentials[1], expected, 1e-9));
}

#[test]
fn potentials_need_a_pressure_limit() {
    let pvt = pvt();
    let usage = PhaseUsage::single(Phase::Oil);
    let cells = cells(pvt.as_ref(), usage, &[200e5]);
    let controls = WellControls::new(vec![oil_rate(-1e-3)]).unwrap();
    let well = Well::producer("P1", 2000.0, controls)
        .with_connection(Connection::new(0, TRANS, 2000.0));
    let mut model = build_model(
        vec![well],
        usage,
        1,
        pvt,
        VfpProperties::new(),
        WellModelConfig::default(),
    );
    let mut state = model.init_well_state(&cells).unwrap();
    let err = model.compute_well_potentials(&cells, &mut state).unwrap_err();
    assert!(matches!(err, WellError::Logic { .. }));
}

fn solve_single_producer(
    usage: PhaseUsage,
    cells: &[CellState],
    control: Control,
) -> (wf_wells::WellSolveReport, wf_wells::WellState, DeferredLogger) {
    let controls = WellControls::new(vec![control, Control::bhp(bar(20.0))]).unwrap();
    let well = Well::producer("P1", 2000.0, controls)
        .with_connection(Connection::new(0, TRANS, 2000.0));
    let mut model = build_model(
        vec![well],
        usage,
        cells.len(),
        pvt(),
        VfpProperties::new(),
        WellModelConfig::default(),
    );
    let mut state = model.init_well_state(cells).unwrap();
    let mut groups = NoGroupControl;
    let mut logger = DeferredLogger::new();
    let mut ctx = WellContext::new(cells, &mut groups, &mut logger);
    let report = model.assemble(&mut ctx, DT, 0, &mut state).unwrap();
    (report, state, logger)
}

fn weighted(distr: [f64; 3], rates: [f64; 3]) -> f64 {
    (0..3).map(|p| distr[p] * rates[p]).sum()
}

#[test]
fn reservoir_rate_producer_meets_voidage_target() {
    let pvt = pvt();
    let usage = PhaseUsage::oil_water();
    let cells = cells(pvt.as_ref(), usage, &[200e5]);
    let distr = [1.02, 1.25, 0.0];
    let control = Control {
        kind: ControlKind::ReservoirRate,
        target: -5e-3,
        distr,
    };
    let (report, state, _) = solve_single_producer(usage, &cells, control);
    assert!(report.converged);
    assert!(report.total_well_iterations > 0);
    assert_eq!(state.current_controls[0], 0);

    assert!(rel_close(weighted(distr, state.rates(0)), -5e-3, 1e-9));
    // The connection inflow carries the same voidage up to well-bore storage
    let perf = state.perf_rates(0);
    assert!(rel_close(weighted(distr, perf), -5e-3, 1e-4));
    assert!(state.bhp[0] < 200e5);
    assert_eq!(state.solution(0)[wf_wells::XVAR_WELL], state.bhp[0]);
}

#[test]
fn liquid_rate_producer_splits_between_water_and_oil() {
    let pvt = pvt();
    let usage = PhaseUsage::oil_water();
    let cells = cells(pvt.as_ref(), usage, &[200e5]);
    let control = Control {
        kind: ControlKind::SurfaceRate,
        target: -5e-3,
        distr: [1.0, 1.0, 0.0],
    };
    let (report, state, logger) = solve_single_producer(usage, &cells, control);
    assert!(report.converged);
    assert_eq!(state.current_controls[0], 0);

    let rates = state.rates(0);
    assert!(rel_close(rates[0] + rates[1], -5e-3, 1e-9));
    assert!(rates[0] < 0.0 && rates[1] < 0.0);
    let perf = state.perf_rates(0);
    assert!(rel_close(perf[0] + perf[1], -5e-3, 1e-4));
    // Two weighted phases are a verified split
    assert!(!logger.has_tag("UNVERIFIED_THREE_PHASE_RATE"));
}

#[test]
fn three_phase_surface_rate_is_flagged_unverified() {
    let pvt = pvt();
    let usage = PhaseUsage::three_phase();
    let cells: Vec<CellState> = [200e5]
        .iter()
        .map(|p| {
            CellState::from_pvt(pvt.as_ref(), usage, *p, 350.0, [500.0, OIL_MOBILITY, 50.0], 0)
                .unwrap()
        })
        .collect();
    let distr = [1.0, 1.0, 1.0];
    let control = Control {
        kind: ControlKind::SurfaceRate,
        target: -5e-3,
        distr,
    };
    let (report, state, logger) = solve_single_producer(usage, &cells, control);
    assert!(report.converged);
    assert!(logger.has_tag("UNVERIFIED_THREE_PHASE_RATE"));
    assert!(rel_close(weighted(distr, state.rates(0)), -5e-3, 1e-9));
}
