//! Economic limit evaluation over whole wells and single connections.

use wf_core::{CellEval, bar};
use wf_fluids::{CellState, Phase, PhaseUsage};
use wf_wells::econ::update_list_econ_limited;
use wf_wells::{
    Connection, Control, DeferredLogger, EconLimitedList, EconLimits, EconSchedule, QuantityLimit,
    Well, WellControls, WellState, Wells,
};

fn cells(n: usize) -> Vec<CellState> {
    (0..n)
        .map(|_| CellState::new(CellEval::constant(200e5), 350.0))
        .collect()
}

fn bhp_controls() -> WellControls {
    WellControls::new(vec![Control::bhp(bar(100.0))]).unwrap()
}

/// One producer "P1" on cells 0..3 and one water injector "I1" on cell 3.
fn field() -> (Wells, WellState) {
    let usage = PhaseUsage::oil_water();
    let mut producer = Well::producer("P1", 2000.0, bhp_controls());
    for cell in 0..3 {
        producer = producer.with_connection(Connection::new(cell, 1e-12, 2000.0 + cell as f64));
    }
    let injector = Well::injector("I1", 2000.0, Phase::Water, bhp_controls())
        .with_connection(Connection::new(3, 1e-12, 2000.0));
    let wells = Wells::new(vec![producer, injector], usage, 4).unwrap();
    let state = WellState::init(&wells, &cells(4), usage).unwrap();
    (wells, state)
}

fn set_perf_rates(state: &mut WellState, perf: usize, rates: [f64; 3]) {
    state.perf_phase_rates[perf * 3..perf * 3 + 3].copy_from_slice(&rates);
}

#[test]
fn low_oil_rate_shuts_or_stops_producer() {
    let (wells, mut state) = field();
    state.set_rates(0, [-0.01, -1e-5, 0.0]);
    state.set_rates(1, [1e-5, 0.0, 0.0]);
    let limits = EconLimits {
        min_oil_rate: Some(1e-4),
        ..Default::default()
    };

    // Injectors are never checked, even with limits attached
    let schedule = EconSchedule::new()
        .with("P1", 0, limits.clone())
        .with("I1", 0, limits.clone());
    let mut list = EconLimitedList::new();
    let mut logger = DeferredLogger::new();
    update_list_econ_limited(&wells, &state, &schedule, 0, &mut list, &mut logger).unwrap();
    assert!(list.well_shut("P1"));
    assert!(!list.well_stopped("P1"));
    assert!(!list.well_shut("I1"));

    let stop = EconLimits {
        automatic_shut_in: false,
        ..limits
    };
    let schedule = EconSchedule::new().with("P1", 0, stop);
    let mut list = EconLimitedList::new();
    update_list_econ_limited(&wells, &state, &schedule, 0, &mut list, &mut logger).unwrap();
    assert!(list.well_stopped("P1"));
    assert!(!list.well_shut("P1"));
    assert_eq!(list.stopped_wells().collect::<Vec<_>>(), vec!["P1"]);
}

#[test]
fn limits_take_effect_from_their_step() {
    let (wells, mut state) = field();
    state.set_rates(0, [0.0, -1e-5, 0.0]);
    let schedule = EconSchedule::new().with(
        "P1",
        3,
        EconLimits {
            min_oil_rate: Some(1e-4),
            ..Default::default()
        },
    );
    let mut list = EconLimitedList::new();
    let mut logger = DeferredLogger::new();
    update_list_econ_limited(&wells, &state, &schedule, 2, &mut list, &mut logger).unwrap();
    assert!(!list.well_shut("P1"));
    update_list_econ_limited(&wells, &state, &schedule, 3, &mut list, &mut logger).unwrap();
    assert!(list.well_shut("P1"));
}

#[test]
fn water_cut_closes_connections_until_shut() {
    let (wells, mut state) = field();
    state.set_rates(0, [-0.9, -0.1, 0.0]);
    // Connection water cuts 0.5, 0.95 and 0.99
    set_perf_rates(&mut state, 0, [-0.1, -0.1, 0.0]);
    set_perf_rates(&mut state, 1, [-0.38, -0.02, 0.0]);
    set_perf_rates(&mut state, 2, [-0.396, -0.004, 0.0]);
    let schedule = EconSchedule::new().with(
        "P1",
        0,
        EconLimits {
            max_water_cut: Some(0.8),
            ..Default::default()
        },
    );
    let mut list = EconLimitedList::new();
    let mut logger = DeferredLogger::new();

    update_list_econ_limited(&wells, &state, &schedule, 0, &mut list, &mut logger).unwrap();
    assert_eq!(list.closed_connections("P1"), &[2]);
    assert!(!list.well_shut("P1"));

    update_list_econ_limited(&wells, &state, &schedule, 0, &mut list, &mut logger).unwrap();
    assert_eq!(list.closed_connections("P1"), &[2, 1]);
    assert!(!list.well_shut("P1"));

    // Only connection 0 remains open, so closing it shuts the well
    update_list_econ_limited(&wells, &state, &schedule, 0, &mut list, &mut logger).unwrap();
    assert_eq!(list.closed_connections("P1"), &[2, 1, 0]);
    assert!(list.well_shut("P1"));
    assert!(
        logger
            .entries()
            .iter()
            .any(|e| e.message == "P1 will be shut due to the last connection closed")
    );
}

#[test]
fn unsupported_options_are_reported() {
    let (wells, mut state) = field();
    state.set_rates(0, [0.0, -1e-5, 0.0]);
    let schedule = EconSchedule::new().with(
        "P1",
        0,
        EconLimits {
            min_oil_rate: Some(1e-4),
            max_gas_oil_ratio: Some(100.0),
            quantity_limit: QuantityLimit::Potential,
            end_run: true,
            follow_on_well: Some("P2".to_string()),
            ..Default::default()
        },
    );
    let mut list = EconLimitedList::new();
    let mut logger = DeferredLogger::new();
    update_list_econ_limited(&wells, &state, &schedule, 0, &mut list, &mut logger).unwrap();
    assert!(list.well_shut("P1"));
    assert!(logger.has_tag("NOT_SUPPORTING_POTN"));
    assert!(logger.has_tag("NOT_SUPPORTING_ENDRUN"));
    assert!(logger.has_tag("NOT_SUPPORTING_FOLLOWONWELL"));
    // The rate violation decides before any ratio is looked at
    assert!(!logger.has_tag("NOT_SUPPORTING_MAX_GOR"));
}
