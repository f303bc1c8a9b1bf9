//! Smoke tests for the analytic black-oil PVT and cell-state construction.

use std::sync::Arc;
use wf_fluids::{
    BlackOilPvt, CellState, Phase, PhaseUsage, PvtModel, PvtRateConverter, RateConverter,
    RegionPvt,
};

fn pvt() -> BlackOilPvt {
    BlackOilPvt::single_region(RegionPvt::default()).unwrap()
}

#[test]
fn cell_state_from_pvt_carries_pressure_sensitivity() {
    let pvt = pvt();
    let cell = CellState::from_pvt(
        &pvt,
        PhaseUsage::three_phase(),
        2.0e7,
        350.0,
        [1.0e3, 5.0e2, 1.0e4],
        0,
    )
    .unwrap();

    assert_eq!(cell.pressure.value(), 2.0e7);
    assert_eq!(cell.pressure.derivative(0), 1.0);
    // saturated Rs grows with pressure below the cap
    assert!((cell.rs.value() - 200.0).abs() < 1e-9);
    // gas inverse FVF grows with pressure
    assert!(cell.inv_b[Phase::Gas.index()].derivative(0) > 0.0);
    assert_eq!(cell.mobility[Phase::Oil.index()].value(), 5.0e2);
}

#[test]
fn cell_state_inactive_phase_defaults() {
    let pvt = pvt();
    let cell =
        CellState::from_pvt(&pvt, PhaseUsage::oil_water(), 1.0e7, 350.0, [1.0, 1.0, 1.0], 0)
            .unwrap();
    assert_eq!(cell.mobility[Phase::Gas.index()].value(), 0.0);
    assert_eq!(cell.inv_b[Phase::Gas.index()].value(), 1.0);
    assert_eq!(cell.rs.value(), 0.0);
}

#[test]
fn cell_state_rejects_negative_pressure() {
    let pvt = pvt();
    assert!(
        CellState::from_pvt(&pvt, PhaseUsage::oil_water(), -5.0, 350.0, [1.0; 3], 0).is_err()
    );
}

#[test]
fn voidage_coefficients_three_phase() {
    let pvt: Arc<dyn PvtModel> = Arc::new(pvt());
    let conv =
        PvtRateConverter::new(pvt.clone(), PhaseUsage::three_phase(), vec![1.0e7], 350.0).unwrap();

    // no gas produced: no dissolved gas in the oil, gas coefficient finite
    let c = conv.calc_coeff(&[-10.0, -100.0, 0.0], 0).unwrap();
    assert!((c[0] - 1.0).abs() < 1e-12);
    assert!((c[1] - 1.2).abs() < 1e-9);
    assert!(c[2].is_finite() && c[2] > 0.0);

    // with solution gas the oil coefficient absorbs the Rs term
    let c2 = conv.calc_coeff(&[0.0, -100.0, -5000.0], 0).unwrap();
    assert!(c2[1] < 1.0);
    assert!(c2.iter().all(|v| v.is_finite()));
}
