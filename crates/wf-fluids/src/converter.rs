//! Surface-to-reservoir voidage rate conversion.

use crate::error::{FluidError, FluidResult};
use crate::model::PvtModel;
use crate::phase::{NUM_PHASES, Phase, PhaseUsage};
use std::sync::Arc;
use wf_core::WellEval;

/// Coefficients converting surface volume rates to reservoir voidage rates.
///
/// `voidage = Σ_p coeff[p] · surface_rate[p]`.
pub trait RateConverter: Send + Sync {
    fn calc_coeff(&self, surface_rates: &[f64; NUM_PHASES], region: usize)
    -> FluidResult<[f64; NUM_PHASES]>;
}

/// Converter evaluating the PVT model at a representative pressure per region.
#[derive(Clone)]
pub struct PvtRateConverter {
    pvt: Arc<dyn PvtModel>,
    usage: PhaseUsage,
    region_pressure: Vec<f64>,
    temperature: f64,
}

impl PvtRateConverter {
    pub fn new(
        pvt: Arc<dyn PvtModel>,
        usage: PhaseUsage,
        region_pressure: Vec<f64>,
        temperature: f64,
    ) -> FluidResult<Self> {
        if region_pressure.len() != pvt.num_regions() {
            return Err(FluidError::InvalidArg {
                what: "one average pressure per PVT region is required",
            });
        }
        Ok(Self {
            pvt,
            usage,
            region_pressure,
            temperature,
        })
    }

    /// Update the representative pressures, e.g. to hydrocarbon-pore-volume
    /// weighted averages at the start of a step.
    pub fn set_region_pressure(&mut self, region: usize, pressure: f64) -> FluidResult<()> {
        let len = self.region_pressure.len();
        let slot = self
            .region_pressure
            .get_mut(region)
            .ok_or(FluidError::RegionOutOfRange { region, len })?;
        *slot = pressure;
        Ok(())
    }
}

impl RateConverter for PvtRateConverter {
    fn calc_coeff(
        &self,
        surface_rates: &[f64; NUM_PHASES],
        region: usize,
    ) -> FluidResult<[f64; NUM_PHASES]> {
        let p = *self
            .region_pressure
            .get(region)
            .ok_or(FluidError::RegionOutOfRange {
                region,
                len: self.region_pressure.len(),
            })?;
        let p = WellEval::constant(p);
        let t = self.temperature;
        let mut coeff = [0.0; NUM_PHASES];

        if self.usage.is_active(Phase::Water) {
            let bw = self.pvt.inverse_fvf(Phase::Water, region, t, p, None)?;
            coeff[Phase::Water.index()] = 1.0 / bw.value();
        }

        let io = Phase::Oil.index();
        let ig = Phase::Gas.index();
        if self.usage.has_oil_and_gas() {
            let qo = surface_rates[io].abs();
            let qg = surface_rates[ig].abs();
            let rs_sat = self.pvt.saturated_gas_dissolution(region, t, p)?.value();
            let rv_sat = self.pvt.saturated_oil_vaporization(region, t, p)?.value();
            let rs = if qo > 0.0 { (qg / qo).min(rs_sat) } else { 0.0 };
            let rv = if qg > 0.0 { (qo / qg).min(rv_sat) } else { 0.0 };
            let bo = self
                .pvt
                .inverse_fvf(Phase::Oil, region, t, p, Some(WellEval::constant(rs)))?
                .value();
            let bg = self
                .pvt
                .inverse_fvf(Phase::Gas, region, t, p, Some(WellEval::constant(rv)))?
                .value();
            let d = 1.0 - rs * rv;
            if d.abs() < f64::EPSILON {
                return Err(FluidError::NonPhysical {
                    what: "rs*rv close to one",
                });
            }
            coeff[io] = (1.0 / bo - rs / bg) / d;
            coeff[ig] = (1.0 / bg - rv / bo) / d;
        } else {
            // dead oil / dry gas without the partner phase
            let zero = Some(WellEval::constant(0.0));
            for phase in [Phase::Oil, Phase::Gas] {
                if self.usage.is_active(phase) {
                    let b = self.pvt.inverse_fvf(phase, region, t, p, zero)?;
                    coeff[phase.index()] = 1.0 / b.value();
                }
            }
        }
        Ok(coeff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackoil::{BlackOilPvt, RegionPvt};

    #[test]
    fn dead_fluids_give_inverse_fvf() {
        let pvt: Arc<dyn PvtModel> =
            Arc::new(BlackOilPvt::single_region(RegionPvt::default()).unwrap());
        let conv = PvtRateConverter::new(pvt, PhaseUsage::oil_water(), vec![1.0e7], 350.0).unwrap();
        let c = conv.calc_coeff(&[1.0, 1.0, 0.0], 0).unwrap();
        assert!((c[0] - 1.0).abs() < 1e-12);
        // dead oil at the reference pressure
        assert!((c[1] - 1.2).abs() < 1e-9);
        assert_eq!(c[2], 0.0);
    }

    #[test]
    fn region_pressure_count_checked() {
        let pvt: Arc<dyn PvtModel> =
            Arc::new(BlackOilPvt::single_region(RegionPvt::default()).unwrap());
        assert!(PvtRateConverter::new(pvt, PhaseUsage::three_phase(), vec![], 350.0).is_err());
    }
}
