//! Analytic black-oil PVT.
//!
//! Isothermal, linearly compressible liquids, ideal-gas-like gas and
//! linear saturation curves capped at a maximum. Enough structure to give
//! the well model pressure-dependent Rs/Rv and formation volume factors
//! with consistent derivatives.

use crate::error::{FluidError, FluidResult};
use crate::model::PvtModel;
use crate::phase::{NUM_PHASES, Phase};
use serde::{Deserialize, Serialize};
use wf_core::WellEval;

/// Property parameters of one PVT region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionPvt {
    /// Surface densities (water, oil, gas) [kg/m³]
    pub surface_density: [f64; NUM_PHASES],
    /// Pressure at which `inv_b_ref` applies [Pa]
    pub reference_pressure: f64,
    /// Inverse formation volume factors at the reference pressure
    pub inv_b_ref: [f64; NUM_PHASES],
    /// Liquid compressibilities (water, oil) [1/Pa]; the gas entry is unused
    pub compressibility: [f64; NUM_PHASES],
    /// Slope of the saturated Rs curve [1/Pa]
    pub rs_per_pa: f64,
    pub rs_max: f64,
    /// Slope of the saturated Rv curve [1/Pa]
    pub rv_per_pa: f64,
    pub rv_max: f64,
    /// Oil volume increase per unit dissolved gas
    pub oil_swelling: f64,
    /// Gas volume increase per unit vaporized oil
    pub gas_swelling: f64,
}

impl Default for RegionPvt {
    fn default() -> Self {
        Self {
            surface_density: [1000.0, 800.0, 0.9],
            reference_pressure: 1.0e7,
            inv_b_ref: [1.0, 1.0 / 1.2, 100.0],
            compressibility: [4.0e-10, 1.0e-9, 0.0],
            rs_per_pa: 1.0e-5,
            rs_max: 200.0,
            rv_per_pa: 1.0e-11,
            rv_max: 5.0e-4,
            oil_swelling: 2.0e-3,
            gas_swelling: 0.0,
        }
    }
}

/// Multi-region analytic black-oil model.
#[derive(Clone, Debug)]
pub struct BlackOilPvt {
    regions: Vec<RegionPvt>,
}

impl BlackOilPvt {
    pub fn new(regions: Vec<RegionPvt>) -> FluidResult<Self> {
        if regions.is_empty() {
            return Err(FluidError::InvalidArg {
                what: "at least one PVT region is required",
            });
        }
        for r in &regions {
            if r.reference_pressure <= 0.0 {
                return Err(FluidError::NonPhysical {
                    what: "reference pressure",
                });
            }
            if r.inv_b_ref.iter().any(|b| *b <= 0.0) {
                return Err(FluidError::NonPhysical {
                    what: "reference inverse formation volume factor",
                });
            }
        }
        Ok(Self { regions })
    }

    pub fn single_region(region: RegionPvt) -> FluidResult<Self> {
        Self::new(vec![region])
    }

    fn region(&self, region: usize) -> FluidResult<&RegionPvt> {
        self.regions
            .get(region)
            .ok_or(FluidError::RegionOutOfRange {
                region,
                len: self.regions.len(),
            })
    }
}

fn check_pressure(p: WellEval) -> FluidResult<()> {
    if !(p.value().is_finite() && p.value() > 0.0) {
        return Err(FluidError::NonPhysical { what: "pressure" });
    }
    Ok(())
}

impl PvtModel for BlackOilPvt {
    fn name(&self) -> &str {
        "analytic-black-oil"
    }

    fn num_regions(&self) -> usize {
        self.regions.len()
    }

    fn surface_density(&self, phase: Phase, region: usize) -> FluidResult<f64> {
        Ok(self.region(region)?.surface_density[phase.index()])
    }

    fn inverse_fvf(
        &self,
        phase: Phase,
        region: usize,
        temperature: f64,
        pressure: WellEval,
        ratio: Option<WellEval>,
    ) -> FluidResult<WellEval> {
        check_pressure(pressure)?;
        let r = self.region(region)?;
        let i = phase.index();
        let b = match phase {
            Phase::Water => {
                (1.0 + (pressure - r.reference_pressure) * r.compressibility[i]) * r.inv_b_ref[i]
            }
            Phase::Oil => {
                let rs = match ratio {
                    Some(rs) => rs,
                    None => self.saturated_gas_dissolution(region, temperature, pressure)?,
                };
                (1.0 + (pressure - r.reference_pressure) * r.compressibility[i]) * r.inv_b_ref[i]
                    / (1.0 + rs * r.oil_swelling)
            }
            Phase::Gas => {
                let rv = match ratio {
                    Some(rv) => rv,
                    None => self.saturated_oil_vaporization(region, temperature, pressure)?,
                };
                pressure / r.reference_pressure * r.inv_b_ref[i] / (1.0 + rv * r.gas_swelling)
            }
        };
        if !(b.value().is_finite() && b.value() > 0.0) {
            return Err(FluidError::NonPhysical {
                what: "inverse formation volume factor",
            });
        }
        Ok(b)
    }

    fn saturated_gas_dissolution(
        &self,
        region: usize,
        _temperature: f64,
        pressure: WellEval,
    ) -> FluidResult<WellEval> {
        check_pressure(pressure)?;
        let r = self.region(region)?;
        Ok((pressure * r.rs_per_pa).min(WellEval::constant(r.rs_max)))
    }

    fn saturated_oil_vaporization(
        &self,
        region: usize,
        _temperature: f64,
        pressure: WellEval,
    ) -> FluidResult<WellEval> {
        check_pressure(pressure)?;
        let r = self.region(region)?;
        Ok((pressure * r.rv_per_pa).min(WellEval::constant(r.rv_max)))
    }
}
