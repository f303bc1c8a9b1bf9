//! PVT model trait.

use crate::error::FluidResult;
use crate::phase::Phase;
use wf_core::WellEval;

/// Black-oil property evaluations consumed by the well model.
///
/// Implementations must be thread-safe (Send + Sync) since per-well assembly
/// runs in parallel. Pressures are differentiable so that saturated ratios
/// evaluated at well-bore pressure carry well-unknown sensitivities.
pub trait PvtModel: Send + Sync {
    /// Get the model name (for debugging/logging).
    fn name(&self) -> &str;

    /// Number of PVT regions.
    fn num_regions(&self) -> usize;

    /// Density at surface conditions [kg/m³].
    fn surface_density(&self, phase: Phase, region: usize) -> FluidResult<f64>;

    /// Inverse formation volume factor.
    ///
    /// `ratio` is the dissolved gas-oil ratio for oil and the vaporized oil-gas
    /// ratio for gas; `None` evaluates the saturated value. Water ignores it.
    fn inverse_fvf(
        &self,
        phase: Phase,
        region: usize,
        temperature: f64,
        pressure: WellEval,
        ratio: Option<WellEval>,
    ) -> FluidResult<WellEval>;

    /// Saturated dissolved gas-oil ratio (Rs_sat).
    fn saturated_gas_dissolution(
        &self,
        region: usize,
        temperature: f64,
        pressure: WellEval,
    ) -> FluidResult<WellEval>;

    /// Saturated vaporized oil-gas ratio (Rv_sat).
    fn saturated_oil_vaporization(
        &self,
        region: usize,
        temperature: f64,
        pressure: WellEval,
    ) -> FluidResult<WellEval>;
}
