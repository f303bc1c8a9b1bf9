//! Well control constraints.
//!
//! A well carries an ordered list of constraints. Exactly one is the current
//! control at any time; the others act as limits that may trigger a switch.

use crate::error::{WellError, WellResult};
use crate::well::WellType;
use serde::{Deserialize, Serialize};
use wf_core::{Pressure, VolumeRate};
use uom::si::pressure::pascal;
use uom::si::volume_rate::cubic_meter_per_second;
use wf_fluids::NUM_PHASES;

/// Surface-rate scaling of the gas fraction primary variable.
pub(crate) const SURFACE_RATE_SCALING: [f64; NUM_PHASES] = [1.0, 1.0, 0.01];

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlKind {
    /// Bottom-hole pressure [Pa]
    Bhp,
    /// Tubing-head pressure [Pa], evaluated through a lift-curve table
    Thp { vfp_table: u32, alq: f64 },
    /// Weighted sum of surface rates [m³/s]
    SurfaceRate,
    /// Weighted sum of reservoir voidage rates [m³/s]
    ReservoirRate,
}

impl ControlKind {
    pub fn name(&self) -> &'static str {
        match self {
            ControlKind::Bhp => "BHP",
            ControlKind::Thp { .. } => "THP",
            ControlKind::SurfaceRate => "SURFACE_RATE",
            ControlKind::ReservoirRate => "RESERVOIR_RATE",
        }
    }

    /// BHP and THP controls fix a pressure; the others fix a rate.
    pub fn is_pressure(&self) -> bool {
        matches!(self, ControlKind::Bhp | ControlKind::Thp { .. })
    }
}

/// One constraint of a well.
///
/// Rate targets follow the flux sign convention: positive for injection,
/// negative for production.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Control {
    pub kind: ControlKind,
    pub target: f64,
    /// Per-phase weights for rate controls; for reservoir-rate controls these
    /// are the voidage conversion coefficients
    #[serde(default)]
    pub distr: [f64; NUM_PHASES],
}

impl Control {
    pub fn bhp(target: Pressure) -> Self {
        Self {
            kind: ControlKind::Bhp,
            target: target.get::<pascal>(),
            distr: [0.0; NUM_PHASES],
        }
    }

    pub fn thp(target: Pressure, vfp_table: u32, alq: f64) -> Self {
        Self {
            kind: ControlKind::Thp { vfp_table, alq },
            target: target.get::<pascal>(),
            distr: [0.0; NUM_PHASES],
        }
    }

    pub fn surface_rate(target: VolumeRate, distr: [f64; NUM_PHASES]) -> Self {
        Self {
            kind: ControlKind::SurfaceRate,
            target: target.get::<cubic_meter_per_second>(),
            distr,
        }
    }

    pub fn reservoir_rate(target: VolumeRate, distr: [f64; NUM_PHASES]) -> Self {
        Self {
            kind: ControlKind::ReservoirRate,
            target: target.get::<cubic_meter_per_second>(),
            distr,
        }
    }

    /// Weighted rate compared against the target of a rate control.
    pub fn weighted_rate(&self, rates: &[f64; NUM_PHASES]) -> f64 {
        self.distr.iter().zip(rates).map(|(d, q)| d * q).sum()
    }

    /// Scaling applied to the fraction primary variables under this control.
    pub(crate) fn fraction_scaling(&self) -> [f64; NUM_PHASES] {
        match self.kind {
            ControlKind::ReservoirRate => self.distr,
            _ => SURFACE_RATE_SCALING,
        }
    }

    /// Number of phases with a nonzero weight.
    pub(crate) fn num_weighted_phases(&self) -> usize {
        self.distr.iter().filter(|d| **d > 0.0).count()
    }
}

/// Ordered constraint list of one well.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WellControls {
    controls: Vec<Control>,
    /// Control a freshly initialized well state starts from
    #[serde(default)]
    initial: usize,
}

impl WellControls {
    pub fn new(controls: Vec<Control>) -> WellResult<Self> {
        Self::with_initial(controls, 0)
    }

    pub fn with_initial(controls: Vec<Control>, initial: usize) -> WellResult<Self> {
        if controls.is_empty() {
            return Err(WellError::invalid("a well needs at least one control"));
        }
        if initial >= controls.len() {
            return Err(WellError::invalid(format!(
                "initial control {initial} out of range ({} controls)",
                controls.len()
            )));
        }
        for c in &controls {
            if !c.target.is_finite() {
                return Err(WellError::invalid("control target must be finite"));
            }
            if c.distr.iter().any(|d| *d < 0.0 || !d.is_finite()) {
                return Err(WellError::invalid("control weights must be non-negative"));
            }
        }
        Ok(Self { controls, initial })
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn initial(&self) -> usize {
        self.initial
    }

    pub fn get(&self, index: usize) -> WellResult<&Control> {
        self.controls.get(index).ok_or_else(|| {
            WellError::logic(format!(
                "control index {index} out of range ({} controls)",
                self.controls.len()
            ))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Control> {
        self.controls.iter()
    }

    pub fn set_target(&mut self, index: usize, target: f64) -> WellResult<()> {
        let len = self.controls.len();
        let control = self.controls.get_mut(index).ok_or_else(|| {
            WellError::logic(format!("control index {index} out of range ({len} controls)"))
        })?;
        control.target = target;
        Ok(())
    }

    /// Index of the first constraint of the given kind.
    pub fn find(&self, pred: impl Fn(&ControlKind) -> bool) -> Option<usize> {
        self.controls.iter().position(|c| pred(&c.kind))
    }
}

/// Whether a non-current constraint is violated at the given well state.
///
/// Injectors must not exceed their limits, producers must not fall below
/// theirs (producer rate targets are negative).
pub fn constraint_broken(
    well_type: WellType,
    control: &Control,
    bhp: f64,
    thp: f64,
    rates: &[f64; NUM_PHASES],
) -> bool {
    let value = match control.kind {
        ControlKind::Bhp => bhp,
        ControlKind::Thp { .. } => thp,
        ControlKind::SurfaceRate | ControlKind::ReservoirRate => control.weighted_rate(rates),
    };
    match well_type {
        WellType::Injector => value > control.target,
        WellType::Producer => value < control.target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_core::{bar, sm3_per_day};

    #[test]
    fn constructors_convert_to_si() {
        let c = Control::bhp(bar(100.0));
        assert_eq!(c.target, 1.0e7);
        let r = Control::surface_rate(sm3_per_day(-86_400.0), [0.0, 1.0, 0.0]);
        assert!((r.target + 1.0).abs() < 1e-12);
    }

    #[test]
    fn producer_limits() {
        let bhp = Control::bhp(bar(100.0));
        assert!(constraint_broken(WellType::Producer, &bhp, 80e5, 0.0, &[0.0; 3]));
        assert!(!constraint_broken(WellType::Producer, &bhp, 120e5, 0.0, &[0.0; 3]));

        let orat = Control {
            kind: ControlKind::SurfaceRate,
            target: -100.0,
            distr: [0.0, 1.0, 0.0],
        };
        assert!(constraint_broken(WellType::Producer, &orat, 0.0, 0.0, &[-5.0, -150.0, -9.0]));
        assert!(!constraint_broken(WellType::Producer, &orat, 0.0, 0.0, &[-5.0, -50.0, -9.0]));
    }

    #[test]
    fn injector_limits() {
        let bhp = Control::bhp(bar(300.0));
        assert!(constraint_broken(WellType::Injector, &bhp, 310e5, 0.0, &[0.0; 3]));
        let wrat = Control {
            kind: ControlKind::SurfaceRate,
            target: 50.0,
            distr: [1.0, 0.0, 0.0],
        };
        assert!(constraint_broken(WellType::Injector, &wrat, 0.0, 0.0, &[60.0, 0.0, 0.0]));
        assert!(!constraint_broken(WellType::Injector, &wrat, 0.0, 0.0, &[40.0, 0.0, 0.0]));
    }

    #[test]
    fn empty_control_list_rejected() {
        assert!(WellControls::new(vec![]).is_err());
        assert!(WellControls::with_initial(vec![Control::bhp(bar(1.0))], 1).is_err());
    }

    #[test]
    fn fraction_scaling_per_kind() {
        let resv = Control {
            kind: ControlKind::ReservoirRate,
            target: -1.0,
            distr: [1.1, 1.3, 0.004],
        };
        assert_eq!(resv.fraction_scaling(), [1.1, 1.3, 0.004]);
        assert_eq!(Control::bhp(bar(1.0)).fraction_scaling(), SURFACE_RATE_SCALING);
    }
}
