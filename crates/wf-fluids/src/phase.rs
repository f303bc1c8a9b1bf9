//! Phases and active-phase bookkeeping.
//!
//! Phase quantities are stored in canonical order (water, oil, gas) in
//! fixed-size arrays; inactive phases simply hold zeros.

use crate::error::{FluidError, FluidResult};
use serde::{Deserialize, Serialize};

/// Number of canonical black-oil phases.
pub const NUM_PHASES: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Water = 0,
    Oil = 1,
    Gas = 2,
}

impl Phase {
    pub const ALL: [Phase; NUM_PHASES] = [Phase::Water, Phase::Oil, Phase::Gas];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Water => "water",
            Phase::Oil => "oil",
            Phase::Gas => "gas",
        }
    }
}

/// Which of the canonical phases take part in the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseUsage {
    active: [bool; NUM_PHASES],
}

impl PhaseUsage {
    pub fn new(water: bool, oil: bool, gas: bool) -> FluidResult<Self> {
        if !(water || oil || gas) {
            return Err(FluidError::InvalidArg {
                what: "at least one phase must be active",
            });
        }
        Ok(Self {
            active: [water, oil, gas],
        })
    }

    pub fn three_phase() -> Self {
        Self {
            active: [true, true, true],
        }
    }

    pub fn oil_water() -> Self {
        Self {
            active: [true, true, false],
        }
    }

    pub fn oil_gas() -> Self {
        Self {
            active: [false, true, true],
        }
    }

    pub fn single(phase: Phase) -> Self {
        let mut active = [false; NUM_PHASES];
        active[phase.index()] = true;
        Self { active }
    }

    #[inline]
    pub fn is_active(&self, phase: Phase) -> bool {
        self.active[phase.index()]
    }

    pub fn num_phases(&self) -> usize {
        self.active.iter().filter(|a| **a).count()
    }

    pub fn active_phases(&self) -> impl Iterator<Item = Phase> + '_ {
        Phase::ALL.into_iter().filter(|p| self.is_active(*p))
    }

    /// Both hydrocarbon phases present, so Rs/Rv couple them.
    #[inline]
    pub fn has_oil_and_gas(&self) -> bool {
        self.is_active(Phase::Oil) && self.is_active(Phase::Gas)
    }
}

impl Default for PhaseUsage {
    fn default() -> Self {
        Self::three_phase()
    }
}
