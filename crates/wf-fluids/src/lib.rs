//! wf-fluids: fluid state and property collaborators for the well model.
//!
//! Provides:
//! - Phase definitions and active-phase bookkeeping
//! - Per-cell differentiable fluid state supplied by the reservoir simulator
//! - `PvtModel` trait for the black-oil property evaluations the wells need
//! - An analytic black-oil PVT implementation
//! - `RateConverter` trait for surface-to-reservoir voidage coefficients
//!
//! # Architecture
//!
//! The well model never evaluates viscosities or relative permeabilities itself.
//! Those arrive already folded into [`CellState`] (mobility, inverse formation
//! volume factor, Rs/Rv). The only property queries issued from inside the well
//! model are saturated Rs/Rv at well-bore pressure, inverse formation volume
//! factors for connection densities, and surface densities.

pub mod blackoil;
pub mod converter;
pub mod error;
pub mod model;
pub mod phase;
pub mod state;

pub use blackoil::{BlackOilPvt, RegionPvt};
pub use converter::{PvtRateConverter, RateConverter};
pub use error::{FluidError, FluidResult};
pub use model::PvtModel;
pub use phase::{NUM_PHASES, Phase, PhaseUsage};
pub use state::CellState;
