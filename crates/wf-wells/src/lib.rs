//! Implicit standard-well model for black-oil reservoir simulation.
//!
//! Each well contributes three unknowns (a total-rate proxy or the bottom-hole
//! pressure, plus water and gas fractions). The well equations are assembled
//! with automatic differentiation, the well unknowns are eliminated locally
//! through a Schur complement, and the reservoir solver only ever sees the
//! reduced system.
//!
//! Per outer (Newton) iteration the reservoir simulator calls:
//! 1. [`StandardWells::assemble`], which updates controls, optionally runs the
//!    local well solve, and assembles and eliminates the well blocks
//! 2. [`StandardWells::apply_residual`] / [`StandardWells::apply`] (or the explicit
//!    [`StandardWells::schur_contributions`]) while building the reduced system
//! 3. [`StandardWells::recover_and_update`] after the reduced linear solve
//!
//! Once per report step it calls [`StandardWells::update_list_econ_limited`].

pub mod blocks;
pub mod config;
pub mod controls;
pub mod density;
pub mod econ;
pub mod error;
pub mod flux;
pub mod group;
pub mod logger;
pub mod parallel;
pub mod report;
pub mod vfp;
pub mod well;
pub mod well_state;

mod assembly;
mod model;
mod potentials;
mod solver;
mod switching;

pub use blocks::{Block, BlockVector, SchurEntry, WellBlocks};
pub use config::WellModelConfig;
pub use controls::{Control, ControlKind, WellControls, constraint_broken};
pub use econ::{EconLimitedList, EconLimits, EconSchedule, QuantityLimit, RatioViolation};
pub use error::{WellError, WellResult};
pub use flux::{ConnectionFluxInput, compute_connection_flux};
pub use group::{
    GroupMember, NoGroupControl, TargetUpdate, VoidageReplacementGroup, WellCollection,
};
pub use logger::{DeferredLogger, LogEntry, LogLevel};
pub use model::{ConnectionContribution, StandardWells, WellContext};
pub use parallel::{Communicator, SerialCommunicator, reduce_failure};
pub use report::WellSolveReport;
pub use vfp::{BilinearVfpTable, FlowRateKind, VfpProperties, VfpTable};
pub use well::{Connection, Well, WellType, Wells};
pub use well_state::{GFRAC, WFRAC, WellState, XVAR_WELL};
