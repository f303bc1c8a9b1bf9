//! Fluid property errors.

use thiserror::Error;

/// Result type for fluid operations.
pub type FluidResult<T> = Result<T, FluidError>;

/// Errors that can occur during fluid property calculations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FluidError {
    /// Non-physical values (negative pressure, formation volume factor, etc.).
    #[error("Non-physical value for {what}")]
    NonPhysical { what: &'static str },

    /// PVT region index outside the table set.
    #[error("PVT region {region} out of range (regions={len})")]
    RegionOutOfRange { region: usize, len: usize },

    /// Invalid argument.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}
