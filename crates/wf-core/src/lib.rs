//! wf-core: stable foundation for wellflow.
//!
//! Contains:
//! - units (uom constructors for pressures, rates and time)
//! - numeric (finite checks and bounded Newton updates)
//! - eval (forward-mode differentiable evaluation with fixed sensitivity slots)
//! - error (non-finite value errors)

pub mod error;
pub mod eval;
pub mod numeric;
pub mod units;

// Flat re-exports used across the well crates
pub use error::{WfError, WfResult};
pub use eval::{CellEval, Eval, NUM_EQ, WellEval};
pub use numeric::*;
pub use units::*;
