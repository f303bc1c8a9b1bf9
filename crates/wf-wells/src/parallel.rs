//! Reductions across simulator processes.
//!
//! Wells may be distributed over several processes. Convergence norms and
//! failure flags must then be reduced so that every process takes the same
//! decision.

use crate::error::{WellError, WellResult};

/// Collective operations used by the well model.
pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn max(&self, local: f64) -> f64;

    fn sum(&self, local: f64) -> f64;

    fn is_output_rank(&self) -> bool {
        self.rank() == 0
    }
}

/// Single-process communicator: every reduction is the identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn max(&self, local: f64) -> f64 {
        local
    }

    fn sum(&self, local: f64) -> f64 {
        local
    }
}

/// Make a fatal failure on any process abort the step on all of them.
///
/// Every process must call this collectively. A local error is returned
/// unchanged; a process that succeeded while a peer failed gets
/// [`WellError::StepAborted`].
pub fn reduce_failure<T>(comm: &dyn Communicator, local: WellResult<T>) -> WellResult<T> {
    let failed = match &local {
        Err(e) if e.is_fatal() => 1.0,
        _ => 0.0,
    };
    let any_failed = comm.max(failed) > 0.0;
    match local {
        Ok(_) if any_failed => Err(WellError::StepAborted {
            what: format!("fatal well error on another process (rank {})", comm.rank()),
        }),
        other => other,
    }
}
