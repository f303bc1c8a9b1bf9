//! Error types for the command-line driver.

use std::path::PathBuf;
use wf_fluids::FluidError;
use wf_wells::WellError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Failed to read scenario file: {path}")]
    ScenarioRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse scenario YAML: {0}")]
    ScenarioParse(String),

    #[error("Invalid scenario: {0}")]
    Invalid(String),

    #[error("Fluid error: {0}")]
    Fluid(#[from] FluidError),

    #[error("Well model error: {0}")]
    Well(#[from] WellError),
}

pub type CliResult<T> = Result<T, CliError>;
