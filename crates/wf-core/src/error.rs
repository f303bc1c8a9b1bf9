use thiserror::Error;

pub type WfResult<T> = Result<T, WfError>;

/// Errors raised by the shared numeric helpers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WfError {
    #[error("{what} is not finite ({value})")]
    NonFinite { what: &'static str, value: f64 },
}
