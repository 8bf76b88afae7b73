//! Crate-wide error taxonomy.
//!
//! Every fallible operation in `qforge` returns [`Result<T>`]; no panic ever
//! crosses a public boundary except through [`Error::Internal`], which the
//! orchestrator uses to wrap a caught panic rather than let it propagate.

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("capacity exceeded: {0}")]
    Capacity(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt data: {0}")]
    Corrupt(String),

    #[error("out of space: {0}")]
    OutOfSpace(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Machine-usable tag matching the variant name, for wire-shape
    /// `{success, error}` payloads that need a stable identifier alongside
    /// the human-readable message.
    pub fn tag(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::InvalidState(_) => "InvalidState",
            Error::Capacity(_) => "Capacity",
            Error::NotFound(_) => "NotFound",
            Error::Corrupt(_) => "Corrupt",
            Error::OutOfSpace(_) => "OutOfSpace",
            Error::InvalidName(_) => "InvalidName",
            Error::IoError(_) => "IoError",
            Error::Internal(_) => "Internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_matches_variant() {
        assert_eq!(Error::InvalidArgument("x".into()).tag(), "InvalidArgument");
        assert_eq!(Error::Capacity("x".into()).tag(), "Capacity");
        assert_eq!(Error::NotFound("x".into()).tag(), "NotFound");
    }
}
