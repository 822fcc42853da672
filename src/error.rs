#![warn(missing_docs)]
//! Mode matching specific error structures
use argmin::core::ArgminError;
use std::{error::Error, fmt::Display};

/// Crate specific Result type
pub type MmResult<T> = std::result::Result<T, ModeMatchError>;

/// Errors that can be returned by the propagation, fitting and search functions.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ModeMatchError {
    /// the complex beam parameter became non-physical (vanishing denominator, non-finite value or
    /// a beam that is no longer forward propagating).
    InvalidBeamState(String),
    /// a beam width fit did not reach its convergence criterion within the iteration budget.
    FitDidNotConverge(String),
    /// a position interval lies outside the physically meaningful domain.
    OutOfBoundsPosition(String),
    /// malformed input values (intervals, waist sizes, sequence lengths, ...)
    InvalidInput(String),
    /// errors not falling in one of the categories above
    Other(String),
}

impl Display for ModeMatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBeamState(m) => {
                write!(f, "InvalidBeamState:{m}")
            }
            Self::FitDidNotConverge(m) => {
                write!(f, "FitDidNotConverge:{m}")
            }
            Self::OutOfBoundsPosition(m) => {
                write!(f, "OutOfBoundsPosition:{m}")
            }
            Self::InvalidInput(m) => {
                write!(f, "InvalidInput:{m}")
            }
            Self::Other(m) => write!(f, "ModeMatch Error:Other:{m}"),
        }
    }
}
impl Error for ModeMatchError {}

impl std::convert::From<String> for ModeMatchError {
    fn from(msg: String) -> Self {
        Self::Other(msg)
    }
}
impl std::convert::From<argmin::core::Error> for ModeMatchError {
    fn from(err: argmin::core::Error) -> Self {
        let err = match err.downcast::<Self>() {
            Ok(mm_err) => return mm_err,
            Err(err) => err,
        };
        match err.downcast::<ArgminError>() {
            Ok(ArgminError::InvalidParameter { text }) => Self::InvalidInput(text),
            Ok(argmin_err) => Self::Other(format!("optimizer: {argmin_err}")),
            Err(err) => Self::Other(format!("optimizer: {err}")),
        }
    }
}
#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn from() {
        let error = ModeMatchError::from("test".to_string());
        assert_eq!(error, ModeMatchError::Other("test".to_string()));
    }
    #[test]
    fn from_optimizer_error() {
        let err: argmin::core::Error = ArgminError::InvalidParameter {
            text: "negative tolerance".into(),
        }
        .into();
        assert_eq!(
            ModeMatchError::from(err),
            ModeMatchError::InvalidInput("negative tolerance".into())
        );
        let err: argmin::core::Error = ModeMatchError::InvalidBeamState("test".into()).into();
        assert_eq!(
            ModeMatchError::from(err),
            ModeMatchError::InvalidBeamState("test".into())
        );
        let err: argmin::core::Error = ArgminError::NotImplemented {
            text: "gradient".into(),
        }
        .into();
        assert!(matches!(ModeMatchError::from(err), ModeMatchError::Other(_)));
    }
    #[test]
    fn display() {
        assert_eq!(
            format!("{}", ModeMatchError::InvalidBeamState("test".to_string())),
            "InvalidBeamState:test"
        );
        assert_eq!(
            format!("{}", ModeMatchError::FitDidNotConverge("test".to_string())),
            "FitDidNotConverge:test"
        );
        assert_eq!(
            format!("{}", ModeMatchError::OutOfBoundsPosition("test".to_string())),
            "OutOfBoundsPosition:test"
        );
        assert_eq!(
            format!("{}", ModeMatchError::InvalidInput("test".to_string())),
            "InvalidInput:test"
        );
        assert_eq!(
            format!("{}", ModeMatchError::Other("test".to_string())),
            "ModeMatch Error:Other:test"
        );
    }
    #[test]
    fn debug() {
        assert_eq!(
            format!("{:?}", ModeMatchError::InvalidBeamState("test".to_string())),
            "InvalidBeamState(\"test\")"
        );
    }
}
