use std::{
    error::Error,
    fmt::{self, Display},
};

use rand_distr::uniform::Error as UniformError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidGraph(String),
    MissingForward,
    InvalidInit(String),
}

impl From<UniformError> for MlErr {
    fn from(value: UniformError) -> Self {
        Self::InvalidInit(value.to_string())
    }
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => {
                format!("There's a size mismatch in {what}, got {got} and expected {expected}")
            }
            MlErr::InvalidGraph(msg) => format!("Invalid graph batch: {msg}"),
            MlErr::MissingForward => {
                "Tried to backpropagate before running a forward pass".to_string()
            }
            MlErr::InvalidInit(msg) => format!("Invalid weight initialization: {msg}"),
        };

        write!(f, "{s}")
    }
}

impl Error for MlErr {}
