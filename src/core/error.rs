use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid distribution: {0}")]
    InvalidDistribution(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Cannot summarise empty input: {0}")]
    EmptyInput(&'static str),

    #[error("History {index} has {actual} steps, expected {expected}")]
    LengthMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

pub type SimResult<T> = Result<T, ModelError>;
