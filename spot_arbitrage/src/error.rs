use thiserror::Error;

/// Caller-input failures. None of these are transient, so nothing is retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArbitrageError {
    #[error("invalid threshold spec: {0}")]
    InvalidSpec(String),

    #[error("cannot {0} on an empty price series")]
    EmptySeries(&'static str),

    #[error("invalid battery config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ArbitrageError>;
