use thiserror::Error;

/// Errors raised while parsing chain primitives
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, CommonError>;
