//! Error types for datestuff operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatestuffError {
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Undefined length: {0}")]
    UndefinedLength(String),

    #[error("Index out of range: {0}")]
    IndexOutOfRange(String),

    #[error("Unreversible range: {0}")]
    UnreversibleRange(String),

    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("Unsupported operand: {0}")]
    UnsupportedOperand(String),

    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),

    #[error("Invalid span: {0}")]
    InvalidSpan(String),
}

pub type Result<T> = std::result::Result<T, DatestuffError>;
