//! Instruction model errors definition.

use std::io;
use thiserror::Error;

pub type InstrResult<T> = Result<T, InstrError>;

#[derive(Debug, Error)]
pub enum InstrError {
    #[error(transparent)]
    IO(#[from] io::Error),

    #[error("model deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed method signature: {0}")]
    MalformedSignature(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),
}
