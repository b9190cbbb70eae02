//! Component model errors definition.

use std::io;
use thiserror::Error;

pub type ComponentResult<T> = Result<T, ComponentError>;

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error(transparent)]
    IO(#[from] io::Error),

    #[error("metadata deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("mandatory metadata absent: {0}")]
    MissingMetadata(String),
}
