//! Graph engine errors definition.

use df_components::errors::ComponentError;
use df_instr::errors::InstrError;
use regex::Error as RegexError;
use thiserror::Error;

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("instruction model error: {0}")]
    Instr(#[from] InstrError),

    #[error("component model error: {0}")]
    Component(#[from] ComponentError),

    #[error("regex error: {0}")]
    Regex(#[from] RegexError),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("no such vertex: {0}")]
    VertexNotFound(String),

    #[error("malformed trace: {0}")]
    MalformedTrace(String),
}
