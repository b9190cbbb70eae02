//! Global error handling.
//!
//! Each sub-crate of the project defines its own error type.
//! Their types can be unified, for example in a main function,
//! when winding results at the top-level.
//!
//! ```rust,no_run
//! use dexflow::prelude::*;
//!
//! fn main() -> DfResult<()> { // can return a DfError
//!    let _model = CodeModel::open("demo/model.json")?; // can return an InstrError
//!    Ok(())
//! }
//! ```

use df_components::ComponentError;
use df_graphs::GraphError;
use df_instr::InstrError;
use std::io;
use thiserror::Error;

/// An alias for result that can be a [`DfError`].
pub type DfResult<T> = Result<T, DfError>;

/// The main error type for error winding at the top-level.
/// It mainly consists of transparent wrappers over error types that
/// are defined in dependencies.
#[derive(Debug, Error)]
pub enum DfError {
    /// Custom error for reporting bad command line arguments usage.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// Error that can be returned from [I/O operations](std::io).
    #[error(transparent)]
    IO(#[from] io::Error),

    /// Error that can be returned from regex compilation.
    #[error(transparent)]
    Regex(#[from] regex::Error),

    /// Error that can be returned from json serialization.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Error that can be returned from [`df_graphs`] functions.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Error that can be returned from [`df_instr`] functions.
    #[error(transparent)]
    Instr(#[from] InstrError),

    /// Error that can be returned from [`df_components`] functions.
    #[error(transparent)]
    Component(#[from] ComponentError),
}
