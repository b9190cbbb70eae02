//! Graph construction and derivation engine of `DexFlow`.
//!
//! Builds, from the provider data models, the layered graph representations
//! the analyses run on: per-method control flow graphs ([`intra`]), the
//! stitched application-wide graph with lifecycle synthesis ([`inter`]),
//! post-dominator trees ([`dominator`]), control dependence graphs
//! ([`cdg`]), and the method-level call tree ([`calltree`]). Coverage traces
//! resolve back onto graph vertices through [`trace`].

pub mod base;
pub mod calltree;
pub mod cdg;
pub mod dominator;
pub mod errors;
pub mod hierarchy;
pub mod inter;
pub mod intra;
pub mod statement;
pub mod trace;
pub mod vertex;

#[cfg(test)]
mod fixture;

pub use base::{BaseGraph, GraphKind, NodeIndex};
pub use calltree::CallTree;
pub use cdg::ControlDependenceGraph;
pub use dominator::PostDominatorTree;
pub use errors::{GraphError, GraphResult};
pub use hierarchy::Hierarchy;
pub use inter::{default_excludes, InterCfg, Options, Stub, GLOBAL_ENTRY};
pub use intra::{IntraCfg, Mode};
pub use statement::Statement;
pub use trace::{BranchKind, Trace, TracePos};
pub use vertex::Vertex;
