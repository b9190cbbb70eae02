//! Coverage trace parsing and vertex lookup.
//!
//! The trace text format is the stable query interface of the engine:
//! `<class>-><method-signature>-><entry|exit|index>`, with an optional
//! branch-coverage variant `<class>-><method>-><index>->if|switch[-><ordinal>]`
//! that collapses onto the instruction vertex at the given index.

use crate::base::NodeIndex;
use crate::errors::{GraphError, GraphResult};
use crate::inter::InterCfg;
use crate::intra::IntraCfg;
use df_instr::MethodSig;
use rayon::prelude::*;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    If,
    Switch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracePos {
    Entry,
    Exit,
    Instruction(u32),
    /// Branch coverage: one taken arm of the conditional at `index`.
    Branch {
        index: u32,
        kind: BranchKind,
        ordinal: u32,
    },
}

/// One parsed coverage trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    sig: MethodSig,
    pos: TracePos,
}

impl Trace {
    pub fn new(sig: MethodSig, pos: TracePos) -> Self {
        Self { sig, pos }
    }

    pub fn instruction(sig: MethodSig, index: u32) -> Self {
        Self::new(sig, TracePos::Instruction(index))
    }

    #[inline]
    #[must_use]
    pub fn sig(&self) -> &MethodSig {
        &self.sig
    }

    #[inline]
    #[must_use]
    pub fn pos(&self) -> TracePos {
        self.pos
    }

    /// The instruction index the trace collapses onto, if any.
    #[must_use]
    pub fn index(&self) -> Option<u32> {
        match self.pos {
            TracePos::Instruction(index) | TracePos::Branch { index, .. } => Some(index),
            _ => None,
        }
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.sig)?;
        match self.pos {
            TracePos::Entry => write!(f, "->entry"),
            TracePos::Exit => write!(f, "->exit"),
            TracePos::Instruction(index) => write!(f, "->{index}"),
            TracePos::Branch {
                index,
                kind,
                ordinal,
            } => {
                let kind = match kind {
                    BranchKind::If => "if",
                    BranchKind::Switch => "switch",
                };
                write!(f, "->{index}->{kind}->{ordinal}")
            }
        }
    }
}

impl FromStr for Trace {
    type Err = GraphError;

    fn from_str(s: &str) -> GraphResult<Self> {
        let malformed = || GraphError::MalformedTrace(s.to_string());
        let tokens: Vec<&str> = s.split("->").collect();
        if !(3..=5).contains(&tokens.len()) {
            return Err(malformed());
        }
        let sig: MethodSig = format!("{}->{}", tokens[0], tokens[1])
            .parse()
            .map_err(|_| malformed())?;
        let pos = match (tokens[2], tokens.len()) {
            ("entry", 3) => TracePos::Entry,
            ("exit", 3) => TracePos::Exit,
            (token, 3) => TracePos::Instruction(token.parse().map_err(|_| malformed())?),
            (token, _) => {
                let index = token.parse().map_err(|_| malformed())?;
                let kind = match tokens[3] {
                    "if" => BranchKind::If,
                    "switch" => BranchKind::Switch,
                    _ => return Err(malformed()),
                };
                let ordinal = match tokens.get(4) {
                    Some(t) => t.parse().map_err(|_| malformed())?,
                    None => 0,
                };
                TracePos::Branch {
                    index,
                    kind,
                    ordinal,
                }
            }
        };
        Ok(Self { sig, pos })
    }
}

impl InterCfg {
    /// Resolves a trace to its vertex. Entry and exit positions are direct
    /// method-table hits; instruction positions search breadth-first from
    /// the method's entry, falling back to a partitioned scan of the whole
    /// vertex set.
    pub fn lookup(&self, trace: &Trace) -> GraphResult<NodeIndex> {
        let method = trace.sig().to_string();
        let stub = self.stub(&method)?;
        match trace.pos() {
            TracePos::Entry => Ok(stub.entry),
            TracePos::Exit => Ok(stub.exit),
            TracePos::Instruction(index) | TracePos::Branch { index, .. } => {
                if let Some(id) = bfs_find(self, stub.entry, &method, index) {
                    return Ok(id);
                }
                log::debug!("trace {trace} not reachable from the method entry, scanning");
                let ids: Vec<NodeIndex> = self.graph().node_indices().collect();
                ids.par_iter()
                    .find_any(|id| wraps(self, **id, &method, index))
                    .copied()
                    .ok_or_else(|| GraphError::VertexNotFound(trace.to_string()))
            }
        }
    }
}

fn wraps(inter: &InterCfg, id: NodeIndex, method: &str, index: u32) -> bool {
    let vertex = inter.graph().vertex(id);
    vertex.method() == method && vertex.statement().contains_index(index)
}

/// Breadth-first search for the vertex wrapping `index`. Callee subgraphs
/// are traversed too: the continuation after a call is only reachable
/// through the callee's stub.
fn bfs_find(inter: &InterCfg, start: NodeIndex, method: &str, index: u32) -> Option<NodeIndex> {
    let mut visited = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(id) = queue.pop_front() {
        if wraps(inter, id, method, index) {
            return Some(id);
        }
        for s in inter.graph().successors(id) {
            if visited.insert(s) {
                queue.push_back(s);
            }
        }
    }
    None
}

impl IntraCfg {
    pub fn lookup(&self, trace: &Trace) -> GraphResult<NodeIndex> {
        let method = trace.sig().to_string();
        if method != self.method_name() {
            return Err(GraphError::MethodNotFound(method));
        }
        let g = self.graph();
        match trace.pos() {
            TracePos::Entry => Ok(g.entry_index()),
            TracePos::Exit => Ok(g.exit_index()),
            TracePos::Instruction(index) | TracePos::Branch { index, .. } => g
                .node_indices()
                .find(|id| g.vertex(*id).statement().contains_index(index))
                .ok_or_else(|| GraphError::VertexNotFound(trace.to_string())),
        }
    }
}
