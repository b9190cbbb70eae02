//! Statements: the atomic payload every graph vertex is built from.

use df_instr::{Instr, MethodSig};
use std::fmt;
use std::hash::{Hash, Hasher};

/// The payload of a graph vertex.
///
/// Equality and hashing are structural and deliberately partial: a `Basic`
/// statement is identified by its method, code index and opcode; `Entry` and
/// `Exit` by their method and kind; `Return` by its caller, callee and call
/// site index; a `Block` by the identities of its elements. The rest of the
/// wrapped instruction data (predecessor/successor sets in particular) does
/// not take part in identity, so a statement keeps naming the same program
/// point across graph transformations.
#[derive(Debug, Clone)]
pub enum Statement {
    Entry {
        method: String,
    },
    Exit {
        method: String,
    },
    Basic {
        method: String,
        instr: Instr,
    },
    /// A basic block: a non-empty ordered sequence of `Basic` and `Return`
    /// statements.
    Block {
        method: String,
        stmts: Vec<Statement>,
    },
    /// Synthetic marker: control came back from `callee`, invoked at
    /// `call_index` inside `method`.
    Return {
        method: String,
        callee: String,
        call_index: u32,
    },
}

impl Statement {
    /// Packs an ordered sequence into a single statement. Empty input is
    /// rejected, a one-element sequence collapses to its element, so blocks
    /// built here are never empty and never trivial.
    #[must_use]
    pub fn block(method: &str, mut stmts: Vec<Statement>) -> Option<Self> {
        match stmts.len() {
            0 => None,
            1 => Some(stmts.remove(0)),
            _ => Some(Self::Block {
                method: method.to_string(),
                stmts,
            }),
        }
    }

    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::Entry { method }
            | Self::Exit { method }
            | Self::Basic { method, .. }
            | Self::Block { method, .. }
            | Self::Return { method, .. } => method,
        }
    }

    /// The wrapped instruction, for `Basic` statements only.
    #[must_use]
    pub fn instruction(&self) -> Option<&Instr> {
        match self {
            Self::Basic { instr, .. } => Some(instr),
            _ => None,
        }
    }

    /// Block elements, for `Block` statements only.
    #[must_use]
    pub fn elements(&self) -> Option<&[Statement]> {
        match self {
            Self::Block { stmts, .. } => Some(stmts),
            _ => None,
        }
    }

    /// First addressable element of a block, or the statement itself.
    #[must_use]
    pub fn first(&self) -> &Statement {
        match self {
            Self::Block { stmts, .. } => stmts.first().unwrap_or(self),
            other => other,
        }
    }

    /// Last addressable element of a block, or the statement itself.
    #[must_use]
    pub fn last(&self) -> &Statement {
        match self {
            Self::Block { stmts, .. } => stmts.last().unwrap_or(self),
            other => other,
        }
    }

    /// Whether the statement covers the given instruction code index.
    #[must_use]
    pub fn contains_index(&self, index: u32) -> bool {
        match self {
            Self::Basic { instr, .. } => instr.index() == index,
            Self::Block { stmts, .. } => stmts.iter().any(|s| s.contains_index(index)),
            _ => false,
        }
    }

    /// Call sites wrapped by the statement: nominal target and code index of
    /// every invoke instruction, in stream order.
    #[must_use]
    pub fn invoke_targets(&self) -> Vec<(&MethodSig, u32)> {
        match self {
            Self::Basic { instr, .. } => instr
                .target()
                .filter(|_| instr.is_invoke())
                .map(|t| (t, instr.index()))
                .into_iter()
                .collect(),
            Self::Block { stmts, .. } => {
                stmts.iter().flat_map(Statement::invoke_targets).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Entry { method } => write!(f, "entry {method}"),
            Self::Exit { method } => write!(f, "exit {method}"),
            Self::Basic { instr, .. } => write!(f, "{instr}"),
            Self::Block { stmts, .. } => {
                write!(f, "block[")?;
                for (i, stmt) in stmts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{stmt}")?;
                }
                write!(f, "]")
            }
            Self::Return {
                callee, call_index, ..
            } => write!(f, "return@{call_index} <- {callee}"),
        }
    }
}

impl PartialEq for Statement {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Entry { method: a }, Self::Entry { method: b })
            | (Self::Exit { method: a }, Self::Exit { method: b }) => a == b,
            (
                Self::Basic {
                    method: ma,
                    instr: ia,
                },
                Self::Basic {
                    method: mb,
                    instr: ib,
                },
            ) => ma == mb && ia.index() == ib.index() && ia.opcode() == ib.opcode(),
            (
                Self::Block {
                    method: ma,
                    stmts: sa,
                },
                Self::Block {
                    method: mb,
                    stmts: sb,
                },
            ) => ma == mb && sa == sb,
            (
                Self::Return {
                    method: ma,
                    callee: ca,
                    call_index: ia,
                },
                Self::Return {
                    method: mb,
                    callee: cb,
                    call_index: ib,
                },
            ) => ma == mb && ca == cb && ia == ib,
            _ => false,
        }
    }
}

impl Eq for Statement {}

impl Hash for Statement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Entry { method } => {
                0u8.hash(state);
                method.hash(state);
            }
            Self::Exit { method } => {
                1u8.hash(state);
                method.hash(state);
            }
            Self::Basic { method, instr } => {
                2u8.hash(state);
                method.hash(state);
                instr.index().hash(state);
                instr.opcode().hash(state);
            }
            Self::Block { method, stmts } => {
                3u8.hash(state);
                method.hash(state);
                stmts.len().hash(state);
                for stmt in stmts {
                    stmt.hash(state);
                }
            }
            Self::Return {
                method,
                callee,
                call_index,
            } => {
                4u8.hash(state);
                method.hash(state);
                callee.hash(state);
                call_index.hash(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use df_instr::InstrKind;

    fn basic(method: &str, index: u32, opcode: &str) -> Statement {
        Statement::Basic {
            method: method.to_string(),
            instr: Instr::new(index, opcode, InstrKind::Plain),
        }
    }

    #[test]
    fn basic_identity_ignores_flow_sets() {
        let a = Statement::Basic {
            method: "m".to_string(),
            instr: Instr::new(3, "const/4", InstrKind::Plain).with_flow([1], [4]),
        };
        let b = Statement::Basic {
            method: "m".to_string(),
            instr: Instr::new(3, "const/4", InstrKind::Plain).with_flow([2], [5, 6]),
        };
        assert_eq!(a, b);
    }

    #[test]
    fn basic_identity_discriminates_on_opcode_and_index() {
        assert_ne!(basic("m", 3, "const/4"), basic("m", 3, "const/16"));
        assert_ne!(basic("m", 3, "const/4"), basic("m", 4, "const/4"));
        assert_ne!(basic("m", 3, "const/4"), basic("n", 3, "const/4"));
    }

    #[test]
    fn entry_exit_identity() {
        let entry = Statement::Entry {
            method: "m".to_string(),
        };
        let exit = Statement::Exit {
            method: "m".to_string(),
        };
        assert_ne!(entry, exit);
        assert_eq!(
            entry,
            Statement::Entry {
                method: "m".to_string()
            }
        );
    }

    #[test]
    fn block_constructor_enforces_shape() {
        assert_eq!(Statement::block("m", vec![]), None);
        // a one-element sequence collapses to its element
        assert_eq!(
            Statement::block("m", vec![basic("m", 0, "const/4")]),
            Some(basic("m", 0, "const/4"))
        );
        let block = Statement::block(
            "m",
            vec![basic("m", 0, "const/4"), basic("m", 1, "return-void")],
        )
        .unwrap();
        assert!(matches!(block, Statement::Block { .. }));
    }

    #[test]
    fn block_first_last() {
        let block = Statement::Block {
            method: "m".to_string(),
            stmts: vec![basic("m", 0, "const/4"), basic("m", 1, "return-void")],
        };
        assert!(block.contains_index(1));
        assert!(!block.contains_index(2));
        assert_eq!(block.first(), &basic("m", 0, "const/4"));
        assert_eq!(block.last(), &basic("m", 1, "return-void"));
    }
}
