//! Graph vertices and their derived flags.

use crate::statement::Statement;
use df_instr::InstrKind;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A graph vertex owning exactly one statement.
///
/// All flags are derived at construction time and immutable thereafter.
/// `is_branch_target` cannot be derived from the statement alone (it depends
/// on the kinds of the predecessor instructions, which only the builder
/// sees), so builders pass it in explicitly; it defaults to `false` for
/// synthetic vertices. Vertex identity is statement identity.
#[derive(Debug, Clone)]
pub struct Vertex {
    stmt: Statement,
    is_entry: bool,
    is_exit: bool,
    is_return: bool,
    is_branch_target: bool,
    is_if: bool,
    is_switch: bool,
}

impl Vertex {
    pub fn new(stmt: Statement) -> Self {
        Self::with_branch_target(stmt, false)
    }

    /// Builds a vertex known (by its builder) to be the target of a
    /// branching instruction.
    pub fn with_branch_target(stmt: Statement, is_branch_target: bool) -> Self {
        let is_entry = matches!(stmt, Statement::Entry { .. });
        let is_exit = matches!(stmt, Statement::Exit { .. });
        // a continuation block opens with its virtual return marker
        let is_return = matches!(stmt.first(), Statement::Return { .. });
        let last_kind = stmt.last().instruction().map(df_instr::Instr::kind);
        let is_if = last_kind == Some(InstrKind::If);
        let is_switch = last_kind == Some(InstrKind::Switch);
        Self {
            stmt,
            is_entry,
            is_exit,
            is_return,
            is_branch_target: is_branch_target && !(is_entry || is_exit || is_return),
            is_if,
            is_switch,
        }
    }

    #[inline]
    #[must_use]
    pub fn statement(&self) -> &Statement {
        &self.stmt
    }

    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        self.stmt.method()
    }

    #[inline]
    #[must_use]
    pub fn is_entry(&self) -> bool {
        self.is_entry
    }

    #[inline]
    #[must_use]
    pub fn is_exit(&self) -> bool {
        self.is_exit
    }

    #[inline]
    #[must_use]
    pub fn is_return(&self) -> bool {
        self.is_return
    }

    #[inline]
    #[must_use]
    pub fn is_branch_target(&self) -> bool {
        self.is_branch_target
    }

    #[inline]
    #[must_use]
    pub fn is_if(&self) -> bool {
        self.is_if
    }

    #[inline]
    #[must_use]
    pub fn is_switch(&self) -> bool {
        self.is_switch
    }

    /// Whether the statement wraps at least one call instruction.
    #[must_use]
    pub fn is_invoke(&self) -> bool {
        !self.stmt.invoke_targets().is_empty()
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.stmt.fmt(f)
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.stmt == other.stmt
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.stmt.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use df_instr::Instr;

    #[test]
    fn flags_for_entry_exit() {
        let entry = Vertex::new(Statement::Entry {
            method: "m".to_string(),
        });
        assert!(entry.is_entry());
        assert!(!entry.is_exit() && !entry.is_return() && !entry.is_if());

        let exit = Vertex::new(Statement::Exit {
            method: "m".to_string(),
        });
        assert!(exit.is_exit());
    }

    #[test]
    fn flags_for_branching_statements() {
        let if_vertex = Vertex::new(Statement::Basic {
            method: "m".to_string(),
            instr: Instr::new(4, "if-eqz", InstrKind::If),
        });
        assert!(if_vertex.is_if());
        assert!(!if_vertex.is_switch());

        let block = Vertex::new(Statement::Block {
            method: "m".to_string(),
            stmts: vec![
                Statement::Basic {
                    method: "m".to_string(),
                    instr: Instr::new(0, "const/4", InstrKind::Plain),
                },
                Statement::Basic {
                    method: "m".to_string(),
                    instr: Instr::new(1, "packed-switch", InstrKind::Switch),
                },
            ],
        });
        assert!(block.is_switch());
        assert!(!block.is_if());
    }

    #[test]
    fn continuation_blocks_carry_the_return_flag() {
        let marker = Statement::Return {
            method: "m".to_string(),
            callee: "n".to_string(),
            call_index: 1,
        };
        assert!(Vertex::new(marker.clone()).is_return());

        let continuation = Vertex::new(Statement::Block {
            method: "m".to_string(),
            stmts: vec![
                marker,
                Statement::Basic {
                    method: "m".to_string(),
                    instr: Instr::new(2, "return-void", InstrKind::Return),
                },
            ],
        });
        assert!(continuation.is_return());
    }

    #[test]
    fn branch_target_flag_is_builder_provided() {
        let stmt = Statement::Basic {
            method: "m".to_string(),
            instr: Instr::new(2, "const/4", InstrKind::Plain),
        };
        assert!(!Vertex::new(stmt.clone()).is_branch_target());
        assert!(Vertex::with_branch_target(stmt, true).is_branch_target());
    }
}
