//! Decoded instructions as handed over by the instruction-stream provider.

use crate::method::MethodSig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Opcode kind classification of a decoded instruction.
///
/// The provider collapses the full opcode space into the few classes the
/// graph construction cares about. `Plain` covers every instruction without
/// special control flow (moves, arithmetic, field accesses, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InstrKind {
    If,
    Goto,
    Switch,
    Invoke,
    Return,
    Throw,
    Payload,
    Plain,
}

/// One decoded instruction of a method body.
///
/// Predecessor and successor sets reference code indices within the same
/// method; exceptional flow has already been merged into them by the
/// provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instr {
    index: u32,
    opcode: String,
    kind: InstrKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<MethodSig>,
    #[serde(default)]
    preds: BTreeSet<u32>,
    #[serde(default)]
    succs: BTreeSet<u32>,
}

impl Instr {
    pub fn new(index: u32, opcode: &str, kind: InstrKind) -> Self {
        Self {
            index,
            opcode: opcode.to_string(),
            kind,
            target: None,
            preds: BTreeSet::new(),
            succs: BTreeSet::new(),
        }
    }

    /// Sets the nominal call target (invoke instructions only).
    #[must_use]
    pub fn with_target(mut self, target: MethodSig) -> Self {
        self.target = Some(target);
        self
    }

    #[must_use]
    pub fn with_flow<P, S>(mut self, preds: P, succs: S) -> Self
    where
        P: IntoIterator<Item = u32>,
        S: IntoIterator<Item = u32>,
    {
        self.preds = preds.into_iter().collect();
        self.succs = succs.into_iter().collect();
        self
    }

    #[inline]
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    #[must_use]
    pub fn opcode(&self) -> &str {
        &self.opcode
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> InstrKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> Option<&MethodSig> {
        self.target.as_ref()
    }

    #[inline]
    pub fn preds(&self) -> impl Iterator<Item = u32> + '_ {
        self.preds.iter().copied()
    }

    #[inline]
    pub fn succs(&self) -> impl Iterator<Item = u32> + '_ {
        self.succs.iter().copied()
    }

    #[must_use]
    pub fn nb_succs(&self) -> usize {
        self.succs.len()
    }

    /// Conditional or multi-way branching instruction.
    #[must_use]
    pub fn is_branching(&self) -> bool {
        matches!(self.kind, InstrKind::If | InstrKind::Switch)
    }

    /// Any instruction that transfers control to an explicit target.
    #[must_use]
    pub fn is_jump(&self) -> bool {
        matches!(self.kind, InstrKind::If | InstrKind::Goto | InstrKind::Switch)
    }

    #[must_use]
    pub fn is_invoke(&self) -> bool {
        self.kind == InstrKind::Invoke
    }

    /// Return or throw: leaves the method.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, InstrKind::Return | InstrKind::Throw)
    }

    /// Instructions that must not become graph vertices: payload tables and
    /// trailing instructions that neither continue nor leave the method.
    #[must_use]
    pub fn is_skippable(&self) -> bool {
        self.kind == InstrKind::Payload || (self.succs.is_empty() && !self.is_terminal())
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.index, self.opcode)?;
        if let Some(target) = &self.target {
            write!(f, " {target}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skippable_classification() {
        let payload = Instr::new(10, "packed-switch-payload", InstrKind::Payload);
        assert!(payload.is_skippable());

        let trailing_nop = Instr::new(11, "nop", InstrKind::Plain);
        assert!(trailing_nop.is_skippable());

        let ret = Instr::new(12, "return-void", InstrKind::Return);
        assert!(!ret.is_skippable());

        let plain = Instr::new(0, "const/4", InstrKind::Plain).with_flow([], [1]);
        assert!(!plain.is_skippable());
    }

    #[test]
    fn jump_classification() {
        assert!(Instr::new(0, "if-eqz", InstrKind::If).is_branching());
        assert!(Instr::new(0, "goto", InstrKind::Goto).is_jump());
        assert!(!Instr::new(0, "goto", InstrKind::Goto).is_branching());
    }
}
