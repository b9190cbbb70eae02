//! Data model of the instruction-stream provider consumed by the `DexFlow`
//! graph engine.
//!
//! The provider (an external bytecode decoder) hands over, for every method,
//! an ordered list of instructions with their code index, an opcode kind
//! classification, and predecessor/successor index sets in which direct and
//! exceptional flow are already merged. This crate only defines those
//! structures, plus the class/method naming scheme used as lookup keys
//! throughout the project; it performs no decoding itself.

pub mod classes;
pub mod errors;
pub mod instrs;
pub mod method;

pub use classes::{ClassDef, CodeModel, MethodBody};
pub use errors::{InstrError, InstrResult};
pub use instrs::{Instr, InstrKind};
pub use method::MethodSig;
