//! Shrike register bytecode
//!
//! This crate defines the fixed-width instruction formats of the register
//! machine targeted by the optimizer: opcodes, per-format operand layouts,
//! and the code-unit reader/writer used to decode and encode method bodies.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod encoder;
pub mod format;
pub mod instruction;
pub mod opcode;

pub use encoder::{units_from_bytes, units_to_bytes, CodeReader, CodeWriter, DecodeError};
pub use format::{
    Format10t, Format10x, Format11n, Format11x, Format12x, Format20t, Format21c, Format21s,
    Format21t, Format22b, Format22c, Format22s, Format22t, Format23x, Format35c, Format3rc,
    IndexedItems, InstructionFormat, OperandError,
};
pub use instruction::{decode_all, encode_all, Instruction, Operands};
pub use opcode::{Format, InvokeKind, Opcode, ReferenceKind};
