//! Decoded instructions
//!
//! [`Instruction`] pairs an [`Opcode`] with the [`Operands`] of its format.
//! `Operands` is a closed union over the format structs, so every operation
//! is a plain `match` over the format tag.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::encoder::{CodeReader, CodeWriter, DecodeError};
use crate::format::{
    Format10t, Format10x, Format11n, Format11x, Format12x, Format20t, Format21c, Format21s,
    Format21t, Format22b, Format22c, Format22s, Format22t, Format23x, Format35c, Format3rc,
    IndexedItems, InstructionFormat, OperandError,
};
use crate::opcode::{Format, Opcode};

/// Operands of one instruction, tagged by format
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Operands {
    /// 10x
    F10x(Format10x),
    /// 10t
    F10t(Format10t),
    /// 11n
    F11n(Format11n),
    /// 11x
    F11x(Format11x),
    /// 12x
    F12x(Format12x),
    /// 20t
    F20t(Format20t),
    /// 21c
    F21c(Format21c),
    /// 21s
    F21s(Format21s),
    /// 21t
    F21t(Format21t),
    /// 22b
    F22b(Format22b),
    /// 22c
    F22c(Format22c),
    /// 22s
    F22s(Format22s),
    /// 22t
    F22t(Format22t),
    /// 23x
    F23x(Format23x),
    /// 35c
    F35c(Format35c),
    /// 3rc
    F3rc(Format3rc),
}

/// Dispatch a method call to the format struct inside `Operands`
macro_rules! with_format {
    ($operands:expr, $f:ident => $body:expr) => {
        match $operands {
            Operands::F10x($f) => $body,
            Operands::F10t($f) => $body,
            Operands::F11n($f) => $body,
            Operands::F11x($f) => $body,
            Operands::F12x($f) => $body,
            Operands::F20t($f) => $body,
            Operands::F21c($f) => $body,
            Operands::F21s($f) => $body,
            Operands::F21t($f) => $body,
            Operands::F22b($f) => $body,
            Operands::F22c($f) => $body,
            Operands::F22s($f) => $body,
            Operands::F22t($f) => $body,
            Operands::F23x($f) => $body,
            Operands::F35c($f) => $body,
            Operands::F3rc($f) => $body,
        }
    };
}

macro_rules! operands_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Operands {
                fn from(operands: $ty) -> Self {
                    Operands::$variant(operands)
                }
            }
        )*
    };
}

operands_from!(
    F10x(Format10x),
    F10t(Format10t),
    F11n(Format11n),
    F11x(Format11x),
    F12x(Format12x),
    F20t(Format20t),
    F21c(Format21c),
    F21s(Format21s),
    F21t(Format21t),
    F22b(Format22b),
    F22c(Format22c),
    F22s(Format22s),
    F22t(Format22t),
    F23x(Format23x),
    F35c(Format35c),
    F3rc(Format3rc),
);

impl Operands {
    /// Format tag of these operands
    pub fn format(&self) -> Format {
        fn tag<F: InstructionFormat>(_: &F) -> Format {
            F::FORMAT
        }
        with_format!(self, f => tag(f))
    }

    /// Decode operands of `format`
    pub fn decode(format: Format, high: u8, reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        Ok(match format {
            Format::F10x => Format10x::decode(high, reader)?.into(),
            Format::F10t => Format10t::decode(high, reader)?.into(),
            Format::F11n => Format11n::decode(high, reader)?.into(),
            Format::F11x => Format11x::decode(high, reader)?.into(),
            Format::F12x => Format12x::decode(high, reader)?.into(),
            Format::F20t => Format20t::decode(high, reader)?.into(),
            Format::F21c => Format21c::decode(high, reader)?.into(),
            Format::F21s => Format21s::decode(high, reader)?.into(),
            Format::F21t => Format21t::decode(high, reader)?.into(),
            Format::F22b => Format22b::decode(high, reader)?.into(),
            Format::F22c => Format22c::decode(high, reader)?.into(),
            Format::F22s => Format22s::decode(high, reader)?.into(),
            Format::F22t => Format22t::decode(high, reader)?.into(),
            Format::F23x => Format23x::decode(high, reader)?.into(),
            Format::F35c => Format35c::decode(high, reader)?.into(),
            Format::F3rc => Format3rc::decode(high, reader)?.into(),
        })
    }

    /// Operand hash mixed with the format identity
    pub fn format_hash(&self) -> i32 {
        with_format!(self, f => f.format_hash())
    }

    /// Pool index operand, if the format carries one
    pub fn pool_index(&self) -> Option<u32> {
        with_format!(self, f => f.pool_index())
    }
}

/// A single decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    opcode: Opcode,
    operands: Operands,
}

impl Instruction {
    /// Pair an opcode with operands of its format
    pub fn new(opcode: Opcode, operands: impl Into<Operands>) -> Result<Self, OperandError> {
        let operands = operands.into();
        let expected = opcode.format();
        if operands.format() != expected {
            return Err(OperandError::FormatMismatch {
                opcode: opcode.name(),
                expected: expected.name(),
                actual: operands.format().name(),
            });
        }
        Ok(Self { opcode, operands })
    }

    /// Decode one instruction at the reader's position
    pub fn decode(reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        let offset = reader.position();
        let (high, byte) = reader.read_bytes()?;
        let opcode = Opcode::from_u8(byte).ok_or(DecodeError::InvalidOpcode {
            opcode: byte,
            offset,
        })?;
        let operands = Operands::decode(opcode.format(), high, reader)?;
        Ok(Self { opcode, operands })
    }

    /// Encode this instruction, advancing the writer by
    /// [`size_in_units`](Self::size_in_units) units
    pub fn encode(&self, writer: &mut CodeWriter) {
        let opcode = self.opcode;
        with_format!(&self.operands, f => f.encode(opcode, writer))
    }

    /// The opcode
    #[inline]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The operands
    #[inline]
    pub fn operands(&self) -> &Operands {
        &self.operands
    }

    /// The instruction format
    #[inline]
    pub fn format(&self) -> Format {
        self.opcode.format()
    }

    /// Encoded size in 16-bit units
    #[inline]
    pub fn size_in_units(&self) -> usize {
        self.format().size_in_units()
    }

    /// Same operands under another opcode of the same format
    pub fn with_opcode(&self, opcode: Opcode) -> Result<Self, OperandError> {
        Self::new(opcode, self.operands)
    }

    /// Pool index operand, if the format carries one
    pub fn pool_index(&self) -> Option<u32> {
        self.operands.pool_index()
    }

    /// Report the pool entries this instruction references
    pub fn collect_indexed_items(&self, items: &mut IndexedItems) {
        let kind = self.opcode.reference_kind();
        with_format!(&self.operands, f => f.collect_indexed_items(kind, items))
    }

    /// Disassembler-style rendering with hexadecimal literals
    pub fn smali(&self) -> String {
        SmaliDisplay(self).to_string()
    }
}

impl Ord for Instruction {
    fn cmp(&self, other: &Self) -> Ordering {
        self.opcode
            .cmp(&other.opcode)
            .then_with(|| self.operands.cmp(&other.operands))
    }
}

impl PartialOrd for Instruction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Instruction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.opcode.hash(state);
        self.operands.format_hash().hash(state);
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<20} ", self.opcode.name())?;
        with_format!(&self.operands, ops => ops.fmt_operands(f))
    }
}

struct SmaliDisplay<'a>(&'a Instruction);

impl fmt::Display for SmaliDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.0.opcode.name())?;
        with_format!(&self.0.operands, ops => ops.fmt_smali_operands(f))
    }
}

/// Decode a whole body of code
pub fn decode_all(units: &[u16]) -> Result<Vec<Instruction>, DecodeError> {
    let mut reader = CodeReader::new(units);
    let mut instructions = Vec::new();
    while reader.has_more() {
        instructions.push(Instruction::decode(&mut reader)?);
    }
    Ok(instructions)
}

/// Encode a whole body of code
pub fn encode_all(instructions: &[Instruction]) -> Vec<u16> {
    let size = instructions.iter().map(Instruction::size_in_units).sum();
    let mut writer = CodeWriter::with_capacity(size);
    for instruction in instructions {
        instruction.encode(&mut writer);
    }
    writer.finish()
}
