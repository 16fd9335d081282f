//! Instruction formats
//!
//! One struct per fixed-width format. Each format knows how to decode itself
//! from a [`CodeReader`] (after the opcode unit's low byte was consumed),
//! encode itself, order and hash its operands, render them, and report the
//! pool entries it references.
//!
//! The representative format is [`Format22b`]: `AA|op CC|BB`, an 8-bit
//! destination register, an 8-bit source register and a signed 8-bit literal.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::encoder::{combine_bytes, combine_nibbles, CodeReader, CodeWriter, DecodeError};
use crate::opcode::{Format, Opcode, ReferenceKind};

/// Errors raised when constructing an instruction from out-of-range parts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperandError {
    /// Operand outside the range its bit width allows
    #[error("Operand {operand} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Operand name (`A`, `B`, ...)
        operand: &'static str,
        /// Rejected value
        value: i64,
        /// Smallest allowed value
        min: i64,
        /// Largest allowed value
        max: i64,
    },

    /// Operands built for another format than the opcode requires
    #[error("Opcode {opcode} requires format {expected}, got {actual}")]
    FormatMismatch {
        /// Opcode mnemonic
        opcode: &'static str,
        /// Format the opcode uses
        expected: &'static str,
        /// Format of the supplied operands
        actual: &'static str,
    },

    /// Too many registers for a 35c invoke
    #[error("Invoke takes at most 5 registers, got {0}")]
    TooManyRegisters(usize),
}

fn check(operand: &'static str, value: i64, min: i64, max: i64) -> Result<i64, OperandError> {
    if value < min || value > max {
        return Err(OperandError::OutOfRange {
            operand,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

fn u4(operand: &'static str, value: i32) -> Result<u8, OperandError> {
    check(operand, value as i64, 0, 0xF).map(|v| v as u8)
}

fn s4(operand: &'static str, value: i32) -> Result<i8, OperandError> {
    check(operand, value as i64, -8, 7).map(|v| v as i8)
}

fn u8_(operand: &'static str, value: i32) -> Result<u8, OperandError> {
    check(operand, value as i64, 0, u8::MAX as i64).map(|v| v as u8)
}

fn s8(operand: &'static str, value: i32) -> Result<i8, OperandError> {
    check(operand, value as i64, i8::MIN as i64, i8::MAX as i64).map(|v| v as i8)
}

fn u16_(operand: &'static str, value: i32) -> Result<u16, OperandError> {
    check(operand, value as i64, 0, u16::MAX as i64).map(|v| v as u16)
}

fn s16(operand: &'static str, value: i32) -> Result<i16, OperandError> {
    check(operand, value as i64, i16::MIN as i64, i16::MAX as i64).map(|v| v as i16)
}

/// Pool indices referenced by a body of code, grouped by pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedItems {
    /// String pool indices
    pub strings: BTreeSet<u32>,
    /// Type pool indices
    pub types: BTreeSet<u32>,
    /// Field pool indices
    pub fields: BTreeSet<u32>,
    /// Method pool indices
    pub methods: BTreeSet<u32>,
}

impl IndexedItems {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reference
    pub fn add(&mut self, kind: ReferenceKind, index: u32) {
        match kind {
            ReferenceKind::String => self.strings.insert(index),
            ReferenceKind::Type => self.types.insert(index),
            ReferenceKind::Field => self.fields.insert(index),
            ReferenceKind::Method => self.methods.insert(index),
        };
    }

    /// Check if nothing was referenced
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
            && self.types.is_empty()
            && self.fields.is_empty()
            && self.methods.is_empty()
    }
}

/// Operations every fixed-width format supports
pub trait InstructionFormat: Copy + Ord + fmt::Debug {
    /// The format these operands belong to
    const FORMAT: Format;

    /// Decode the operands; `high` is the high byte of the opcode unit,
    /// which has already been consumed
    fn decode(high: u8, reader: &mut CodeReader<'_>) -> Result<Self, DecodeError>;

    /// Write the opcode unit and the operand units
    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter);

    /// Operand bits packed into one integer, the basis of [`format_hash`]
    ///
    /// [`format_hash`]: InstructionFormat::format_hash
    fn packed(&self) -> i32;

    /// Hash of the operands mixed with the format identity
    fn format_hash(&self) -> i32 {
        self.packed() ^ Self::FORMAT.discriminant()
    }

    /// Human-readable operand text
    fn fmt_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;

    /// Disassembler-style operand text
    fn fmt_smali_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_operands(f)
    }

    /// Report referenced pool entries; `kind` comes from the opcode
    fn collect_indexed_items(&self, _kind: Option<ReferenceKind>, _items: &mut IndexedItems) {}

    /// Pool index operand, for formats that carry one
    fn pool_index(&self) -> Option<u32> {
        None
    }
}

// ============================================================================
// 22b: the representative three-operand format
// ============================================================================

/// `AA|op CC|BB`: `vAA`, `vBB` and a signed 8-bit literal `#CC`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Format22b {
    /// Destination register
    pub aa: u8,
    /// Source register
    pub bb: u8,
    /// Signed literal
    pub cc: i8,
}

impl Format22b {
    /// Build from raw operand values, rejecting anything out of range
    pub fn new(a: i32, b: i32, c: i32) -> Result<Self, OperandError> {
        Ok(Self {
            aa: u8_("A", a)?,
            bb: u8_("B", b)?,
            cc: s8("C", c)?,
        })
    }
}

impl InstructionFormat for Format22b {
    const FORMAT: Format = Format::F22b;

    fn decode(high: u8, reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        let (cc, bb) = reader.read_bytes()?;
        Ok(Self {
            aa: high,
            bb,
            cc: cc as i8,
        })
    }

    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter) {
        writer.write_first(self.aa, opcode.to_u8());
        writer.write_u16(combine_bytes(self.cc as u8, self.bb));
    }

    fn packed(&self) -> i32 {
        // C contributes its low byte only so a negative literal leaves A and B intact
        ((self.aa as i32) << 16) | ((self.bb as i32) << 8) | (self.cc as u8 as i32)
    }

    fn fmt_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}, v{}, #{}", self.aa, self.bb, self.cc)
    }

    fn fmt_smali_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{}, v{}, 0x{:02x}  # {}",
            self.aa, self.bb, self.cc as u8, self.cc
        )
    }
}

// ============================================================================
// Single-unit formats
// ============================================================================

/// `ØØ|op`: no operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Format10x;

impl InstructionFormat for Format10x {
    const FORMAT: Format = Format::F10x;

    fn decode(_high: u8, _reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self)
    }

    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter) {
        writer.write_first(0, opcode.to_u8());
    }

    fn packed(&self) -> i32 {
        0
    }

    fn fmt_operands(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}

/// `AA|op`: signed 8-bit branch offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Format10t {
    /// Branch offset in units
    pub aa: i8,
}

impl Format10t {
    /// Build from a raw offset
    pub fn new(offset: i32) -> Result<Self, OperandError> {
        Ok(Self { aa: s8("A", offset)? })
    }
}

impl InstructionFormat for Format10t {
    const FORMAT: Format = Format::F10t;

    fn decode(high: u8, _reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self { aa: high as i8 })
    }

    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter) {
        writer.write_first(self.aa as u8, opcode.to_u8());
    }

    fn packed(&self) -> i32 {
        self.aa as i32
    }

    fn fmt_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.aa)
    }
}

/// `B|A|op`: `vA` and a signed 4-bit literal `#B`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Format11n {
    /// Destination register
    pub a: u8,
    /// Signed literal
    pub b: i8,
}

impl Format11n {
    /// Build from raw operand values
    pub fn new(a: i32, b: i32) -> Result<Self, OperandError> {
        Ok(Self {
            a: u4("A", a)?,
            b: s4("B", b)?,
        })
    }
}

impl InstructionFormat for Format11n {
    const FORMAT: Format = Format::F11n;

    fn decode(high: u8, _reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            a: high & 0xF,
            b: (high as i8) >> 4,
        })
    }

    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter) {
        writer.write_first(combine_nibbles(self.b as u8, self.a), opcode.to_u8());
    }

    fn packed(&self) -> i32 {
        ((self.a as i32) << 4) | self.b as i32
    }

    fn fmt_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}, #{}", self.a, self.b)
    }

    fn fmt_smali_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}, 0x{:x}  # {}", self.a, self.b as u8 & 0xF, self.b)
    }
}

/// `AA|op`: one 8-bit register
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Format11x {
    /// Register
    pub aa: u8,
}

impl Format11x {
    /// Build from a raw register number
    pub fn new(a: i32) -> Result<Self, OperandError> {
        Ok(Self { aa: u8_("A", a)? })
    }
}

impl InstructionFormat for Format11x {
    const FORMAT: Format = Format::F11x;

    fn decode(high: u8, _reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self { aa: high })
    }

    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter) {
        writer.write_first(self.aa, opcode.to_u8());
    }

    fn packed(&self) -> i32 {
        self.aa as i32
    }

    fn fmt_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.aa)
    }
}

/// `B|A|op`: two 4-bit registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Format12x {
    /// Destination register
    pub a: u8,
    /// Source register
    pub b: u8,
}

impl Format12x {
    /// Build from raw register numbers
    pub fn new(a: i32, b: i32) -> Result<Self, OperandError> {
        Ok(Self {
            a: u4("A", a)?,
            b: u4("B", b)?,
        })
    }
}

impl InstructionFormat for Format12x {
    const FORMAT: Format = Format::F12x;

    fn decode(high: u8, _reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            a: high & 0xF,
            b: high >> 4,
        })
    }

    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter) {
        writer.write_first(combine_nibbles(self.b, self.a), opcode.to_u8());
    }

    fn packed(&self) -> i32 {
        ((self.a as i32) << 4) | self.b as i32
    }

    fn fmt_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}, v{}", self.a, self.b)
    }
}

// ============================================================================
// Two-unit formats
// ============================================================================

/// `ØØ|op AAAA`: signed 16-bit branch offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Format20t {
    /// Branch offset in units
    pub aaaa: i16,
}

impl Format20t {
    /// Build from a raw offset
    pub fn new(offset: i32) -> Result<Self, OperandError> {
        Ok(Self {
            aaaa: s16("A", offset)?,
        })
    }
}

impl InstructionFormat for Format20t {
    const FORMAT: Format = Format::F20t;

    fn decode(_high: u8, reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            aaaa: reader.read_i16()?,
        })
    }

    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter) {
        writer.write_first(0, opcode.to_u8());
        writer.write_i16(self.aaaa);
    }

    fn packed(&self) -> i32 {
        self.aaaa as i32
    }

    fn fmt_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.aaaa)
    }
}

/// `AA|op BBBB`: `vAA` and a 16-bit pool index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Format21c {
    /// Register
    pub aa: u8,
    /// Pool index
    pub bbbb: u16,
}

impl Format21c {
    /// Build from raw operand values
    pub fn new(a: i32, index: i32) -> Result<Self, OperandError> {
        Ok(Self {
            aa: u8_("A", a)?,
            bbbb: u16_("B", index)?,
        })
    }
}

impl InstructionFormat for Format21c {
    const FORMAT: Format = Format::F21c;

    fn decode(high: u8, reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            aa: high,
            bbbb: reader.read_u16()?,
        })
    }

    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter) {
        writer.write_first(self.aa, opcode.to_u8());
        writer.write_u16(self.bbbb);
    }

    fn packed(&self) -> i32 {
        ((self.aa as i32) << 16) | self.bbbb as i32
    }

    fn fmt_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}, @{}", self.aa, self.bbbb)
    }

    fn collect_indexed_items(&self, kind: Option<ReferenceKind>, items: &mut IndexedItems) {
        if let Some(kind) = kind {
            items.add(kind, self.bbbb as u32);
        }
    }

    fn pool_index(&self) -> Option<u32> {
        Some(self.bbbb as u32)
    }
}

/// `AA|op BBBB`: `vAA` and a signed 16-bit literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Format21s {
    /// Destination register
    pub aa: u8,
    /// Signed literal
    pub bbbb: i16,
}

impl Format21s {
    /// Build from raw operand values
    pub fn new(a: i32, literal: i32) -> Result<Self, OperandError> {
        Ok(Self {
            aa: u8_("A", a)?,
            bbbb: s16("B", literal)?,
        })
    }
}

impl InstructionFormat for Format21s {
    const FORMAT: Format = Format::F21s;

    fn decode(high: u8, reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            aa: high,
            bbbb: reader.read_i16()?,
        })
    }

    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter) {
        writer.write_first(self.aa, opcode.to_u8());
        writer.write_i16(self.bbbb);
    }

    fn packed(&self) -> i32 {
        ((self.aa as i32) << 16) | (self.bbbb as u16 as i32)
    }

    fn fmt_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}, #{}", self.aa, self.bbbb)
    }

    fn fmt_smali_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{}, 0x{:04x}  # {}",
            self.aa, self.bbbb as u16, self.bbbb
        )
    }
}

/// `AA|op BBBB`: `vAA` and a signed 16-bit branch offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Format21t {
    /// Tested register
    pub aa: u8,
    /// Branch offset in units
    pub bbbb: i16,
}

impl Format21t {
    /// Build from raw operand values
    pub fn new(a: i32, offset: i32) -> Result<Self, OperandError> {
        Ok(Self {
            aa: u8_("A", a)?,
            bbbb: s16("B", offset)?,
        })
    }
}

impl InstructionFormat for Format21t {
    const FORMAT: Format = Format::F21t;

    fn decode(high: u8, reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            aa: high,
            bbbb: reader.read_i16()?,
        })
    }

    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter) {
        writer.write_first(self.aa, opcode.to_u8());
        writer.write_i16(self.bbbb);
    }

    fn packed(&self) -> i32 {
        ((self.aa as i32) << 16) | (self.bbbb as u16 as i32)
    }

    fn fmt_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}, {:+}", self.aa, self.bbbb)
    }
}

/// `B|A|op CCCC`: two 4-bit registers and a 16-bit pool index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Format22c {
    /// Value register
    pub a: u8,
    /// Object register
    pub b: u8,
    /// Pool index
    pub cccc: u16,
}

impl Format22c {
    /// Build from raw operand values
    pub fn new(a: i32, b: i32, index: i32) -> Result<Self, OperandError> {
        Ok(Self {
            a: u4("A", a)?,
            b: u4("B", b)?,
            cccc: u16_("C", index)?,
        })
    }
}

impl InstructionFormat for Format22c {
    const FORMAT: Format = Format::F22c;

    fn decode(high: u8, reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            a: high & 0xF,
            b: high >> 4,
            cccc: reader.read_u16()?,
        })
    }

    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter) {
        writer.write_first(combine_nibbles(self.b, self.a), opcode.to_u8());
        writer.write_u16(self.cccc);
    }

    fn packed(&self) -> i32 {
        ((self.a as i32) << 20) | ((self.b as i32) << 16) | self.cccc as i32
    }

    fn fmt_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}, v{}, @{}", self.a, self.b, self.cccc)
    }

    fn collect_indexed_items(&self, kind: Option<ReferenceKind>, items: &mut IndexedItems) {
        if let Some(kind) = kind {
            items.add(kind, self.cccc as u32);
        }
    }

    fn pool_index(&self) -> Option<u32> {
        Some(self.cccc as u32)
    }
}

/// `B|A|op CCCC`: two 4-bit registers and a signed 16-bit literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Format22s {
    /// Destination register
    pub a: u8,
    /// Source register
    pub b: u8,
    /// Signed literal
    pub cccc: i16,
}

impl Format22s {
    /// Build from raw operand values
    pub fn new(a: i32, b: i32, literal: i32) -> Result<Self, OperandError> {
        Ok(Self {
            a: u4("A", a)?,
            b: u4("B", b)?,
            cccc: s16("C", literal)?,
        })
    }
}

impl InstructionFormat for Format22s {
    const FORMAT: Format = Format::F22s;

    fn decode(high: u8, reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            a: high & 0xF,
            b: high >> 4,
            cccc: reader.read_i16()?,
        })
    }

    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter) {
        writer.write_first(combine_nibbles(self.b, self.a), opcode.to_u8());
        writer.write_i16(self.cccc);
    }

    fn packed(&self) -> i32 {
        ((self.a as i32) << 20) | ((self.b as i32) << 16) | (self.cccc as u16 as i32)
    }

    fn fmt_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}, v{}, #{}", self.a, self.b, self.cccc)
    }

    fn fmt_smali_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{}, v{}, 0x{:04x}  # {}",
            self.a, self.b, self.cccc as u16, self.cccc
        )
    }
}

/// `B|A|op CCCC`: two 4-bit registers and a signed branch offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Format22t {
    /// First compared register
    pub a: u8,
    /// Second compared register
    pub b: u8,
    /// Branch offset in units
    pub cccc: i16,
}

impl Format22t {
    /// Build from raw operand values
    pub fn new(a: i32, b: i32, offset: i32) -> Result<Self, OperandError> {
        Ok(Self {
            a: u4("A", a)?,
            b: u4("B", b)?,
            cccc: s16("C", offset)?,
        })
    }
}

impl InstructionFormat for Format22t {
    const FORMAT: Format = Format::F22t;

    fn decode(high: u8, reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            a: high & 0xF,
            b: high >> 4,
            cccc: reader.read_i16()?,
        })
    }

    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter) {
        writer.write_first(combine_nibbles(self.b, self.a), opcode.to_u8());
        writer.write_i16(self.cccc);
    }

    fn packed(&self) -> i32 {
        ((self.a as i32) << 20) | ((self.b as i32) << 16) | (self.cccc as u16 as i32)
    }

    fn fmt_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}, v{}, {:+}", self.a, self.b, self.cccc)
    }
}

/// `AA|op CC|BB`: three 8-bit registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Format23x {
    /// Destination register
    pub aa: u8,
    /// First source register
    pub bb: u8,
    /// Second source register
    pub cc: u8,
}

impl Format23x {
    /// Build from raw register numbers
    pub fn new(a: i32, b: i32, c: i32) -> Result<Self, OperandError> {
        Ok(Self {
            aa: u8_("A", a)?,
            bb: u8_("B", b)?,
            cc: u8_("C", c)?,
        })
    }
}

impl InstructionFormat for Format23x {
    const FORMAT: Format = Format::F23x;

    fn decode(high: u8, reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        let (cc, bb) = reader.read_bytes()?;
        Ok(Self { aa: high, bb, cc })
    }

    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter) {
        writer.write_first(self.aa, opcode.to_u8());
        writer.write_u16(combine_bytes(self.cc, self.bb));
    }

    fn packed(&self) -> i32 {
        ((self.aa as i32) << 16) | ((self.bb as i32) << 8) | self.cc as i32
    }

    fn fmt_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}, v{}, v{}", self.aa, self.bb, self.cc)
    }
}

// ============================================================================
// Three-unit formats
// ============================================================================

/// `A|G|op BBBB F|E|D|C`: up to five 4-bit argument registers and a method
/// pool index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Format35c {
    /// Argument count
    pub a: u8,
    /// Argument registers C, D, E, F, G (entries past `a` are zero)
    pub registers: [u8; 5],
    /// Pool index
    pub bbbb: u16,
}

impl Format35c {
    /// Build from a pool index and the argument registers
    pub fn new(index: i32, registers: &[i32]) -> Result<Self, OperandError> {
        if registers.len() > 5 {
            return Err(OperandError::TooManyRegisters(registers.len()));
        }
        const NAMES: [&str; 5] = ["C", "D", "E", "F", "G"];
        let mut regs = [0u8; 5];
        for (i, &reg) in registers.iter().enumerate() {
            regs[i] = u4(NAMES[i], reg)?;
        }
        Ok(Self {
            a: registers.len() as u8,
            registers: regs,
            bbbb: u16_("B", index)?,
        })
    }

    /// The registers actually passed
    pub fn arguments(&self) -> &[u8] {
        &self.registers[..(self.a as usize).min(5)]
    }
}

impl InstructionFormat for Format35c {
    const FORMAT: Format = Format::F35c;

    fn decode(high: u8, reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        let bbbb = reader.read_u16()?;
        let unit = reader.read_u16()?;
        let a = high >> 4;
        let mut registers = [
            (unit & 0xF) as u8,
            ((unit >> 4) & 0xF) as u8,
            ((unit >> 8) & 0xF) as u8,
            ((unit >> 12) & 0xF) as u8,
            high & 0xF,
        ];
        for unused in registers.iter_mut().skip(a as usize) {
            *unused = 0;
        }
        Ok(Self { a, registers, bbbb })
    }

    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter) {
        let [c, d, e, f, g] = self.registers;
        writer.write_first(combine_nibbles(self.a, g), opcode.to_u8());
        writer.write_u16(self.bbbb);
        writer.write_u16(combine_bytes(combine_nibbles(f, e), combine_nibbles(d, c)));
    }

    fn packed(&self) -> i32 {
        let [c, d, e, f, g] = self.registers;
        let regs = (self.a as i32) << 20
            | (c as i32) << 16
            | (d as i32) << 12
            | (e as i32) << 8
            | (f as i32) << 4
            | g as i32;
        regs ^ ((self.bbbb as i32) << 8)
    }

    fn fmt_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        for (i, reg) in self.arguments().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "v{}", reg)?;
        }
        write!(f, " }}, @{}", self.bbbb)
    }

    fn collect_indexed_items(&self, kind: Option<ReferenceKind>, items: &mut IndexedItems) {
        if let Some(kind) = kind {
            items.add(kind, self.bbbb as u32);
        }
    }

    fn pool_index(&self) -> Option<u32> {
        Some(self.bbbb as u32)
    }
}

/// `AA|op BBBB CCCC`: a register range `vCCCC .. vCCCC+AA-1` and a method
/// pool index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Format3rc {
    /// Argument count
    pub aa: u8,
    /// First argument register
    pub cccc: u16,
    /// Pool index
    pub bbbb: u16,
}

impl Format3rc {
    /// Build from raw operand values
    pub fn new(count: i32, index: i32, first: i32) -> Result<Self, OperandError> {
        let aa = u8_("A", count)?;
        let cccc = u16_("C", first)?;
        // The range must stay addressable.
        check("C", first as i64 + count as i64, 0, u16::MAX as i64 + 1)?;
        Ok(Self {
            aa,
            cccc,
            bbbb: u16_("B", index)?,
        })
    }
}

impl InstructionFormat for Format3rc {
    const FORMAT: Format = Format::F3rc;

    fn decode(high: u8, reader: &mut CodeReader<'_>) -> Result<Self, DecodeError> {
        let bbbb = reader.read_u16()?;
        let cccc = reader.read_u16()?;
        Ok(Self {
            aa: high,
            cccc,
            bbbb,
        })
    }

    fn encode(&self, opcode: Opcode, writer: &mut CodeWriter) {
        writer.write_first(self.aa, opcode.to_u8());
        writer.write_u16(self.bbbb);
        writer.write_u16(self.cccc);
    }

    fn packed(&self) -> i32 {
        (((self.aa as i32) << 16) | self.cccc as i32) ^ ((self.bbbb as i32) << 8)
    }

    fn fmt_operands(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.aa == 0 {
            return write!(f, "{{ }}, @{}", self.bbbb);
        }
        let last = self.cccc as u32 + self.aa as u32 - 1;
        write!(f, "{{ v{} .. v{} }}, @{}", self.cccc, last, self.bbbb)
    }

    fn collect_indexed_items(&self, kind: Option<ReferenceKind>, items: &mut IndexedItems) {
        if let Some(kind) = kind {
            items.add(kind, self.bbbb as u32);
        }
    }

    fn pool_index(&self) -> Option<u32> {
        Some(self.bbbb as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<F: InstructionFormat>(operands: F, opcode: Opcode) -> Vec<u16> {
        let mut writer = CodeWriter::new();
        operands.encode(opcode, &mut writer);
        writer.finish()
    }

    fn decode<F: InstructionFormat>(units: &[u16]) -> F {
        let mut reader = CodeReader::new(units);
        let (high, _op) = reader.read_bytes().unwrap();
        F::decode(high, &mut reader).unwrap()
    }

    #[test]
    fn test_22b_layout() {
        let insn = Format22b::new(0x12, 0x34, -2).unwrap();
        let units = encode(insn, Opcode::AddIntLit8);
        assert_eq!(units, vec![0x12D8, 0xFE34]);
        assert_eq!(decode::<Format22b>(&units), insn);
    }

    #[test]
    fn test_22b_range_enforcement() {
        assert!(Format22b::new(256, 0, 0).is_err());
        assert!(Format22b::new(0, -1, 0).is_err());
        assert!(Format22b::new(0, 0, 128).is_err());
        assert!(Format22b::new(0, 0, -129).is_err());
        assert_eq!(
            Format22b::new(0, 0, 128),
            Err(OperandError::OutOfRange {
                operand: "C",
                value: 128,
                min: -128,
                max: 127
            })
        );
        assert!(Format22b::new(255, 255, -128).is_ok());
    }

    #[test]
    fn test_22b_truncated_stream() {
        let units = [0x01D8];
        let mut reader = CodeReader::new(&units);
        let (high, _) = reader.read_bytes().unwrap();
        assert_eq!(
            Format22b::decode(high, &mut reader),
            Err(DecodeError::UnexpectedEnd(1))
        );
    }

    #[test]
    fn test_22b_ordering_uses_signed_literal() {
        let low = Format22b::new(1, 1, -5).unwrap();
        let high = Format22b::new(1, 1, 5).unwrap();
        assert!(low < high);
        let by_b = Format22b::new(1, 0, 100).unwrap();
        assert!(by_b < low);
    }

    #[test]
    fn test_hash_differs_across_formats() {
        let lit = Format22b::new(1, 2, 3).unwrap();
        let regs = Format23x::new(1, 2, 3).unwrap();
        assert_eq!(lit.packed(), regs.packed());
        assert_ne!(lit.format_hash(), regs.format_hash());
    }

    #[test]
    fn test_11n_sign_extension() {
        let insn = Format11n::new(3, -8).unwrap();
        let units = encode(insn, Opcode::Const4);
        assert_eq!(decode::<Format11n>(&units), insn);
        assert!(Format11n::new(16, 0).is_err());
        assert!(Format11n::new(0, 8).is_err());
    }

    #[test]
    fn test_35c_roundtrip() {
        let insn = Format35c::new(0x1234, &[1, 2, 3, 4, 5]).unwrap();
        let units = encode(insn, Opcode::InvokeStatic);
        assert_eq!(units.len(), 3);
        assert_eq!(decode::<Format35c>(&units), insn);
        assert_eq!(insn.arguments(), &[1, 2, 3, 4, 5]);
        assert!(Format35c::new(0, &[0, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_35c_decode_clears_unused_registers() {
        // two arguments, stale nibbles in E, F and G
        let units = [0x2F00 | Opcode::InvokeStatic.to_u8() as u16, 0x0042, 0xAB21];
        let decoded = decode::<Format35c>(&units);
        let built = Format35c::new(0x42, &[1, 2]).unwrap();
        assert_eq!(decoded, built);
        assert_eq!(decoded.format_hash(), built.format_hash());
        assert_eq!(decoded.arguments(), &[1, 2]);
    }

    #[test]
    fn test_22b_negative_literal_keeps_registers_in_hash() {
        let x = Format22b::new(1, 2, -1).unwrap();
        let y = Format22b::new(7, 9, -1).unwrap();
        assert_ne!(x.packed(), y.packed());
        assert_eq!(x.packed(), 0x0102FF);
    }

    #[test]
    fn test_3rc_roundtrip() {
        let insn = Format3rc::new(7, 99, 300).unwrap();
        let units = encode(insn, Opcode::InvokeVirtualRange);
        assert_eq!(decode::<Format3rc>(&units), insn);
    }

    #[test]
    fn test_indexed_items_only_for_references() {
        let mut items = IndexedItems::new();
        Format22b::new(1, 2, 3)
            .unwrap()
            .collect_indexed_items(None, &mut items);
        assert!(items.is_empty());

        Format21c::new(0, 42)
            .unwrap()
            .collect_indexed_items(Some(ReferenceKind::Field), &mut items);
        assert!(items.fields.contains(&42));
    }
}
