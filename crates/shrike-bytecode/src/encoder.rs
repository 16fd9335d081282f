//! Code-unit encoding and decoding utilities
//!
//! Instructions are sequences of 16-bit code units. The writer appends units,
//! the reader consumes them and reports truncation as a [`DecodeError`].

use thiserror::Error;

/// Errors that can occur while decoding an instruction stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The stream ended in the middle of an instruction
    #[error("Unexpected end of code at unit {0}")]
    UnexpectedEnd(usize),

    /// The opcode byte does not name a known instruction
    #[error("Invalid opcode {opcode:#04x} at unit {offset}")]
    InvalidOpcode {
        /// The offending opcode byte
        opcode: u8,
        /// Unit offset of the instruction
        offset: usize,
    },

    /// A byte stream that cannot be split into 16-bit units
    #[error("Code byte length {0} is not a multiple of two")]
    OddLength(usize),
}

/// Writer for 16-bit code units
///
/// Keeps a cursor equal to the number of units written so far.
pub struct CodeWriter {
    units: Vec<u16>,
}

impl CodeWriter {
    /// Create a new writer
    pub fn new() -> Self {
        Self { units: Vec::new() }
    }

    /// Create a new writer with capacity (in units)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            units: Vec::with_capacity(capacity),
        }
    }

    /// Current cursor position (units written)
    #[inline]
    pub fn position(&self) -> usize {
        self.units.len()
    }

    /// Write the first unit of an instruction: opcode in the low byte,
    /// `high` in the high byte
    #[inline]
    pub fn write_first(&mut self, high: u8, opcode: u8) {
        self.units.push(combine_bytes(high, opcode));
    }

    /// Write a raw 16-bit unit
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.units.push(value);
    }

    /// Write a signed 16-bit unit
    #[inline]
    pub fn write_i16(&mut self, value: i16) {
        self.units.push(value as u16);
    }

    /// Get the units written so far
    pub fn units(&self) -> &[u16] {
        &self.units
    }

    /// Consume the writer and return the units
    pub fn finish(self) -> Vec<u16> {
        self.units
    }

    /// Consume the writer and return the little-endian byte encoding
    pub fn into_bytes(self) -> Vec<u8> {
        units_to_bytes(&self.units)
    }
}

impl Default for CodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader over 16-bit code units
pub struct CodeReader<'a> {
    units: &'a [u16],
    position: usize,
}

impl<'a> CodeReader<'a> {
    /// Create a new reader
    pub fn new(units: &'a [u16]) -> Self {
        Self { units, position: 0 }
    }

    /// Current unit offset
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Check if there are more units to read
    #[inline]
    pub fn has_more(&self) -> bool {
        self.position < self.units.len()
    }

    /// Read the next unit
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let value = *self
            .units
            .get(self.position)
            .ok_or(DecodeError::UnexpectedEnd(self.position))?;
        self.position += 1;
        Ok(value)
    }

    /// Read the next unit as a signed value
    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        self.read_u16().map(|unit| unit as i16)
    }

    /// Read the next unit split into `(high, low)` bytes
    pub fn read_bytes(&mut self) -> Result<(u8, u8), DecodeError> {
        let unit = self.read_u16()?;
        Ok(((unit >> 8) as u8, unit as u8))
    }
}

/// Pack two bytes into one unit, `high` in bits 15-8
#[inline]
pub fn combine_bytes(high: u8, low: u8) -> u16 {
    (high as u16) << 8 | low as u16
}

/// Pack two nibbles into one byte, `high` in bits 7-4
#[inline]
pub fn combine_nibbles(high: u8, low: u8) -> u8 {
    (high & 0xF) << 4 | (low & 0xF)
}

/// Split a byte stream into little-endian 16-bit units
pub fn units_from_bytes(bytes: &[u8]) -> Result<Vec<u16>, DecodeError> {
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddLength(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Serialize units as little-endian bytes
pub fn units_to_bytes(units: &[u16]) -> Vec<u8> {
    units.iter().flat_map(|unit| unit.to_le_bytes()).collect()
}
