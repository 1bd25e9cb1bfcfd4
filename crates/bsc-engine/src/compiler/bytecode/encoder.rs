//! Bytecode encoding and decoding utilities

use super::opcode::Opcode;
use thiserror::Error;

/// Errors that can occur during bytecode decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Unexpected end of bytecode stream
    #[error("Unexpected end of bytecode at offset {0}")]
    UnexpectedEnd(usize),

    /// Invalid opcode
    #[error("Invalid opcode {0:#04x} at offset {1}")]
    InvalidOpcode(u8, usize),
}

/// Bytecode writer for encoding instructions
///
/// Provides methods for emitting opcodes and their operands into a binary buffer.
#[derive(Debug, Default)]
pub struct BytecodeWriter {
    buffer: Vec<u8>,
}

impl BytecodeWriter {
    /// Create a new bytecode writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Get the current bytecode buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the bytecode buffer
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get the current offset (length of bytecode)
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    // ===== Basic Emission =====

    /// Emit a raw byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Emit a 16-bit unsigned integer (little-endian)
    pub fn emit_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit an opcode without operands
    pub fn emit_opcode(&mut self, opcode: Opcode) {
        self.emit_u8(opcode.to_u8());
    }

    // ===== Stack =====

    pub fn emit_push8(&mut self, value: u8) {
        self.emit_opcode(Opcode::Push8);
        self.emit_u8(value);
    }

    pub fn emit_push16(&mut self, value: u16) {
        self.emit_opcode(Opcode::Push16);
        self.emit_u16(value);
    }

    pub fn emit_push_zeros(&mut self, count: u16) {
        self.emit_opcode(Opcode::PushZeros);
        self.emit_u16(count);
    }

    // ===== Memory =====

    pub fn emit_iget8(&mut self, address: u16) {
        self.emit_opcode(Opcode::Iget8);
        self.emit_u16(address);
    }

    pub fn emit_iget16(&mut self, address: u16) {
        self.emit_opcode(Opcode::Iget16);
        self.emit_u16(address);
    }

    // ===== Control Flow =====

    pub fn emit_ijump(&mut self, target: u16) {
        self.emit_opcode(Opcode::Ijump);
        self.emit_u16(target);
    }

    pub fn emit_call(&mut self, frame_delta: u16, target: u16) {
        self.emit_opcode(Opcode::Call);
        self.emit_u16(frame_delta);
        self.emit_u16(target);
    }

    pub fn emit_label(&mut self, id: u16) {
        self.emit_opcode(Opcode::Label);
        self.emit_u16(id);
    }
}

/// Bytecode reader for decoding instructions
pub struct BytecodeReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> BytecodeReader<'a> {
    /// Create a new bytecode reader
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Get the current position in the buffer
    pub fn position(&self) -> usize {
        self.position
    }

    /// Check if there are more bytes to read
    pub fn has_more(&self) -> bool {
        self.position < self.buffer.len()
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        if self.position >= self.buffer.len() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let value = self.buffer[self.position];
        self.position += 1;
        Ok(value)
    }

    /// Read a 16-bit unsigned integer (little-endian)
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        if self.position + 2 > self.buffer.len() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let bytes = [self.buffer[self.position], self.buffer[self.position + 1]];
        self.position += 2;
        Ok(u16::from_le_bytes(bytes))
    }

    /// Read an opcode
    pub fn read_opcode(&mut self) -> Result<Opcode, DecodeError> {
        let offset = self.position;
        let byte = self.read_u8()?;
        Opcode::from_u8(byte).ok_or(DecodeError::InvalidOpcode(byte, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_and_read() {
        let mut writer = BytecodeWriter::new();
        writer.emit_push8(3);
        writer.emit_push16(0x1234);
        writer.emit_call(4, 0x0010);

        let bytes = writer.into_bytes();
        assert_eq!(bytes, vec![0x01, 3, 0x02, 0x34, 0x12, 0x50, 4, 0, 0x10, 0]);

        let mut reader = BytecodeReader::new(&bytes);
        assert_eq!(reader.read_opcode().unwrap(), Opcode::Push8);
        assert_eq!(reader.read_u8().unwrap(), 3);
        assert_eq!(reader.read_opcode().unwrap(), Opcode::Push16);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_opcode().unwrap(), Opcode::Call);
        assert_eq!(reader.read_u16().unwrap(), 4);
        assert_eq!(reader.read_u16().unwrap(), 0x10);
        assert!(!reader.has_more());
    }

    #[test]
    fn test_read_past_end() {
        let mut reader = BytecodeReader::new(&[0x02, 0x01]);
        reader.read_opcode().unwrap();
        assert_eq!(reader.read_u16(), Err(DecodeError::UnexpectedEnd(1)));
    }

    #[test]
    fn test_invalid_opcode() {
        let mut reader = BytecodeReader::new(&[0x99]);
        assert_eq!(reader.read_opcode(), Err(DecodeError::InvalidOpcode(0x99, 0)));
    }
}
