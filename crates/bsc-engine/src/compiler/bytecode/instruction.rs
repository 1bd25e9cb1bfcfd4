//! Decoded instructions
//!
//! The code generator schedules [`Instruction`] values and the disassembler
//! prints them; the VM executes the raw stream directly.

use super::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use super::opcode::Opcode;
use std::fmt;

/// One instruction with its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    Push8(u8),
    Push16(u16),
    Pop8,
    Pop16,
    PushZeros(u16),
    Get8,
    Get16,
    Iget8(u16),
    Iget16(u16),
    Set8,
    Set16,
    Neg8,
    Add8,
    Sub8,
    Mul8,
    Div8,
    Neg16,
    Add16,
    Sub16,
    Mul16,
    Div16,
    Extend,
    Jump,
    Ijump(u16),
    Call { frame_delta: u16, target: u16 },
    Ret,
    Label(u16),
    Eof,
}

impl Instruction {
    pub fn opcode(self) -> Opcode {
        match self {
            Self::Nop => Opcode::Nop,
            Self::Push8(_) => Opcode::Push8,
            Self::Push16(_) => Opcode::Push16,
            Self::Pop8 => Opcode::Pop8,
            Self::Pop16 => Opcode::Pop16,
            Self::PushZeros(_) => Opcode::PushZeros,
            Self::Get8 => Opcode::Get8,
            Self::Get16 => Opcode::Get16,
            Self::Iget8(_) => Opcode::Iget8,
            Self::Iget16(_) => Opcode::Iget16,
            Self::Set8 => Opcode::Set8,
            Self::Set16 => Opcode::Set16,
            Self::Neg8 => Opcode::Neg8,
            Self::Add8 => Opcode::Add8,
            Self::Sub8 => Opcode::Sub8,
            Self::Mul8 => Opcode::Mul8,
            Self::Div8 => Opcode::Div8,
            Self::Neg16 => Opcode::Neg16,
            Self::Add16 => Opcode::Add16,
            Self::Sub16 => Opcode::Sub16,
            Self::Mul16 => Opcode::Mul16,
            Self::Div16 => Opcode::Div16,
            Self::Extend => Opcode::Extend,
            Self::Jump => Opcode::Jump,
            Self::Ijump(_) => Opcode::Ijump,
            Self::Call { .. } => Opcode::Call,
            Self::Ret => Opcode::Ret,
            Self::Label(_) => Opcode::Label,
            Self::Eof => Opcode::Eof,
        }
    }

    /// Encoded size in bytes
    pub fn size(self) -> usize {
        1 + self.opcode().operand_size()
    }

    pub fn encode(self, writer: &mut BytecodeWriter) {
        match self {
            Self::Push8(value) => writer.emit_push8(value),
            Self::Push16(value) => writer.emit_push16(value),
            Self::PushZeros(count) => writer.emit_push_zeros(count),
            Self::Iget8(address) => writer.emit_iget8(address),
            Self::Iget16(address) => writer.emit_iget16(address),
            Self::Ijump(target) => writer.emit_ijump(target),
            Self::Call {
                frame_delta,
                target,
            } => writer.emit_call(frame_delta, target),
            Self::Label(id) => writer.emit_label(id),
            other => writer.emit_opcode(other.opcode()),
        }
    }

    /// Decode the instruction at the reader's position.
    pub fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let instruction = match reader.read_opcode()? {
            Opcode::Nop => Self::Nop,
            Opcode::Push8 => Self::Push8(reader.read_u8()?),
            Opcode::Push16 => Self::Push16(reader.read_u16()?),
            Opcode::Pop8 => Self::Pop8,
            Opcode::Pop16 => Self::Pop16,
            Opcode::PushZeros => Self::PushZeros(reader.read_u16()?),
            Opcode::Get8 => Self::Get8,
            Opcode::Get16 => Self::Get16,
            Opcode::Iget8 => Self::Iget8(reader.read_u16()?),
            Opcode::Iget16 => Self::Iget16(reader.read_u16()?),
            Opcode::Set8 => Self::Set8,
            Opcode::Set16 => Self::Set16,
            Opcode::Neg8 => Self::Neg8,
            Opcode::Add8 => Self::Add8,
            Opcode::Sub8 => Self::Sub8,
            Opcode::Mul8 => Self::Mul8,
            Opcode::Div8 => Self::Div8,
            Opcode::Neg16 => Self::Neg16,
            Opcode::Add16 => Self::Add16,
            Opcode::Sub16 => Self::Sub16,
            Opcode::Mul16 => Self::Mul16,
            Opcode::Div16 => Self::Div16,
            Opcode::Extend => Self::Extend,
            Opcode::Jump => Self::Jump,
            Opcode::Ijump => Self::Ijump(reader.read_u16()?),
            Opcode::Call => {
                let frame_delta = reader.read_u16()?;
                let target = reader.read_u16()?;
                Self::Call {
                    frame_delta,
                    target,
                }
            }
            Opcode::Ret => Self::Ret,
            Opcode::Label => Self::Label(reader.read_u16()?),
            Opcode::Eof => Self::Eof,
        };
        Ok(instruction)
    }

    /// Decode a whole stream into `(offset, instruction)` pairs.
    pub fn decode_stream(code: &[u8]) -> Result<Vec<(usize, Instruction)>, DecodeError> {
        let mut reader = BytecodeReader::new(code);
        let mut instructions = Vec::new();
        while reader.has_more() {
            let offset = reader.position();
            instructions.push((offset, Self::decode(&mut reader)?));
        }
        Ok(instructions)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.opcode().name();
        match *self {
            Self::Push8(value) => write!(f, "{} {}", name, value as i8),
            Self::Push16(value) => write!(f, "{} {}", name, value as i16),
            Self::PushZeros(value)
            | Self::Iget8(value)
            | Self::Iget16(value)
            | Self::Ijump(value)
            | Self::Label(value) => write!(f, "{} {}", name, value),
            Self::Call {
                frame_delta,
                target,
            } => write!(f, "{} {} {}", name, frame_delta, target),
            _ => f.write_str(name),
        }
    }
}

/// Render a listing, one instruction per line, prefixed with its offset.
pub fn disassemble(code: &[u8]) -> Result<String, DecodeError> {
    let mut listing = String::new();
    for (offset, instruction) in Instruction::decode_stream(code)? {
        listing.push_str(&format!("{:04} {}\n", offset, instruction));
    }
    Ok(listing)
}
