//! Bytecode definitions for the bsc stack machine
//!
//! - [`opcode`]: the instruction set
//! - [`encoder`]: raw emission and decoding
//! - [`instruction`]: typed instructions and the disassembler

pub mod encoder;
pub mod instruction;
pub mod opcode;

pub use encoder::{BytecodeReader, BytecodeWriter, DecodeError};
pub use instruction::{disassemble, Instruction};
pub use opcode::Opcode;
