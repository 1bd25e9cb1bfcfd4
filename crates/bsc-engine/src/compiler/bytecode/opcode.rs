//! Bytecode opcodes for the bsc stack machine

/// Bytecode opcode enumeration
///
/// All opcodes are single-byte instructions. Some opcodes take additional operands
/// that follow the opcode byte in the bytecode stream; every multi-byte operand
/// is little-endian.
///
/// Opcodes are organized into categories:
/// - 0x00-0x0F: Stack manipulation & constants
/// - 0x10-0x1F: Memory access (frame-relative)
/// - 0x20-0x27: 8-bit arithmetic
/// - 0x28-0x2F: 16-bit arithmetic
/// - 0x30-0x3F: Conversions
/// - 0x40-0x4F: Control flow
/// - 0x50-0x5F: Calls and labels
/// - 0xFF: End of stream
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Stack Manipulation & Constants (0x00-0x0F) =====
    /// No operation
    Nop = 0x00,
    /// Push an 8-bit literal (operand: u8)
    Push8 = 0x01,
    /// Push a 16-bit literal (operand: u16)
    Push16 = 0x02,
    /// Discard the top byte
    Pop8 = 0x03,
    /// Discard the top two bytes
    Pop16 = 0x04,
    /// Reserve zeroed bytes (operand: u16 count)
    PushZeros = 0x05,

    // ===== Memory Access (0x10-0x1F) =====
    /// Pop an address, push the byte stored there
    Get8 = 0x10,
    /// Pop an address, push the short stored there
    Get16 = 0x11,
    /// Push the byte at an immediate address (operand: u16)
    Iget8 = 0x12,
    /// Push the short at an immediate address (operand: u16)
    Iget16 = 0x13,
    /// Pop a byte, then an address, and store the byte
    Set8 = 0x14,
    /// Pop a short, then an address, and store the short
    Set16 = 0x15,

    // ===== 8-bit Arithmetic (0x20-0x27) =====
    Neg8 = 0x20,
    Add8 = 0x21,
    Sub8 = 0x22,
    Mul8 = 0x23,
    Div8 = 0x24,

    // ===== 16-bit Arithmetic (0x28-0x2F) =====
    Neg16 = 0x28,
    Add16 = 0x29,
    Sub16 = 0x2A,
    Mul16 = 0x2B,
    Div16 = 0x2C,

    // ===== Conversions (0x30-0x3F) =====
    /// Sign-extend the top byte into a short
    Extend = 0x30,

    // ===== Control Flow (0x40-0x4F) =====
    /// Pop a short and jump to it
    Jump = 0x40,
    /// Jump to an immediate target (operand: u16)
    Ijump = 0x41,

    // ===== Calls (0x50-0x5F) =====
    /// Push the return address and frame delta, move the frame pointer by
    /// delta and jump (operands: u16 delta, u16 target)
    Call = 0x50,
    /// Pop the frame delta and return address, restore the frame and jump back
    Ret = 0x51,
    /// Call-target marker, no runtime effect (operand: u16 id)
    Label = 0x52,

    /// Explicit end of stream
    Eof = 0xFF,
}

impl Opcode {
    /// Convert byte to opcode
    ///
    /// Returns None if the byte does not correspond to a valid opcode.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Nop),
            0x01 => Some(Self::Push8),
            0x02 => Some(Self::Push16),
            0x03 => Some(Self::Pop8),
            0x04 => Some(Self::Pop16),
            0x05 => Some(Self::PushZeros),

            0x10 => Some(Self::Get8),
            0x11 => Some(Self::Get16),
            0x12 => Some(Self::Iget8),
            0x13 => Some(Self::Iget16),
            0x14 => Some(Self::Set8),
            0x15 => Some(Self::Set16),

            0x20 => Some(Self::Neg8),
            0x21 => Some(Self::Add8),
            0x22 => Some(Self::Sub8),
            0x23 => Some(Self::Mul8),
            0x24 => Some(Self::Div8),

            0x28 => Some(Self::Neg16),
            0x29 => Some(Self::Add16),
            0x2A => Some(Self::Sub16),
            0x2B => Some(Self::Mul16),
            0x2C => Some(Self::Div16),

            0x30 => Some(Self::Extend),

            0x40 => Some(Self::Jump),
            0x41 => Some(Self::Ijump),

            0x50 => Some(Self::Call),
            0x51 => Some(Self::Ret),
            0x52 => Some(Self::Label),

            0xFF => Some(Self::Eof),
            _ => None,
        }
    }

    /// Convert opcode to byte
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Get the mnemonic of this opcode
    pub fn name(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Push8 => "PUSH8",
            Self::Push16 => "PUSH16",
            Self::Pop8 => "POP8",
            Self::Pop16 => "POP16",
            Self::PushZeros => "PUSHZEROS",
            Self::Get8 => "GET8",
            Self::Get16 => "GET16",
            Self::Iget8 => "IGET8",
            Self::Iget16 => "IGET16",
            Self::Set8 => "SET8",
            Self::Set16 => "SET16",
            Self::Neg8 => "NEG8",
            Self::Add8 => "ADD8",
            Self::Sub8 => "SUB8",
            Self::Mul8 => "MUL8",
            Self::Div8 => "DIV8",
            Self::Neg16 => "NEG16",
            Self::Add16 => "ADD16",
            Self::Sub16 => "SUB16",
            Self::Mul16 => "MUL16",
            Self::Div16 => "DIV16",
            Self::Extend => "EXTEND",
            Self::Jump => "JUMP",
            Self::Ijump => "IJUMP",
            Self::Call => "CALL",
            Self::Ret => "RET",
            Self::Label => "LABEL",
            Self::Eof => "EOF",
        }
    }

    /// Number of operand bytes following the opcode
    pub fn operand_size(self) -> usize {
        match self {
            Self::Push8 => 1,
            Self::Push16 | Self::PushZeros | Self::Iget8 | Self::Iget16 | Self::Ijump | Self::Label => 2,
            Self::Call => 4,
            _ => 0,
        }
    }

    /// Check if this opcode is a jump instruction
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jump | Self::Ijump)
    }

    /// Check if this opcode performs arithmetic
    pub fn is_arithmetic(self) -> bool {
        matches!(self.to_u8(), 0x20..=0x24 | 0x28..=0x2C)
    }

    /// Check if this opcode terminates a basic block
    pub fn is_terminator(self) -> bool {
        self.is_jump() || matches!(self, Self::Ret | Self::Eof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for byte in 0..=u8::MAX {
            if let Some(opcode) = Opcode::from_u8(byte) {
                assert_eq!(opcode.to_u8(), byte, "Failed roundtrip for {:?}", opcode);
            }
        }
    }

    #[test]
    fn test_invalid_opcode() {
        assert_eq!(Opcode::from_u8(0x06), None);
        assert_eq!(Opcode::from_u8(0x25), None);
        assert_eq!(Opcode::from_u8(0xFE), None);
    }

    #[test]
    fn test_opcode_names() {
        assert_eq!(Opcode::Push16.name(), "PUSH16");
        assert_eq!(Opcode::PushZeros.name(), "PUSHZEROS");
        assert_eq!(Opcode::Extend.name(), "EXTEND");
    }

    #[test]
    fn test_categories() {
        assert!(Opcode::Ijump.is_jump());
        assert!(!Opcode::Call.is_jump());
        assert!(Opcode::Div16.is_arithmetic());
        assert!(!Opcode::Extend.is_arithmetic());
        assert!(Opcode::Ret.is_terminator());
        assert_eq!(Opcode::Call.operand_size(), 4);
    }
}
