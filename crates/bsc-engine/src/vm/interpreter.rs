//! Bytecode interpreter

use super::{ByteStack, VmError, VmOptions, VmResult};
use crate::compiler::bytecode::Opcode;

/// The bsc virtual machine.
pub struct Vm {
    stack: ByteStack,
    options: VmOptions,
    steps: usize,
}

impl Vm {
    pub fn new(options: VmOptions) -> Self {
        Self {
            stack: ByteStack::with_capacity(options.stack_size),
            options,
            steps: 0,
        }
    }

    /// Evaluation stack contents, bottom first.
    pub fn stack(&self) -> &[u8] {
        self.stack.as_slice()
    }

    /// Instructions executed so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Run `code` until `eof` or the end of the stream.
    ///
    /// # Errors
    ///
    /// Any stack, frame or jump violation, an unknown opcode, division by zero
    /// or exceeding the step budget stops execution with a [`VmError`].
    pub fn execute(&mut self, code: &[u8]) -> VmResult<()> {
        let mut pc = 0;

        while pc < code.len() {
            self.steps += 1;
            if self.steps > self.options.max_steps {
                return Err(VmError::StepLimitExceeded(self.options.max_steps));
            }

            let at = pc;
            let opcode_byte = code[pc];
            let opcode =
                Opcode::from_u8(opcode_byte).ok_or(VmError::InvalidOpcode(opcode_byte, at))?;
            pc += 1;

            log::trace!(
                "{:04} {:<9} fp={} stack={:?}",
                at,
                opcode.name(),
                self.stack.fp(),
                self.stack.as_slice()
            );

            match opcode {
                Opcode::Nop => {}
                Opcode::Push8 => {
                    let value = self.read_u8(code, &mut pc)?;
                    self.stack.push8(value)?;
                }
                Opcode::Push16 => {
                    let value = self.read_u16(code, &mut pc)?;
                    self.stack.push16(value)?;
                }
                Opcode::Pop8 => {
                    self.stack.pop8()?;
                }
                Opcode::Pop16 => {
                    self.stack.pop16()?;
                }
                Opcode::PushZeros => {
                    let count = self.read_u16(code, &mut pc)?;
                    self.stack.push_zeros(count as usize)?;
                }

                Opcode::Get8 => {
                    let address = self.stack.pop16()?;
                    let value = self.stack.load8(address)?;
                    self.stack.push8(value)?;
                }
                Opcode::Get16 => {
                    let address = self.stack.pop16()?;
                    let value = self.stack.load16(address)?;
                    self.stack.push16(value)?;
                }
                Opcode::Iget8 => {
                    let address = self.read_u16(code, &mut pc)?;
                    let value = self.stack.load8(address)?;
                    self.stack.push8(value)?;
                }
                Opcode::Iget16 => {
                    let address = self.read_u16(code, &mut pc)?;
                    let value = self.stack.load16(address)?;
                    self.stack.push16(value)?;
                }
                Opcode::Set8 => {
                    let value = self.stack.pop8()?;
                    let address = self.stack.pop16()?;
                    self.stack.store8(address, value)?;
                }
                Opcode::Set16 => {
                    let value = self.stack.pop16()?;
                    let address = self.stack.pop16()?;
                    self.stack.store16(address, value)?;
                }

                Opcode::Neg8 => {
                    let value = self.stack.pop8()? as i8;
                    self.stack.push8(value.wrapping_neg() as u8)?;
                }
                Opcode::Add8 => self.op_binary8(i8::wrapping_add)?,
                Opcode::Sub8 => self.op_binary8(i8::wrapping_sub)?,
                Opcode::Mul8 => self.op_binary8(i8::wrapping_mul)?,
                Opcode::Div8 => self.op_div8(at)?,
                Opcode::Neg16 => {
                    let value = self.stack.pop16()? as i16;
                    self.stack.push16(value.wrapping_neg() as u16)?;
                }
                Opcode::Add16 => self.op_binary16(i16::wrapping_add)?,
                Opcode::Sub16 => self.op_binary16(i16::wrapping_sub)?,
                Opcode::Mul16 => self.op_binary16(i16::wrapping_mul)?,
                Opcode::Div16 => self.op_div16(at)?,

                Opcode::Extend => {
                    let low = self.stack.peek8()?;
                    self.stack.push8(if low & 0x80 != 0 { 0xFF } else { 0x00 })?;
                }

                Opcode::Jump => {
                    let target = self.stack.pop16()?;
                    pc = self.jump_target(code, target)?;
                }
                Opcode::Ijump => {
                    let target = self.read_u16(code, &mut pc)?;
                    pc = self.jump_target(code, target)?;
                }
                Opcode::Call => {
                    let frame_delta = self.read_u16(code, &mut pc)?;
                    let target = self.read_u16(code, &mut pc)?;
                    let return_pc = u16::try_from(pc).map_err(|_| VmError::JumpOutOfBounds(pc))?;
                    let destination = self.jump_target(code, target)?;
                    self.stack.push16(return_pc)?;
                    self.stack.push16(frame_delta)?;
                    self.stack.enter_frame(frame_delta)?;
                    pc = destination;
                }
                Opcode::Ret => {
                    let frame_delta = self.stack.pop16()?;
                    let return_pc = self.stack.pop16()?;
                    self.stack.leave_frame(frame_delta)?;
                    pc = self.jump_target(code, return_pc)?;
                }
                Opcode::Label => {
                    self.read_u16(code, &mut pc)?;
                }
                Opcode::Eof => break,
            }
        }

        log::debug!(
            "vm halted after {} steps with {} bytes on the stack",
            self.steps,
            self.stack.len()
        );
        Ok(())
    }

    // ===== Operand fetch =====

    #[inline]
    fn read_u8(&self, code: &[u8], pc: &mut usize) -> VmResult<u8> {
        let value = *code.get(*pc).ok_or(VmError::UnexpectedEnd(*pc))?;
        *pc += 1;
        Ok(value)
    }

    #[inline]
    fn read_u16(&self, code: &[u8], pc: &mut usize) -> VmResult<u16> {
        if *pc + 1 >= code.len() {
            return Err(VmError::UnexpectedEnd(*pc));
        }
        let value = u16::from_le_bytes([code[*pc], code[*pc + 1]]);
        *pc += 2;
        Ok(value)
    }

    /// A target equal to the stream length halts on the next fetch.
    fn jump_target(&self, code: &[u8], target: u16) -> VmResult<usize> {
        let target = target as usize;
        if target > code.len() {
            return Err(VmError::JumpOutOfBounds(target));
        }
        Ok(target)
    }

    // ===== Arithmetic =====

    /// Pops the right operand, then the left.
    #[inline]
    fn op_binary8(&mut self, op: fn(i8, i8) -> i8) -> VmResult<()> {
        let b = self.stack.pop8()? as i8;
        let a = self.stack.pop8()? as i8;
        self.stack.push8(op(a, b) as u8)
    }

    #[inline]
    fn op_binary16(&mut self, op: fn(i16, i16) -> i16) -> VmResult<()> {
        let b = self.stack.pop16()? as i16;
        let a = self.stack.pop16()? as i16;
        self.stack.push16(op(a, b) as u16)
    }

    fn op_div8(&mut self, at: usize) -> VmResult<()> {
        let b = self.stack.pop8()? as i8;
        let a = self.stack.pop8()? as i8;
        if b == 0 {
            return Err(VmError::DivisionByZero(at));
        }
        self.stack.push8(a.wrapping_div(b) as u8)
    }

    fn op_div16(&mut self, at: usize) -> VmResult<()> {
        let b = self.stack.pop16()? as i16;
        let a = self.stack.pop16()? as i16;
        if b == 0 {
            return Err(VmError::DivisionByZero(at));
        }
        self.stack.push16(a.wrapping_div(b) as u16)
    }
}
