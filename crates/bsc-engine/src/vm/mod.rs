//! Stack-machine interpreter for bsc bytecode
//!
//! The machine has a byte-addressed evaluation stack, a frame pointer and a
//! program counter. Variables live on the evaluation stack itself: every
//! memory access is relative to the frame pointer and must stay below the
//! stack top. `call` moves the frame pointer onto a class instance so the
//! class body can initialize its members with frame-relative addresses.

pub mod interpreter;
pub mod stack;

pub use interpreter::Vm;
pub use stack::ByteStack;

use crate::compiler::ErrorKind;
use thiserror::Error;

/// Default evaluation stack size in bytes
pub const DEFAULT_STACK_SIZE: usize = 4096;

/// Default bound on executed instructions
pub const DEFAULT_MAX_STEPS: usize = 1_000_000;

/// VM configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmOptions {
    /// Evaluation stack capacity in bytes
    pub stack_size: usize,
    /// Instructions executed before the run is aborted
    pub max_steps: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// VM traps. None of them are recoverable; they mean the bytecode is wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// Stack overflow
    #[error("Stack overflow")]
    StackOverflow,

    /// Stack underflow
    #[error("Stack underflow")]
    StackUnderflow,

    /// Invalid opcode
    #[error("Invalid opcode {0:#04x} at offset {1}")]
    InvalidOpcode(u8, usize),

    /// An operand runs past the end of the stream
    #[error("Unexpected end of bytecode at offset {0}")]
    UnexpectedEnd(usize),

    /// Memory access outside the live part of the stack
    #[error("Frame access out of bounds: address {address} (frame {fp}, stack top {top})")]
    FrameOutOfBounds { address: usize, fp: usize, top: usize },

    /// Jump or call target past the end of the stream
    #[error("Jump target {0} is out of bounds")]
    JumpOutOfBounds(usize),

    /// Division by zero
    #[error("Division by zero at offset {0}")]
    DivisionByZero(usize),

    /// `ret` would move the frame pointer below zero
    #[error("Frame underflow")]
    FrameUnderflow,

    /// Step budget exhausted
    #[error("Step limit of {0} instructions exceeded")]
    StepLimitExceeded(usize),
}

impl VmError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::VmTrap
    }
}

/// VM execution result
pub type VmResult<T> = Result<T, VmError>;
