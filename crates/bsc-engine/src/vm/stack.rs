//! Byte-addressed evaluation stack
//!
//! # Memory Layout
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │ temporaries                         │  ← top (next free byte)
//! │ return pc, frame delta (per call)   │
//! ├─────────────────────────────────────┤
//! │ class instance being initialized    │  ← fp (frame pointer)
//! ├─────────────────────────────────────┤
//! │ top-level variables                 │  ← 0
//! └─────────────────────────────────────┘
//! ```
//!
//! Shorts are stored little-endian: the low byte is pushed first, so it
//! sits deeper than the high byte.

use super::{VmError, VmResult};

/// Evaluation stack with a frame pointer.
#[derive(Debug, Clone)]
pub struct ByteStack {
    bytes: Vec<u8>,
    fp: usize,
    max_size: usize,
}

impl ByteStack {
    /// Create a stack holding at most `max_size` bytes
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(max_size.min(1024)),
            fp: 0,
            max_size,
        }
    }

    /// Number of live bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn fp(&self) -> usize {
        self.fp
    }

    // ========================================================================
    // Push / Pop
    // ========================================================================

    /// Push a byte
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackOverflow` if the stack is full.
    #[inline]
    pub fn push8(&mut self, value: u8) -> VmResult<()> {
        if self.bytes.len() >= self.max_size {
            return Err(VmError::StackOverflow);
        }
        self.bytes.push(value);
        Ok(())
    }

    /// Pop a byte
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackUnderflow` if the stack is empty.
    #[inline]
    pub fn pop8(&mut self) -> VmResult<u8> {
        self.bytes.pop().ok_or(VmError::StackUnderflow)
    }

    pub fn push16(&mut self, value: u16) -> VmResult<()> {
        let [low, high] = value.to_le_bytes();
        self.push8(low)?;
        self.push8(high)
    }

    pub fn pop16(&mut self) -> VmResult<u16> {
        let high = self.pop8()?;
        let low = self.pop8()?;
        Ok(u16::from_le_bytes([low, high]))
    }

    /// Top byte without popping
    pub fn peek8(&self) -> VmResult<u8> {
        self.bytes.last().copied().ok_or(VmError::StackUnderflow)
    }

    /// Push `count` zero bytes
    pub fn push_zeros(&mut self, count: usize) -> VmResult<()> {
        if self.bytes.len() + count > self.max_size {
            return Err(VmError::StackOverflow);
        }
        self.bytes.resize(self.bytes.len() + count, 0);
        Ok(())
    }

    // ========================================================================
    // Frame Access
    // ========================================================================

    /// Absolute index of `width` bytes at frame-relative `address`
    fn slot(&self, address: u16, width: usize) -> VmResult<usize> {
        let index = self.fp + address as usize;
        if index + width > self.bytes.len() {
            return Err(VmError::FrameOutOfBounds {
                address: address as usize,
                fp: self.fp,
                top: self.bytes.len(),
            });
        }
        Ok(index)
    }

    pub fn load8(&self, address: u16) -> VmResult<u8> {
        let index = self.slot(address, 1)?;
        Ok(self.bytes[index])
    }

    pub fn load16(&self, address: u16) -> VmResult<u16> {
        let index = self.slot(address, 2)?;
        Ok(u16::from_le_bytes([self.bytes[index], self.bytes[index + 1]]))
    }

    pub fn store8(&mut self, address: u16, value: u8) -> VmResult<()> {
        let index = self.slot(address, 1)?;
        self.bytes[index] = value;
        Ok(())
    }

    pub fn store16(&mut self, address: u16, value: u16) -> VmResult<()> {
        let index = self.slot(address, 2)?;
        self.bytes[index..index + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    // ========================================================================
    // Frames
    // ========================================================================

    /// Move the frame pointer up by `delta`; the new frame must start inside
    /// the live stack.
    pub fn enter_frame(&mut self, delta: u16) -> VmResult<()> {
        let fp = self.fp + delta as usize;
        if fp > self.bytes.len() {
            return Err(VmError::FrameOutOfBounds {
                address: delta as usize,
                fp: self.fp,
                top: self.bytes.len(),
            });
        }
        self.fp = fp;
        Ok(())
    }

    pub fn leave_frame(&mut self, delta: u16) -> VmResult<()> {
        self.fp = self
            .fp
            .checked_sub(delta as usize)
            .ok_or(VmError::FrameUnderflow)?;
        Ok(())
    }
}
