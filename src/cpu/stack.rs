//! Hardware stack used by CALL/RET and PUSH/POP.
//!
//! The stack grows downward from the top of its own 256-byte store, the way
//! the AVR stack grows down from RAMEND. The stack pointer always names the
//! next free slot.

use serde::{Serialize, Deserialize};

/// Number of bytes the stack can hold.
pub const STACK_SIZE: usize = 256;

/// Stack pointer value of an empty stack.
pub const STACK_TOP: u16 = (STACK_SIZE - 1) as u16;

/// LIFO byte store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    data: Vec<u8>,
    /// Number of bytes currently on the stack.
    depth: usize,
}

impl Stack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self {
            data: vec![0; STACK_SIZE],
            depth: 0,
        }
    }

    /// Empty the stack and clear its storage.
    pub fn reset(&mut self) {
        self.data.fill(0);
        self.depth = 0;
    }

    /// Push a byte. A push onto a full stack is dropped.
    pub fn push(&mut self, value: u8) {
        if self.depth == STACK_SIZE {
            log::warn!("stack overflow, value {:#04x} dropped", value);
            return;
        }
        self.data[STACK_SIZE - 1 - self.depth] = value;
        self.depth += 1;
    }

    /// Pop a byte. Popping an empty stack yields 0.
    pub fn pop(&mut self) -> u8 {
        if self.depth == 0 {
            log::warn!("stack underflow, returning 0");
            return 0;
        }
        self.depth -= 1;
        self.data[STACK_SIZE - 1 - self.depth]
    }

    /// Address of the next free slot.
    ///
    /// Starts at [`STACK_TOP`] and decreases by one per pushed byte. A full
    /// stack reports -1 wrapped, i.e. `u16::MAX`.
    pub fn pointer(&self) -> u16 {
        STACK_TOP.wrapping_sub(self.depth as u16)
    }

    /// The value on top of the stack, or 0 when empty.
    pub fn last_pushed(&self) -> u8 {
        match self.depth {
            0 => 0,
            d => self.data[STACK_SIZE - d],
        }
    }

    /// Number of bytes on the stack.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("pointer", &self.pointer())
            .field("depth", &self.depth)
            .field("top", &self.last_pushed())
            .finish()
    }
}
