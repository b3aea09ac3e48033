//! CPU register file and status register.
//!
//! The control unit has:
//! - R0..R31: 32 general-purpose 8-bit registers
//! - SR: status register holding the ISNZVC flags
//!
//! The program counter, memory address register and instruction register
//! live on [`Cpu`](crate::cpu::Cpu) itself since only the state machine
//! touches them.

use serde::{Serialize, Deserialize};
use std::fmt;

/// Number of general-purpose registers.
pub const REGISTER_COUNT: usize = 32;

/// Register R16, the first register usable with immediate instructions on AVR.
pub const R16: u8 = 16;
/// Register R17.
pub const R17: u8 = 17;
/// Register R18.
pub const R18: u8 = 18;
/// Register R24.
pub const R24: u8 = 24;

/// The 32-entry general-purpose register file.
///
/// Register indices are masked to 5 bits, so every 8-bit operand
/// selects some register.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    regs: [u8; REGISTER_COUNT],
}

impl RegisterFile {
    /// Create a register file with all registers cleared.
    pub const fn new() -> Self {
        Self { regs: [0; REGISTER_COUNT] }
    }

    /// Clear every register.
    pub fn reset(&mut self) {
        self.regs = [0; REGISTER_COUNT];
    }

    /// Read register `index` (masked to 0..=31).
    #[inline]
    pub fn get(&self, index: u8) -> u8 {
        self.regs[Self::slot(index)]
    }

    /// Write register `index` (masked to 0..=31).
    #[inline]
    pub fn set(&mut self, index: u8, value: u8) {
        self.regs[Self::slot(index)] = value;
    }

    /// All registers, R0 first.
    pub fn as_slice(&self) -> &[u8] {
        &self.regs
    }

    #[inline]
    fn slot(index: u8) -> usize {
        (index & 0x1F) as usize
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only show non-zero registers
        let mut map = f.debug_map();
        for (i, value) in self.regs.iter().enumerate().filter(|(_, v)| **v != 0) {
            map.entry(&format_args!("R{}", i), &format_args!("{:#04x}", value));
        }
        map.finish()
    }
}

/// Status register: Interrupt, Sign, Negative, Zero, Overflow, Carry.
///
/// Only ALU-backed instructions (arithmetic, logic and compares) write it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusFlags {
    /// I: global interrupt enable (never set by this core)
    pub interrupt: bool,
    /// S: sign of the last result
    pub sign: bool,
    /// N: negative, mirrors S
    pub negative: bool,
    /// Z: last result was zero
    pub zero: bool,
    /// V: signed overflow
    pub overflow: bool,
    /// C: unsigned carry out / borrow
    pub carry: bool,
}

impl StatusFlags {
    pub const I: u8 = 1 << 5;
    pub const S: u8 = 1 << 4;
    pub const N: u8 = 1 << 3;
    pub const Z: u8 = 1 << 2;
    pub const V: u8 = 1 << 1;
    pub const C: u8 = 1 << 0;

    /// All flags cleared.
    pub const fn new() -> Self {
        Self {
            interrupt: false,
            sign: false,
            negative: false,
            zero: false,
            overflow: false,
            carry: false,
        }
    }

    /// Pack into the low six bits as `ISNZVC`.
    pub fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.interrupt { bits |= Self::I; }
        if self.sign { bits |= Self::S; }
        if self.negative { bits |= Self::N; }
        if self.zero { bits |= Self::Z; }
        if self.overflow { bits |= Self::V; }
        if self.carry { bits |= Self::C; }
        bits
    }

    /// Unpack from `ISNZVC` bits; bits 6 and 7 are ignored.
    pub fn from_bits(bits: u8) -> Self {
        Self {
            interrupt: bits & Self::I != 0,
            sign: bits & Self::S != 0,
            negative: bits & Self::N != 0,
            zero: bits & Self::Z != 0,
            overflow: bits & Self::V != 0,
            carry: bits & Self::C != 0,
        }
    }
}

impl fmt::Display for StatusFlags {
    /// Six binary digits, `ISNZVC` order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06b}", self.bits())
    }
}
