//! CPU emulation for the 8-bit control unit.
//!
//! This module implements the complete machine:
//! - 32 eight-bit registers and an ISNZVC status register
//! - 256-word program memory of 24-bit instructions
//! - 512-byte data memory with memory-mapped I/O
//! - a 256-byte hardware stack
//! - a three-phase fetch/decode/execute control unit

pub mod alu;
pub mod decode;
pub mod execute;
pub mod inspect;
pub mod io;
pub mod memory;
pub mod program;
pub mod registers;
pub mod stack;

pub use alu::AluOp;
pub use decode::{Instruction, Opcode, DecodeError};
pub use execute::{Cpu, CpuState};
pub use inspect::{Snapshot, Watch};
pub use memory::{DataMemory, MemoryError, ProgramMemory};
pub use program::{Program, Symbol};
pub use registers::{RegisterFile, StatusFlags};
pub use stack::Stack;
