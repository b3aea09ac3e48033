//! # AVR8 Emulator
//!
//! An emulator of a small 8-bit control unit modelled on the AVR.
//!
//! Each instruction passes through three visible phases (fetch, decode,
//! execute) that can be stepped one at a time, which makes the machine a
//! convenient teaching aid for how a processor's control unit works.

pub mod cpu;
pub mod asm;
pub mod config;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, Instruction, Program, Snapshot, StatusFlags, Watch};
pub use asm::{assemble, disassemble, demo_program, AssemblerError, load_image, save_image};
pub use config::RunConfig;

#[cfg(feature = "tui")]
pub use tui::run_debugger;
