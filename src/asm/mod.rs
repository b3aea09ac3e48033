//! Assembler and disassembler for control unit programs.
//!
//! This module provides:
//! - A two-pass assembler (text → program image)
//! - A disassembler (program image → readable text)
//! - The HEX24 image file format
//! - The built-in LED/button demo program

pub mod assembler;
pub mod demo;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use demo::demo_program;
pub use disasm::disassemble;
pub use image::{load_image, save_image, ImageError};
