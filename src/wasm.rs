//! WebAssembly bindings for the control unit emulator.
//!
//! This module provides JavaScript-friendly wrappers around the core emulator.

use wasm_bindgen::prelude::*;
use js_sys::Uint8Array;
use crate::{Cpu, Program};
use crate::asm::assembler::assemble;
use crate::asm::demo::demo_program;
use crate::asm::disasm::{disassemble, disassemble_instruction};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly CPU wrapper.
#[wasm_bindgen]
pub struct WasmCpu {
    cpu: Cpu,
}

#[wasm_bindgen]
impl WasmCpu {
    /// Create a new CPU instance.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self { cpu: Cpu::new() }
    }

    /// Load a program from assembly source code.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let program = assemble(source)
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        self.load(&program)
    }

    /// Load the built-in LED/button program.
    #[wasm_bindgen]
    pub fn load_demo(&mut self) -> Result<usize, JsError> {
        self.load(&demo_program())
    }

    /// Advance one fetch, decode or execute phase. Returns the new state name.
    #[wasm_bindgen]
    pub fn step_state(&mut self) -> String {
        self.cpu.step_state();
        self.cpu.state.name().to_string()
    }

    /// Advance to the next execute phase. Returns the pending instruction.
    #[wasm_bindgen]
    pub fn step_instruction(&mut self) -> String {
        self.cpu.step_instruction();
        disassemble_instruction(self.cpu.ir)
    }

    /// Run a number of instruction steps.
    #[wasm_bindgen]
    pub fn run(&mut self, instructions: u32) -> u64 {
        self.cpu.run_instructions(instructions as u64);
        self.cpu.cycles
    }

    /// Reset the control unit, keeping the loaded program.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    /// Set a data memory location (e.g. PINB for input).
    #[wasm_bindgen]
    pub fn write_data(&mut self, addr: u16, value: u8) {
        self.cpu.data.write(addr, value);
    }

    #[wasm_bindgen]
    pub fn read_data(&self, addr: u16) -> u8 {
        self.cpu.data.read(addr)
    }

    /// Get cycle count.
    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.cpu.cycles
    }

    /// Get program counter.
    #[wasm_bindgen]
    pub fn pc(&self) -> u8 {
        self.cpu.pc
    }

    /// Get state as string.
    #[wasm_bindgen]
    pub fn state(&self) -> String {
        self.cpu.state.name().to_string()
    }

    /// Get the status register bits (ISNZVC).
    #[wasm_bindgen]
    pub fn status(&self) -> u8 {
        self.cpu.sr.bits()
    }

    /// Get all 32 registers.
    #[wasm_bindgen]
    pub fn registers(&self) -> Uint8Array {
        Uint8Array::from(self.cpu.regs.as_slice())
    }

    /// Disassembly of the loaded program.
    #[wasm_bindgen]
    pub fn disassembly(&self) -> String {
        disassemble(self.cpu.image())
    }

    /// Get the full inspection report as a JSON string.
    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        self.cpu
            .inspect()
            .to_json()
            .map_err(|e| JsError::new(&format!("{}", e)))
    }
}

impl WasmCpu {
    fn load(&mut self, program: &Program) -> Result<usize, JsError> {
        self.cpu = Cpu::with_program(program)
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(program.len())
    }
}

impl Default for WasmCpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble source code and return instruction count.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<usize, JsError> {
    let program = assemble(source)
        .map_err(|e| JsError::new(&format!("{}", e)))?;
    Ok(program.len())
}

/// Disassemble a single 24-bit instruction word.
#[wasm_bindgen]
pub fn wasm_disassemble(word: u32) -> String {
    disassemble_instruction(word)
}
