//! Read-only snapshots of CPU state.
//!
//! A [`Snapshot`] captures everything a debugger or report needs at one
//! instant. It serializes to JSON and renders as a plain-text report.

use crate::cpu::decode::Opcode;
use crate::cpu::execute::{Cpu, CpuState};
use crate::cpu::io::{self, DDRB, PINB, PORTB};
use crate::cpu::registers::{StatusFlags, R16, R17, R18, R24};
use serde::{Serialize, Deserialize};
use std::fmt;

/// Which registers and I/O locations a snapshot reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watch {
    /// Register indices (0..=31).
    pub registers: Vec<u8>,
    /// Data memory addresses of I/O registers.
    pub io: Vec<u8>,
}

impl Default for Watch {
    /// R16, R17, R18, R24 and DDRB, PORTB, PINB.
    fn default() -> Self {
        Self {
            registers: vec![R16, R17, R18, R24],
            io: vec![DDRB, PORTB, PINB],
        }
    }
}

/// A watched register and its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterValue {
    pub index: u8,
    pub value: u8,
}

/// A watched I/O location and its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoValue {
    pub name: String,
    pub addr: u8,
    pub value: u8,
}

/// Point-in-time view of the CPU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: CpuState,
    pub routine: String,
    /// Mnemonic of the latched opcode, `"???"` if undefined.
    pub instruction: String,
    pub pc: u8,
    pub mar: u8,
    pub ir: u32,
    pub opcode: u8,
    pub op1: u8,
    pub op2: u8,
    pub stack_pointer: u16,
    pub stack_top: u8,
    pub flags: StatusFlags,
    pub registers: Vec<RegisterValue>,
    pub io: Vec<IoValue>,
    pub cycles: u64,
}

impl Cpu {
    /// Snapshot with the default watch list.
    pub fn inspect(&self) -> Snapshot {
        self.inspect_with(&Watch::default())
    }

    /// Snapshot reporting the registers and I/O locations in `watch`.
    pub fn inspect_with(&self, watch: &Watch) -> Snapshot {
        let registers = watch
            .registers
            .iter()
            .map(|&index| RegisterValue {
                index: index & 0x1F,
                value: self.regs.get(index),
            })
            .collect();

        let io = watch
            .io
            .iter()
            .map(|&addr| IoValue {
                name: io::io_name(addr)
                    .map_or_else(|| format!("{:#04x}", addr), str::to_string),
                addr,
                value: self.data.read(addr as u16),
            })
            .collect();

        Snapshot {
            state: self.state,
            routine: self.routine_name(self.mar).to_string(),
            instruction: Opcode::mnemonic(self.opcode).unwrap_or("???").to_string(),
            pc: self.pc,
            mar: self.mar,
            ir: self.ir,
            opcode: self.opcode,
            op1: self.op1,
            op2: self.op2,
            stack_pointer: self.stack.pointer(),
            stack_top: self.stack.last_pushed(),
            flags: self.sr,
            registers,
            io,
            cycles: self.cycles,
        }
    }
}

impl Snapshot {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

const RULE: &str =
    "--------------------------------------------------------------------------------";

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", RULE)?;
        writeln!(f, "{:<40}{}", "Current subroutine:", self.routine)?;
        writeln!(f, "{:<40}{}", "Current instruction:", self.instruction)?;
        writeln!(f, "{:<40}{}", "Current state:", self.state.name())?;
        writeln!(f)?;
        writeln!(f, "{:<40}{}", "Program counter:", self.pc)?;
        writeln!(f, "{:<40}{}", "Stack pointer:", self.stack_pointer)?;
        writeln!(f, "{:<40}{}", "Last added value to the stack:", self.stack_top)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<40}{:08b} {:08b} {:08b}",
            "Instruction register:",
            (self.ir >> 16) as u8,
            (self.ir >> 8) as u8,
            self.ir as u8
        )?;
        writeln!(f, "{:<40}{}", "Status register (ISNZVC):", self.flags)?;
        writeln!(f)?;
        for reg in &self.registers {
            let label = format!("Content in CPU register R{}:", reg.index);
            writeln!(f, "{:<40}{:08b}", label, reg.value)?;
        }
        writeln!(f)?;
        for io in &self.io {
            let label = format!("Content in {}:", io.name);
            writeln!(f, "{:<40}{:08b}", label, io.value)?;
        }
        writeln!(f, "{}", RULE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::{encode, Instruction};
    use crate::cpu::program::Program;

    fn demo_cpu() -> Cpu {
        let mut program = Program::from_words(vec![
            encode(&Instruction::Ldi { reg: R16, imm: 0x21 }),
            encode(&Instruction::Out { addr: PORTB, reg: R16 }),
            encode(&Instruction::Push { reg: R16 }),
        ]);
        program.add_symbol("main", 0);
        Cpu::with_program(&program).unwrap()
    }

    #[test]
    fn test_inspect_does_not_mutate() {
        let mut cpu = demo_cpu();
        cpu.run_instructions(3);
        let before = serde_json::to_string(&cpu).unwrap();

        let a = cpu.inspect();
        let b = cpu.inspect();

        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&cpu).unwrap(), before);
    }

    #[test]
    fn test_inspect_fields() {
        let mut cpu = demo_cpu();
        // Executes LDI and OUT, leaves PUSH decoded
        cpu.run_instructions(3);
        let snap = cpu.inspect();

        assert_eq!(snap.state, CpuState::Execute);
        assert_eq!(snap.routine, "main");
        assert_eq!(snap.instruction, "PUSH");
        assert_eq!(snap.mar, 2);
        assert_eq!(snap.pc, 3);
        assert_eq!(snap.registers[0], RegisterValue { index: 16, value: 0x21 });
        let portb = snap.io.iter().find(|io| io.name == "PORTB").unwrap();
        assert_eq!(portb.value, 0x21);
    }

    #[test]
    fn test_custom_watch() {
        let cpu = demo_cpu();
        let watch = Watch { registers: vec![0, 31], io: vec![0x40] };
        let snap = cpu.inspect_with(&watch);

        assert_eq!(snap.registers.len(), 2);
        assert_eq!(snap.io[0].name, "0x40");
    }

    #[test]
    fn test_report_text() {
        let mut cpu = demo_cpu();
        cpu.run_instructions(2);
        let text = cpu.inspect().to_string();

        assert!(text.contains("Current subroutine:"));
        assert!(text.contains("Content in CPU register R16:"));
        assert!(text.contains("00100001"));
        assert!(text.contains("Status register (ISNZVC):"));
    }

    #[test]
    fn test_json_roundtrip() {
        let snap = demo_cpu().inspect();
        let json = snap.to_json().unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
