//! Disassembler.
//!
//! Converts raw instruction words back to assembler syntax.

use crate::cpu::decode::{decode, split, Instruction};
use crate::cpu::io::io_name;
use crate::cpu::program::Program;

/// Disassemble a single instruction word.
pub fn disassemble_instruction(word: u32) -> String {
    match decode(word) {
        Ok(decoded) => format_instruction(&decoded),
        Err(_) => {
            let (opcode, op1, op2) = split(word);
            format!("??? {:#04x}, {:#04x}, {:#04x}", opcode, op1, op2)
        }
    }
}

/// Disassemble a program image, with routine labels.
pub fn disassemble(program: &Program) -> String {
    let mut output = String::new();
    output.push_str("; Disassembly\n");
    output.push_str("; -----------\n\n");

    for (addr, &word) in program.words.iter().enumerate() {
        for symbol in program.symbols.iter().filter(|s| s.addr as usize == addr) {
            output.push_str(&format!("{}:\n", symbol.name));
        }
        let line = disassemble_instruction(word);
        output.push_str(&format!("{:03}: {:<24} ; {:06X}\n", addr, line, word & 0xFF_FFFF));
    }

    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    let name = instr.mnemonic();
    match *instr {
        Instruction::Nop | Instruction::Ret => name.to_string(),

        Instruction::Ldi { reg, imm }
        | Instruction::Ori { reg, imm }
        | Instruction::Andi { reg, imm }
        | Instruction::Xori { reg, imm }
        | Instruction::Addi { reg, imm }
        | Instruction::Subi { reg, imm }
        | Instruction::Cpi { reg, imm } => format!("{} {}, {:#04x}", name, reg_name(reg), imm),

        Instruction::Mov { dst: reg, src }
        | Instruction::Or { reg, src }
        | Instruction::And { reg, src }
        | Instruction::Xor { reg, src }
        | Instruction::Add { reg, src }
        | Instruction::Sub { reg, src }
        | Instruction::Cp { reg, src } => format!("{} {}, {}", name, reg_name(reg), reg_name(src)),

        Instruction::Out { addr, reg } => format!("{} {}, {}", name, io_operand(addr), reg_name(reg)),
        Instruction::In { reg, addr } => format!("{} {}, {}", name, reg_name(reg), io_operand(addr)),
        Instruction::Sts { addr, reg } => format!("{} {:#04x}, {}", name, addr, reg_name(reg)),
        Instruction::Lds { reg, addr } => format!("{} {}, {:#04x}", name, reg_name(reg), addr),

        Instruction::Clr { reg }
        | Instruction::Inc { reg }
        | Instruction::Dec { reg }
        | Instruction::Push { reg }
        | Instruction::Pop { reg }
        | Instruction::Lsl { reg }
        | Instruction::Lsr { reg } => format!("{} {}", name, reg_name(reg)),

        Instruction::Call { addr }
        | Instruction::Jmp { addr }
        | Instruction::Breq { addr }
        | Instruction::Brne { addr }
        | Instruction::Brge { addr }
        | Instruction::Brgt { addr }
        | Instruction::Brle { addr }
        | Instruction::Brlt { addr } => format!("{} {}", name, addr),
    }
}

fn reg_name(reg: u8) -> String {
    format!("R{}", reg & 0x1F)
}

/// I/O address by name where one exists.
fn io_operand(addr: u8) -> String {
    io_name(addr).map_or_else(|| format!("{:#04x}", addr), str::to_string)
}
