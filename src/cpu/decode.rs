//! Instruction decoder.
//!
//! Every instruction is a 24-bit word packed into a `u32`:
//!
//! ```text
//! 31      24 23     16 15      8 7       0
//! | unused  | opcode  |   op1   |   op2   |
//! ```
//!
//! Operand meaning depends on the opcode: a register index, an immediate,
//! an I/O address or a program address.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Decoded instruction.
///
/// One variant per opcode, so execution is an exhaustive `match`.
/// Register fields are raw operand bytes; the register file masks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// No operation
    Nop,

    // ==================== Data Movement ====================

    /// Load immediate: R[reg] := imm
    Ldi { reg: u8, imm: u8 },
    /// Copy register: R[dst] := R[src]
    Mov { dst: u8, src: u8 },
    /// Write I/O: DM[addr] := R[reg]
    Out { addr: u8, reg: u8 },
    /// Read I/O: R[reg] := DM[addr]
    In { reg: u8, addr: u8 },
    /// Store to variable bank: DM[addr + 256] := R[reg]
    Sts { addr: u8, reg: u8 },
    /// Load from variable bank: R[reg] := DM[addr + 256]
    Lds { reg: u8, addr: u8 },
    /// Clear register: R[reg] := 0
    Clr { reg: u8 },

    // ==================== Logic / Arithmetic ====================

    Ori { reg: u8, imm: u8 },
    Andi { reg: u8, imm: u8 },
    Xori { reg: u8, imm: u8 },
    Or { reg: u8, src: u8 },
    And { reg: u8, src: u8 },
    Xor { reg: u8, src: u8 },
    Addi { reg: u8, imm: u8 },
    Subi { reg: u8, imm: u8 },
    Add { reg: u8, src: u8 },
    Sub { reg: u8, src: u8 },
    Inc { reg: u8 },
    Dec { reg: u8 },
    /// Compare with immediate (flags only)
    Cpi { reg: u8, imm: u8 },
    /// Compare registers (flags only)
    Cp { reg: u8, src: u8 },

    // ==================== Control Flow ====================

    /// Push return address, jump to addr
    Call { addr: u8 },
    /// Pop return address into PC
    Ret,
    Push { reg: u8 },
    Pop { reg: u8 },
    Jmp { addr: u8 },

    // ==================== Branches ====================

    /// Branch if Z
    Breq { addr: u8 },
    /// Branch if not Z
    Brne { addr: u8 },
    /// Branch if not S
    Brge { addr: u8 },
    /// Branch if not S and not Z
    Brgt { addr: u8 },
    /// Branch if S or Z
    Brle { addr: u8 },
    /// Branch if S
    Brlt { addr: u8 },

    // ==================== Shifts ====================

    Lsl { reg: u8 },
    Lsr { reg: u8 },
}

/// Opcode byte values.
pub struct Opcode;

impl Opcode {
    pub const NOP: u8 = 0x00;
    pub const LDI: u8 = 0x01;
    pub const MOV: u8 = 0x02;
    pub const OUT: u8 = 0x03;
    pub const IN: u8 = 0x04;
    pub const STS: u8 = 0x05;
    pub const LDS: u8 = 0x06;
    pub const CLR: u8 = 0x07;
    pub const ORI: u8 = 0x08;
    pub const ANDI: u8 = 0x09;
    pub const XORI: u8 = 0x0A;
    pub const OR: u8 = 0x0B;
    pub const AND: u8 = 0x0C;
    pub const XOR: u8 = 0x0D;
    pub const ADDI: u8 = 0x0E;
    pub const SUBI: u8 = 0x0F;
    pub const ADD: u8 = 0x10;
    pub const SUB: u8 = 0x11;
    pub const INC: u8 = 0x12;
    pub const DEC: u8 = 0x13;
    pub const CPI: u8 = 0x14;
    pub const CP: u8 = 0x15;
    pub const CALL: u8 = 0x16;
    pub const RET: u8 = 0x17;
    pub const PUSH: u8 = 0x18;
    pub const POP: u8 = 0x19;
    pub const JMP: u8 = 0x1A;
    pub const BREQ: u8 = 0x1B;
    pub const BRNE: u8 = 0x1C;
    pub const BRGE: u8 = 0x1D;
    pub const BRGT: u8 = 0x1E;
    pub const BRLE: u8 = 0x1F;
    pub const BRLT: u8 = 0x20;
    pub const LSL: u8 = 0x21;
    pub const LSR: u8 = 0x22;

    /// Number of defined opcodes; they occupy `0..COUNT`.
    pub const COUNT: u8 = 0x23;

    /// Mnemonics indexed by opcode.
    const MNEMONICS: [&'static str; Self::COUNT as usize] = [
        "NOP", "LDI", "MOV", "OUT", "IN", "STS", "LDS", "CLR",
        "ORI", "ANDI", "XORI", "OR", "AND", "XOR", "ADDI", "SUBI",
        "ADD", "SUB", "INC", "DEC", "CPI", "CP", "CALL", "RET",
        "PUSH", "POP", "JMP", "BREQ", "BRNE", "BRGE", "BRGT", "BRLE",
        "BRLT", "LSL", "LSR",
    ];

    /// Mnemonic for an opcode byte, if it is defined.
    pub fn mnemonic(opcode: u8) -> Option<&'static str> {
        Self::MNEMONICS.get(opcode as usize).copied()
    }

    /// Opcode byte for a mnemonic (case-insensitive).
    pub fn from_mnemonic(name: &str) -> Option<u8> {
        Self::MNEMONICS
            .iter()
            .position(|m| m.eq_ignore_ascii_case(name))
            .map(|i| i as u8)
    }
}

/// Split a raw word into `(opcode, op1, op2)`.
#[inline]
pub fn split(word: u32) -> (u8, u8, u8) {
    ((word >> 16) as u8, (word >> 8) as u8, word as u8)
}

/// Pack `(opcode, op1, op2)` into a raw word.
#[inline]
pub const fn assemble_word(opcode: u8, op1: u8, op2: u8) -> u32 {
    (opcode as u32) << 16 | (op1 as u32) << 8 | op2 as u32
}

/// Decode already-split instruction fields.
pub fn decode_fields(opcode: u8, op1: u8, op2: u8) -> Result<Instruction, DecodeError> {
    let instruction = match opcode {
        Opcode::NOP => Instruction::Nop,
        Opcode::LDI => Instruction::Ldi { reg: op1, imm: op2 },
        Opcode::MOV => Instruction::Mov { dst: op1, src: op2 },
        Opcode::OUT => Instruction::Out { addr: op1, reg: op2 },
        Opcode::IN => Instruction::In { reg: op1, addr: op2 },
        Opcode::STS => Instruction::Sts { addr: op1, reg: op2 },
        Opcode::LDS => Instruction::Lds { reg: op1, addr: op2 },
        Opcode::CLR => Instruction::Clr { reg: op1 },
        Opcode::ORI => Instruction::Ori { reg: op1, imm: op2 },
        Opcode::ANDI => Instruction::Andi { reg: op1, imm: op2 },
        Opcode::XORI => Instruction::Xori { reg: op1, imm: op2 },
        Opcode::OR => Instruction::Or { reg: op1, src: op2 },
        Opcode::AND => Instruction::And { reg: op1, src: op2 },
        Opcode::XOR => Instruction::Xor { reg: op1, src: op2 },
        Opcode::ADDI => Instruction::Addi { reg: op1, imm: op2 },
        Opcode::SUBI => Instruction::Subi { reg: op1, imm: op2 },
        Opcode::ADD => Instruction::Add { reg: op1, src: op2 },
        Opcode::SUB => Instruction::Sub { reg: op1, src: op2 },
        Opcode::INC => Instruction::Inc { reg: op1 },
        Opcode::DEC => Instruction::Dec { reg: op1 },
        Opcode::CPI => Instruction::Cpi { reg: op1, imm: op2 },
        Opcode::CP => Instruction::Cp { reg: op1, src: op2 },
        Opcode::CALL => Instruction::Call { addr: op1 },
        Opcode::RET => Instruction::Ret,
        Opcode::PUSH => Instruction::Push { reg: op1 },
        Opcode::POP => Instruction::Pop { reg: op1 },
        Opcode::JMP => Instruction::Jmp { addr: op1 },
        Opcode::BREQ => Instruction::Breq { addr: op1 },
        Opcode::BRNE => Instruction::Brne { addr: op1 },
        Opcode::BRGE => Instruction::Brge { addr: op1 },
        Opcode::BRGT => Instruction::Brgt { addr: op1 },
        Opcode::BRLE => Instruction::Brle { addr: op1 },
        Opcode::BRLT => Instruction::Brlt { addr: op1 },
        Opcode::LSL => Instruction::Lsl { reg: op1 },
        Opcode::LSR => Instruction::Lsr { reg: op1 },
        _ => return Err(DecodeError::InvalidOpcode(opcode)),
    };

    Ok(instruction)
}

/// Decode a raw instruction word. The top byte is ignored.
pub fn decode(word: u32) -> Result<Instruction, DecodeError> {
    let (opcode, op1, op2) = split(word);
    decode_fields(opcode, op1, op2)
}

/// Encode an instruction to its raw word.
///
/// Operands an instruction does not use are encoded as zero.
pub fn encode(instr: &Instruction) -> u32 {
    let (opcode, op1, op2) = match *instr {
        Instruction::Nop => (Opcode::NOP, 0, 0),
        Instruction::Ldi { reg, imm } => (Opcode::LDI, reg, imm),
        Instruction::Mov { dst, src } => (Opcode::MOV, dst, src),
        Instruction::Out { addr, reg } => (Opcode::OUT, addr, reg),
        Instruction::In { reg, addr } => (Opcode::IN, reg, addr),
        Instruction::Sts { addr, reg } => (Opcode::STS, addr, reg),
        Instruction::Lds { reg, addr } => (Opcode::LDS, reg, addr),
        Instruction::Clr { reg } => (Opcode::CLR, reg, 0),
        Instruction::Ori { reg, imm } => (Opcode::ORI, reg, imm),
        Instruction::Andi { reg, imm } => (Opcode::ANDI, reg, imm),
        Instruction::Xori { reg, imm } => (Opcode::XORI, reg, imm),
        Instruction::Or { reg, src } => (Opcode::OR, reg, src),
        Instruction::And { reg, src } => (Opcode::AND, reg, src),
        Instruction::Xor { reg, src } => (Opcode::XOR, reg, src),
        Instruction::Addi { reg, imm } => (Opcode::ADDI, reg, imm),
        Instruction::Subi { reg, imm } => (Opcode::SUBI, reg, imm),
        Instruction::Add { reg, src } => (Opcode::ADD, reg, src),
        Instruction::Sub { reg, src } => (Opcode::SUB, reg, src),
        Instruction::Inc { reg } => (Opcode::INC, reg, 0),
        Instruction::Dec { reg } => (Opcode::DEC, reg, 0),
        Instruction::Cpi { reg, imm } => (Opcode::CPI, reg, imm),
        Instruction::Cp { reg, src } => (Opcode::CP, reg, src),
        Instruction::Call { addr } => (Opcode::CALL, addr, 0),
        Instruction::Ret => (Opcode::RET, 0, 0),
        Instruction::Push { reg } => (Opcode::PUSH, reg, 0),
        Instruction::Pop { reg } => (Opcode::POP, reg, 0),
        Instruction::Jmp { addr } => (Opcode::JMP, addr, 0),
        Instruction::Breq { addr } => (Opcode::BREQ, addr, 0),
        Instruction::Brne { addr } => (Opcode::BRNE, addr, 0),
        Instruction::Brge { addr } => (Opcode::BRGE, addr, 0),
        Instruction::Brgt { addr } => (Opcode::BRGT, addr, 0),
        Instruction::Brle { addr } => (Opcode::BRLE, addr, 0),
        Instruction::Brlt { addr } => (Opcode::BRLT, addr, 0),
        Instruction::Lsl { reg } => (Opcode::LSL, reg, 0),
        Instruction::Lsr { reg } => (Opcode::LSR, reg, 0),
    };

    assemble_word(opcode, op1, op2)
}

impl Instruction {
    /// Opcode byte of this instruction.
    pub fn opcode(&self) -> u8 {
        split(encode(self)).0
    }

    /// Upper-case mnemonic, e.g. `"LDI"`.
    pub fn mnemonic(&self) -> &'static str {
        // Every variant encodes to a defined opcode
        Opcode::mnemonic(self.opcode()).unwrap_or("???")
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DecodeError {
    #[error("invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_zero_is_nop() {
        assert_eq!(decode(0).unwrap(), Instruction::Nop);
    }

    #[test]
    fn test_decode_field_layout() {
        // LDI R16, 0x01
        let word = 0x01_10_01;
        assert_eq!(split(word), (0x01, 0x10, 0x01));
        assert_eq!(decode(word).unwrap(), Instruction::Ldi { reg: 16, imm: 1 });
    }

    #[test]
    fn test_top_byte_ignored() {
        assert_eq!(decode(0xAB_1A_05_00).unwrap(), Instruction::Jmp { addr: 5 });
    }

    #[test]
    fn test_invalid_opcode() {
        assert_eq!(decode(0x23_00_00), Err(DecodeError::InvalidOpcode(0x23)));
        assert_eq!(decode(0xFF_00_00), Err(DecodeError::InvalidOpcode(0xFF)));
    }

    #[test]
    fn test_mnemonic_lookup() {
        assert_eq!(Opcode::mnemonic(Opcode::BRLT), Some("BRLT"));
        assert_eq!(Opcode::mnemonic(Opcode::COUNT), None);
        assert_eq!(Opcode::from_mnemonic("brne"), Some(Opcode::BRNE));
        assert_eq!(Opcode::from_mnemonic("HLT"), None);
        assert_eq!(Instruction::Lsr { reg: 3 }.mnemonic(), "LSR");
    }

    proptest! {
        #[test]
        fn prop_every_defined_opcode_decodes(opcode in 0u8..Opcode::COUNT, op1: u8, op2: u8) {
            let instr = decode_fields(opcode, op1, op2).unwrap();
            prop_assert_eq!(instr.opcode(), opcode);
            // Re-encoding keeps the meaning even when unused operands are dropped
            prop_assert_eq!(decode(encode(&instr)).unwrap(), instr);
        }

        #[test]
        fn prop_undefined_opcodes_fail(opcode in Opcode::COUNT..=u8::MAX, op1: u8, op2: u8) {
            prop_assert_eq!(
                decode_fields(opcode, op1, op2),
                Err(DecodeError::InvalidOpcode(opcode))
            );
        }
    }
}
