//! Control unit.
//!
//! Implements the fetch-decode-execute state machine and all instruction
//! behaviors. Each call to [`Cpu::step_state`] advances exactly one phase.

use crate::cpu::alu::{self, AluOp};
use crate::cpu::decode::{self, DecodeError, Instruction};
use crate::cpu::memory::{DataMemory, MemoryError, ProgramMemory, VARIABLE_BANK_OFFSET};
use crate::cpu::program::Program;
use crate::cpu::registers::{RegisterFile, StatusFlags};
use crate::cpu::stack::Stack;
use log::{debug, trace, warn};
use serde::{Serialize, Deserialize};

/// Phase of the instruction cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Read the instruction at PC into IR.
    Fetch,
    /// Split IR into opcode and operands.
    Decode,
    /// Run the decoded instruction.
    Execute,
}

impl CpuState {
    /// Numeric code of the state, as shown by debuggers.
    pub fn code(self) -> u8 {
        match self {
            CpuState::Fetch => 0,
            CpuState::Decode => 1,
            CpuState::Execute => 2,
        }
    }

    /// State for a numeric code, if the code names one.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CpuState::Fetch),
            1 => Some(CpuState::Decode),
            2 => Some(CpuState::Execute),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CpuState::Fetch => "Fetch",
            CpuState::Decode => "Decode",
            CpuState::Execute => "Execute",
        }
    }

    /// The phase that follows this one.
    pub fn next(self) -> Self {
        match self {
            CpuState::Fetch => CpuState::Decode,
            CpuState::Decode => CpuState::Execute,
            CpuState::Execute => CpuState::Fetch,
        }
    }
}

/// The 8-bit control unit together with the stores it drives.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpu {
    /// General-purpose registers R0..R31.
    pub regs: RegisterFile,
    /// Status register (ISNZVC).
    pub sr: StatusFlags,
    /// Program counter: address of the next instruction to fetch.
    pub pc: u8,
    /// Memory address register: address of the instruction last fetched.
    pub mar: u8,
    /// Instruction register: raw word last fetched.
    pub ir: u32,
    /// Opcode latched by the last decode.
    pub opcode: u8,
    /// First operand latched by the last decode.
    pub op1: u8,
    /// Second operand latched by the last decode.
    pub op2: u8,
    /// Current phase.
    pub state: CpuState,
    /// Read-only instruction store.
    pub program: ProgramMemory,
    /// Data memory (I/O bank and variable bank).
    pub data: DataMemory,
    /// Call/return and push/pop stack.
    pub stack: Stack,
    /// Instructions executed since the last reset.
    pub cycles: u64,
    /// Result of the last decode, consumed by Execute.
    decoded: Result<Instruction, DecodeError>,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
    /// Image last installed, kept for routine names.
    image: Program,
}

impl Cpu {
    /// Create a CPU with zeroed state and an all-NOP program.
    pub fn new() -> Self {
        Self {
            regs: RegisterFile::new(),
            sr: StatusFlags::new(),
            pc: 0,
            mar: 0,
            ir: 0,
            opcode: 0,
            op1: 0,
            op2: 0,
            state: CpuState::Fetch,
            program: ProgramMemory::new(),
            data: DataMemory::new(),
            stack: Stack::new(),
            cycles: 0,
            decoded: Ok(Instruction::Nop),
            last_instr: None,
            image: Program::default(),
        }
    }

    /// Create a CPU with `program` installed.
    pub fn with_program(program: &Program) -> Result<Self, MemoryError> {
        let mut cpu = Self::new();
        cpu.load_program(program)?;
        Ok(cpu)
    }

    /// Reset every register, flag, the stack and data memory.
    ///
    /// The installed program is left in place. Calling this twice in a row
    /// is the same as calling it once.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.sr = StatusFlags::new();
        self.pc = 0;
        self.mar = 0;
        self.ir = 0;
        self.opcode = 0;
        self.op1 = 0;
        self.op2 = 0;
        self.state = CpuState::Fetch;
        self.data.reset();
        self.stack.reset();
        self.cycles = 0;
        self.decoded = Ok(Instruction::Nop);
        self.last_instr = None;
        debug!("control unit reset");
    }

    /// Install a program image (words and symbols).
    ///
    /// Execution state is untouched; call [`Cpu::reset`] to restart at 0.
    pub fn load_program(&mut self, program: &Program) -> Result<(), MemoryError> {
        self.program.load(&program.words)?;
        self.image = program.clone();
        debug!(
            "loaded {} instruction words, {} symbols",
            program.len(),
            program.symbols.len()
        );
        Ok(())
    }

    /// Install bare instruction words.
    pub fn load_words(&mut self, words: &[u32]) -> Result<(), MemoryError> {
        self.load_program(&Program::from_words(words.to_vec()))
    }

    /// Advance exactly one phase of the instruction cycle.
    pub fn step_state(&mut self) {
        match self.state {
            CpuState::Fetch => {
                self.ir = self.program.read(self.pc as usize);
                self.mar = self.pc;
                self.pc = self.pc.wrapping_add(1);
                self.state = CpuState::Decode;
            }
            CpuState::Decode => {
                let (opcode, op1, op2) = decode::split(self.ir);
                self.opcode = opcode;
                self.op1 = op1;
                self.op2 = op2;
                self.decoded = decode::decode_fields(opcode, op1, op2);
                self.state = CpuState::Execute;
            }
            CpuState::Execute => match self.decoded {
                Ok(instr) => {
                    trace!("{:03}: {:?}", self.mar, instr);
                    self.execute(instr);
                    self.cycles += 1;
                    self.last_instr = Some(instr);
                    self.state = CpuState::Fetch;
                }
                Err(e) => {
                    warn!("{} at address {}, resetting", e, self.mar);
                    self.reset();
                }
            },
        }
    }

    /// Step phases until the CPU reaches Execute.
    ///
    /// From Execute this runs the pending instruction, then fetches and
    /// decodes the next one, leaving it ready to execute. From a fresh
    /// reset the first call only fetches and decodes.
    pub fn step_instruction(&mut self) {
        loop {
            self.step_state();
            if self.state == CpuState::Execute {
                break;
            }
        }
    }

    /// Run `count` calls of [`Cpu::step_instruction`].
    pub fn run_instructions(&mut self, count: u64) {
        for _ in 0..count {
            self.step_instruction();
        }
    }

    /// Force the state machine into the phase with the given code.
    ///
    /// Codes that name no phase reset the whole machine.
    pub fn set_state_code(&mut self, code: u8) {
        match CpuState::from_code(code) {
            Some(state) => self.state = state,
            None => {
                warn!("invalid CPU state code {}, resetting", code);
                self.reset();
            }
        }
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction) {
        match instr {
            Instruction::Nop => {}

            // ==================== Data Movement ====================

            Instruction::Ldi { reg, imm } => self.regs.set(reg, imm),

            Instruction::Mov { dst, src } => {
                let value = self.regs.get(src);
                self.regs.set(dst, value);
            }

            Instruction::Out { addr, reg } => {
                self.data.write(addr as u16, self.regs.get(reg));
            }

            Instruction::In { reg, addr } => {
                let value = self.data.read(addr as u16);
                self.regs.set(reg, value);
            }

            Instruction::Sts { addr, reg } => {
                self.data.write(addr as u16 + VARIABLE_BANK_OFFSET, self.regs.get(reg));
            }

            Instruction::Lds { reg, addr } => {
                let value = self.data.read(addr as u16 + VARIABLE_BANK_OFFSET);
                self.regs.set(reg, value);
            }

            Instruction::Clr { reg } => self.regs.set(reg, 0),

            // ==================== Logic / Arithmetic ====================

            Instruction::Ori { reg, imm } => self.alu_to_reg(AluOp::Or, reg, imm),
            Instruction::Andi { reg, imm } => self.alu_to_reg(AluOp::And, reg, imm),
            Instruction::Xori { reg, imm } => self.alu_to_reg(AluOp::Xor, reg, imm),
            Instruction::Addi { reg, imm } => self.alu_to_reg(AluOp::Add, reg, imm),
            Instruction::Subi { reg, imm } => self.alu_to_reg(AluOp::Sub, reg, imm),

            Instruction::Or { reg, src } => self.alu_to_reg(AluOp::Or, reg, self.regs.get(src)),
            Instruction::And { reg, src } => self.alu_to_reg(AluOp::And, reg, self.regs.get(src)),
            Instruction::Xor { reg, src } => self.alu_to_reg(AluOp::Xor, reg, self.regs.get(src)),
            Instruction::Add { reg, src } => self.alu_to_reg(AluOp::Add, reg, self.regs.get(src)),
            Instruction::Sub { reg, src } => self.alu_to_reg(AluOp::Sub, reg, self.regs.get(src)),

            Instruction::Inc { reg } => self.alu_to_reg(AluOp::Add, reg, 1),
            Instruction::Dec { reg } => self.alu_to_reg(AluOp::Sub, reg, 1),

            Instruction::Cpi { reg, imm } => {
                self.alu(AluOp::Sub, self.regs.get(reg), imm);
            }

            Instruction::Cp { reg, src } => {
                self.alu(AluOp::Sub, self.regs.get(reg), self.regs.get(src));
            }

            // ==================== Control Flow ====================

            Instruction::Call { addr } => {
                self.stack.push(self.pc);
                self.pc = addr;
            }

            Instruction::Ret => self.pc = self.stack.pop(),

            Instruction::Push { reg } => self.stack.push(self.regs.get(reg)),

            Instruction::Pop { reg } => {
                let value = self.stack.pop();
                self.regs.set(reg, value);
            }

            Instruction::Jmp { addr } => self.pc = addr,

            // ==================== Branches ====================
            // Signed conditions read S and Z only; V is not folded in.

            Instruction::Breq { addr } => self.branch_if(self.sr.zero, addr),
            Instruction::Brne { addr } => self.branch_if(!self.sr.zero, addr),
            Instruction::Brge { addr } => self.branch_if(!self.sr.sign, addr),
            Instruction::Brgt { addr } => self.branch_if(!self.sr.sign && !self.sr.zero, addr),
            Instruction::Brle { addr } => self.branch_if(self.sr.sign || self.sr.zero, addr),
            Instruction::Brlt { addr } => self.branch_if(self.sr.sign, addr),

            // ==================== Shifts ====================

            Instruction::Lsl { reg } => {
                let value = self.regs.get(reg) << 1;
                self.regs.set(reg, value);
            }

            Instruction::Lsr { reg } => {
                let value = self.regs.get(reg) >> 1;
                self.regs.set(reg, value);
            }
        }
    }

    /// Run the ALU and latch its flags, keeping the interrupt flag.
    fn alu(&mut self, op: AluOp, a: u8, b: u8) -> u8 {
        let (result, flags) = alu::apply(op, a, b);
        self.sr = StatusFlags { interrupt: self.sr.interrupt, ..flags };
        result
    }

    /// `R[reg] := R[reg] op operand`, updating flags.
    fn alu_to_reg(&mut self, op: AluOp, reg: u8, operand: u8) {
        let result = self.alu(op, self.regs.get(reg), operand);
        self.regs.set(reg, result);
    }

    #[inline]
    fn branch_if(&mut self, condition: bool, addr: u8) {
        if condition {
            self.pc = addr;
        }
    }

    /// Result of the last decode.
    pub fn decoded(&self) -> Result<Instruction, DecodeError> {
        self.decoded
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// The installed program image.
    pub fn image(&self) -> &Program {
        &self.image
    }

    /// Name of the routine containing `addr` in the installed image.
    pub fn routine_name(&self, addr: u8) -> &str {
        self.image.routine_name(addr)
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("pc", &self.pc)
            .field("ir", &format_args!("{:#08x}", self.ir))
            .field("sr", &self.sr)
            .field("regs", &self.regs)
            .field("stack", &self.stack)
            .field("cycles", &self.cycles)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::{assemble_word, encode, Opcode};
    use crate::cpu::io::{DDRB, PINB};
    use crate::cpu::registers::{R16, R17};
    use crate::cpu::stack::STACK_TOP;

    fn make_cpu(instructions: &[Instruction]) -> Cpu {
        let words: Vec<u32> = instructions.iter().map(encode).collect();
        let mut cpu = Cpu::new();
        cpu.load_words(&words).unwrap();
        cpu
    }

    /// Run `n` full fetch/decode/execute cycles from a Fetch boundary.
    fn run_cycles(cpu: &mut Cpu, n: usize) {
        for _ in 0..n * 3 {
            cpu.step_state();
        }
    }

    #[test]
    fn test_state_cycle() {
        let mut cpu = make_cpu(&[Instruction::Nop]);
        assert_eq!(cpu.state, CpuState::Fetch);
        cpu.step_state();
        assert_eq!(cpu.state, CpuState::Decode);
        cpu.step_state();
        assert_eq!(cpu.state, CpuState::Execute);
        cpu.step_state();
        assert_eq!(cpu.state, CpuState::Fetch);
    }

    #[test]
    fn test_fetch_latches_ir_and_mar() {
        let mut cpu = make_cpu(&[Instruction::Nop, Instruction::Ldi { reg: R16, imm: 7 }]);
        run_cycles(&mut cpu, 1);
        cpu.step_state();

        assert_eq!(cpu.ir, assemble_word(Opcode::LDI, R16, 7));
        assert_eq!(cpu.mar, 1);
        assert_eq!(cpu.pc, 2);

        cpu.step_state();
        assert_eq!((cpu.opcode, cpu.op1, cpu.op2), (Opcode::LDI, R16, 7));
    }

    #[test]
    fn test_step_instruction_stops_at_execute() {
        let mut cpu = make_cpu(&[Instruction::Ldi { reg: R16, imm: 1 }]);

        cpu.step_instruction();
        assert_eq!(cpu.state, CpuState::Execute);
        // Fetched and decoded but not yet executed
        assert_eq!(cpu.regs.get(R16), 0);

        cpu.step_instruction();
        assert_eq!(cpu.state, CpuState::Execute);
        assert_eq!(cpu.regs.get(R16), 1);
        assert_eq!(cpu.cycles, 1);
    }

    #[test]
    fn test_ldi_out_writes_io() {
        let mut cpu = make_cpu(&[
            Instruction::Ldi { reg: R16, imm: 0x01 },
            Instruction::Out { addr: DDRB, reg: R16 },
        ]);

        run_cycles(&mut cpu, 2);

        assert_eq!(cpu.data.read(DDRB as u16), 0x01);
    }

    #[test]
    fn test_in_reads_io() {
        let mut cpu = make_cpu(&[Instruction::In { reg: R17, addr: PINB }]);
        cpu.data.write(PINB as u16, 0x20);

        run_cycles(&mut cpu, 1);

        assert_eq!(cpu.regs.get(R17), 0x20);
    }

    #[test]
    fn test_sts_lds_use_variable_bank() {
        let mut cpu = make_cpu(&[
            Instruction::Ldi { reg: R16, imm: 0x42 },
            Instruction::Sts { addr: 0x10, reg: R16 },
            Instruction::Lds { reg: R17, addr: 0x10 },
        ]);

        run_cycles(&mut cpu, 3);

        assert_eq!(cpu.data.read(0x110), 0x42);
        assert_eq!(cpu.data.read(0x10), 0);
        assert_eq!(cpu.regs.get(R17), 0x42);
    }

    #[test]
    fn test_call_ret() {
        let mut cpu = make_cpu(&[
            Instruction::Call { addr: 5 },
            Instruction::Nop,
            Instruction::Nop,
            Instruction::Nop,
            Instruction::Nop,
            Instruction::Ret,
        ]);
        let sp_before = cpu.stack.pointer();

        run_cycles(&mut cpu, 1);
        assert_eq!(cpu.pc, 5);
        assert_eq!(cpu.stack.pointer(), sp_before - 1);
        assert_eq!(cpu.stack.last_pushed(), 1);

        run_cycles(&mut cpu, 1);
        assert_eq!(cpu.pc, 1);
        assert_eq!(cpu.stack.pointer(), sp_before);
        assert_eq!(sp_before, STACK_TOP);
    }

    #[test]
    fn test_push_pop() {
        let mut cpu = make_cpu(&[
            Instruction::Ldi { reg: R16, imm: 9 },
            Instruction::Push { reg: R16 },
            Instruction::Clr { reg: R16 },
            Instruction::Pop { reg: R17 },
        ]);

        run_cycles(&mut cpu, 4);

        assert_eq!(cpu.regs.get(R16), 0);
        assert_eq!(cpu.regs.get(R17), 9);
        assert!(cpu.stack.is_empty());
    }

    #[test]
    fn test_cpi_breq_taken() {
        let mut cpu = make_cpu(&[
            Instruction::Ldi { reg: R16, imm: 5 },
            Instruction::Cpi { reg: R16, imm: 5 },
            Instruction::Breq { addr: 0x20 },
        ]);

        run_cycles(&mut cpu, 2);
        assert!(cpu.sr.zero);
        assert!(!cpu.sr.sign);
        // CPI leaves the register alone
        assert_eq!(cpu.regs.get(R16), 5);

        run_cycles(&mut cpu, 1);
        assert_eq!(cpu.pc, 0x20);
    }

    #[test]
    fn test_cpi_brne_not_taken() {
        let mut cpu = make_cpu(&[
            Instruction::Ldi { reg: R16, imm: 5 },
            Instruction::Cpi { reg: R16, imm: 5 },
            Instruction::Brne { addr: 0x20 },
        ]);

        run_cycles(&mut cpu, 3);
        assert_eq!(cpu.pc, 3);
    }

    #[test]
    fn test_data_movement_keeps_flags() {
        let mut cpu = make_cpu(&[
            Instruction::Ldi { reg: R16, imm: 0 },
            Instruction::Cpi { reg: R16, imm: 1 },
            Instruction::Ldi { reg: R17, imm: 0 },
            Instruction::Mov { dst: R16, src: R17 },
            Instruction::Lsl { reg: R16 },
            Instruction::Jmp { addr: 6 },
        ]);

        run_cycles(&mut cpu, 2);
        let flags = cpu.sr;
        assert!(flags.sign && flags.carry);

        run_cycles(&mut cpu, 4);
        assert_eq!(cpu.sr, flags);
    }

    #[test]
    fn test_interrupt_flag_survives_alu() {
        let mut cpu = make_cpu(&[Instruction::Addi { reg: R16, imm: 1 }]);
        cpu.sr.interrupt = true;

        run_cycles(&mut cpu, 1);

        assert!(cpu.sr.interrupt);
        assert_eq!(cpu.regs.get(R16), 1);
    }

    #[test]
    fn test_invalid_opcode_resets() {
        let mut cpu = make_cpu(&[
            Instruction::Ldi { reg: R16, imm: 3 },
            Instruction::Push { reg: R16 },
            Instruction::Cpi { reg: R16, imm: 3 },
        ]);
        let mut words: Vec<u32> = (0..3).map(|i| cpu.program.read(i)).collect();
        words.push(assemble_word(0x99, 1, 2));
        cpu.load_words(&words).unwrap();

        run_cycles(&mut cpu, 3);
        assert!(cpu.sr.zero);
        assert!(!cpu.stack.is_empty());

        // Fetch and decode the bad word, then execute it
        run_cycles(&mut cpu, 1);

        let mut fresh = cpu.clone();
        fresh.reset();
        assert_eq!(cpu.state, CpuState::Fetch);
        assert_eq!(cpu.pc, 0);
        assert_eq!(cpu.regs, fresh.regs);
        assert_eq!(cpu.sr, StatusFlags::new());
        assert!(cpu.stack.is_empty());
        // Program survives
        assert_eq!(cpu.program.read(3), assemble_word(0x99, 1, 2));
    }

    #[test]
    fn test_invalid_state_code_resets() {
        let mut cpu = make_cpu(&[Instruction::Ldi { reg: R16, imm: 3 }]);
        run_cycles(&mut cpu, 1);
        assert_eq!(cpu.regs.get(R16), 3);

        cpu.set_state_code(1);
        assert_eq!(cpu.state, CpuState::Decode);

        cpu.set_state_code(7);
        assert_eq!(cpu.state, CpuState::Fetch);
        assert_eq!(cpu.regs.get(R16), 0);
        assert_eq!(cpu.pc, 0);
    }

    #[test]
    fn test_pc_wraps() {
        let mut cpu = make_cpu(&[Instruction::Jmp { addr: 0xFF }]);
        run_cycles(&mut cpu, 2);
        // NOP at 0xFF, then PC wraps to 0
        assert_eq!(cpu.pc, 0);
    }

    #[test]
    fn test_reset_keeps_program() {
        let mut cpu = make_cpu(&[Instruction::Ldi { reg: R16, imm: 3 }]);
        run_cycles(&mut cpu, 1);
        cpu.reset();

        assert_eq!(cpu.program.read(0), encode(&Instruction::Ldi { reg: R16, imm: 3 }));
        assert_eq!(cpu.cycles, 0);
        assert_eq!(cpu.last_instruction(), None);
    }
}
