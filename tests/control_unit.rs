//! End-to-end behavior of the control unit: assembled programs run through
//! the fetch/decode/execute cycle.

use avr8::cpu::decode::{assemble_word, Opcode};
use avr8::cpu::memory::VARIABLE_BANK_OFFSET;
use avr8::{assemble, Cpu, CpuState, Program, StatusFlags};
use proptest::prelude::*;

/// Assemble `source` and execute exactly `count` instructions.
fn run_source(source: &str, count: u64) -> Cpu {
    let program = assemble(source).unwrap();
    let mut cpu = Cpu::with_program(&program).unwrap();
    // The first step only fetches and decodes
    cpu.run_instructions(count + 1);
    assert_eq!(cpu.cycles, count);
    cpu
}

#[test]
fn test_instruction_table() {
    const S: u8 = StatusFlags::S;
    const N: u8 = StatusFlags::N;
    const Z: u8 = StatusFlags::Z;
    const V: u8 = StatusFlags::V;
    const C: u8 = StatusFlags::C;

    let cases: &[(&str, u64, u8, u8)] = &[
        ("LDI R16, 0x7F\nLDI R17, 1\nADD R16, R17", 3, 0x80, S | N | V),
        ("LDI R16, 0\nSUBI R16, 1", 2, 0xFF, S | N | C),
        ("LDI R16, 0xFF\nINC R16", 2, 0x00, Z | C),
        ("LDI R16, 3\nDEC R16", 2, 0x02, 0),
        ("LDI R16, 0xF0\nANDI R16, 0x0F", 2, 0x00, Z),
        ("LDI R16, 0x0F\nORI R16, 0xF0", 2, 0xFF, S | N),
        ("LDI R16, 0xAA\nXORI R16, 0xAA", 2, 0x00, Z),
        ("LDI R16, 0x81\nLSL R16", 2, 0x02, 0),
        ("LDI R16, 0x80\nLSR R16", 2, 0x40, 0),
        ("LDI R17, 9\nMOV R16, R17", 2, 9, 0),
        ("LDI R16, 5\nPUSH R16\nCLR R16\nPOP R16", 4, 5, 0),
        ("LDI R17, 42\nSTS 0x10, R17\nLDS R16, 0x10", 3, 42, 0),
        ("LDI R16, 7\nCPI R16, 7", 2, 7, Z),
        ("LDI R16, 1\nLDI R17, 2\nCP R16, R17", 3, 1, S | N | C),
        ("LDI R16, 4\nNOP", 2, 4, 0),
        ("LDI R16, 0x10\nADDI R16, 0x20", 2, 0x30, 0),
        ("LDI R16, 0xFF\nADDI R16, 1", 2, 0x00, Z | C),
        ("LDI R16, 0x80\nLDI R17, 0x80\nADD R16, R17", 3, 0x00, Z | V | C),
        ("LDI R16, 5\nLDI R17, 3\nSUB R16, R17", 3, 0x02, 0),
        ("LDI R16, 3\nLDI R17, 5\nSUB R16, R17", 3, 0xFE, S | N | C),
        ("LDI R16, 0x0F\nLDI R17, 0xF0\nOR R16, R17", 3, 0xFF, S | N),
        ("LDI R16, 0xF0\nLDI R17, 0x3C\nAND R16, R17", 3, 0x30, 0),
        ("LDI R16, 0x55\nLDI R17, 0x55\nXOR R16, R17", 3, 0x00, Z),
        ("LDI R17, 6\nOUT PORTB, R17\nIN R16, PORTB", 3, 6, 0),
        ("LDI R16, 1\nJMP skip\nLDI R16, 2\nskip: NOP", 3, 1, 0),
    ];

    for &(source, count, r16, flags) in cases {
        let cpu = run_source(source, count);
        assert_eq!(cpu.regs.get(16), r16, "R16 after {:?}", source);
        assert_eq!(cpu.sr.bits(), flags, "flags after {:?}", source);
    }
}

#[test]
fn test_branch_truth_table() {
    // (mnemonic, taken when equal, when less, when greater)
    let branches = [
        ("BREQ", true, false, false),
        ("BRNE", false, true, true),
        ("BRGE", true, false, true),
        ("BRGT", false, false, true),
        ("BRLE", true, true, false),
        ("BRLT", false, true, false),
    ];

    for (mnemonic, eq, lt, gt) in branches {
        for (a, expected) in [(5, eq), (3, lt), (7, gt)] {
            let source = format!("LDI R16, {}\nCPI R16, 5\n{} 10", a, mnemonic);
            let cpu = run_source(&source, 3);
            let taken = cpu.mar == 10;
            assert_eq!(taken, expected, "{} after CPI {} vs 5", mnemonic, a);
            if !taken {
                assert_eq!(cpu.mar, 3);
            }
        }
    }
}

#[test]
fn test_sts_writes_variable_bank() {
    let cpu = run_source("LDI R17, 42\nSTS 0x10, R17", 2);
    assert_eq!(cpu.data.read(VARIABLE_BANK_OFFSET + 0x10), 42);
    assert_eq!(cpu.data.read(0x10), 0);
}

#[test]
fn test_signed_branch_ignores_overflow() {
    // -128 - 1 overflows to +127: S is clear, so BRLT falls through
    // even though the signed comparison is "less than".
    let cpu = run_source("LDI R16, 0x80\nCPI R16, 1\nBRLT 10", 3);
    assert!(cpu.sr.overflow);
    assert!(!cpu.sr.sign);
    assert_eq!(cpu.mar, 3);

    let cpu = run_source("LDI R16, 0x80\nCPI R16, 1\nBRGE 10", 3);
    assert_eq!(cpu.mar, 10);
}

#[test]
fn test_nested_calls() {
    let source = r#"
    start:
        CALL outer
        JMP start
    outer:
        LDI R16, 1
        CALL inner
        RET
    inner:
        LDI R17, 2
        RET
    "#;
    let program = assemble(source).unwrap();
    let mut cpu = Cpu::with_program(&program).unwrap();

    // CALL outer, LDI, CALL inner, LDI: two return addresses stacked
    cpu.run_instructions(5);
    assert_eq!(cpu.stack.depth(), 2);
    assert_eq!(cpu.routine_name(cpu.mar), "inner");

    // RET, RET: back at JMP start
    cpu.run_instructions(2);
    assert!(cpu.stack.is_empty());
    assert_eq!(cpu.mar, 1);
    assert_eq!(cpu.routine_name(cpu.mar), "start");
    assert_eq!((cpu.regs.get(16), cpu.regs.get(17)), (1, 2));
}

#[test]
fn test_invalid_opcode_resets_machine() {
    let program = assemble("LDI R16, 5\nPUSH R16\nOUT PORTB, R16").unwrap();
    let mut words = program.words.clone();
    words.push(assemble_word(Opcode::COUNT, 0, 0));
    let program = Program::from_words(words);

    let mut cpu = Cpu::with_program(&program).unwrap();
    cpu.run_instructions(4);
    assert_eq!(cpu.cycles, 3);
    assert_eq!(cpu.state, CpuState::Execute);

    cpu.step_state();
    assert_eq!(cpu, Cpu::with_program(&program).unwrap());
}

/// Words whose opcode is always recognized.
fn valid_word() -> impl Strategy<Value = u32> {
    (0..Opcode::COUNT, any::<u8>(), any::<u8>())
        .prop_map(|(opcode, op1, op2)| assemble_word(opcode, op1, op2))
}

/// Mostly valid words with the occasional unknown opcode.
fn any_word() -> impl Strategy<Value = u32> {
    prop_oneof![
        9 => valid_word(),
        1 => any::<u32>(),
    ]
}

proptest! {
    #[test]
    fn prop_reset_restores_power_on_state(
        words in prop::collection::vec(any_word(), 0..=64),
        states in 0u64..300,
        inputs in any::<u8>(),
    ) {
        let program = Program::from_words(words);
        let fresh = Cpu::with_program(&program).unwrap();
        let mut cpu = fresh.clone();
        cpu.data.write(0x23, inputs);
        for _ in 0..states {
            cpu.step_state();
        }

        cpu.reset();
        prop_assert_eq!(&cpu, &fresh);
        cpu.reset();
        prop_assert_eq!(&cpu, &fresh);
    }

    #[test]
    fn prop_instruction_step_is_three_states(
        words in prop::collection::vec(any_word(), 1..=64),
        warmup in 1u64..50,
    ) {
        let program = Program::from_words(words);
        let mut cpu = Cpu::with_program(&program).unwrap();
        cpu.run_instructions(warmup);
        prop_assert_eq!(cpu.state, CpuState::Execute);

        let mut by_states = cpu.clone();
        cpu.step_instruction();
        for _ in 0..3 {
            by_states.step_state();
        }
        prop_assert_eq!(cpu, by_states);
    }

    #[test]
    fn prop_execution_is_deterministic(
        words in prop::collection::vec(any_word(), 0..=64),
        states in 0u64..300,
    ) {
        let program = Program::from_words(words);
        let mut a = Cpu::with_program(&program).unwrap();
        let mut b = Cpu::with_program(&program).unwrap();
        for _ in 0..states {
            a.step_state();
            b.step_state();
        }
        prop_assert_eq!(a.inspect(), b.inspect());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_state_cycles_in_order(
        words in prop::collection::vec(valid_word(), 0..=64),
        states in 1u64..200,
    ) {
        let program = Program::from_words(words);
        let mut cpu = Cpu::with_program(&program).unwrap();
        for _ in 0..states {
            let before = cpu.state;
            cpu.step_state();
            prop_assert_eq!(cpu.state, before.next());
        }
        prop_assert_eq!(cpu.cycles, states / 3);
    }
}
