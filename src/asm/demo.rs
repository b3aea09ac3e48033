//! Built-in LED/button demo program.
//!
//! Polls a button on PORTB5 (pull-up enabled) and drives an LED on PORTB0:
//! the LED is lit while PINB5 reads high.
//!
//! ```text
//! RESET_vect: JMP main
//! main:       CALL setup
//! main_loop:  IN R16, PINB
//!             ANDI R16, (1 << BUTTON1)
//!             BRNE led1_on
//! led1_off:   IN R16, PORTB
//!             ANDI R16, ~(1 << LED1)
//!             OUT PORTB, R16
//!             JMP main_loop
//! led1_on:    IN R16, PORTB
//!             ORI R16, (1 << LED1)
//!             OUT PORTB, R16
//!             JMP main_loop
//! setup:      LDI R16, (1 << LED1)
//!             OUT DDRB, R16
//!             LDI R16, (1 << BUTTON1)
//!             OUT PORTB, R16
//!             RET
//! ```

use crate::cpu::decode::{encode, Instruction};
use crate::cpu::io::{DDRB, PINB, PORTB};
use crate::cpu::program::Program;
use crate::cpu::registers::R16;

/// Bit of the LED on port B.
pub const LED1: u8 = 0;
/// Bit of the button on port B.
pub const BUTTON1: u8 = 5;

const MAIN: u8 = 1;
const MAIN_LOOP: u8 = 2;
const LED1_OFF: u8 = 5;
const LED1_ON: u8 = 9;
const SETUP: u8 = 13;

/// The demo as a program image with its routine symbols.
pub fn demo_program() -> Program {
    use Instruction::*;

    let code = [
        // RESET_vect
        Jmp { addr: MAIN },
        // main
        Call { addr: SETUP },
        In { reg: R16, addr: PINB },
        Andi { reg: R16, imm: 1 << BUTTON1 },
        Brne { addr: LED1_ON },
        // led1_off
        In { reg: R16, addr: PORTB },
        Andi { reg: R16, imm: !(1 << LED1) },
        Out { addr: PORTB, reg: R16 },
        Jmp { addr: MAIN_LOOP },
        // led1_on
        In { reg: R16, addr: PORTB },
        Ori { reg: R16, imm: 1 << LED1 },
        Out { addr: PORTB, reg: R16 },
        Jmp { addr: MAIN_LOOP },
        // setup
        Ldi { reg: R16, imm: 1 << LED1 },
        Out { addr: DDRB, reg: R16 },
        Ldi { reg: R16, imm: 1 << BUTTON1 },
        Out { addr: PORTB, reg: R16 },
        Ret,
    ];

    let mut program = Program::from_words(code.iter().map(encode).collect());
    program.add_symbol("RESET_vect", 0);
    program.add_symbol("main", MAIN);
    program.add_symbol("led1_off", LED1_OFF);
    program.add_symbol("led1_on", LED1_ON);
    program.add_symbol("setup", SETUP);
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assembler::assemble;
    use crate::cpu::Cpu;

    /// The demo in assembler form (as in the module docs).
    const DEMO_SOURCE: &str = r#"
        .equ LED1, 0
        .equ BUTTON1, 5
    RESET_vect:
        JMP main
    main:
        CALL setup
        IN R16, PINB
        ANDI R16, (1 << BUTTON1)
        BRNE led1_on
    led1_off:
        IN R16, PORTB
        ANDI R16, ~(1 << LED1)
        OUT PORTB, R16
        JMP 2
    led1_on:
        IN R16, PORTB
        ORI R16, (1 << LED1)
        OUT PORTB, R16
        JMP 2
    setup:
        LDI R16, (1 << LED1)
        OUT DDRB, R16
        LDI R16, (1 << BUTTON1)
        OUT PORTB, R16
        RET
    "#;

    #[test]
    fn test_demo_matches_source() {
        assert_eq!(assemble(DEMO_SOURCE).unwrap(), demo_program());
    }

    #[test]
    fn test_demo_routine_names() {
        let program = demo_program();
        assert_eq!(program.len(), 18);
        assert_eq!(program.routine_name(0), "RESET_vect");
        assert_eq!(program.routine_name(3), "main");
        assert_eq!(program.routine_name(7), "led1_off");
        assert_eq!(program.routine_name(12), "led1_on");
        assert_eq!(program.routine_name(17), "setup");
        assert_eq!(program.routine_name(18), "Unknown");
    }

    #[test]
    fn test_demo_follows_button() {
        let mut cpu = Cpu::with_program(&demo_program()).unwrap();
        // Reset vector, setup, and a first pass through the loop
        cpu.run_instructions(20);
        assert_eq!(cpu.data.read(DDRB as u16), 1 << LED1);
        // Pull-up reads as low until the driver sets PINB: LED off
        assert_eq!(cpu.data.read(PORTB as u16) & (1 << LED1), 0);

        // Press: PINB5 high lights the LED
        cpu.data.write(PINB as u16, 1 << BUTTON1);
        cpu.run_instructions(20);
        assert_eq!(cpu.data.read(PORTB as u16) & (1 << LED1), 1 << LED1);

        // Release
        cpu.data.write(PINB as u16, 0);
        cpu.run_instructions(20);
        assert_eq!(cpu.data.read(PORTB as u16) & (1 << LED1), 0);
    }
}
