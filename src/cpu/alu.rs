//! Arithmetic/logic unit.
//!
//! A pure function from an operation and two operands to a result byte and
//! a fresh set of status flags. The control unit decides what to do with
//! either half; compares simply drop the result.

use crate::cpu::registers::StatusFlags;
use serde::{Serialize, Deserialize};

/// Operations the ALU can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluOp {
    Or,
    And,
    Xor,
    Add,
    Sub,
}

/// Compute `a op b`, returning the result and the flags it produces.
///
/// - Z is set iff the result is zero
/// - S is bit 7 of the result, N mirrors S
/// - ADD: C is the carry out of bit 7, V is signed overflow
/// - SUB: C is the borrow (`a < b`), V is signed overflow
/// - OR/AND/XOR clear C and V
///
/// The interrupt flag is never produced here.
#[must_use]
pub fn apply(op: AluOp, a: u8, b: u8) -> (u8, StatusFlags) {
    let (result, carry, overflow) = match op {
        AluOp::Or => (a | b, false, false),
        AluOp::And => (a & b, false, false),
        AluOp::Xor => (a ^ b, false, false),
        AluOp::Add => {
            let (result, carry) = a.overflowing_add(b);
            // Both operands share a sign the result does not
            let overflow = (a ^ result) & (b ^ result) & 0x80 != 0;
            (result, carry, overflow)
        }
        AluOp::Sub => {
            let (result, borrow) = a.overflowing_sub(b);
            // Operands differ in sign and the result took the sign of b
            let overflow = (a ^ b) & (a ^ result) & 0x80 != 0;
            (result, borrow, overflow)
        }
    };

    let sign = result & 0x80 != 0;
    let flags = StatusFlags {
        interrupt: false,
        sign,
        negative: sign,
        zero: result == 0,
        overflow,
        carry,
    };

    (result, flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_logic_ops() {
        assert_eq!(apply(AluOp::Or, 0b1010, 0b0101).0, 0b1111);
        assert_eq!(apply(AluOp::And, 0b1010, 0b0110).0, 0b0010);
        assert_eq!(apply(AluOp::Xor, 0xFF, 0x0F).0, 0xF0);

        let (_, flags) = apply(AluOp::And, 0xF0, 0x0F);
        assert!(flags.zero);
        assert!(!flags.carry);
        assert!(!flags.overflow);
    }

    #[test]
    fn test_add_carry_and_overflow() {
        // 0xFF + 1 wraps to zero with carry, no signed overflow (-1 + 1)
        let (r, f) = apply(AluOp::Add, 0xFF, 0x01);
        assert_eq!(r, 0);
        assert!(f.zero && f.carry && !f.overflow);

        // 127 + 1 overflows into the sign bit
        let (r, f) = apply(AluOp::Add, 0x7F, 0x01);
        assert_eq!(r, 0x80);
        assert!(f.overflow && f.sign && f.negative && !f.carry);
    }

    #[test]
    fn test_sub_borrow_and_overflow() {
        let (r, f) = apply(AluOp::Sub, 5, 5);
        assert_eq!(r, 0);
        assert!(f.zero && !f.sign && !f.carry);

        let (r, f) = apply(AluOp::Sub, 3, 5);
        assert_eq!(r, 0xFE);
        assert!(f.carry && f.sign && !f.overflow);

        // -128 - 1 overflows to +127
        let (r, f) = apply(AluOp::Sub, 0x80, 0x01);
        assert_eq!(r, 0x7F);
        assert!(f.overflow && !f.sign);
    }

    #[test]
    fn test_interrupt_never_set() {
        for op in [AluOp::Or, AluOp::And, AluOp::Xor, AluOp::Add, AluOp::Sub] {
            assert!(!apply(op, 0xFF, 0xFF).1.interrupt);
        }
    }

    proptest! {
        #[test]
        fn prop_add_matches_wide_arithmetic(a: u8, b: u8) {
            let (r, f) = apply(AluOp::Add, a, b);
            let wide = a as u16 + b as u16;
            let signed = a as i8 as i16 + b as i8 as i16;
            prop_assert_eq!(r, wide as u8);
            prop_assert_eq!(f.carry, wide > 0xFF);
            prop_assert_eq!(f.overflow, !(-128..=127).contains(&signed));
            prop_assert_eq!(f.zero, r == 0);
            prop_assert_eq!(f.sign, r & 0x80 != 0);
            prop_assert_eq!(f.negative, f.sign);
        }

        #[test]
        fn prop_sub_matches_wide_arithmetic(a: u8, b: u8) {
            let (r, f) = apply(AluOp::Sub, a, b);
            let signed = a as i8 as i16 - b as i8 as i16;
            prop_assert_eq!(r, a.wrapping_sub(b));
            prop_assert_eq!(f.carry, a < b);
            prop_assert_eq!(f.overflow, !(-128..=127).contains(&signed));
            prop_assert_eq!(f.zero, a == b);
        }

        #[test]
        fn prop_logic_clears_carry_and_overflow(a: u8, b: u8) {
            for op in [AluOp::Or, AluOp::And, AluOp::Xor] {
                let (_, f) = apply(op, a, b);
                prop_assert!(!f.carry);
                prop_assert!(!f.overflow);
            }
        }
    }
}
