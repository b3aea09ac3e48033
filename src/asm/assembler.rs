//! Two-pass assembler.
//!
//! Syntax:
//! ```text
//! ; Comment
//! .equ LED1, 0          ; Named constant
//! main:                 ; Label (becomes a routine symbol)
//!     LDI R16, (1 << LED1)
//!     OUT DDRB, R16     ; I/O registers by name
//!     ANDI R16, ~(1 << 5)
//!     JMP main          ; Labels usable before or after definition
//!     .org 0x20         ; Continue at another address
//! ```
//!
//! Operand expressions support decimal, `0x` hex and `0b` binary literals,
//! labels, `.equ` constants, I/O register names, parentheses, unary `~`
//! and `-`, and the binary operators `<<`, `>>`, `&`, `|`, `+`, `-`.

use crate::cpu::decode::{encode, Instruction};
use crate::cpu::io;
use crate::cpu::memory::PROGRAM_MEMORY_SIZE;
use crate::cpu::program::Program;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a program image.
pub fn assemble(source: &str) -> Result<Program, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// A source line reduced to its statement.
struct Statement<'a> {
    line: usize,
    mnemonic: &'a str,
    operands: Vec<&'a str>,
}

/// The assembler state.
struct Assembler {
    /// Current address (origin).
    current_addr: usize,
    /// Label -> address.
    labels: HashMap<String, u8>,
    /// Label definitions in source order.
    label_order: Vec<(String, u8)>,
    /// `.equ` constants.
    constants: HashMap<String, i64>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            current_addr: 0,
            labels: HashMap::new(),
            label_order: Vec::new(),
            constants: HashMap::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Program, AssemblerError> {
        // Pass 1: collect labels and constants, fix every statement's address
        let mut placed = Vec::new();
        for (line_num, line) in source.lines().enumerate() {
            if let Some(stmt) = self.scan_line(line, line_num + 1)? {
                placed.push((self.current_addr, stmt));
                self.current_addr += 1;
            }
        }

        // Pass 2: encode with every symbol known
        let mut words = Vec::new();
        for (addr, stmt) in &placed {
            let instr = self.parse_instruction(stmt)?;
            if words.len() <= *addr {
                words.resize(addr + 1, 0);
            }
            words[*addr] = encode(&instr);
        }

        let mut program = Program::from_words(words);
        for (name, addr) in &self.label_order {
            program.add_symbol(name.clone(), *addr);
        }
        Ok(program)
    }

    /// Handle labels and directives; return the instruction statement, if any.
    fn scan_line<'a>(
        &mut self,
        line: &'a str,
        line_num: usize,
    ) -> Result<Option<Statement<'a>>, AssemblerError> {
        // Remove comments
        let mut line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        }
        .trim();

        // Label definition
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim();
            if !is_identifier(label) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label '{}'", label),
                });
            }
            self.define_label(label, line_num)?;
            line = line[colon_idx + 1..].trim();
        }

        if line.is_empty() {
            return Ok(None);
        }

        let (mnemonic, rest) = match line.find(char::is_whitespace) {
            Some(idx) => (&line[..idx], line[idx..].trim()),
            None => (line, ""),
        };

        let operands: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(str::trim).collect()
        };

        if mnemonic.starts_with('.') {
            self.directive(mnemonic, rest, &operands, line_num)?;
            return Ok(None);
        }

        if self.current_addr >= PROGRAM_MEMORY_SIZE {
            return Err(AssemblerError::ProgramTooLarge { line: line_num });
        }

        Ok(Some(Statement { line: line_num, mnemonic, operands }))
    }

    fn define_label(&mut self, label: &str, line_num: usize) -> Result<(), AssemblerError> {
        if self.labels.contains_key(label) {
            return Err(AssemblerError::DuplicateLabel {
                line: line_num,
                label: label.to_string(),
            });
        }
        let addr = self.address_byte(line_num)?;
        self.labels.insert(label.to_string(), addr);
        self.label_order.push((label.to_string(), addr));
        Ok(())
    }

    fn directive(
        &mut self,
        name: &str,
        rest: &str,
        operands: &[&str],
        line_num: usize,
    ) -> Result<(), AssemblerError> {
        match name.to_ascii_lowercase().as_str() {
            ".equ" | ".set" => {
                // Accept both `.equ NAME, value` and `.equ NAME = value`
                let (ident, expr) = match rest.split_once('=') {
                    Some((ident, expr)) => (ident.trim(), expr.trim()),
                    None if operands.len() == 2 => (operands[0], operands[1]),
                    None => {
                        return Err(AssemblerError::SyntaxError {
                            line: line_num,
                            message: ".equ requires a name and a value".into(),
                        })
                    }
                };
                if !is_identifier(ident) {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!("invalid constant name '{}'", ident),
                    });
                }
                let value = self.eval(expr, line_num)?;
                self.constants.insert(ident.to_string(), value);
            }

            ".org" => {
                let [expr] = operands else {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: ".org requires an address".into(),
                    });
                };
                let addr = self.eval(expr, line_num)?;
                if !(0..PROGRAM_MEMORY_SIZE as i64).contains(&addr) {
                    return Err(AssemblerError::ValueOutOfRange { line: line_num, value: addr });
                }
                self.current_addr = addr as usize;
            }

            _ => {
                return Err(AssemblerError::UnknownMnemonic {
                    line: line_num,
                    mnemonic: name.to_string(),
                })
            }
        }

        Ok(())
    }

    fn parse_instruction(&self, stmt: &Statement<'_>) -> Result<Instruction, AssemblerError> {
        let line = stmt.line;
        let mnemonic = stmt.mnemonic.to_ascii_uppercase();
        let ops = &stmt.operands;

        let expect = |count: usize| -> Result<(), AssemblerError> {
            if ops.len() == count {
                Ok(())
            } else {
                Err(AssemblerError::OperandCount {
                    line,
                    mnemonic: mnemonic.clone(),
                    expected: count,
                    found: ops.len(),
                })
            }
        };

        let instr = match mnemonic.as_str() {
            "NOP" => { expect(0)?; Instruction::Nop }
            "RET" => { expect(0)?; Instruction::Ret }

            // Single register
            "CLR" | "INC" | "DEC" | "PUSH" | "POP" | "LSL" | "LSR" => {
                expect(1)?;
                let reg = self.register(ops[0], line)?;
                match mnemonic.as_str() {
                    "CLR" => Instruction::Clr { reg },
                    "INC" => Instruction::Inc { reg },
                    "DEC" => Instruction::Dec { reg },
                    "PUSH" => Instruction::Push { reg },
                    "POP" => Instruction::Pop { reg },
                    "LSL" => Instruction::Lsl { reg },
                    _ => Instruction::Lsr { reg },
                }
            }

            // Register, immediate
            "LDI" | "ORI" | "ANDI" | "XORI" | "ADDI" | "SUBI" | "CPI" => {
                expect(2)?;
                let reg = self.register(ops[0], line)?;
                let imm = self.byte(ops[1], line)?;
                match mnemonic.as_str() {
                    "LDI" => Instruction::Ldi { reg, imm },
                    "ORI" => Instruction::Ori { reg, imm },
                    "ANDI" => Instruction::Andi { reg, imm },
                    "XORI" => Instruction::Xori { reg, imm },
                    "ADDI" => Instruction::Addi { reg, imm },
                    "SUBI" => Instruction::Subi { reg, imm },
                    _ => Instruction::Cpi { reg, imm },
                }
            }

            // Register, register
            "MOV" | "OR" | "AND" | "XOR" | "ADD" | "SUB" | "CP" => {
                expect(2)?;
                let reg = self.register(ops[0], line)?;
                let src = self.register(ops[1], line)?;
                match mnemonic.as_str() {
                    "MOV" => Instruction::Mov { dst: reg, src },
                    "OR" => Instruction::Or { reg, src },
                    "AND" => Instruction::And { reg, src },
                    "XOR" => Instruction::Xor { reg, src },
                    "ADD" => Instruction::Add { reg, src },
                    "SUB" => Instruction::Sub { reg, src },
                    _ => Instruction::Cp { reg, src },
                }
            }

            // Address, register
            "OUT" | "STS" => {
                expect(2)?;
                let addr = self.byte(ops[0], line)?;
                let reg = self.register(ops[1], line)?;
                if mnemonic == "OUT" {
                    Instruction::Out { addr, reg }
                } else {
                    Instruction::Sts { addr, reg }
                }
            }

            // Register, address
            "IN" | "LDS" => {
                expect(2)?;
                let reg = self.register(ops[0], line)?;
                let addr = self.byte(ops[1], line)?;
                if mnemonic == "IN" {
                    Instruction::In { reg, addr }
                } else {
                    Instruction::Lds { reg, addr }
                }
            }

            // Program address
            "CALL" | "JMP" | "BREQ" | "BRNE" | "BRGE" | "BRGT" | "BRLE" | "BRLT" => {
                expect(1)?;
                let addr = self.byte(ops[0], line)?;
                match mnemonic.as_str() {
                    "CALL" => Instruction::Call { addr },
                    "JMP" => Instruction::Jmp { addr },
                    "BREQ" => Instruction::Breq { addr },
                    "BRNE" => Instruction::Brne { addr },
                    "BRGE" => Instruction::Brge { addr },
                    "BRGT" => Instruction::Brgt { addr },
                    "BRLE" => Instruction::Brle { addr },
                    _ => Instruction::Brlt { addr },
                }
            }

            _ => {
                return Err(AssemblerError::UnknownMnemonic {
                    line,
                    mnemonic: stmt.mnemonic.to_string(),
                })
            }
        };

        Ok(instr)
    }

    /// Parse a register operand `R0`..`R31`.
    fn register(&self, operand: &str, line: usize) -> Result<u8, AssemblerError> {
        let index = operand
            .strip_prefix(['R', 'r'])
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|&n| n < 32);

        index.ok_or_else(|| AssemblerError::SyntaxError {
            line,
            message: format!("expected register R0-R31, found '{}'", operand),
        })
    }

    /// Evaluate an operand that must fit in a byte.
    ///
    /// Negative values down to -128 wrap, so `~(1 << 0)` gives 0xFE.
    fn byte(&self, operand: &str, line: usize) -> Result<u8, AssemblerError> {
        let value = self.eval(operand, line)?;
        if !(-128..=255).contains(&value) {
            return Err(AssemblerError::ValueOutOfRange { line, value });
        }
        Ok(value as u8)
    }

    fn address_byte(&self, line: usize) -> Result<u8, AssemblerError> {
        u8::try_from(self.current_addr)
            .map_err(|_| AssemblerError::ProgramTooLarge { line })
    }

    fn eval(&self, expr: &str, line: usize) -> Result<i64, AssemblerError> {
        let tokens = tokenize(expr).map_err(|message| AssemblerError::SyntaxError { line, message })?;
        let mut parser = ExprParser { tokens: &tokens, pos: 0, asm: self, line };
        let value = parser.or_expr()?;
        if parser.pos != tokens.len() {
            return Err(AssemblerError::SyntaxError {
                line,
                message: format!("unexpected trailing input in '{}'", expr),
            });
        }
        Ok(value)
    }

    fn resolve(&self, name: &str, line: usize) -> Result<i64, AssemblerError> {
        if let Some(&value) = self.constants.get(name) {
            return Ok(value);
        }
        if let Some(&addr) = self.labels.get(name) {
            return Ok(addr as i64);
        }
        if let Some(addr) = io::io_address(name) {
            return Ok(addr as i64);
        }
        Err(AssemblerError::UndefinedSymbol { line, name: name.to_string() })
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(i64),
    Ident(String),
    Op(&'static str),
    Open,
    Close,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let bytes = expr.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' => i += 1,
            '(' => { tokens.push(Token::Open); i += 1; }
            ')' => { tokens.push(Token::Close); i += 1; }
            '~' => { tokens.push(Token::Op("~")); i += 1; }
            '&' => { tokens.push(Token::Op("&")); i += 1; }
            '|' => { tokens.push(Token::Op("|")); i += 1; }
            '+' => { tokens.push(Token::Op("+")); i += 1; }
            '-' => { tokens.push(Token::Op("-")); i += 1; }
            '<' | '>' => {
                if bytes.get(i + 1) != Some(&bytes[i]) {
                    return Err(format!("expected '{}{}'", c, c));
                }
                tokens.push(Token::Op(if c == '<' { "<<" } else { ">>" }));
                i += 2;
            }
            _ if c.is_ascii_alphanumeric() || c == '_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let word = &expr[start..i];
                if c.is_ascii_digit() {
                    tokens.push(Token::Number(parse_number(word)?));
                } else {
                    tokens.push(Token::Ident(word.to_string()));
                }
            }
            _ => return Err(format!("unexpected character '{}'", c)),
        }
    }

    if tokens.is_empty() {
        return Err("missing operand".into());
    }
    Ok(tokens)
}

fn parse_number(word: &str) -> Result<i64, String> {
    let lower = word.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2)
    } else {
        lower.parse::<i64>()
    };
    parsed.map_err(|_| format!("invalid number '{}'", word))
}

/// Recursive-descent evaluator, lowest precedence first:
/// `|`, `&`, `<< >>`, `+ -`, unary.
struct ExprParser<'t, 'a> {
    tokens: &'t [Token],
    pos: usize,
    asm: &'a Assembler,
    line: usize,
}

impl ExprParser<'_, '_> {
    fn peek_op(&self, op: &str) -> bool {
        matches!(self.tokens.get(self.pos), Some(Token::Op(o)) if *o == op)
    }

    fn or_expr(&mut self) -> Result<i64, AssemblerError> {
        let mut value = self.and_expr()?;
        while self.peek_op("|") {
            self.pos += 1;
            value |= self.and_expr()?;
        }
        Ok(value)
    }

    fn and_expr(&mut self) -> Result<i64, AssemblerError> {
        let mut value = self.shift_expr()?;
        while self.peek_op("&") {
            self.pos += 1;
            value &= self.shift_expr()?;
        }
        Ok(value)
    }

    fn shift_expr(&mut self) -> Result<i64, AssemblerError> {
        let mut value = self.sum_expr()?;
        loop {
            if self.peek_op("<<") {
                self.pos += 1;
                let rhs = self.sum_expr()?;
                value = value.checked_shl(self.shift_amount(rhs)?).unwrap_or(0);
            } else if self.peek_op(">>") {
                self.pos += 1;
                let rhs = self.sum_expr()?;
                value >>= self.shift_amount(rhs)?;
            } else {
                return Ok(value);
            }
        }
    }

    fn shift_amount(&self, rhs: i64) -> Result<u32, AssemblerError> {
        u32::try_from(rhs)
            .ok()
            .filter(|&n| n < 32)
            .ok_or(AssemblerError::ValueOutOfRange { line: self.line, value: rhs })
    }

    fn sum_expr(&mut self) -> Result<i64, AssemblerError> {
        let mut value = self.unary()?;
        loop {
            if self.peek_op("+") {
                self.pos += 1;
                let rhs = self.unary()?;
                value = value.checked_add(rhs).ok_or(self.out_of_range(rhs))?;
            } else if self.peek_op("-") {
                self.pos += 1;
                let rhs = self.unary()?;
                value = value.checked_sub(rhs).ok_or(self.out_of_range(rhs))?;
            } else {
                return Ok(value);
            }
        }
    }

    fn unary(&mut self) -> Result<i64, AssemblerError> {
        if self.peek_op("~") {
            self.pos += 1;
            return Ok(!self.unary()?);
        }
        if self.peek_op("-") {
            self.pos += 1;
            let value = self.unary()?;
            return value.checked_neg().ok_or(self.out_of_range(value));
        }
        self.primary()
    }

    fn out_of_range(&self, value: i64) -> AssemblerError {
        AssemblerError::ValueOutOfRange { line: self.line, value }
    }

    fn primary(&mut self) -> Result<i64, AssemblerError> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        match token {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Ident(name)) => self.asm.resolve(&name, self.line),
            Some(Token::Open) => {
                let value = self.or_expr()?;
                match self.tokens.get(self.pos) {
                    Some(Token::Close) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err(AssemblerError::SyntaxError {
                        line: self.line,
                        message: "missing ')'".into(),
                    }),
                }
            }
            _ => Err(AssemblerError::SyntaxError {
                line: self.line,
                message: "expected a value".into(),
            }),
        }
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("{mnemonic} on line {line} takes {expected} operand(s), found {found}")]
    OperandCount { line: usize, mnemonic: String, expected: usize, found: usize },

    #[error("undefined symbol on line {line}: {name}")]
    UndefinedSymbol { line: usize, name: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("program exceeds program memory on line {line}")]
    ProgramTooLarge { line: usize },
}
