//! HEX24 program image format.
//!
//! A simple text format:
//! - One instruction per line as six hex digits (`0110 01` spacing allowed)
//! - `@name` lines mark a routine starting at the next instruction
//! - Text after `;` is a comment
//! - Blank lines are ignored

use crate::cpu::memory::PROGRAM_MEMORY_SIZE;
use crate::cpu::program::Program;
use crate::asm::disasm::disassemble_instruction;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

/// Parse an image from text.
pub fn parse_image(text: &str) -> Result<Program, ImageError> {
    read_image(text.as_bytes())
}

/// Load an image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Program, ImageError> {
    let file = std::fs::File::open(path.as_ref())?;
    read_image(BufReader::new(file))
}

fn read_image<R: BufRead>(reader: R) -> Result<Program, ImageError> {
    let mut program = Program::default();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line_num = line_num + 1;

        let content = match line.find(';') {
            Some(idx) => &line[..idx],
            None => &line[..],
        }
        .trim();

        if content.is_empty() {
            continue;
        }

        if let Some(name) = content.strip_prefix('@') {
            let name = name.trim();
            if name.is_empty() {
                return Err(ImageError::Parse { line: line_num, message: "empty symbol name".into() });
            }
            let addr = u8::try_from(program.len()).map_err(|_| ImageError::TooLarge)?;
            program.add_symbol(name, addr);
            continue;
        }

        let digits: String = content.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ImageError::Parse {
                line: line_num,
                message: format!("expected 6 hex digits, found '{}'", content),
            });
        }

        let word = u32::from_str_radix(&digits, 16).map_err(|e| ImageError::Parse {
            line: line_num,
            message: e.to_string(),
        })?;

        if program.len() == PROGRAM_MEMORY_SIZE {
            return Err(ImageError::TooLarge);
        }
        program.words.push(word);
    }

    Ok(program)
}

/// Render an image as text, with a disassembly comment on every line.
pub fn format_image(program: &Program) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail
    let _ = write_image(&mut out, program);
    String::from_utf8_lossy(&out).into_owned()
}

/// Save an image to disk.
pub fn save_image<P: AsRef<Path>>(path: P, program: &Program) -> Result<(), ImageError> {
    let mut file = std::fs::File::create(path.as_ref())?;
    write_image(&mut file, program)?;
    Ok(())
}

fn write_image<W: Write>(out: &mut W, program: &Program) -> std::io::Result<()> {
    writeln!(out, "; HEX24 program image")?;
    writeln!(out, "; {} instructions", program.len())?;
    writeln!(out)?;

    for (addr, &word) in program.words.iter().enumerate() {
        for symbol in program.symbols.iter().filter(|s| s.addr as usize == addr) {
            writeln!(out, "@{}", symbol.name)?;
        }
        writeln!(out, "{:06X} ; {:03}: {}", word & 0xFF_FFFF, addr, disassemble_instruction(word))?;
    }

    Ok(())
}

/// Errors that can occur while reading or writing images.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("image exceeds {} instruction words", PROGRAM_MEMORY_SIZE)]
    TooLarge,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assembler::assemble;

    #[test]
    fn test_parse_image() {
        let text = "; header\n@main\n01 10 01\n031610 ; OUT\n\n@loop\n1A0200\n";
        let program = parse_image(text).unwrap();

        assert_eq!(program.words, vec![0x011001, 0x031610, 0x1A0200]);
        assert_eq!(program.symbol_addr("main"), Some(0));
        assert_eq!(program.symbol_addr("loop"), Some(2));
    }

    #[test]
    fn test_format_then_parse_keeps_symbols() {
        let program = assemble("main:\n LDI R16, 1\nloop:\n JMP loop").unwrap();
        let text = format_image(&program);

        assert!(text.contains("@loop"));
        assert!(text.contains("LDI R16, 0x01"));
        assert_eq!(parse_image(&text).unwrap(), program);
    }

    #[test]
    fn test_bad_lines() {
        assert!(matches!(parse_image("12345"), Err(ImageError::Parse { line: 1, .. })));
        assert!(matches!(parse_image("\nzz0000"), Err(ImageError::Parse { line: 2, .. })));
        assert!(matches!(parse_image("@"), Err(ImageError::Parse { .. })));
        assert!(matches!(parse_image("+12345"), Err(ImageError::Parse { line: 1, .. })));
        assert!(matches!(parse_image("-00001"), Err(ImageError::Parse { line: 1, .. })));
    }

    #[test]
    fn test_too_large() {
        let text = "000000\n".repeat(PROGRAM_MEMORY_SIZE + 1);
        assert!(matches!(parse_image(&text), Err(ImageError::TooLarge)));
    }
}
