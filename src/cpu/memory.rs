//! Memory subsystem.
//!
//! Two independent stores:
//! - [`ProgramMemory`]: 256 read-only 24-bit instruction words
//! - [`DataMemory`]: 512 bytes, the I/O bank (0-255) followed by the
//!   variable bank (256-511) used by STS/LDS
//!
//! Neither store ever fails a read during execution; addresses outside the
//! store yield zero.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Number of instruction words in program memory.
pub const PROGRAM_MEMORY_SIZE: usize = 256;

/// Number of bytes in data memory (two 256-byte banks).
pub const DATA_MEMORY_SIZE: usize = 512;

/// Offset of the variable bank addressed by STS/LDS.
pub const VARIABLE_BANK_OFFSET: u16 = 256;

/// Only the low 24 bits of a program word are significant.
pub const INSTRUCTION_MASK: u32 = 0x00FF_FFFF;

/// Read-only instruction store.
///
/// Programs are installed by the driver with [`ProgramMemory::load`]; the
/// control unit only ever reads.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramMemory {
    words: Vec<u32>,
}

impl ProgramMemory {
    /// Create an empty program memory (every word is NOP).
    pub fn new() -> Self {
        Self {
            words: vec![0; PROGRAM_MEMORY_SIZE],
        }
    }

    /// Build a program memory holding `program` at address 0.
    pub fn from_words(program: &[u32]) -> Result<Self, MemoryError> {
        let mut mem = Self::new();
        mem.load(program)?;
        Ok(mem)
    }

    /// Replace the contents with `program`, starting at address 0.
    ///
    /// Words past the end of the program are cleared to NOP and the top
    /// byte of every word is dropped.
    pub fn load(&mut self, program: &[u32]) -> Result<(), MemoryError> {
        if program.len() > PROGRAM_MEMORY_SIZE {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: PROGRAM_MEMORY_SIZE,
            });
        }

        self.words.fill(0);
        for (slot, &word) in self.words.iter_mut().zip(program) {
            *slot = word & INSTRUCTION_MASK;
        }

        Ok(())
    }

    /// Read the instruction at `addr`. Out of range yields NOP (0).
    #[inline]
    pub fn read(&self, addr: usize) -> u32 {
        self.words.get(addr).copied().unwrap_or(0)
    }

    /// Index one past the last non-NOP word.
    pub fn program_len(&self) -> usize {
        self.words.iter().rposition(|&w| w != 0).map_or(0, |i| i + 1)
    }

    /// Dump a range of words (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u32)> {
        let end = (start + count).min(PROGRAM_MEMORY_SIZE);
        (start.min(end)..end)
            .map(|i| (i, self.words[i]))
            .collect()
    }
}

impl Default for ProgramMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProgramMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramMemory")
            .field("program_len", &self.program_len())
            .field("total_words", &PROGRAM_MEMORY_SIZE)
            .finish()
    }
}

/// Flat byte-addressable data store standing in for memory-mapped I/O.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMemory {
    cells: Vec<u8>,
}

impl DataMemory {
    /// Create a data memory with every byte cleared.
    pub fn new() -> Self {
        Self {
            cells: vec![0; DATA_MEMORY_SIZE],
        }
    }

    /// Clear every byte.
    pub fn reset(&mut self) {
        self.cells.fill(0);
    }

    /// Read a byte. Out of range reads return 0.
    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        self.cells.get(addr as usize).copied().unwrap_or(0)
    }

    /// Write a byte. Out of range writes are dropped.
    #[inline]
    pub fn write(&mut self, addr: u16, value: u8) {
        match self.cells.get_mut(addr as usize) {
            Some(cell) => *cell = value,
            None => log::warn!("data memory write to {:#06x} dropped (out of range)", addr),
        }
    }

    /// Dump a range of bytes (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u8)> {
        let end = (start + count).min(DATA_MEMORY_SIZE);
        (start.min(end)..end)
            .map(|i| (i, self.cells[i]))
            .collect()
    }
}

impl Default for DataMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DataMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&b| b != 0).count();

        f.debug_struct("DataMemory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &DATA_MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur while installing a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Program is too large to fit in program memory.
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}
