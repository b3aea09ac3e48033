//! Program images: instruction words plus the routine symbols that name
//! address ranges within them.

use serde::{Serialize, Deserialize};

/// A named routine starting at `addr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub addr: u8,
}

/// A program ready to be installed into program memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Instruction words, address 0 first.
    pub words: Vec<u32>,
    /// Routine entry points, sorted by address.
    pub symbols: Vec<Symbol>,
}

impl Program {
    /// A program without symbols.
    pub fn from_words(words: Vec<u32>) -> Self {
        Self { words, symbols: Vec::new() }
    }

    /// Record a routine starting at `addr`.
    ///
    /// A later symbol at the same address replaces the earlier one.
    pub fn add_symbol(&mut self, name: impl Into<String>, addr: u8) {
        let name = name.into();
        match self.symbols.binary_search_by_key(&addr, |s| s.addr) {
            Ok(i) => self.symbols[i].name = name,
            Err(i) => self.symbols.insert(i, Symbol { name, addr }),
        }
    }

    /// Address of a routine by name.
    pub fn symbol_addr(&self, name: &str) -> Option<u8> {
        self.symbols.iter().find(|s| s.name == name).map(|s| s.addr)
    }

    /// Name of the routine containing `addr`.
    ///
    /// A routine spans from its entry point up to the next symbol, or to the
    /// end of the program for the last one. Addresses outside every routine
    /// are `"Unknown"`.
    pub fn routine_name(&self, addr: u8) -> &str {
        if addr as usize >= self.words.len() {
            return "Unknown";
        }
        self.symbols
            .iter()
            .rev()
            .find(|s| s.addr <= addr)
            .map_or("Unknown", |s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
