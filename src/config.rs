//! Run configuration.
//!
//! Optional JSON file consumed by the CLI. Every field has a default, so
//! `{}` is a valid configuration:
//!
//! ```json
//! {
//!   "max_instructions": 200,
//!   "trace": false,
//!   "log_level": "info",
//!   "watch": { "registers": [16, 17, 18, 24], "io": ["DDRB", "PORTB", "PINB"] },
//!   "inputs": { "PINB": 32 }
//! }
//! ```

use crate::cpu::inspect::Watch;
use crate::cpu::io::io_address;
use crate::cpu::Cpu;
use log::LevelFilter;
use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Registers and I/O locations to report, as written in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Register indices.
    pub registers: Vec<u8>,
    /// I/O register names or numeric addresses (`"0x40"`).
    pub io: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            registers: vec![16, 17, 18, 24],
            io: vec!["DDRB".into(), "PORTB".into(), "PINB".into()],
        }
    }
}

/// Settings for a CLI run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Number of instruction steps to run.
    pub max_instructions: u64,
    /// Print a report after every instruction.
    pub trace: bool,
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`.
    pub log_level: String,
    pub watch: WatchConfig,
    /// Values preloaded into I/O locations before the run (e.g. PINB).
    pub inputs: BTreeMap<String, u8>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_instructions: 100,
            trace: false,
            log_level: "warn".into(),
            watch: WatchConfig::default(),
            inputs: BTreeMap::new(),
        }
    }
}

impl RunConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Check every field that serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.level_filter()?;
        self.watch()?;
        for name in self.inputs.keys() {
            parse_io_location(name)?;
        }
        if let Some(&reg) = self.watch.registers.iter().find(|&&r| r > 31) {
            return Err(ConfigError::InvalidRegister(reg));
        }
        Ok(())
    }

    /// The configured log level.
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| ConfigError::InvalidLogLevel(self.log_level.clone()))
    }

    /// Resolve the watch list to data memory addresses.
    pub fn watch(&self) -> Result<Watch, ConfigError> {
        let io = self
            .watch
            .io
            .iter()
            .map(|name| parse_io_location(name))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Watch {
            registers: self.watch.registers.clone(),
            io,
        })
    }

    /// Write the configured inputs into data memory.
    pub fn apply_inputs(&self, cpu: &mut Cpu) -> Result<(), ConfigError> {
        for (name, &value) in &self.inputs {
            let addr = parse_io_location(name)?;
            cpu.data.write(addr as u16, value);
        }
        Ok(())
    }
}

/// Resolve an I/O register name or a numeric address.
pub fn parse_io_location(text: &str) -> Result<u8, ConfigError> {
    let text = text.trim();
    if let Some(addr) = io_address(text) {
        return Ok(addr);
    }

    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => text.parse::<u8>(),
    };
    parsed.map_err(|_| ConfigError::UnknownIoLocation(text.to_string()))
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid log level '{0}'")]
    InvalidLogLevel(String),

    #[error("unknown I/O location '{0}'")]
    UnknownIoLocation(String),

    #[error("register R{0} does not exist")]
    InvalidRegister(u8),
}
