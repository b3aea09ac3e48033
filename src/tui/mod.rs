//! TUI debugger for the control unit.
//!
//! Provides an interactive terminal-based debugger with:
//! - Phase-by-phase or instruction-by-instruction stepping
//! - Control unit latches and status flags
//! - Watched registers, I/O and a data memory view
//! - Breakpoints and a button input on PINB

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
