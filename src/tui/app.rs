//! Debugger application state and logic.

use crate::asm::disasm::disassemble_instruction;
use crate::cpu::io::PINB;
use crate::cpu::memory::DATA_MEMORY_SIZE;
use crate::asm::demo::BUTTON1;
use crate::{Cpu, CpuState, Program, Snapshot, Watch};
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Registers and I/O shown in the side panel.
    pub watch: Watch,
    /// Breakpoints (by program address).
    pub breakpoints: HashSet<u8>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Data memory view scroll offset.
    pub mem_scroll: usize,
    /// Resume past a breakpoint on the first tick after `run`.
    skip_breakpoint: bool,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: &Program, watch: Watch) -> Self {
        let mut cpu = Cpu::new();
        let status = match cpu.load_program(program) {
            Ok(()) => "Ready. 's' state step, 'n' instruction step, 'r' run, 'q' quit.".into(),
            Err(e) => format!("Failed to load program: {}", e),
        };

        Self {
            cpu,
            watch,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status,
            mem_scroll: 0x20,
            skip_breakpoint: false,
        }
    }

    /// Advance one phase.
    pub fn step_state(&mut self) {
        let before = self.cpu.state;
        self.cpu.step_state();
        self.status = format!(
            "{} done, next: {} (PC={:03})",
            before.name(),
            self.cpu.state.name(),
            self.cpu.pc
        );
    }

    /// Advance to the next Execute phase.
    pub fn step_instruction(&mut self) {
        self.cpu.step_instruction();
        self.status = format!(
            "{:03}: {}",
            self.cpu.mar,
            disassemble_instruction(self.cpu.ir)
        );
    }

    /// Run until paused or a breakpoint is reached.
    pub fn run(&mut self) {
        self.running = true;
        self.skip_breakpoint = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        // Stop with the breakpoint instruction decoded but not executed
        let at_breakpoint =
            self.cpu.state == CpuState::Execute && self.breakpoints.contains(&self.cpu.mar);
        if at_breakpoint && !self.skip_breakpoint {
            self.running = false;
            self.status = format!("Breakpoint at {:03}", self.cpu.mar);
            return;
        }

        self.skip_breakpoint = false;
        self.step_instruction();
    }

    /// Toggle breakpoint at the instruction last fetched.
    pub fn toggle_breakpoint(&mut self) {
        let addr = self.cpu.mar;
        if self.breakpoints.remove(&addr) {
            self.status = format!("Removed breakpoint at {:03}", addr);
        } else {
            self.breakpoints.insert(addr);
            self.status = format!("Set breakpoint at {:03}", addr);
        }
    }

    /// Flip the button input bit in PINB.
    pub fn toggle_button(&mut self) {
        let pinb = self.cpu.data.read(PINB as u16) ^ (1 << BUTTON1);
        self.cpu.data.write(PINB as u16, pinb);
        let pressed = pinb & (1 << BUTTON1) != 0;
        self.status = format!("Button {}", if pressed { "pressed" } else { "released" });
    }

    /// Reset CPU to initial state, keeping the program.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    pub fn scroll_up(&mut self) {
        self.mem_scroll = self.mem_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        if self.mem_scroll + 1 < DATA_MEMORY_SIZE {
            self.mem_scroll += 1;
        }
    }

    /// Current snapshot for the register panel.
    pub fn snapshot(&self) -> Snapshot {
        self.cpu.inspect_with(&self.watch)
    }

    /// Get disassembly around the current instruction.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u8, String, bool)> {
        let current = self.cpu.mar as usize;
        let start = current.saturating_sub(lines / 2);

        self.cpu
            .program
            .dump(start, lines)
            .into_iter()
            .map(|(addr, word)| (addr as u8, disassemble_instruction(word), addr == current))
            .collect()
    }

    /// Apply one key press.
    pub fn handle_key(&mut self, code: crossterm::event::KeyCode) {
        use crossterm::event::KeyCode;

        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('s') => {
                self.running = false;
                self.step_state();
            }
            KeyCode::Char('n') => {
                self.running = false;
                self.step_instruction();
            }
            KeyCode::Char('r') => self.run(),
            KeyCode::Char('p') => {
                self.running = false;
                self.status = "Paused.".into();
            }
            KeyCode::Char('b') => self.toggle_breakpoint(),
            KeyCode::Char('i') => self.toggle_button(),
            KeyCode::Char('x') => self.reset(),
            KeyCode::Up => self.scroll_up(),
            KeyCode::Down => self.scroll_down(),
            _ => {}
        }
    }
}

/// Run `body`, then `restore` whatever the outcome.
///
/// An error from `body` takes precedence over one from `restore`.
fn restoring<T>(
    body: impl FnOnce() -> std::io::Result<T>,
    restore: impl FnOnce() -> std::io::Result<()>,
) -> std::io::Result<T> {
    let result = body();
    let restored = restore();
    let value = result?;
    restored?;
    Ok(value)
}

/// Run the debugger with a program.
pub fn run_debugger(program: &Program, watch: Watch) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    enable_raw_mode()?;

    // Raw mode and the alternate screen are undone on every exit path
    let body = || -> std::io::Result<()> {
        stdout().execute(EnterAlternateScreen)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

        let mut app = DebuggerApp::new(program, watch);

        while !app.should_quit {
            terminal.draw(|frame| {
                super::ui::draw(frame, &app);
            })?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        app.handle_key(key.code);
                    }
                }
            }

            if app.running {
                app.tick();
            }
        }

        Ok(())
    };

    restoring(body, || {
        disable_raw_mode()?;
        stdout().execute(LeaveAlternateScreen)?;
        Ok(())
    })
}
