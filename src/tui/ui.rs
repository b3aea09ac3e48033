//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::asm::disasm::format_instruction;
use crate::cpu::io::io_name;
use crate::CpuState;
use super::app::DebuggerApp;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Percentage(45),
        ])
        .split(frame.area());

    // Left side: code, latches and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(10),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_control(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: watched registers, data memory and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(app.watch.registers.len() as u16 + app.watch.io.len() as u16 + 2),
            Constraint::Min(6),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_watch(frame, right_chunks[0], app);
    draw_memory(frame, right_chunks[1], app);
    draw_help(frame, right_chunks[2]);
}

/// Draw program memory around the current instruction.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };
            let text = format!("{}{:03}: {}", prefix, addr, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let title = format!(" {} ", app.cpu.routine_name(app.cpu.mar));
    let list = List::new(items)
        .block(Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw the control unit latches and status flags.
fn draw_control(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let cpu = &app.cpu;
    let state_style = match cpu.state {
        CpuState::Fetch => Style::default().fg(Color::Blue),
        CpuState::Decode => Style::default().fg(Color::Magenta),
        CpuState::Execute => Style::default().fg(Color::Green),
    };

    let flag = |name: &'static str, set: bool| {
        let style = if set {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        Span::styled(format!("{} ", name), style)
    };

    let content = vec![
        Line::from(vec![
            Span::raw("State: "),
            Span::styled(format!("{} ({})", cpu.state.name(), cpu.state.code()), state_style),
            Span::raw("   Cycles: "),
            Span::styled(format!("{}", cpu.cycles), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            Span::raw("PC:  "),
            Span::styled(format!("{:03}", cpu.pc), Style::default().fg(Color::White)),
            Span::raw("   MAR: "),
            Span::styled(format!("{:03}", cpu.mar), Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::raw("IR:  "),
            Span::styled(
                format!("{:08b} {:08b} {:08b}", cpu.opcode, cpu.op1, cpu.op2),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::raw("Decoded: "),
            match cpu.decoded() {
                Ok(instr) => Span::styled(format_instruction(&instr), Style::default().fg(Color::White)),
                Err(e) => Span::styled(e.to_string(), Style::default().fg(Color::Red)),
            },
        ]),
        Line::from(vec![
            Span::raw("SP:  "),
            Span::styled(format!("{:03}", cpu.stack.pointer()), Style::default().fg(Color::White)),
            Span::raw("   Top: "),
            Span::styled(format!("{:03}", cpu.stack.last_pushed()), Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::raw("SREG: "),
            flag("I", cpu.sr.interrupt),
            flag("S", cpu.sr.sign),
            flag("N", cpu.sr.negative),
            flag("Z", cpu.sr.zero),
            flag("V", cpu.sr.overflow),
            flag("C", cpu.sr.carry),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Control unit ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw watched registers and I/O locations.
fn draw_watch(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let snapshot = app.snapshot();

    let registers = snapshot.registers.iter().map(|r| {
        ListItem::new(format!("R{:<5}{:08b}  {:3}", r.index, r.value, r.value))
    });
    let io = snapshot.io.iter().map(|io| {
        ListItem::new(format!("{:<6}{:08b}  {:3}", io.name, io.value, io.value))
            .style(Style::default().fg(Color::Yellow))
    });

    let list = List::new(registers.chain(io).collect::<Vec<_>>())
        .block(Block::default()
            .title(" Watch ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)));

    frame.render_widget(list, area);
}

/// Draw data memory view.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let items: Vec<ListItem> = app
        .cpu
        .data
        .dump(app.mem_scroll, visible_rows)
        .into_iter()
        .map(|(addr, value)| {
            let label = u8::try_from(addr).ok().and_then(io_name).unwrap_or("");

            let text = format!("{:03}: {:08b} {:3} {}", addr, value, value, label);

            let style = if !label.is_empty() {
                Style::default().fg(Color::Yellow)
            } else if value != 0 {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            ListItem::new(text).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Data memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: State  n: Instruction  r: Run  p: Pause  b: Breakpoint"),
        Line::from("i: Button  x: Reset  ↑↓: Scroll memory  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}
