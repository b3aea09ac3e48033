//! AVR8 Emulator - CLI Entry Point
//!
//! Commands:
//! - `avr8-emu run <program>` - Run an ASM or HEX24 file for N instructions
//! - `avr8-emu step <program>` - Report after every fetch, decode and execute
//! - `avr8-emu asm <source>` - Assemble to HEX24
//! - `avr8-emu disasm <image>` - Disassemble HEX24
//! - `avr8-emu demo` - Run the built-in LED/button program
//! - `avr8-emu debug <program>` - Interactive debugger

use avr8::{Cpu, Program, RunConfig, Watch};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "avr8-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "A fetch/decode/execute emulator of a small 8-bit AVR-like control unit")]
struct Cli {
    /// Log level (off, error, warn, info, debug, trace)
    #[arg(short, long, global = true)]
    verbose: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program for a number of instructions
    Run {
        /// Path to the ASM or HEX24 file to execute
        program: String,
        /// JSON run configuration
        #[arg(short, long)]
        config: Option<String>,
        /// Number of instructions to run (overrides the configuration)
        #[arg(short, long)]
        max_instructions: Option<u64>,
        /// Print a report after every instruction
        #[arg(short, long)]
        trace: bool,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a report after every single state
    Step {
        /// Path to the ASM or HEX24 file to execute
        program: String,
        /// Number of states to step
        #[arg(short, long, default_value = "12")]
        states: u64,
    },
    /// Assemble source to HEX24
    Asm {
        /// Path to the source file
        source: String,
        /// Output HEX24 file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble HEX24 to readable text
    Disasm {
        /// Path to the HEX24 file
        image: String,
    },
    /// Run the built-in LED/button program
    Demo {
        /// Hold the button on PINB5 down
        #[arg(short, long)]
        button: bool,
        /// Number of instructions to run
        #[arg(short, long, default_value = "40")]
        max_instructions: u64,
    },
    /// Interactive debugger
    Debug {
        /// Path to the ASM or HEX24 file to debug
        program: String,
        /// JSON run configuration (watch list)
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { program, config, max_instructions, trace, json }) => {
            let mut config = load_config(config.as_deref());
            if let Some(n) = max_instructions {
                config.max_instructions = n;
            }
            config.trace |= trace;
            init_logging(cli.verbose.as_deref(), &config);
            run_program(&program, &config, json);
        }
        Some(Commands::Step { program, states }) => {
            init_logging(cli.verbose.as_deref(), &RunConfig::default());
            step_program(&program, states);
        }
        Some(Commands::Asm { source, output }) => {
            init_logging(cli.verbose.as_deref(), &RunConfig::default());
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { image }) => {
            init_logging(cli.verbose.as_deref(), &RunConfig::default());
            disassemble_file(&image);
        }
        Some(Commands::Demo { button, max_instructions }) => {
            init_logging(cli.verbose.as_deref(), &RunConfig::default());
            run_demo(button, max_instructions);
        }
        Some(Commands::Debug { program, config }) => {
            let config = load_config(config.as_deref());
            debug_program(&program, &config);
        }
        None => {
            println!("AVR8 Emulator v0.1.0");
            println!("An 8-bit control unit stepped through fetch, decode and execute");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn init_logging(verbose: Option<&str>, config: &RunConfig) {
    let level = match verbose {
        Some(text) => text.parse::<LevelFilter>().unwrap_or_else(|_| {
            eprintln!("❌ Invalid log level: {}", text);
            std::process::exit(1);
        }),
        None => config.level_filter().unwrap_or(LevelFilter::Warn),
    };

    let log_config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .build();

    // Logs go to stderr so `--json` output stays clean
    if let Err(e) = TermLogger::init(level, log_config, TerminalMode::Stderr, ColorChoice::Auto) {
        eprintln!("❌ Failed to initialize logging: {}", e);
    }
}

fn load_config(path: Option<&str>) -> RunConfig {
    match path {
        Some(path) => match RunConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => RunConfig::default(),
    }
}

/// Load an ASM source or a HEX24 image, exiting on failure.
fn load_program_file(path: &str) -> Program {
    use avr8::{assemble, load_image};

    let program = if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Failed to read file: {}", e);
                std::process::exit(1);
            }
        };

        match assemble(&source) {
            Ok(program) => {
                eprintln!("📝 Assembled {} instructions", program.len());
                program
            }
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match load_image(path) {
            Ok(program) => {
                eprintln!("📂 Loaded {} instructions", program.len());
                program
            }
            Err(e) => {
                eprintln!("❌ Failed to load image: {}", e);
                std::process::exit(1);
            }
        }
    };

    if program.is_empty() {
        eprintln!("❌ No instructions to execute");
        std::process::exit(1);
    }

    program
}

fn make_cpu(program: &Program) -> Cpu {
    match Cpu::with_program(program) {
        Ok(cpu) => cpu,
        Err(e) => {
            eprintln!("❌ Failed to load program: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_program(path: &str, config: &RunConfig, json: bool) {
    let watch = match config.watch() {
        Ok(watch) => watch,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let program = load_program_file(path);
    let mut cpu = make_cpu(&program);
    if let Err(e) = config.apply_inputs(&mut cpu) {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    for _ in 0..config.max_instructions {
        cpu.step_instruction();
        if config.trace && !json {
            print!("{}", cpu.inspect_with(&watch));
        }
    }

    report(&cpu, &watch, json);
}

fn step_program(path: &str, states: u64) {
    let program = load_program_file(path);
    let mut cpu = make_cpu(&program);
    let watch = Watch::default();

    for _ in 0..states {
        cpu.step_state();
        print!("{}", cpu.inspect_with(&watch));
    }
}

fn run_demo(button: bool, max_instructions: u64) {
    use avr8::asm::demo::BUTTON1;
    use avr8::cpu::io::PINB;

    println!("💡 LED/button demo, button {}", if button { "held" } else { "released" });

    let mut cpu = make_cpu(&avr8::demo_program());
    if button {
        cpu.data.write(PINB as u16, 1 << BUTTON1);
    }
    cpu.run_instructions(max_instructions);

    report(&cpu, &Watch::default(), false);
}

fn report(cpu: &Cpu, watch: &Watch, json: bool) {
    let snapshot = cpu.inspect_with(watch);
    if json {
        match snapshot.to_json() {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("❌ Failed to serialize snapshot: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        print!("{}", snapshot);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str, config: &RunConfig) {
    use avr8::run_debugger;

    let watch = match config.watch() {
        Ok(watch) => watch,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    println!("🔍 Loading: {}", path);
    let program = load_program_file(path);

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(&program, watch) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str, _config: &RunConfig) {
    eprintln!("❌ Built without the `tui` feature");
    std::process::exit(1);
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use avr8::{assemble, save_image};

    let out_path = match output {
        Some(path) => PathBuf::from(path),
        None => image_path_for(source_path),
    };
    if out_path.as_path() == Path::new(source_path) {
        eprintln!("❌ Output would overwrite the source file: {}", source_path);
        std::process::exit(1);
    }
    let out_path = out_path.display().to_string();

    println!("📝 Assembling: {} → {}", source_path, out_path);

    // Read source
    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    // Assemble
    let program = match assemble(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Assembled {} instructions", program.len());

    if let Err(e) = save_image(&out_path, &program) {
        eprintln!("❌ Failed to save image: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path);
}

/// Default image path: the source path with a `.hex24` extension.
fn image_path_for(source_path: &str) -> PathBuf {
    Path::new(source_path).with_extension("hex24")
}

fn disassemble_file(image_path: &str) {
    use avr8::{disassemble, load_image};

    println!("📖 Disassembling: {}", image_path);
    println!();

    let program = match load_image(image_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", disassemble(&program));
}
