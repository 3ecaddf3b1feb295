use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

mod commands;
mod config;
mod devmem;
mod error;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Parser)]
#[command(name = "menlo-cnc", version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// YAML file with map, controller and timing settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Drive the in memory register simulator instead of /dev/mem
    #[arg(long, global = true)]
    simulate: bool,

    /// One of `off`, `error`, `warn`, `info`, `debug` or `trace`
    #[arg(short, long, global = true, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a program; write an image with -o, otherwise print it back
    Assemble {
        source: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a program image as source
    Disasm { image: PathBuf },
    /// Assemble (or load an image) and stream it to the pulse generator
    Run { program: PathBuf },
    /// Check the register map and run the register self test
    TestCnc,
    /// Emit a pulse train on X
    TestPulse {
        /// Pulse frequency in Hz
        #[arg(default_value_t = 1_000.0)]
        frequency: f64,
        #[arg(long, default_value_t = 1_000)]
        count: u32,
        /// Pulse width in nanoseconds
        #[arg(long, default_value_t = 500)]
        width: u32,
    },
    /// Walk a single lit bit across the general purpose outputs
    TestLeds {
        /// Milliseconds per step
        #[arg(long, default_value_t = 50)]
        delay: u64,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = TermLogger::init(
        args.log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        eprintln!("cannot start logger: {e}");
    }

    if let Err(e) = main_real(args) {
        log::error!("{e}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn main_real(args: Args) -> Result<(), AppError> {
    let config = AppConfig::load(args.config.as_deref())?;
    let target = if args.simulate {
        commands::Target::Simulator
    } else {
        commands::Target::DevMem
    };
    match args.command {
        Command::Assemble { source, output } => commands::assemble(&source, output.as_deref()),
        Command::Disasm { image } => commands::disasm(&image),
        Command::Run { program } => commands::run(&config, target, &program),
        Command::TestCnc => commands::test_cnc(&config, target),
        Command::TestPulse {
            frequency,
            count,
            width,
        } => commands::test_pulse(&config, target, frequency, count, width),
        Command::TestLeds { delay } => commands::test_leds(&config, target, delay),
    }
}
