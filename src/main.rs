use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use floortrack::app;
use floortrack::cli::{Cli, Commands};
use floortrack::config::{self, ConsoleConfig};
use floortrack::process_guard::{self, AcquireState};
use floortrack::util::setup_tracing;

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("floortrack error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<u8> {
    setup_tracing();
    let cli = Cli::parse();
    let config = ConsoleConfig::load_or_init()?;

    match cli.command {
        Some(Commands::Status) => {
            app::print_status(&config, cli.user.as_deref())?;
            Ok(0)
        }
        Some(Commands::Doctor) => app::doctor(&config, cli.user.as_deref()),
        None => {
            let _guard = match process_guard::acquire_single_instance()? {
                AcquireState::Acquired(guard) => guard,
                AcquireState::AlreadyRunning { pid } => {
                    match pid {
                        Some(pid) => eprintln!("floortrack is already running (PID {pid})."),
                        None => eprintln!("floortrack is already running."),
                    }
                    return Ok(1);
                }
            };
            let runtime = config::runtime_settings();
            app::run(config, cli.user.as_deref(), runtime)?;
            Ok(0)
        }
    }
}
