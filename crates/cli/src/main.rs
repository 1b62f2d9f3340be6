//! Seatlock CLI: race concurrent reservations for a seat.
//!
//! Commands:
//! - `seatlock simulate --seat ID --actors N --isolation LEVEL`
//! - `seatlock tables`
//! - `seatlock show TABLE`
//!
//! Configuration comes from `--config` (TOML), then `SEATLOCK_*` environment
//! variables, then command-line flags.

mod commands;
mod format;
mod parse;

use std::process;
use std::str::FromStr;

use seatlock::{Error, Seatlock, SimulationConfig};
use tracing::Level;

use commands::build_cli;
use format::{format_error, format_report, format_rows, format_tables, OutputMode};
use parse::{global_args, matches_to_action, CliAction, GlobalArgs, SimulateArgs};

fn main() {
    let matches = build_cli().get_matches();
    let globals = global_args(&matches);
    let mode = if globals.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let action = match matches_to_action(&matches) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(2);
        }
    };

    let config = match load_config(&globals) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            process::exit(1);
        }
    };
    init_logging(globals.verbose, &config.log_level);

    process::exit(run(action, config, mode));
}

fn load_config(globals: &GlobalArgs) -> Result<SimulationConfig, Error> {
    let mut config = match &globals.config {
        Some(path) => SimulationConfig::from_file(path)?,
        None => SimulationConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

fn init_logging(verbose: u8, configured: &str) {
    let level = match verbose {
        0 => Level::from_str(configured).unwrap_or(Level::INFO),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(action: CliAction, config: SimulationConfig, mode: OutputMode) -> i32 {
    match action {
        CliAction::Simulate(args) => simulate(args, config, mode),
        CliAction::Tables => {
            print_result(open(config).and_then(|db| db.tables()), mode, |t| format_tables(t, mode))
        }
        CliAction::Show { table } => {
            print_result(open(config).and_then(|db| db.rows(&table)), mode, |rows| {
                format_rows(rows, mode)
            })
        }
    }
}

fn simulate(args: SimulateArgs, config: SimulationConfig, mode: OutputMode) -> i32 {
    let mut builder = Seatlock::builder().config(config);
    if let Some(stagger) = args.stagger {
        builder = builder.stagger(stagger);
    }
    if let Some(timeout) = args.lock_timeout {
        builder = builder.lock_timeout(Some(timeout));
    }

    let result = builder
        .open()
        .and_then(|db| db.simulate(args.seat_id, args.actors, args.isolation));
    match result {
        Ok(report) => {
            println!("{}", format_report(&report, mode, args.all));
            if report.fatal_error().is_some() {
                1
            } else {
                0
            }
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            1
        }
    }
}

fn open(config: SimulationConfig) -> Result<Seatlock, Error> {
    Seatlock::builder().config(config).open()
}

fn print_result<T>(result: Result<T, Error>, mode: OutputMode, render: impl Fn(&T) -> String) -> i32 {
    match result {
        Ok(value) => {
            println!("{}", render(&value));
            0
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            1
        }
    }
}
