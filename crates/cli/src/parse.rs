//! ArgMatches → CliAction conversion.

use clap::ArgMatches;
use seatlock::{IsolationLevel, SeatId};
use std::path::PathBuf;
use std::time::Duration;

/// What the user asked for.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run a simulation.
    Simulate(SimulateArgs),
    /// List table names.
    Tables,
    /// Print every row of a table.
    Show { table: String },
}

/// Arguments of `seatlock simulate`.
#[derive(Debug, PartialEq)]
pub struct SimulateArgs {
    pub seat_id: SeatId,
    pub actors: usize,
    pub isolation: IsolationLevel,
    pub stagger: Option<Duration>,
    pub lock_timeout: Option<Duration>,
    pub all: bool,
}

/// Flags shared by every command.
#[derive(Debug, PartialEq)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub verbose: u8,
    pub json: bool,
}

pub fn global_args(matches: &ArgMatches) -> GlobalArgs {
    GlobalArgs {
        config: matches.get_one::<String>("config").map(PathBuf::from),
        verbose: matches.get_count("verbose"),
        json: matches.get_flag("json"),
    }
}

/// Convert clap ArgMatches into a CliAction.
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, String> {
    let (sub_name, sub_matches) = matches
        .subcommand()
        .ok_or_else(|| "No command provided".to_string())?;

    match sub_name {
        "simulate" => parse_simulate(sub_matches).map(CliAction::Simulate),
        "tables" => Ok(CliAction::Tables),
        "show" => {
            let table = sub_matches
                .get_one::<String>("table")
                .ok_or("Missing table name")?
                .clone();
            Ok(CliAction::Show { table })
        }
        other => Err(format!("Unknown command: {}", other)),
    }
}

fn parse_simulate(m: &ArgMatches) -> Result<SimulateArgs, String> {
    let seat_id = *m.get_one::<u64>("seat").ok_or("Missing --seat")?;
    let actors = *m.get_one::<usize>("actors").ok_or("Missing --actors")?;
    let isolation = m
        .get_one::<String>("isolation")
        .map(|raw| raw.parse::<IsolationLevel>())
        .transpose()
        .map_err(|e| e.to_string())?
        .unwrap_or_default();

    Ok(SimulateArgs {
        seat_id,
        actors,
        isolation,
        stagger: m.get_one::<u64>("stagger-ms").map(|ms| Duration::from_millis(*ms)),
        lock_timeout: m
            .get_one::<u64>("lock-timeout-ms")
            .map(|ms| Duration::from_millis(*ms)),
        all: m.get_flag("all"),
    })
}
