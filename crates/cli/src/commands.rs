//! Clap command tree.

use clap::{value_parser, Arg, ArgAction, Command};

/// Build the `seatlock` command.
pub fn build_cli() -> Command {
    Command::new("seatlock")
        .about("Race concurrent reservations for a seat under a chosen isolation level")
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .global(true)
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log output (-v debug, -vv trace)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Print machine-readable JSON"),
        )
        .subcommand(simulate_command())
        .subcommand(Command::new("tables").about("List the tables the store exposes"))
        .subcommand(
            Command::new("show")
                .about("Print every row of a table")
                .arg(Arg::new("table").required(true).value_name("TABLE")),
        )
}

fn simulate_command() -> Command {
    Command::new("simulate")
        .about("Run concurrent actors against one seat")
        .arg(
            Arg::new("seat")
                .long("seat")
                .short('s')
                .required(true)
                .value_name("ID")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("actors")
                .long("actors")
                .short('n')
                .required(true)
                .value_name("N")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("isolation")
                .long("isolation")
                .short('i')
                .value_name("LEVEL")
                .default_value("read-committed")
                .help("read-committed, repeatable-read or serializable"),
        )
        .arg(
            Arg::new("stagger-ms")
                .long("stagger-ms")
                .value_name("MS")
                .value_parser(value_parser!(u64))
                .help("Delay between actor starts [default: from config, else 100]"),
        )
        .arg(
            Arg::new("lock-timeout-ms")
                .long("lock-timeout-ms")
                .value_name("MS")
                .value_parser(value_parser!(u64).range(1..))
                .help("Fail actors that wait longer than this for the row lock"),
        )
        .arg(
            Arg::new("all")
                .long("all")
                .action(ArgAction::SetTrue)
                .help("Print every seat before and after, not just the target"),
        )
}
