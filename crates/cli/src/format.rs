//! Output formatting for human and JSON modes.

use seatlock::{Error, ReservationResult, Seat, SimulationReport};
use std::fmt::Write;

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

pub fn format_report(report: &SimulationReport, mode: OutputMode, all: bool) -> String {
    match mode {
        OutputMode::Json => to_json(report),
        OutputMode::Human => human_report(report, all),
    }
}

pub fn format_tables(tables: &[String], mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(&tables),
        OutputMode::Human => tables.join("\n"),
    }
}

pub fn format_rows(rows: &[Seat], mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(&rows),
        OutputMode::Human => seat_table(rows),
    }
}

pub fn format_error(error: &Error, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::json!({ "error": error.to_string() }).to_string(),
        OutputMode::Human => format!("(error) {}", error),
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
}

fn human_report(report: &SimulationReport, all: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "run {} | seat {} | {} actors | {}",
        report.run_id, report.seat_id, report.actor_count, report.isolation
    );

    let _ = writeln!(out, "before:");
    write_seats(&mut out, &report.before, report.seat_id, all);

    for outcome in &report.outcomes {
        let txn = outcome
            .txn_id
            .map(|id| format!("txn {}", id))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  actor {:<4} {:<9} {}",
            outcome.actor_id,
            txn,
            describe(&outcome.result)
        );
    }

    let _ = writeln!(out, "after:");
    match &report.after {
        Some(after) => write_seats(&mut out, after, report.seat_id, all),
        None => {
            let _ = writeln!(out, "  (store unavailable)");
        }
    }

    let _ = write!(
        out,
        "summary: {} reserved, {} rejected, {} conflicts, {} cancelled, {} errors in {}ms",
        report.reserved_count(),
        report.rejected_count(),
        report.conflict_count(),
        report.cancelled_count(),
        report.error_count(),
        report.elapsed_ms
    );
    if let Some(fatal) = report.fatal_error() {
        let _ = write!(out, "\nrun aborted: {}", fatal);
    }
    out
}

fn write_seats(out: &mut String, seats: &[Seat], target: u64, all: bool) {
    let mut shown = 0;
    for seat in seats.iter().filter(|s| all || s.id == target) {
        let _ = writeln!(out, "  {}", seat);
        shown += 1;
    }
    if shown == 0 {
        let _ = writeln!(out, "  seat {} does not exist", target);
    }
}

fn describe(result: &ReservationResult) -> String {
    match result {
        ReservationResult::Reserved { commit_version } => {
            format!("{} (commit v{})", result.label(), commit_version)
        }
        ReservationResult::AlreadyReservedOrInactive { state } => {
            format!("{} ({})", result.label(), state)
        }
        ReservationResult::ConflictRolledBack { reason } => format!("{}: {}", result.label(), reason),
        ReservationResult::Cancelled => result.label().to_string(),
        ReservationResult::Failed { error } => format!("{}: {}", result.label(), error),
    }
}

fn seat_table(rows: &[Seat]) -> String {
    let mut out = format!("{:<8} {:<10} {}", "id", "state", "kind");
    for seat in rows {
        let _ = write!(out, "\n{:<8} {:<10} {}", seat.id, seat.state.to_string(), seat.kind);
    }
    out
}
