//! Configuration Tests
//!
//! Sessions opened from TOML files.

use crate::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn config_file(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn seats_come_from_the_file() {
    let file = config_file(
        r#"
        stagger_ms = 0

        [[seats]]
        id = 1
        state = "active"
        kind = "vip"

        [[seats]]
        id = 2
        state = "reserved"
        kind = "vip"
        "#,
    );
    let db = Seatlock::builder().config_file(file.path()).open().unwrap();

    assert_eq!(db.snapshot_all().unwrap().len(), 2);
    assert_eq!(db.config().stagger_ms, 0);
    assert_eq!(db.simulate(2, 2, IsolationLevel::ReadCommitted).unwrap().rejected_count(), 2);
}

#[test]
fn builder_settings_override_the_file() {
    let file = config_file("stagger_ms = 250\nmax_actors = 5\n");
    let db = Seatlock::builder()
        .config_file(file.path())
        .stagger(Duration::ZERO)
        .open()
        .unwrap();

    assert_eq!(db.config().stagger_ms, 0);
    assert_eq!(db.config().max_actors, 5);
    assert_eq!(db.snapshot_all().unwrap().len(), 50);
}

#[test]
fn lock_timeout_from_file() {
    let file = config_file("stagger_ms = 0\nlock_timeout_ms = 40\n");
    let db = Seatlock::builder().config_file(file.path()).open().unwrap();

    let mut holder = db
        .transactions()
        .begin(&**db.store(), IsolationLevel::ReadCommitted, &[42])
        .unwrap();
    holder.read_for_update(&**db.store(), 42).unwrap();

    let report = db.simulate(42, 2, IsolationLevel::ReadCommitted).unwrap();
    db.transactions()
        .rollback(&mut holder, &**db.store(), "done")
        .unwrap();

    for outcome in &report.outcomes {
        let err: Error = outcome.result.error().unwrap().clone().into();
        assert!(matches!(err, Error::Timeout(_)));
    }
}

#[test]
fn bad_files_are_config_errors() {
    let file = config_file("stagger_ms = \"soon\"\n");
    let err = Seatlock::builder().config_file(file.path()).open().err().unwrap();
    assert!(matches!(err, Error::Config(_)));

    let dir = tempfile::tempdir().unwrap();
    let err = Seatlock::open(dir.path().join("missing.toml")).err().unwrap();
    assert!(matches!(err, Error::Config(_)));
}
