//! Integration tests for the tally binary.
//!
//! These tests verify end-to-end behavior including:
//! - Logging outcomes and one-entry-per-day overwrites
//! - Streak reporting against a fixed reference day
//! - History ranges, CSV export, compaction and reset

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper to create a test directory holding config and data
fn setup_test_dir() -> TempDir {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config_dir = temp_dir.path().join("config/tally");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        "[calendar]\ntimezone = \"utc\"\n",
    )
    .unwrap();
    temp_dir
}

fn data_dir(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("data")
}

/// CLI command isolated from the user's real config and data
fn cli(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tally"));
    cmd.env("XDG_CONFIG_HOME", temp_dir.path().join("config"))
        .env("HOME", temp_dir.path())
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(data_dir(temp_dir));
    cmd
}

fn log_success(temp_dir: &TempDir, date: &str) {
    cli(temp_dir)
        .args(["log", "--success", "--date", date])
        .assert()
        .success();
}

fn read_log_lines(temp_dir: &TempDir) -> Vec<String> {
    fs::read_to_string(data_dir(temp_dir).join("habits.jsonl"))
        .expect("Failed to read log")
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(String::from)
        .collect()
}

#[test]
fn test_cli_help() {
    let temp_dir = setup_test_dir();
    cli(&temp_dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Daily habit tracker with streaks"));
}

#[test]
fn test_default_command_shows_status_and_creates_habit() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("No smoking (negative)"))
        .stdout(predicate::str::contains("Current streak: 0 days"));

    let lines = read_log_lines(&temp_dir);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("\"op\":\"habit\""));
}

#[test]
fn test_log_writes_entry() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .args(["log", "--fail", "--date", "2025-01-05", "--craving", "7"])
        .args(["--note", "after dinner"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged slip for 'No smoking' on 2025-01-05"));

    let lines = read_log_lines(&temp_dir);
    let entry: serde_json::Value = serde_json::from_str(lines.last().unwrap()).unwrap();
    assert_eq!(entry["op"], "entry");
    assert_eq!(entry["is_success"], false);
    assert_eq!(entry["craving_level"], 7);
    assert_eq!(entry["note"], "after dinner");
    assert!(entry["date"].as_str().unwrap().starts_with("2025-01-05T00:00:00"));
}

#[test]
fn test_log_requires_outcome() {
    let temp_dir = setup_test_dir();
    cli(&temp_dir).args(["log"]).assert().failure();
    cli(&temp_dir)
        .args(["log", "--success", "--fail"])
        .assert()
        .failure();
}

#[test]
fn test_craving_out_of_range_rejected() {
    let temp_dir = setup_test_dir();
    cli(&temp_dir)
        .args(["log", "--success", "--craving", "11"])
        .assert()
        .failure();
}

#[test]
fn test_relogging_a_day_overwrites() {
    let temp_dir = setup_test_dir();
    log_success(&temp_dir, "2025-01-05");
    cli(&temp_dir)
        .args(["log", "--fail", "--date", "2025-01-05"])
        .assert()
        .success();

    cli(&temp_dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("2025-01-05  ✗"))
        .stdout(predicate::str::contains("✓").not());

    cli(&temp_dir)
        .args(["status", "--today", "2025-01-05"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✗ slip"))
        .stdout(predicate::str::contains("Days recorded:  1"));
}

#[test]
fn test_status_reports_streaks() {
    let temp_dir = setup_test_dir();
    for date in ["2025-01-01", "2025-01-02", "2025-01-03", "2025-01-05", "2025-01-06"] {
        log_success(&temp_dir, date);
    }

    cli(&temp_dir)
        .args(["status", "--today", "2025-01-06"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Current streak: 2 days"))
        .stdout(predicate::str::contains("Longest streak: 3 days"));

    // The streak must include the reference day itself
    cli(&temp_dir)
        .args(["status", "--today", "2025-01-07"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not logged yet"))
        .stdout(predicate::str::contains("Current streak: 0 days"));
}

#[test]
fn test_history_range() {
    let temp_dir = setup_test_dir();
    for date in ["2025-01-01", "2025-01-02", "2025-01-03", "2025-01-04"] {
        log_success(&temp_dir, date);
    }

    cli(&temp_dir)
        .args(["history", "--from", "2025-01-02", "--to", "2025-01-03"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2025-01-02"))
        .stdout(predicate::str::contains("2025-01-03"))
        .stdout(predicate::str::contains("2025-01-01").not())
        .stdout(predicate::str::contains("2025-01-04").not());
}

#[test]
fn test_habits_are_tracked_separately() {
    let temp_dir = setup_test_dir();
    log_success(&temp_dir, "2025-01-05");

    cli(&temp_dir)
        .args(["--habit", "Meditate", "status", "--today", "2025-01-05"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Meditate"))
        .stdout(predicate::str::contains("Current streak: 0 days"));
}

#[test]
fn test_export_creates_csv() {
    let temp_dir = setup_test_dir();
    log_success(&temp_dir, "2025-01-05");
    log_success(&temp_dir, "2025-01-06");

    let csv_path = temp_dir.path().join("export/history.csv");
    cli(&temp_dir)
        .arg("export")
        .arg("--out")
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 entries"));

    let contents = fs::read_to_string(&csv_path).unwrap();
    let mut lines = contents.lines();
    assert_eq!(
        lines.next().unwrap(),
        "id,date,is_success,craving_level,note,updated_at"
    );
    assert_eq!(lines.count(), 2);
}

#[test]
fn test_compact_shrinks_log() {
    let temp_dir = setup_test_dir();
    for _ in 0..3 {
        log_success(&temp_dir, "2025-01-05");
    }
    assert_eq!(read_log_lines(&temp_dir).len(), 4);

    cli(&temp_dir)
        .arg("compact")
        .assert()
        .success()
        .stdout(predicate::str::contains("dropped 2 superseded records"));

    assert_eq!(read_log_lines(&temp_dir).len(), 2);
    cli(&temp_dir)
        .args(["status", "--today", "2025-01-05"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Current streak: 1 day"));
}

#[test]
fn test_compact_without_log() {
    let temp_dir = setup_test_dir();
    cli(&temp_dir)
        .arg("compact")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to compact"));
}

#[test]
fn test_reset_deletes_habit_and_entries() {
    let temp_dir = setup_test_dir();
    log_success(&temp_dir, "2025-01-05");
    log_success(&temp_dir, "2025-01-06");

    cli(&temp_dir).arg("reset").assert().failure();

    cli(&temp_dir)
        .args(["reset", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 'No smoking' and 2 entries"));

    cli(&temp_dir)
        .args(["reset", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to reset"));

    cli(&temp_dir)
        .args(["status", "--today", "2025-01-06"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Longest streak: 0 days"));
}

#[test]
fn test_invalid_timezone_in_config_fails() {
    let temp_dir = setup_test_dir();
    fs::write(
        temp_dir.path().join("config/tally/config.toml"),
        "[calendar]\ntimezone = \"Mars/Olympus\"\n",
    )
    .unwrap();

    cli(&temp_dir).arg("status").assert().failure();
}
