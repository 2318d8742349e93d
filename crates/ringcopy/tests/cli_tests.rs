//! End-to-end tests of the `ringcopy` binary.

use assert_cmd::Command;
use predicates::prelude::*;

/// `exit(-1)` as seen by the parent process.
const SETUP_FAILURE: i32 = 255;

fn ringcopy() -> Command {
    Command::cargo_bin("ringcopy").unwrap()
}

#[test]
fn test_help_runs() {
    ringcopy()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("total buffer size in bytes"));
}

#[test]
fn test_version_runs() {
    ringcopy().arg("--version").assert().success();
}

#[test]
fn test_missing_arguments_are_usage_errors() {
    ringcopy()
        .assert()
        .code(SETUP_FAILURE)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_copies_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    let data: Vec<u8> = (0..50_000u32).map(|i| (i % 253) as u8).collect();
    std::fs::write(&input, &data).unwrap();

    ringcopy()
        .args(["-s", "4096", "-b", "3"])
        .arg(&input)
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "with buffer: 3 (blocks), block: 4096 (bytes)",
        ))
        .stdout(predicate::str::contains("Read 100%, Wrote 100%"))
        .stdout(predicate::str::contains("Completed in "));

    assert_eq!(std::fs::read(&output).unwrap(), data);
}

#[test]
fn test_quiet_hides_status_line() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    std::fs::write(&input, b"quiet please").unwrap();

    ringcopy()
        .arg("--quiet")
        .arg(&input)
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Waits").not())
        .stdout(predicate::str::contains("Completed in "));

    assert_eq!(std::fs::read(&output).unwrap(), b"quiet please");
}

#[test]
fn test_missing_input_fails_without_creating_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("missing.bin");
    let output = dir.path().join("out.bin");

    ringcopy()
        .arg(&input)
        .arg(&output)
        .assert()
        .code(SETUP_FAILURE)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("couldn't open input file"));

    assert!(!output.exists());
}

#[test]
fn test_unopenable_output_is_a_setup_failure() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("no").join("such").join("out.bin");
    std::fs::write(&input, b"data").unwrap();

    ringcopy()
        .arg(&input)
        .arg(&output)
        .assert()
        .code(SETUP_FAILURE)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("couldn't open output file"));
}

#[test]
fn test_zero_block_size_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    std::fs::write(&input, b"data").unwrap();

    ringcopy()
        .args(["-s", "0"])
        .arg(&input)
        .arg(&output)
        .assert()
        .code(SETUP_FAILURE)
        .stderr(predicate::str::contains("must be a positive integer"));

    assert!(!output.exists());
}

#[test]
fn test_zero_block_count_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    std::fs::write(&input, b"data").unwrap();

    ringcopy()
        .args(["-b", "0"])
        .arg(&input)
        .arg(&output)
        .assert()
        .code(SETUP_FAILURE)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("must be a positive integer"));

    assert!(!output.exists());
}

#[test]
fn test_non_numeric_block_count_is_rejected() {
    ringcopy()
        .args(["-b", "many", "in", "out"])
        .assert()
        .code(SETUP_FAILURE);
}
