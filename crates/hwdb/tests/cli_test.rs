// CLI smoke tests for the hwdb binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_help_exits_zero() {
    Command::cargo_bin("hwdb")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--update"));
}

#[test]
fn test_plain_invocation_prints_usage() {
    Command::cargo_bin("hwdb")
        .unwrap()
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_update_and_query() {
    let tmp = tempdir().unwrap();
    let sources = tmp.path().join("hwdb.d");
    fs::create_dir_all(&sources).unwrap();
    fs::write(
        sources.join("60-mouse.hwdb"),
        "usb:v046DpC077*\n ID_VENDOR=Logitech\n ID_MODEL=Mouse\n",
    )
    .unwrap();
    let output = tmp.path().join("hwdb.bin");

    Command::cargo_bin("hwdb")
        .unwrap()
        .arg("--update")
        .arg("--include")
        .arg(&sources)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();
    assert!(output.is_file());

    Command::cargo_bin("hwdb")
        .unwrap()
        .arg("--query")
        .arg("usb:v046DpC077d0100")
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("ID_VENDOR=Logitech"))
        .stdout(predicate::str::contains("ID_MODEL=Mouse"));
}

#[test]
fn test_query_against_missing_database_fails() {
    let tmp = tempdir().unwrap();
    Command::cargo_bin("hwdb")
        .unwrap()
        .arg("--query")
        .arg("usb:v046DpC077")
        .arg("--output")
        .arg(tmp.path().join("nope.bin"))
        .assert()
        .failure();
}
