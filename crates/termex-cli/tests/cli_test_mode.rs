// Test module - relaxed lint rules
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

//! `termex test` end to end through the compiled binary.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn write_script(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("program");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn write_playbook(dir: &TempDir, lines: &[&str]) -> PathBuf {
    let path = dir.path().join("playbook.xml");
    let mut xml = String::from("<?xml version='1.0' encoding='utf-8'?>\n<test>\n\t<expect>\n\t\t<data>\n");
    for line in lines {
        xml.push_str(&format!("\t\t\t<line>{line}</line>\n"));
    }
    xml.push_str("\t\t</data>\n\t</expect>\n</test>\n");
    fs::write(&path, xml).unwrap();
    path
}

fn run_test_mode(program: &Path, playbook: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_termex"))
        .arg("test")
        .arg(program)
        .arg("--playbook")
        .arg(playbook)
        .output()
        .expect("binary should run")
}

#[test]
fn passing_playbook_exits_zero_with_summary() {
    let dir = TempDir::new().unwrap();
    let program = write_script(&dir, "printf 'all good'");
    let playbook = write_playbook(&dir, &["all good"]);

    let output = run_test_mode(&program, &playbook);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stdout: {stdout}");
    assert!(stdout.contains("succeeded."), "stdout: {stdout}");
}

#[test]
fn failing_playbook_exits_one_with_report() {
    let dir = TempDir::new().unwrap();
    let program = write_script(&dir, "printf 'something else'");
    let playbook = write_playbook(&dir, &["all good"]);

    let output = run_test_mode(&program, &playbook);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1), "stdout: {stdout}");
    assert!(stdout.contains("failed."), "stdout: {stdout}");
    assert!(stdout.contains("Expected screen:"), "stdout: {stdout}");
    assert!(stdout.contains("Differences:"), "stdout: {stdout}");
    assert!(stdout.contains("something else"), "stdout: {stdout}");
}

#[test]
fn malformed_playbook_is_a_hard_error() {
    let dir = TempDir::new().unwrap();
    let program = write_script(&dir, "printf 'x'");
    let playbook = dir.path().join("playbook.xml");
    fs::write(&playbook, "<wrong></wrong>").unwrap();

    let output = run_test_mode(&program, &playbook);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("E_PLAYBOOK"), "stderr: {stderr}");
}

#[test]
fn missing_playbook_file_reports_io_error() {
    let dir = TempDir::new().unwrap();
    let program = write_script(&dir, "printf 'x'");
    let playbook = dir.path().join("does-not-exist.xml");

    let output = run_test_mode(&program, &playbook);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("E_IO"), "stderr: {stderr}");
}
