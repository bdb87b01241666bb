// Test module - relaxed lint rules
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::indexing_slicing)]
#![allow(missing_docs)]

//! End-to-end replay against real programs on a pty.
//!
//! The programs under test are small `/bin/sh` scripts written into a
//! temporary directory, so the tests exercise the whole stack: spawn,
//! non-blocking pty reads, interpretation, expectation matching and
//! finalization.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use tempfile::TempDir;
use termex::{
    replay, Attributes, Cell, Color, ErrorCode, Expectation, Playbook, PlaybookNode, Screen,
    SessionConfig, TestVerdict,
};

fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn text_screen(lines: &[&str]) -> Screen {
    let mut screen = Screen::blank();
    for (row, line) in lines.iter().enumerate() {
        for (col, ch) in line.chars().enumerate() {
            screen.put(
                i32::try_from(row).unwrap(),
                i32::try_from(col).unwrap(),
                Cell { ch, ..Cell::default() },
            );
        }
    }
    screen
}

fn expect(screen: Screen) -> PlaybookNode {
    PlaybookNode::Expect(Expectation { screen })
}

fn action(key: &str) -> PlaybookNode {
    PlaybookNode::Action {
        key: key.to_string(),
    }
}

#[test]
fn output_only_program_passes_matching_playbook() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "greet", r"printf 'Hi\033[7m!'");

    let mut screen = text_screen(&["Hi"]);
    screen.put(
        0,
        2,
        Cell::styled('!', Attributes::Reverse, Color::Default, Color::Default),
    );
    let playbook = Playbook::new(vec![expect(screen)]);

    let config = SessionConfig::new(script.to_string_lossy());
    let verdict = replay(&config, &playbook).unwrap();
    assert!(verdict.passed(), "unexpected verdict: {verdict:?}");
}

#[test]
fn wrong_expectation_fails_with_report() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "greet", "printf 'bye'");

    let playbook = Playbook::new(vec![expect(text_screen(&["something else"]))]);
    let config = SessionConfig::new(script.to_string_lossy());

    match replay(&config, &playbook).unwrap() {
        TestVerdict::Failed { reason, report } => {
            assert!(reason.contains("closed the connection"), "reason: {reason}");
            let report = report.expect("pending expectation should produce a report");
            assert!(report.expected.contains("something else"));
            assert!(report.actual.contains("bye"));
            assert!(report.diff.contains("bye"));
        }
        other => panic!("unexpected verdict: {other:?}"),
    }
}

#[test]
fn actions_reach_the_program() {
    let dir = TempDir::new().unwrap();
    // Canonical mode with echo off: the replies only appear when the program
    // prints them, so the screen stays deterministic.
    let script = write_script(
        &dir,
        "echoer",
        concat!(
            "stty -echo icanon\n",
            "printf 'ready'\n",
            "read line\n",
            "printf '\\rgot:%s' \"$line\"",
        ),
    );

    let playbook = Playbook::new(vec![
        expect(text_screen(&["ready"])),
        action("h"),
        action("i"),
        action("Enter"),
        expect(text_screen(&["got:hi"])),
    ]);

    let config = SessionConfig::new(script.to_string_lossy());
    let verdict = replay(&config, &playbook).unwrap();
    assert!(verdict.passed(), "unexpected verdict: {verdict:?}");
}

#[test]
fn silent_program_times_out_as_failure() {
    let dir = TempDir::new().unwrap();
    // Blocks on stdin without printing; exits when the pty closes.
    let script = write_script(&dir, "silent", "read line");

    let playbook = Playbook::new(vec![expect(text_screen(&["never"]))]);
    let config = SessionConfig::new(script.to_string_lossy());

    match replay(&config, &playbook).unwrap() {
        TestVerdict::Failed { reason, report } => {
            assert!(reason.contains("not responding"), "reason: {reason}");
            assert!(report.is_some());
        }
        other => panic!("unexpected verdict: {other:?}"),
    }
}

#[test]
fn leftover_playbook_steps_fail_on_close() {
    let dir = TempDir::new().unwrap();
    // The pause keeps the pty open long enough for the follow-up action to
    // be written before the hangup.
    let script = write_script(&dir, "quick", "printf 'done'\nsleep 1");

    let playbook = Playbook::new(vec![
        expect(text_screen(&["done"])),
        action("Enter"),
        expect(text_screen(&["more"])),
    ]);
    let config = SessionConfig::new(script.to_string_lossy());

    match replay(&config, &playbook).unwrap() {
        TestVerdict::Failed { reason, .. } => {
            assert!(reason.contains("steps remain"), "reason: {reason}");
        }
        other => panic!("unexpected verdict: {other:?}"),
    }
}

#[test]
fn missing_program_is_a_spawn_error() {
    let playbook = Playbook::new(vec![]);
    let config = SessionConfig::new("/nonexistent/termex-test-program");
    let err = replay(&config, &playbook).unwrap_err();
    assert_eq!(err.code, ErrorCode::Spawn);
}

#[test]
fn hard_error_still_gives_the_child_its_grace_period() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("exited-cleanly");
    // Exits shortly after the pty hangs up; the marker only appears when the
    // child is left to finish on its own instead of being killed.
    let script = write_script(
        &dir,
        "lingerer",
        &format!("read line\nsleep 1\ntouch '{}'", marker.display()),
    );

    // An unencodable key only reaches the session through a hand-built
    // playbook; sending it aborts the run with a hard error mid-flight.
    let playbook = Playbook::new(vec![action("NoSuchKey")]);
    let config = SessionConfig::new(script.to_string_lossy());

    let err = replay(&config, &playbook).unwrap_err();
    assert_eq!(err.code, ErrorCode::Playbook);
    assert!(marker.exists(), "child was not allowed to exit on its own");
}

#[test]
fn empty_playbook_passes_when_program_exits() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "noop", "exit 0");

    let playbook = Playbook::new(vec![]);
    let config = SessionConfig::new(script.to_string_lossy());
    let verdict = replay(&config, &playbook).unwrap();
    assert!(verdict.passed(), "unexpected verdict: {verdict:?}");
}
