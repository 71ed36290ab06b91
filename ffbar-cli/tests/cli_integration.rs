//! Integration tests for the ffbar binary surface.
//!
//! `FFBAR_FFMPEG` points the wrapper at a shell stand-in so the tests
//! run without a real ffmpeg installation.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn no_arguments_prints_usage_and_exits_zero() {
    Command::cargo_bin("ffbar")
        .expect("binary should build")
        .assert()
        .success()
        .stdout(predicate::str::contains("USAGE:"))
        .stdout(predicate::str::contains("ffmpeg"));
}

#[cfg(unix)]
#[test]
fn child_exit_code_becomes_the_wrapper_exit_code() {
    Command::cargo_bin("ffbar")
        .expect("binary should build")
        .env("FFBAR_FFMPEG", "sh")
        .args(["-c", "exit 5"])
        .assert()
        .code(5);
}

#[cfg(unix)]
#[test]
fn failing_child_reports_its_last_diagnostic_line() {
    Command::cargo_bin("ffbar")
        .expect("binary should build")
        .env("FFBAR_FFMPEG", "sh")
        .args([
            "-c",
            "printf 'something harmless\\nconversion failed!\\n' >&2; exit 2",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("conversion failed!"));
}

#[test]
fn missing_ffmpeg_is_reported_as_a_fatal_error() {
    Command::cargo_bin("ffbar")
        .expect("binary should build")
        .env("FFBAR_FFMPEG", "ffbar-definitely-not-installed")
        .args(["-i", "input.mkv", "output.mp4"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ffbar: failed to start"));
}

#[cfg(unix)]
#[test]
fn hyphenated_arguments_are_forwarded_verbatim() {
    // `-c` would be rejected by a flag-parsing CLI; ffbar must pass it
    // straight through to the child.
    Command::cargo_bin("ffbar")
        .expect("binary should build")
        .env("FFBAR_FFMPEG", "sh")
        .args(["-c", "exit 0"])
        .assert()
        .success();
}
