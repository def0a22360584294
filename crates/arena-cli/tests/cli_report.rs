// Test module - relaxed lint rules
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

//! `arena report` against output directories written by `arena run`.

use std::process::Command;

fn arena_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_arena"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn report_regenerates_from_previous_run() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let run = arena_bin()
        .args(["--color=never", "run", "--ci", "--mock-provider", "-o"])
        .arg(&out)
        .output()
        .expect("failed to execute");
    assert!(run.status.success());
    assert!(!out.join("report.html").exists());

    let report = arena_bin()
        .args(["report", "-o"])
        .arg(&out)
        .output()
        .expect("failed to execute");
    assert!(
        report.status.success(),
        "report failed: {}",
        String::from_utf8_lossy(&report.stderr)
    );
    assert!(out.join("report.html").exists());
    let stderr = String::from_utf8_lossy(&report.stderr);
    assert!(stderr.contains("report written to"), "stderr: {stderr}");
}

#[test]
fn report_without_index_fails_with_io_code() {
    let dir = tempfile::tempdir().unwrap();
    let output = arena_bin()
        .args(["report", "-o"])
        .arg(dir.path())
        .output()
        .expect("failed to execute");

    assert_eq!(output.status.code(), Some(5));
}
