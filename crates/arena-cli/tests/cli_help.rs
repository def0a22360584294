//! Tests for help output, color flags and shell completions.
// Test module - relaxed lint rules
#![allow(clippy::expect_used)]

use std::process::Command;

fn arena_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_arena"))
}

fn help_text(args: &[&str]) -> String {
    let output = arena_bin().args(args).output().expect("failed to execute");
    assert!(
        output.status.success(),
        "help command failed: {:?}",
        output.status
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn run_help_lists_flags() {
    let help = help_text(&["run", "--help"]);
    for flag in [
        "--region",
        "--provider",
        "--scenario",
        "--concurrency",
        "--ci",
        "--mock-provider",
        "--mock-config",
        "--out",
        "--html",
        "--html-file",
        "--verbose",
    ] {
        assert!(help.contains(flag), "run help missing {flag}");
    }
}

#[test]
fn top_level_help_lists_commands() {
    let help = help_text(&["--help"]);
    for command in ["run", "report", "completions"] {
        assert!(help.contains(command), "help missing {command}");
    }
}

#[test]
fn color_flag_rejects_invalid() {
    let output = arena_bin()
        .arg("--color=invalid")
        .arg("--help")
        .output()
        .expect("failed to execute");

    assert!(!output.status.success(), "--color=invalid should be rejected");
}

#[test]
fn completions_generate_for_bash() {
    let output = arena_bin()
        .args(["completions", "bash"])
        .output()
        .expect("failed to execute");

    assert!(output.status.success());
    let script = String::from_utf8_lossy(&output.stdout);
    assert!(script.contains("arena"), "completion script: {script}");
}
