//! Smoke tests for the `steadystatectl` binary, via `assert_cmd` the
//! way the teacher's own admin CLI is exercised at the process boundary
//! rather than only through its library-level `Cli`/`Command` types.
//!
//! Assertions read `Output` directly rather than pulling in the
//! `predicates` crate, which this crate's dependency stack does not
//! otherwise need.

use assert_cmd::Command;

fn stdout_of(args: &[&str]) -> String {
    let output = Command::cargo_bin("steadystatectl").unwrap().args(args).output().unwrap();
    assert!(output.status.success(), "command failed: {}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn config_subcommand_prints_toml_by_default() {
    let stdout = stdout_of(&["config"]);
    assert!(stdout.contains("rolling_window_size"));
}

#[test]
fn config_subcommand_respects_json_format() {
    let stdout = stdout_of(&["--format", "json", "config"]);
    assert!(stdout.contains("\"rolling_window_size\""));
}

#[test]
fn run_subcommand_reports_counters_for_the_builtin_word_set() {
    let stdout = stdout_of(&["run", "--iterations", "100", "--ticks", "2"]);
    assert!(stdout.contains("words_defined=5"));
    assert!(stdout.contains("words_executed=100"));
}

#[test]
fn metrics_subcommand_emits_a_long_form_text_dump() {
    let stdout = stdout_of(&["metrics", "--iterations", "50", "--ticks", "1"]);
    assert!(stdout.contains("timestamp:"));
}

#[test]
fn metrics_subcommand_json_format_still_emits_a_csv_header_line() {
    let stdout = stdout_of(&["--format", "json", "metrics", "--iterations", "10", "--ticks", "0"]);
    assert!(stdout.starts_with("timestamp,"));
}

#[test]
fn run_subcommand_rejects_a_nonexistent_capsule_path() {
    Command::cargo_bin("steadystatectl").unwrap().args(["run", "/nonexistent/capsule.bin"]).assert().failure();
}
