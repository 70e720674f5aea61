//! Shared CLI argument and subcommand types for `steadystatectl`.
//!
//! Kept in the library rather than the binary so a CLI smoke test can
//! construct and parse these types directly, the way the teacher's own
//! admin CLI keeps its `Cli`/`Command` types importable from the crate.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::config::PhysicsConfig;
use crate::error::Result;

/// Top-level `steadystatectl` arguments.
#[derive(Parser, Debug)]
#[command(name = "steadystatectl", version, about = "Adaptive execution-physics core harness", disable_help_subcommand = true)]
pub struct Cli {
    /// Path to a `PhysicsConfig` TOML file; defaults are used if absent.
    #[arg(long, env = "STEADYSTATE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format for structured results.
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Structured-output format shared by every subcommand.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Subcommands exposed by `steadystatectl`.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Prints the effective tuning configuration.
    Config,
    /// Loads a capsule (or a small built-in word set), drives a
    /// synthetic workload through it, and reports execution counters.
    Run(RunArgs),
    /// Like `run`, but prints one long-form metrics row instead of a
    /// counters summary.
    Metrics(RunArgs),
}

/// Arguments shared by `run` and `metrics`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to a capsule payload (NUL-separated word names). Without
    /// one, a small built-in word set stands in for it.
    #[arg(value_name = "CAPSULE")]
    pub capsule: Option<PathBuf>,

    /// Synthetic word executions to run.
    #[arg(long, default_value_t = 10_000)]
    pub iterations: u64,

    /// Heartbeat ticks to drive inline once the run completes.
    #[arg(long, default_value_t = 4)]
    pub ticks: u64,
}

/// Loads the effective configuration: `path` if given, `PhysicsConfig`
/// defaults otherwise. The library itself never touches the filesystem
/// — only this CLI-facing helper does.
pub fn load_config(path: Option<&Path>) -> Result<PhysicsConfig> {
    let Some(path) = path else {
        return Ok(PhysicsConfig::default());
    };
    let text = std::fs::read_to_string(path)?;
    PhysicsConfig::from_toml_str(&text)
}

/// The platform default config path, `$XDG_CONFIG_HOME/steadystate/config.toml`
/// or its per-platform equivalent. Purely a CLI convenience; never
/// consulted automatically.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("steadystate").join("config.toml"))
}

/// Summary of one `run`/`metrics` workload, suitable for either text or
/// JSON output.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Number of words the capsule (or built-in set) defined.
    pub words_defined: usize,
    /// Total word dispatches driven.
    pub words_executed: u64,
    /// Total `find_word` lookups performed.
    pub dictionary_lookups: u64,
    /// Heartbeat ticks driven inline after the run.
    pub ticks_run: u64,
}
