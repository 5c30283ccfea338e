//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use testrun_core::config::{DEFAULT_CONFIG_PATH, RunFlags};

/// Run unit, end-to-end and benchmark phases against a freshly started cluster.
///
/// By default the unit and end-to-end phases run. The cluster is always torn
/// down at the end unless `--no-cleanup` is given.
#[derive(Parser, Debug)]
#[command(name = "testrun", version, about, long_about = None)]
pub struct Cli {
    /// Run only the unit phase (no cluster is started).
    #[arg(long, conflicts_with = "e2e_only")]
    pub unit_only: bool,

    /// Run only the end-to-end phase.
    #[arg(long)]
    pub e2e_only: bool,

    /// Also run the benchmark phase after the end-to-end phase.
    #[arg(long)]
    pub with_benchmarks: bool,

    /// Leave the cluster and transient files in place for post-mortem debugging.
    #[arg(long)]
    pub no_cleanup: bool,

    /// Path to the testrun.toml configuration file.
    ///
    /// When omitted, `testrun.toml` is used if present and built-in defaults otherwise.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Output format of the final summary.
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl Cli {
    /// Phase-selection flags for [`RunConfig`](testrun_core::config::RunConfig).
    pub fn run_flags(&self) -> RunFlags {
        RunFlags {
            unit_only: self.unit_only,
            e2e_only: self.e2e_only,
            with_benchmarks: self.with_benchmarks,
            no_cleanup: self.no_cleanup,
        }
    }

    /// Configuration file path, and whether it was given explicitly.
    pub fn config_path(&self) -> (&Path, bool) {
        match &self.config {
            Some(path) => (path.as_path(), true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        }
    }
}
