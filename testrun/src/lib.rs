#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`cli`]: Command-line flags (`Cli`)
//! - [`prerequisites`]: Tool and daemon checks (`PrerequisiteGate`)
//! - [`setup`]: Reports directory and setup commands
//! - [`phase`]: Phase execution under a timeout (`PhaseExecutor`, `ProcessPhaseExecutor`)
//! - [`orchestrator`]: Phase sequencing and failure isolation (`Orchestrator`)
//! - [`summary`]: Artifact parsing and aggregation (`summarize`)
//! - [`cleanup`]: Guaranteed teardown (`CleanupGuard`)
//! - [`report`]: Final report and exit code (`RunReport`)
//! - [`output`]: Text/JSON rendering and status markers
//! - [`logging`]: Tracing subscriber setup
//! - [`error`]: Fatal errors (`RunError`)

pub mod cleanup;
pub mod cli;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod output;
pub mod phase;
pub mod prerequisites;
pub mod report;
pub mod setup;
pub mod summary;

pub use cleanup::{CleanupGuard, CleanupReport};
pub use error::RunError;
pub use orchestrator::{BenchmarkPlan, Orchestrator, PhasePlan};
pub use phase::{PhaseExecutor, PhaseSpec, ProcessPhaseExecutor};
pub use report::{RunRecord, RunReport};
pub use summary::{RunSummary, summarize};
