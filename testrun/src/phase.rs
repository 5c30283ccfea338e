//! Phase Runner
//!
//! Each phase is one external process invocation under its own timeout. The
//! process output is passed through to the terminal; the orchestrator only
//! observes the exit status.
//!
//! # Exit classes
//! - `success`: exit code 0
//! - `failure`: any other exit code, a signal, or a process that could not be spawned
//! - `timed out`: the process exceeded its bound and was killed

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use testrun_core::config::PhaseConfig;
use testrun_core::error::ProcessError;
use testrun_core::process::{CommandSpec, OutputMode, run_with_timeout};
use testrun_core::types::{PhaseKind, PhaseResult};
use tracing::{error, info, warn};

/// One executable phase: what to run and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSpec {
    /// Phase kind
    pub kind: PhaseKind,
    /// Command line and extra environment
    pub command: CommandSpec,
    /// Upper bound on the phase's wall time (`None` = unbounded)
    pub timeout: Option<Duration>,
}

impl PhaseSpec {
    /// Builds a phase from its `[phases.*]` table.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::EmptyCommand`] if the command is empty.
    pub fn from_config(
        kind: PhaseKind,
        config: &PhaseConfig,
        timeout: Option<Duration>,
    ) -> Result<Self, ProcessError> {
        let mut command = CommandSpec::from_argv(&config.command)?;
        for (key, value) in &config.env {
            command = command.env(key.clone(), value.clone());
        }
        Ok(Self {
            kind,
            command,
            timeout,
        })
    }

    /// Adds an environment variable for the phase process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.command = self.command.env(key, value);
        self
    }
}

/// Runs a single phase to completion.
///
/// Implementations never fail: every outcome, including a process that could
/// not be started, is expressed as a [`PhaseResult`].
pub trait PhaseExecutor: Send + Sync {
    /// Runs the phase and waits for it under its timeout.
    fn run(&self, spec: &PhaseSpec) -> impl Future<Output = PhaseResult> + Send;
}

/// Executes phases as child processes with inherited stdout/stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessPhaseExecutor;

impl PhaseExecutor for ProcessPhaseExecutor {
    async fn run(&self, spec: &PhaseSpec) -> PhaseResult {
        info!(
            phase = %spec.kind,
            command = %spec.command.display(),
            timeout_secs = spec.timeout.map(|t| t.as_secs()),
            "phase started"
        );

        let started_at = Utc::now();
        let outcome = run_with_timeout(&spec.command, spec.timeout, OutputMode::Inherit).await;
        let ended_at = Utc::now();

        let result = match outcome {
            Ok(output) => PhaseResult::completed(
                spec.kind,
                started_at,
                ended_at,
                output.exit_code,
                output.timed_out,
            ),
            Err(e) => {
                error!(phase = %spec.kind, error = %e, "phase could not be started");
                PhaseResult::completed(spec.kind, started_at, ended_at, None, false)
                    .with_note(e.to_string())
            }
        };

        log_phase_result(&result);
        result
    }
}

/// Logs a finished phase with its standard fields.
pub fn log_phase_result(result: &PhaseResult) {
    let duration_ms = u64::try_from(result.duration().as_millis()).unwrap_or(u64::MAX);
    if result.succeeded() {
        info!(
            phase = %result.phase,
            exit_code = result.exit_code,
            timed_out = result.timed_out,
            duration_ms,
            "phase finished"
        );
    } else {
        warn!(
            phase = %result.phase,
            exit_code = result.exit_code,
            timed_out = result.timed_out,
            duration_ms,
            outcome = %result.class(),
            "phase finished"
        );
    }
}
