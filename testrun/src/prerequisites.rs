//! Prerequisite Gate
//!
//! Verifies that the container runtime client and the compose client are
//! invocable and that the container daemon answers a ping. Any failure is
//! fatal; nothing is retried because a missing tool is not transient.

use std::time::Duration;

use testrun_cluster::DockerClient;
use testrun_core::config::PrerequisitesConfig;
use testrun_core::process::{CommandSpec, OutputMode, run_with_timeout};
use tracing::{debug, info};

use crate::error::RunError;

/// Checks required tools and the container daemon.
pub struct PrerequisiteGate<'a, D: DockerClient> {
    config: &'a PrerequisitesConfig,
    docker: &'a D,
}

impl<'a, D: DockerClient> PrerequisiteGate<'a, D> {
    /// Creates a gate over the configured tool list and a Docker client.
    pub fn new(config: &'a PrerequisitesConfig, docker: &'a D) -> Self {
        Self { config, docker }
    }

    /// Runs every check in order and stops at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Prerequisite`] naming the failing tool or the daemon.
    pub async fn check(&self) -> Result<(), RunError> {
        let timeout = Duration::from_secs(self.config.timeout_secs);

        for argv in &self.config.tools {
            let spec = CommandSpec::from_argv(argv)
                .map_err(|e| RunError::Prerequisite(format!("invalid tool command: {e}")))?;
            let tool = spec.display();

            let output = run_with_timeout(&spec, Some(timeout), OutputMode::Capture)
                .await
                .map_err(|e| {
                    RunError::Prerequisite(format!("`{tool}` is not installed or not invocable: {e}"))
                })?;

            if output.timed_out {
                return Err(RunError::Prerequisite(format!(
                    "`{tool}` did not respond within {}s",
                    timeout.as_secs()
                )));
            }
            if !output.success() {
                return Err(RunError::Prerequisite(format!(
                    "`{tool}` exited with {}: {}",
                    describe_exit(output.exit_code),
                    output.stderr.trim()
                )));
            }
            debug!(tool = %tool, version = output.stdout.trim(), "tool available");
        }

        self.docker.ping().await.map_err(|e| {
            RunError::Prerequisite(format!("container daemon is not responding: {e}"))
        })?;

        info!(tools = self.config.tools.len(), "prerequisites satisfied");
        Ok(())
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_owned(),
    }
}
