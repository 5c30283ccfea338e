//! Environment setup
//!
//! Runs after the prerequisite gate and before any phase: creates the reports
//! directory and runs the configured `[setup].commands` (dependency
//! installation and the like). A failing command aborts the run.

use std::path::Path;
use std::time::Duration;

use testrun_core::config::SetupConfig;
use testrun_core::process::{CommandSpec, OutputMode, run_with_timeout};
use tracing::info;

use crate::error::RunError;

/// Prepares the environment for the run.
///
/// # Errors
///
/// Returns [`RunError::Setup`] if the reports directory cannot be created or
/// a setup command fails, times out, or cannot be started.
pub async fn prepare_environment(config: &SetupConfig, reports_dir: &Path) -> Result<(), RunError> {
    tokio::fs::create_dir_all(reports_dir).await.map_err(|e| {
        RunError::Setup(format!(
            "cannot create reports directory {}: {e}",
            reports_dir.display()
        ))
    })?;

    let timeout = Duration::from_secs(config.timeout_secs);
    for argv in &config.commands {
        let spec = CommandSpec::from_argv(argv)
            .map_err(|e| RunError::Setup(format!("invalid setup command: {e}")))?;
        let command = spec.display();
        info!(command = %command, "running setup command");

        let output = run_with_timeout(&spec, Some(timeout), OutputMode::Inherit)
            .await
            .map_err(|e| RunError::Setup(e.to_string()))?;

        if output.timed_out {
            return Err(RunError::Setup(format!(
                "`{command}` did not finish within {}s",
                timeout.as_secs()
            )));
        }
        if !output.success() {
            return Err(RunError::Setup(format!(
                "`{command}` exited with code {}",
                output
                    .exit_code
                    .map_or_else(|| "none".to_owned(), |c| c.to_string())
            )));
        }
    }

    info!(
        reports_dir = %reports_dir.display(),
        commands = config.commands.len(),
        "environment ready"
    );
    Ok(())
}
