//! Test configuration builders.
//!
//! Every test gets its own temp directory for the reports directory and the
//! generated benchmark configuration.

use std::path::{Path, PathBuf};

use testrun::orchestrator::Orchestrator;
use testrun_core::config::{RunConfig, RunFlags, TestrunConfig};

use super::executor::ScriptedExecutor;

/// Default configuration rooted in `dir`.
pub fn test_config(dir: &Path) -> TestrunConfig {
    let mut config = TestrunConfig::default();
    config.general.reports_dir = dir.join("reports").to_string_lossy().into_owned();
    config.benchmark.config_path = dir
        .join("benchmark-config.json")
        .to_string_lossy()
        .into_owned();
    config
}

/// Path of the generated benchmark configuration for `config`.
#[allow(dead_code)]
pub fn benchmark_config_path(config: &TestrunConfig) -> PathBuf {
    PathBuf::from(&config.benchmark.config_path)
}

/// Flags as the CLI would produce them.
#[allow(dead_code)]
pub fn flags(unit_only: bool, e2e_only: bool, with_benchmarks: bool, no_cleanup: bool) -> RunFlags {
    RunFlags {
        unit_only,
        e2e_only,
        with_benchmarks,
        no_cleanup,
    }
}

/// Orchestrator over a scripted executor.
pub fn orchestrator(
    config: &TestrunConfig,
    flags: RunFlags,
    executor: ScriptedExecutor,
) -> (Orchestrator<ScriptedExecutor>, RunConfig) {
    let run = RunConfig::from_flags(flags, config);
    let orchestrator = Orchestrator::from_config(config, run.clone(), executor)
        .expect("default phase commands are valid");
    (orchestrator, run)
}

/// A shutdown future that never fires.
pub fn no_signal() -> std::future::Pending<&'static str> {
    std::future::pending()
}

/// A shutdown future firing `signal` after `secs` of (paused) time.
#[allow(dead_code)]
pub async fn signal_after(secs: u64, signal: &'static str) -> &'static str {
    tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
    signal
}
