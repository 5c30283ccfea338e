use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use testrun::cleanup::CleanupGuard;
use testrun::cli::Cli;
use testrun::error::RunError;
use testrun::logging::init_tracing;
use testrun::orchestrator::Orchestrator;
use testrun::output::{Marker, OutputWriter, print_marker};
use testrun::phase::ProcessPhaseExecutor;
use testrun::prerequisites::PrerequisiteGate;
use testrun::setup::prepare_environment;
use testrun_cluster::{
    BollardDockerClient, ClusterManager, ClusterSettings, ClusterTopology, ComposeCli,
};
use testrun_core::config::{RunConfig, TestrunConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // 사용법 오류는 clap이 종료 코드 2로 처리
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %e, "test run aborted");
            print_marker(Marker::Failure, &e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<u8, RunError> {
    let config = load_config(&cli).await?;
    init_tracing(&config.general).map_err(|e| RunError::Logging(e.to_string()))?;

    let run = RunConfig::from_flags(cli.run_flags(), &config);
    tracing::info!(
        config = %cli.config_path().0.display(),
        reports_dir = config.general.reports_dir.as_str(),
        "testrun starting"
    );

    // 사전 조건 → 환경 준비 (클러스터가 존재하기 전이므로 정리할 것이 없음)
    let docker = Arc::new(
        BollardDockerClient::connect_local().map_err(|e| RunError::Prerequisite(e.to_string()))?,
    );
    PrerequisiteGate::new(&config.prerequisites, docker.as_ref())
        .check()
        .await?;
    print_marker(Marker::Success, "prerequisites satisfied");

    prepare_environment(&config.setup, Path::new(&config.general.reports_dir)).await?;

    let cluster = ClusterManager::new(
        ComposeCli::from_config(&config.cluster)?,
        docker,
        ClusterTopology::from_config(&config.cluster)?,
        ClusterSettings::new(&run, &config.cluster),
    );
    let orchestrator = Orchestrator::from_config(&config, run.clone(), ProcessPhaseExecutor)?;
    let guard = CleanupGuard::new(cluster, run.cleanup_on_exit);

    let report = orchestrator.run(guard).await;

    let summary_path = config.report_path(&config.general.summary_file);
    if let Err(e) = report.write_to(&summary_path) {
        tracing::warn!(path = %summary_path.display(), error = %e, "failed to write summary file");
    }

    OutputWriter::new(cli.output).render(&report)?;
    Ok(report.exit_code())
}

/// Loads the file (or defaults), then applies CLI overrides on top.
async fn load_config(cli: &Cli) -> Result<TestrunConfig, RunError> {
    let (path, explicit) = cli.config_path();
    let mut config = if explicit {
        TestrunConfig::load(path).await?
    } else {
        TestrunConfig::load_optional(path).await?
    };

    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    config.validate()?;

    Ok(config)
}
