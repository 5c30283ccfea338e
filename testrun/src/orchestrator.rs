//! Run orchestration -- phase sequencing and failure isolation
//!
//! # Sequence
//!
//! ```text
//! [unit]                      independent of the cluster
//! cluster.start()             only if e2e is requested
//!   ├─ Err ──> e2e recorded as failed (not run), benchmark skipped
//!   └─ Ok ───> [e2e] ──> [benchmark]  (skipped if e2e timed out)
//! summarize()
//! guard.release()             exactly once, also after an interruption
//! ```
//!
//! Phases run strictly one after another on the calling task. Before a phase
//! starts, the artifacts it writes are removed so that a phase that crashes or
//! times out cannot be credited with an earlier run's results.
//!
//! A shutdown signal drops the in-flight phase future (its process is killed
//! on drop), records that phase as interrupted, marks the run interrupted and
//! proceeds to the summary and cleanup.

use std::future::Future;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use testrun_cluster::ClusterControl;
use testrun_core::config::{RunConfig, TestrunConfig};
use testrun_core::error::TestrunError;
use testrun_core::types::{PhaseKind, PhaseResult};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::cleanup::CleanupGuard;
use crate::error::RunError;
use crate::output::{Marker, print_marker};
use crate::phase::{PhaseExecutor, PhaseSpec};
use crate::report::{RequestedPhases, RunRecord, RunReport, SkippedPhase};
use crate::summary::{ArtifactPaths, summarize};

/// Environment variable through which the benchmark finds its generated configuration.
pub const BENCHMARK_CONFIG_ENV: &str = "TESTRUN_BENCHMARK_CONFIG";

/// The three phase invocations of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasePlan {
    pub unit: PhaseSpec,
    pub e2e: PhaseSpec,
    pub benchmark: PhaseSpec,
}

impl PhasePlan {
    /// Builds the phase invocations with the run's timeouts.
    pub fn from_config(config: &TestrunConfig, run: &RunConfig) -> Result<Self, RunError> {
        let phases = &config.phases;
        Ok(Self {
            unit: PhaseSpec::from_config(PhaseKind::Unit, &phases.unit, run.unit_timeout)
                .map_err(TestrunError::from)?,
            e2e: PhaseSpec::from_config(PhaseKind::EndToEnd, &phases.e2e, run.e2e_timeout)
                .map_err(TestrunError::from)?,
            benchmark: PhaseSpec::from_config(
                PhaseKind::Benchmark,
                &phases.benchmark,
                run.benchmark_timeout,
            )
            .map_err(TestrunError::from)?,
        })
    }
}

/// Content of the generated benchmark configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BenchmarkFile {
    pub bootstrap_servers: Vec<String>,
    pub topic: String,
    pub message_count: u64,
    pub message_size: usize,
    pub results_file: Option<PathBuf>,
    pub report_file: PathBuf,
}

/// Where and what to write before the benchmark phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkPlan {
    pub path: PathBuf,
    pub file: BenchmarkFile,
}

impl BenchmarkPlan {
    pub fn from_config(config: &TestrunConfig) -> Self {
        let bench = &config.benchmark;
        Self {
            path: PathBuf::from(&bench.config_path),
            file: BenchmarkFile {
                bootstrap_servers: bench
                    .bootstrap_servers
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect(),
                topic: bench.topic.clone(),
                message_count: bench.message_count,
                message_size: bench.message_size,
                results_file: config
                    .phases
                    .benchmark
                    .results_file
                    .as_deref()
                    .map(|f| config.report_path(f)),
                report_file: config.report_path(&bench.report_file),
            },
        }
    }

    /// Writes the configuration as pretty JSON.
    pub async fn write(&self) -> Result<(), RunError> {
        let json = serde_json::to_vec_pretty(&self.file)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// Phase currently running, kept so an interruption can still record it.
type InFlight = Option<(PhaseKind, DateTime<Utc>)>;

/// Drives one test run.
pub struct Orchestrator<E: PhaseExecutor> {
    run: RunConfig,
    plan: PhasePlan,
    benchmark: BenchmarkPlan,
    artifacts: ArtifactPaths,
    executor: E,
    run_id: Uuid,
}

impl<E: PhaseExecutor> Orchestrator<E> {
    /// Creates an orchestrator with a fresh run id.
    pub fn new(
        run: RunConfig,
        plan: PhasePlan,
        benchmark: BenchmarkPlan,
        artifacts: ArtifactPaths,
        executor: E,
    ) -> Self {
        Self {
            run,
            plan,
            benchmark,
            artifacts,
            executor,
            run_id: Uuid::new_v4(),
        }
    }

    /// Creates an orchestrator from the loaded configuration.
    pub fn from_config(config: &TestrunConfig, run: RunConfig, executor: E) -> Result<Self, RunError> {
        let plan = PhasePlan::from_config(config, &run)?;
        Ok(Self::new(
            run,
            plan,
            BenchmarkPlan::from_config(config),
            ArtifactPaths::from_config(config),
            executor,
        ))
    }

    /// Identifier attached to every log line of this run.
    pub fn run_id(&self) -> String {
        self.run_id.to_string()
    }

    /// Runs until completion or until SIGINT/SIGTERM.
    pub async fn run<C: ClusterControl>(&self, guard: CleanupGuard<C>) -> RunReport {
        self.run_until(guard, shutdown_signal()).await
    }

    /// Runs until completion or until `shutdown` resolves.
    ///
    /// The guard is released exactly once in both cases.
    pub async fn run_until<C, S>(&self, mut guard: CleanupGuard<C>, shutdown: S) -> RunReport
    where
        C: ClusterControl,
        S: Future<Output = &'static str>,
    {
        let span = info_span!("run", run_id = %self.run_id);
        async move {
            info!(
                unit = self.run.run_unit,
                e2e = self.run.run_e2e,
                benchmarks = self.run.run_benchmarks,
                cleanup = self.run.cleanup_on_exit,
                "test run started"
            );

            let mut record = RunRecord::default();
            let mut in_flight: InFlight = None;
            let interrupted = tokio::select! {
                () = self.drive_phases(&mut guard, &mut record, &mut in_flight) => None,
                signal = shutdown => Some(signal),
            };
            if let Some(signal) = interrupted {
                warn!(signal, "run interrupted, abandoning in-flight phase");
                print_marker(Marker::Failure, format!("interrupted by {signal}"));
                if let Some((phase, started_at)) = in_flight {
                    record
                        .results
                        .push(PhaseResult::interrupted(phase, started_at, signal));
                }
                record.interrupted_by = Some(signal.to_owned());
            }

            let summary = summarize(&record.results, &self.artifacts);
            let cleanup = guard.release().await;

            let report = RunReport::new(
                self.run_id(),
                RequestedPhases::from(&self.run),
                record,
                summary,
                cleanup,
            );
            info!(passed = report.succeeded(), "test run finished");
            report
        }
        .instrument(span)
        .await
    }

    async fn drive_phases<C: ClusterControl>(
        &self,
        guard: &mut CleanupGuard<C>,
        record: &mut RunRecord,
        in_flight: &mut InFlight,
    ) {
        if self.run.run_unit {
            let result = self.run_phase(&self.plan.unit, in_flight).await;
            announce(&result);
            record.results.push(result);
        }

        if !self.run.run_e2e {
            return;
        }

        info!("starting cluster");
        if let Err(e) = guard.cluster_mut().start().await {
            print_marker(Marker::Failure, format!("cluster failed to start: {e}"));
            if let Some(diagnostics) = e.diagnostics() {
                eprintln!("{diagnostics}");
            }
            record.cluster_error = Some(e.to_string());
            record.results.push(PhaseResult::not_run(
                PhaseKind::EndToEnd,
                "not run: cluster failed to start",
            ));
            if self.run.run_benchmarks {
                record.skipped.push(SkippedPhase {
                    phase: PhaseKind::Benchmark,
                    reason: "cluster is not available".to_owned(),
                });
            }
            return;
        }
        print_marker(Marker::Success, "cluster ready");

        let e2e = self.run_phase(&self.plan.e2e, in_flight).await;
        announce(&e2e);
        let e2e_timed_out = e2e.timed_out;
        record.results.push(e2e);

        if !self.run.run_benchmarks {
            return;
        }
        if e2e_timed_out {
            print_marker(Marker::Warning, "benchmark skipped: e2e phase timed out");
            record.skipped.push(SkippedPhase {
                phase: PhaseKind::Benchmark,
                reason: "e2e phase timed out".to_owned(),
            });
            return;
        }

        let result = self.run_benchmark(guard, in_flight).await;
        announce(&result);
        record.results.push(result);
    }

    async fn run_benchmark<C: ClusterControl>(
        &self,
        guard: &mut CleanupGuard<C>,
        in_flight: &mut InFlight,
    ) -> PhaseResult {
        guard.track_file(&self.benchmark.path);
        if let Err(e) = self.benchmark.write().await {
            warn!(
                path = %self.benchmark.path.display(),
                error = %e,
                "failed to write benchmark configuration"
            );
            return PhaseResult::not_run(
                PhaseKind::Benchmark,
                format!("benchmark configuration not written: {e}"),
            );
        }

        let spec = self.plan.benchmark.clone().with_env(
            BENCHMARK_CONFIG_ENV,
            self.benchmark.path.to_string_lossy().into_owned(),
        );
        self.run_phase(&spec, in_flight).await
    }

    async fn run_phase(&self, spec: &PhaseSpec, in_flight: &mut InFlight) -> PhaseResult {
        self.clear_artifacts(spec.kind).await;
        *in_flight = Some((spec.kind, Utc::now()));
        let result = self.executor.run(spec).await;
        *in_flight = None;
        result
    }

    async fn clear_artifacts(&self, kind: PhaseKind) {
        for path in self.artifacts.produced_by(kind) {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(phase = %kind, path = %path.display(), "removed stale artifact"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    phase = %kind,
                    path = %path.display(),
                    error = %e,
                    "failed to remove stale artifact"
                ),
            }
        }
    }
}

fn announce(result: &PhaseResult) {
    if result.succeeded() {
        print_marker(Marker::Success, format!("{} phase passed", result.phase));
    } else if result.phase.is_mandatory() {
        print_marker(
            Marker::Failure,
            format!("{} phase {}", result.phase, result.class()),
        );
    } else {
        print_marker(
            Marker::Warning,
            format!(
                "{} phase {} (informational, run outcome unaffected)",
                result.phase,
                result.class()
            ),
        );
    }
}

/// Resolves on SIGINT/SIGTERM. Never resolves if the handlers cannot be installed.
pub async fn shutdown_signal() -> &'static str {
    match wait_for_shutdown_signal().await {
        Ok(signal) => {
            info!(signal = signal, "shutdown signal received");
            signal
        }
        Err(e) => {
            warn!(error = %e, "signal handlers unavailable, run cannot be interrupted");
            std::future::pending().await
        }
    }
}

/// Wait for SIGTERM or SIGINT.
async fn wait_for_shutdown_signal() -> anyhow::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
