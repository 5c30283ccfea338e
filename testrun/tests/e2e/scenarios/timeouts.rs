//! Phase timeouts: e2e timeout fails the run and skips the benchmark,
//! benchmark timeout only warns.

use std::time::Duration;

use testrun::cleanup::CleanupGuard;
use testrun_core::process::TIMEOUT_EXIT_CODE;
use testrun_core::types::{ExitClass, PhaseKind};
use tokio::time::Instant;

use crate::helpers::cluster::FakeCluster;
use crate::helpers::config::{flags, no_signal, orchestrator, test_config};
use crate::helpers::executor::{Script, ScriptedExecutor, invoked_phases};

#[tokio::test(start_paused = true)]
async fn test_e2e_e2e_timeout_fails_run_and_skips_benchmark() {
    // Given: e2e가 300초 제한을 넘겨 400초 동안 실행됨
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new().script(PhaseKind::EndToEnd, Script::takes(400, 0));
    let log = executor.invocations();
    let (orch, run) = orchestrator(&config, flags(false, false, true, false), executor);
    let (cluster, calls) = FakeCluster::healthy();

    // When
    let report = orch
        .run_until(CleanupGuard::new(cluster, run.cleanup_on_exit), no_signal())
        .await;

    // Then
    let e2e = report.result(PhaseKind::EndToEnd).unwrap();
    assert!(e2e.timed_out);
    assert_eq!(e2e.exit_code, Some(TIMEOUT_EXIT_CODE));
    assert_eq!(e2e.class(), ExitClass::TimedOut);
    assert_eq!(report.exit_code(), 1);

    assert_eq!(invoked_phases(&log), vec![PhaseKind::Unit, PhaseKind::EndToEnd]);
    assert!(report.record.was_skipped(PhaseKind::Benchmark));
    assert_eq!(calls.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_benchmark_timeout_only_warns() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor =
        ScriptedExecutor::new().script(PhaseKind::Benchmark, Script::takes(3_600, 0));
    let (orch, run) = orchestrator(&config, flags(false, false, true, false), executor);
    let (cluster, _calls) = FakeCluster::healthy();

    let started = Instant::now();
    let report = orch
        .run_until(CleanupGuard::new(cluster, run.cleanup_on_exit), no_signal())
        .await;

    let bench = report.result(PhaseKind::Benchmark).unwrap();
    assert_eq!(bench.class(), ExitClass::TimedOut);
    assert_eq!(report.exit_code(), 0);
    // 벤치마크는 600초에서 중단됨
    assert!(started.elapsed() < Duration::from_secs(3_600));
}

#[tokio::test(start_paused = true)]
async fn test_e2e_unit_phase_is_unbounded() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new().script(PhaseKind::Unit, Script::takes(2 * 3_600, 0));
    let (orch, run) = orchestrator(&config, flags(true, false, false, false), executor);
    let (cluster, _calls) = FakeCluster::healthy();

    let report = orch
        .run_until(CleanupGuard::new(cluster, run.cleanup_on_exit), no_signal())
        .await;

    let unit = report.result(PhaseKind::Unit).unwrap();
    assert!(!unit.timed_out);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_configured_timeout_override() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.phases.unit.timeout_secs = Some(60);
    let executor = ScriptedExecutor::new().script(PhaseKind::Unit, Script::takes(61, 0));
    let (orch, run) = orchestrator(&config, flags(true, false, false, false), executor);
    let (cluster, _calls) = FakeCluster::healthy();

    let report = orch
        .run_until(CleanupGuard::new(cluster, run.cleanup_on_exit), no_signal())
        .await;

    assert_eq!(
        report.result(PhaseKind::Unit).unwrap().class(),
        ExitClass::TimedOut
    );
    assert_eq!(report.exit_code(), 1);
}
