//! Phase ordering and failure isolation.

use std::time::Duration;

use testrun::cleanup::{CleanupGuard, CleanupReport};
use testrun_core::types::{ExitClass, PhaseKind};

use crate::helpers::cluster::FakeCluster;
use crate::helpers::config::{flags, no_signal, orchestrator, test_config};
use crate::helpers::executor::{Script, ScriptedExecutor, invoked_phases};

#[tokio::test(start_paused = true)]
async fn test_e2e_default_run_passes() {
    // Given: 모든 단계가 성공하는 기본 실행
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new();
    let log = executor.invocations();
    let (orch, run) = orchestrator(&config, flags(false, false, false, false), executor);
    let (cluster, calls) = FakeCluster::healthy();

    // When
    let report = orch
        .run_until(CleanupGuard::new(cluster, run.cleanup_on_exit), no_signal())
        .await;

    // Then: unit → e2e 순서, 종료 코드 0, 클러스터는 한 번 시작/정지
    assert_eq!(invoked_phases(&log), vec![PhaseKind::Unit, PhaseKind::EndToEnd]);
    assert_eq!(report.exit_code(), 0);
    assert!(report.record.skipped.is_empty());
    assert_eq!(calls.starts(), 1);
    assert_eq!(calls.stops(), 1);
    assert!(!calls.is_running());
    assert!(matches!(
        report.cleanup,
        CleanupReport::Completed {
            cluster_stopped: true,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_e2e_unit_failure_still_runs_e2e() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new().script(PhaseKind::Unit, Script::fail());
    let log = executor.invocations();
    let (orch, run) = orchestrator(&config, flags(false, false, false, false), executor);
    let (cluster, calls) = FakeCluster::healthy();

    let report = orch
        .run_until(CleanupGuard::new(cluster, run.cleanup_on_exit), no_signal())
        .await;

    assert_eq!(invoked_phases(&log), vec![PhaseKind::Unit, PhaseKind::EndToEnd]);
    assert_eq!(report.result(PhaseKind::Unit).unwrap().class(), ExitClass::Failure);
    assert!(report.result(PhaseKind::EndToEnd).unwrap().succeeded());
    assert_eq!(report.exit_code(), 1);
    assert_eq!(calls.starts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_unit_only_failure_never_starts_cluster() {
    // Given: --unit-only, 단위 테스트 실패
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new().script(PhaseKind::Unit, Script::fail());
    let log = executor.invocations();
    let (orch, run) = orchestrator(&config, flags(true, false, false, false), executor);
    let (cluster, calls) = FakeCluster::healthy();

    // When
    let report = orch
        .run_until(CleanupGuard::new(cluster, run.cleanup_on_exit), no_signal())
        .await;

    // Then: 종료 코드 1, 클러스터는 시작되지 않았고 정지 호출은 no-op
    assert_eq!(report.exit_code(), 1);
    assert_eq!(invoked_phases(&log), vec![PhaseKind::Unit]);
    assert_eq!(calls.starts(), 0);
    assert_eq!(calls.stops(), 1);
    assert_eq!(
        report.cleanup,
        CleanupReport::Completed {
            cluster_stopped: false,
            removed_files: Vec::new(),
            errors: Vec::new(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_e2e_e2e_only_ignores_unit() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new().script(PhaseKind::Unit, Script::fail());
    let log = executor.invocations();
    let (orch, run) = orchestrator(&config, flags(false, true, true, false), executor);
    let (cluster, _calls) = FakeCluster::healthy();

    let report = orch
        .run_until(CleanupGuard::new(cluster, run.cleanup_on_exit), no_signal())
        .await;

    // --e2e-only는 벤치마크도 끔
    assert_eq!(invoked_phases(&log), vec![PhaseKind::EndToEnd]);
    assert_eq!(report.exit_code(), 0);
    assert!(!report.requested.unit);
    assert!(!report.requested.benchmarks);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_benchmark_failure_is_informational() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new().script(PhaseKind::Benchmark, Script::fail());
    let log = executor.invocations();
    let (orch, run) = orchestrator(&config, flags(false, false, true, false), executor);
    let (cluster, _calls) = FakeCluster::healthy();

    let report = orch
        .run_until(CleanupGuard::new(cluster, run.cleanup_on_exit), no_signal())
        .await;

    assert_eq!(
        invoked_phases(&log),
        vec![PhaseKind::Unit, PhaseKind::EndToEnd, PhaseKind::Benchmark]
    );
    assert_eq!(
        report.result(PhaseKind::Benchmark).unwrap().class(),
        ExitClass::Failure
    );
    assert_eq!(report.exit_code(), 0, "benchmark never gates the run");
}

#[tokio::test(start_paused = true)]
async fn test_e2e_failed_e2e_still_runs_benchmark() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new().script(PhaseKind::EndToEnd, Script::fail());
    let log = executor.invocations();
    let (orch, run) = orchestrator(&config, flags(false, false, true, false), executor);
    let (cluster, _calls) = FakeCluster::healthy();

    let report = orch
        .run_until(CleanupGuard::new(cluster, run.cleanup_on_exit), no_signal())
        .await;

    assert_eq!(
        invoked_phases(&log),
        vec![PhaseKind::Unit, PhaseKind::EndToEnd, PhaseKind::Benchmark]
    );
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_phase_timeouts_are_passed_to_executor() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new();
    let log = executor.invocations();
    let (orch, run) = orchestrator(&config, flags(false, false, true, false), executor);
    let (cluster, _calls) = FakeCluster::healthy();

    orch.run_until(CleanupGuard::new(cluster, run.cleanup_on_exit), no_signal())
        .await;

    let timeouts: Vec<_> = log.lock().unwrap().iter().map(|i| i.timeout).collect();
    assert_eq!(
        timeouts,
        vec![
            None,
            Some(Duration::from_secs(300)),
            Some(Duration::from_secs(600)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_e2e_each_run_has_distinct_id() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let (first, _) = orchestrator(&config, flags(true, false, false, false), ScriptedExecutor::new());
    let (second, _) = orchestrator(&config, flags(true, false, false, false), ScriptedExecutor::new());

    assert_ne!(first.run_id(), second.run_id());

    let (cluster, _calls) = FakeCluster::healthy();
    let report = first.run_until(CleanupGuard::new(cluster, true), no_signal()).await;
    assert_eq!(report.run_id, first.run_id());
}
