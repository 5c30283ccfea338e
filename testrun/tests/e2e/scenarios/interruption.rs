//! Interruption by SIGINT/SIGTERM: in-flight phase abandoned and recorded as
//! interrupted, run fails, cleanup still runs exactly once.

use testrun::cleanup::{CleanupGuard, CleanupReport};
use testrun_core::types::PhaseKind;

use crate::helpers::cluster::{FakeCluster, StartBehavior};
use crate::helpers::config::{flags, orchestrator, signal_after, test_config};
use crate::helpers::executor::{Script, ScriptedExecutor, invoked_phases};

#[tokio::test(start_paused = true)]
async fn test_e2e_interrupt_during_unit_phase() {
    // Given: 60초짜리 단위 테스트 중 10초에 SIGINT
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new().script(PhaseKind::Unit, Script::takes(60, 0));
    let log = executor.invocations();
    let (orch, run) = orchestrator(&config, flags(false, false, false, false), executor);
    let (cluster, calls) = FakeCluster::healthy();

    // When
    let report = orch
        .run_until(
            CleanupGuard::new(cluster, run.cleanup_on_exit),
            signal_after(10, "SIGINT"),
        )
        .await;

    // Then: 단위 테스트는 중단으로 기록, 클러스터 시작 안 됨, 정리는 한 번
    assert_eq!(report.record.interrupted_by.as_deref(), Some("SIGINT"));
    assert_eq!(report.record.results.len(), 1);
    let unit = report.result(PhaseKind::Unit).unwrap();
    assert!(!unit.succeeded());
    assert_eq!(unit.exit_code, None);
    assert!(!unit.timed_out);
    assert_eq!(unit.note.as_deref(), Some("interrupted by SIGINT"));
    assert_eq!(invoked_phases(&log), vec![PhaseKind::Unit]);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(calls.starts(), 0);
    assert_eq!(calls.stops(), 1);
    assert_eq!(calls.blocking_stops(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_interrupt_during_e2e_phase_stops_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new().script(PhaseKind::EndToEnd, Script::takes(250, 0));
    let (orch, run) = orchestrator(&config, flags(false, false, true, false), executor);
    let (cluster, calls) = FakeCluster::healthy();

    let report = orch
        .run_until(
            CleanupGuard::new(cluster, run.cleanup_on_exit),
            signal_after(100, "SIGTERM"),
        )
        .await;

    assert_eq!(report.record.interrupted_by.as_deref(), Some("SIGTERM"));
    assert!(report.result(PhaseKind::Unit).unwrap().succeeded());
    let e2e = report.result(PhaseKind::EndToEnd).unwrap();
    assert_eq!(e2e.note.as_deref(), Some("interrupted by SIGTERM"));
    assert!(e2e.ended_at >= e2e.started_at);
    let e2e_summary = report.summary.phase(PhaseKind::EndToEnd).unwrap();
    assert!(e2e_summary.counts.is_none());
    assert!(report.result(PhaseKind::Benchmark).is_none());
    assert_eq!(report.exit_code(), 1);
    assert_eq!(calls.stops(), 1);
    assert!(matches!(
        report.cleanup,
        CleanupReport::Completed {
            cluster_stopped: true,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_e2e_interrupt_during_cluster_start() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new();
    let log = executor.invocations();
    let (orch, run) = orchestrator(&config, flags(false, true, false, false), executor);
    let (cluster, calls) = FakeCluster::new(StartBehavior::Ready(std::time::Duration::from_secs(90)));

    let report = orch
        .run_until(
            CleanupGuard::new(cluster, run.cleanup_on_exit),
            signal_after(30, "SIGINT"),
        )
        .await;

    assert!(invoked_phases(&log).is_empty());
    // 실행 중이던 단계가 없으므로 중단된 단계 기록도 없음
    assert!(report.record.results.is_empty());
    assert_eq!(report.exit_code(), 1);
    // 시작 도중 중단되어도 up 이후이므로 정지
    assert_eq!(calls.stops(), 1);
    assert!(!calls.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_e2e_interrupt_with_no_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new().script(PhaseKind::EndToEnd, Script::takes(250, 0));
    let (orch, run) = orchestrator(&config, flags(false, true, false, true), executor);
    let (cluster, calls) = FakeCluster::healthy();

    let report = orch
        .run_until(
            CleanupGuard::new(cluster, run.cleanup_on_exit),
            signal_after(60, "SIGINT"),
        )
        .await;

    assert!(!report.cleanup.ran());
    assert_eq!(calls.teardowns(), 0);
    assert_eq!(report.exit_code(), 1);
}
