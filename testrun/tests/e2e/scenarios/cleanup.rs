//! Cleanup runs exactly once per invocation, or never with --no-cleanup.

use testrun::cleanup::{CleanupGuard, CleanupReport};
use testrun_core::types::PhaseKind;

use crate::helpers::cluster::FakeCluster;
use crate::helpers::config::{benchmark_config_path, flags, no_signal, orchestrator, test_config};
use crate::helpers::executor::{Script, ScriptedExecutor};

#[tokio::test(start_paused = true)]
async fn test_e2e_cleanup_runs_once_whichever_phase_fails() {
    for failing in [PhaseKind::Unit, PhaseKind::EndToEnd, PhaseKind::Benchmark] {
        // Given: 한 단계만 실패
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let executor = ScriptedExecutor::new().script(failing, Script::fail());
        let (orch, run) = orchestrator(&config, flags(false, false, true, false), executor);
        let (cluster, calls) = FakeCluster::healthy();

        // When
        let report = orch
            .run_until(CleanupGuard::new(cluster, run.cleanup_on_exit), no_signal())
            .await;

        // Then: 정리는 정확히 한 번 (drop 경로는 사용되지 않음)
        assert!(report.cleanup.ran(), "{failing}");
        assert_eq!(calls.stops(), 1, "{failing}");
        assert_eq!(calls.blocking_stops(), 0, "{failing}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_e2e_no_cleanup_never_runs_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new().script(PhaseKind::EndToEnd, Script::fail());
    let (orch, run) = orchestrator(&config, flags(false, false, true, true), executor);
    let (cluster, calls) = FakeCluster::healthy();

    let report = orch
        .run_until(CleanupGuard::new(cluster, run.cleanup_on_exit), no_signal())
        .await;

    assert_eq!(
        report.cleanup,
        CleanupReport::Skipped {
            left_running: true,
            kept_files: vec![benchmark_config_path(&config)],
        }
    );
    assert_eq!(calls.teardowns(), 0);
    assert!(calls.is_running());
    assert!(benchmark_config_path(&config).exists());
}

#[tokio::test(start_paused = true)]
async fn test_e2e_benchmark_config_lives_until_cleanup() {
    // Given
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new();
    let log = executor.invocations();
    let (orch, run) = orchestrator(&config, flags(false, false, true, false), executor);
    let (cluster, _calls) = FakeCluster::healthy();

    // When
    let report = orch
        .run_until(CleanupGuard::new(cluster, run.cleanup_on_exit), no_signal())
        .await;

    // Then: 벤치마크 실행 중에는 설정 파일이 존재하고 환경변수로 전달됨
    let bench = log
        .lock()
        .unwrap()
        .iter()
        .find(|i| i.phase == PhaseKind::Benchmark)
        .cloned()
        .expect("benchmark phase should run");
    let path = benchmark_config_path(&config);
    assert_eq!(
        bench.env.get("TESTRUN_BENCHMARK_CONFIG").map(String::as_str),
        Some(path.to_string_lossy().as_ref())
    );
    let written: serde_json::Value =
        serde_json::from_str(bench.benchmark_config.as_deref().unwrap()).unwrap();
    assert_eq!(written["topic"], "testrun-benchmark");
    assert_eq!(written["bootstrap_servers"][0], "localhost:9092");

    // 정리 후에는 삭제됨
    assert!(!path.exists());
    assert!(matches!(
        &report.cleanup,
        CleanupReport::Completed { removed_files, .. } if removed_files == &vec![path.clone()]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_e2e_panicking_phase_still_tears_down() {
    // Given: e2e 단계가 패닉
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new().script(PhaseKind::EndToEnd, Script::Panic);
    let (orch, run) = orchestrator(&config, flags(false, false, false, false), executor);
    let (cluster, calls) = FakeCluster::healthy();
    let guard = CleanupGuard::new(cluster, run.cleanup_on_exit);

    // When
    let outcome = tokio::spawn(async move { orch.run_until(guard, no_signal()).await }).await;

    // Then: 가드의 drop 경로가 클러스터를 한 번 정지
    assert!(outcome.unwrap_err().is_panic());
    assert_eq!(calls.starts(), 1);
    assert_eq!(calls.stops(), 0);
    assert_eq!(calls.blocking_stops(), 1);
    assert!(!calls.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_e2e_panic_with_no_cleanup_leaves_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let executor = ScriptedExecutor::new().script(PhaseKind::EndToEnd, Script::Panic);
    let (orch, run) = orchestrator(&config, flags(false, false, false, true), executor);
    let (cluster, calls) = FakeCluster::healthy();
    let guard = CleanupGuard::new(cluster, run.cleanup_on_exit);

    let outcome = tokio::spawn(async move { orch.run_until(guard, no_signal()).await }).await;

    assert!(outcome.is_err());
    assert_eq!(calls.teardowns(), 0);
    assert!(calls.is_running());
}
