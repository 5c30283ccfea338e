//! Fake clusters for E2E tests.
//!
//! - [`FakeCluster`]: implements `ClusterControl` directly and counts calls
//! - [`SimulatedCompose`]: implements `ComposeClient` so the real
//!   `ClusterManager` and readiness prober can be exercised end to end

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use testrun_cluster::{
    ClusterControl, ClusterDiagnostics, ClusterError, ClusterManager, ClusterSettings,
    ClusterTopology, ComposeClient, ContainerState, DockerClient,
};
use testrun_core::config::ClusterConfig;
use testrun_core::process::ProcessOutput;
use tokio::time::Instant;

/// Call counters shared between a [`FakeCluster`] and the test.
#[derive(Default)]
pub struct ClusterCalls {
    pub start: AtomicUsize,
    pub stop: AtomicUsize,
    pub stop_blocking: AtomicUsize,
    pub running: AtomicBool,
}

#[allow(dead_code)]
impl ClusterCalls {
    pub fn starts(&self) -> usize {
        self.start.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn blocking_stops(&self) -> usize {
        self.stop_blocking.load(Ordering::SeqCst)
    }

    /// Every teardown, async or blocking.
    pub fn teardowns(&self) -> usize {
        self.stops() + self.blocking_stops()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// How `start()` behaves.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum StartBehavior {
    /// Ready after the given delay.
    Ready(Duration),
    /// Readiness timeout after the given delay, with diagnostics.
    ReadinessTimeout(Duration),
    /// `compose up` fails immediately.
    ComposeFailure,
}

/// A `ClusterControl` with scripted `start` behavior.
pub struct FakeCluster {
    behavior: StartBehavior,
    calls: Arc<ClusterCalls>,
}

#[allow(dead_code)]
impl FakeCluster {
    pub fn new(behavior: StartBehavior) -> (Self, Arc<ClusterCalls>) {
        let calls = Arc::new(ClusterCalls::default());
        (
            Self {
                behavior,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    pub fn healthy() -> (Self, Arc<ClusterCalls>) {
        Self::new(StartBehavior::Ready(Duration::from_secs(15)))
    }
}

impl ClusterControl for FakeCluster {
    async fn start(&mut self) -> Result<(), ClusterError> {
        self.calls.start.fetch_add(1, Ordering::SeqCst);
        // up가 호출된 시점부터 정리 대상
        self.calls.running.store(true, Ordering::SeqCst);
        match &self.behavior {
            StartBehavior::Ready(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            StartBehavior::ReadinessTimeout(delay) => {
                tokio::time::sleep(*delay).await;
                Err(ClusterError::ReadinessTimeout {
                    elapsed_secs: delay.as_secs(),
                    failing_nodes: vec!["kafka-2".to_owned()],
                    diagnostics: Box::new(ClusterDiagnostics {
                        logs: "kafka-2  | FATAL controller not reachable\n".to_owned(),
                        ..ClusterDiagnostics::default()
                    }),
                })
            }
            StartBehavior::ComposeFailure => Err(ClusterError::Compose {
                action: "up".to_owned(),
                reason: "exit code 1: port 9092 is already allocated".to_owned(),
            }),
        }
    }

    async fn stop(&mut self) -> Result<(), ClusterError> {
        self.calls.stop.fetch_add(1, Ordering::SeqCst);
        self.calls.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop_blocking(&mut self) -> Result<(), ClusterError> {
        self.calls.stop_blocking.fetch_add(1, Ordering::SeqCst);
        self.calls.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.calls.is_running()
    }
}

/// Compose project whose services turn healthy at fixed offsets after `up`.
pub struct SimulatedCompose {
    healthy_after: HashMap<String, Duration>,
    up_at: std::sync::Mutex<Option<Instant>>,
    pub ups: AtomicUsize,
    pub downs: AtomicUsize,
}

#[allow(dead_code)]
impl SimulatedCompose {
    pub fn new(healthy_after: &[(&str, u64)]) -> Arc<Self> {
        Arc::new(Self {
            healthy_after: healthy_after
                .iter()
                .map(|(name, secs)| ((*name).to_owned(), Duration::from_secs(*secs)))
                .collect(),
            up_at: std::sync::Mutex::new(None),
            ups: AtomicUsize::new(0),
            downs: AtomicUsize::new(0),
        })
    }

    fn up_at(&self) -> Option<Instant> {
        self.up_at.lock().map(|guard| *guard).unwrap_or(None)
    }

    fn set_up_at(&self, value: Option<Instant>) {
        if let Ok(mut guard) = self.up_at.lock() {
            *guard = value;
        }
    }
}

/// Shared handle so the test keeps access after the manager takes ownership.
pub struct ComposeHandle(pub Arc<SimulatedCompose>);

impl ComposeClient for ComposeHandle {
    async fn up(&self) -> Result<(), ClusterError> {
        self.0.ups.fetch_add(1, Ordering::SeqCst);
        self.0.set_up_at(Some(Instant::now()));
        Ok(())
    }

    async fn down(&self) -> Result<(), ClusterError> {
        self.0.downs.fetch_add(1, Ordering::SeqCst);
        self.0.set_up_at(None);
        Ok(())
    }

    fn down_blocking(&self) -> Result<(), ClusterError> {
        self.0.downs.fetch_add(1, Ordering::SeqCst);
        self.0.set_up_at(None);
        Ok(())
    }

    async fn logs(&self, _tail: usize) -> Result<String, ClusterError> {
        Ok("kafka-3  | WARN still waiting for controller\n".to_owned())
    }

    async fn exec(
        &self,
        service: &str,
        _argv: &[String],
        _timeout: Duration,
    ) -> Result<ProcessOutput, ClusterError> {
        let healthy = match (self.0.up_at(), self.0.healthy_after.get(service)) {
            (Some(up_at), Some(after)) => up_at.elapsed() >= *after,
            _ => false,
        };
        Ok(ProcessOutput {
            exit_code: Some(if healthy { 0 } else { 1 }),
            stdout: if healthy { "imok".to_owned() } else { String::new() },
            ..ProcessOutput::default()
        })
    }

    fn project(&self) -> &str {
        "testrun"
    }
}

/// Docker daemon stub reporting one restarting container.
pub struct StubDocker;

impl DockerClient for StubDocker {
    async fn ping(&self) -> Result<(), ClusterError> {
        Ok(())
    }

    async fn list_project_containers(
        &self,
        _project: &str,
    ) -> Result<Vec<ContainerState>, ClusterError> {
        Ok(vec![ContainerState {
            id: "0123456789ab".to_owned(),
            name: "testrun-kafka-3-1".to_owned(),
            service: Some("kafka-3".to_owned()),
            state: "restarting".to_owned(),
            status: "Restarting (1) 2 seconds ago".to_owned(),
        }])
    }
}

/// The real cluster manager over a simulated compose project (default topology).
#[allow(dead_code)]
pub fn simulated_manager(
    compose: &Arc<SimulatedCompose>,
    readiness_secs: u64,
    poll_secs: u64,
) -> ClusterManager<ComposeHandle, StubDocker> {
    let config = ClusterConfig::default();
    ClusterManager::new(
        ComposeHandle(Arc::clone(compose)),
        Arc::new(StubDocker),
        ClusterTopology::from_config(&config).expect("default topology is valid"),
        ClusterSettings {
            readiness_timeout: Duration::from_secs(readiness_secs),
            poll_interval: Duration::from_secs(poll_secs),
            probe_timeout: Duration::from_secs(10),
            log_tail_lines: config.log_tail_lines,
        },
    )
}
