//! 클러스터 수명주기 관리
//!
//! [`ClusterManager`]만 클러스터를 시작/정지할 수 있습니다. 클러스터는
//! 단일 소유 핸들로 오케스트레이터와 정리 코디네이터 사이에서 명시적으로
//! 전달되며 전역 상태를 사용하지 않습니다.
//!
//! # 시작 순서
//! 1. 이전 실행의 잔여물을 지우기 위해 `down` 강제 실행 (실패 무시)
//! 2. `up`
//! 3. [`ReadinessProber`]로 준비 대기
//! 4. 타임아웃이면 로그와 컨테이너 상태를 수집하여 [`ClusterError::ReadinessTimeout`] 반환

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use testrun_core::config::{ClusterConfig, RunConfig};
use tracing::{debug, info, warn};

use crate::compose::ComposeClient;
use crate::diagnostics::ClusterDiagnostics;
use crate::docker::DockerClient;
use crate::error::ClusterError;
use crate::readiness::{ComposeNodeProber, ReadinessOutcome, ReadinessProber};
use crate::topology::ClusterTopology;

/// 클러스터 시작/정지 추상화
///
/// 오케스트레이터와 정리 코디네이터는 이 trait만 알고 있으므로
/// 테스트에서 가짜 클러스터로 교체할 수 있습니다.
pub trait ClusterControl: Send {
    /// 클러스터를 깨끗한 상태에서 시작하고 준비될 때까지 기다립니다.
    fn start(&mut self) -> impl Future<Output = Result<(), ClusterError>> + Send;

    /// 클러스터를 정지합니다. 시작된 적이 없으면 아무것도 하지 않고 성공합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), ClusterError>> + Send;

    /// 비동기 런타임 밖에서 정지합니다 (`Drop` 경로 전용). `stop`과 같은 멱등성을 가집니다.
    fn stop_blocking(&mut self) -> Result<(), ClusterError>;

    /// `up`이 호출된 뒤 아직 정지되지 않았는지 여부
    fn is_running(&self) -> bool;
}

/// 클러스터 대기/진단 파라미터
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSettings {
    /// 준비 대기 제한 시간
    pub readiness_timeout: Duration,
    /// 준비 폴링 간격
    pub poll_interval: Duration,
    /// 노드 프로브 하나당 제한 시간
    pub probe_timeout: Duration,
    /// 진단 시 수집할 로그 줄 수
    pub log_tail_lines: usize,
}

impl ClusterSettings {
    /// 실행 설정과 클러스터 설정에서 파라미터를 만듭니다.
    pub fn new(run: &RunConfig, cluster: &ClusterConfig) -> Self {
        Self {
            readiness_timeout: run.readiness_timeout,
            poll_interval: run.poll_interval,
            probe_timeout: Duration::from_secs(cluster.probe_timeout_secs),
            log_tail_lines: cluster.log_tail_lines,
        }
    }
}

/// compose + Docker 기반 클러스터 관리자
pub struct ClusterManager<C: ComposeClient, D: DockerClient> {
    compose: C,
    docker: Arc<D>,
    topology: ClusterTopology,
    settings: ClusterSettings,
    up_invoked: bool,
}

impl<C: ComposeClient, D: DockerClient> ClusterManager<C, D> {
    /// 관리자를 생성합니다. 클러스터는 아직 시작되지 않습니다.
    pub fn new(
        compose: C,
        docker: Arc<D>,
        topology: ClusterTopology,
        settings: ClusterSettings,
    ) -> Self {
        Self {
            compose,
            docker,
            topology,
            settings,
            up_invoked: false,
        }
    }

    /// 토폴로지
    pub fn topology(&self) -> &ClusterTopology {
        &self.topology
    }

    /// 로그와 컨테이너 상태를 수집합니다. 수집 실패는 진단 정보에 기록만 합니다.
    pub async fn collect_diagnostics(&self) -> ClusterDiagnostics {
        let mut diagnostics = ClusterDiagnostics::default();

        match self.compose.logs(self.settings.log_tail_lines).await {
            Ok(logs) => diagnostics.logs = logs,
            Err(e) => diagnostics.collection_errors.push(e.to_string()),
        }

        match self
            .docker
            .list_project_containers(self.compose.project())
            .await
        {
            Ok(containers) => diagnostics.containers = containers,
            Err(e) => diagnostics.collection_errors.push(e.to_string()),
        }

        diagnostics
    }
}

impl<C: ComposeClient, D: DockerClient> ClusterControl for ClusterManager<C, D> {
    async fn start(&mut self) -> Result<(), ClusterError> {
        // 이전 실행의 잔여물 제거; "정지할 것이 없음"은 정상
        if let Err(e) = self.compose.down().await {
            debug!(error = %e, "pre-start teardown failed, continuing");
        }

        // up이 중간에 실패해도 부분적으로 생성된 컨테이너는 정리 대상
        self.up_invoked = true;
        self.compose.up().await?;

        let prober = ComposeNodeProber::new(&self.compose, self.settings.probe_timeout);
        let outcome = ReadinessProber::new(&prober)
            .await_ready(
                &self.topology,
                self.settings.readiness_timeout,
                self.settings.poll_interval,
            )
            .await?;

        match outcome {
            ReadinessOutcome::Ready { rounds, elapsed } => {
                info!(
                    project = self.compose.project(),
                    rounds,
                    elapsed_secs = elapsed.as_secs(),
                    "cluster started"
                );
                Ok(())
            }
            ReadinessOutcome::TimedOut {
                elapsed,
                failing_nodes,
                ..
            } => {
                let diagnostics = self.collect_diagnostics().await;
                Err(ClusterError::ReadinessTimeout {
                    elapsed_secs: elapsed.as_secs(),
                    failing_nodes,
                    diagnostics: Box::new(diagnostics),
                })
            }
        }
    }

    async fn stop(&mut self) -> Result<(), ClusterError> {
        if !self.up_invoked {
            debug!("cluster was never started, nothing to stop");
            return Ok(());
        }
        self.compose.down().await?;
        self.up_invoked = false;
        info!(project = self.compose.project(), "cluster stopped");
        Ok(())
    }

    fn stop_blocking(&mut self) -> Result<(), ClusterError> {
        if !self.up_invoked {
            return Ok(());
        }
        warn!(
            project = self.compose.project(),
            "stopping cluster from drop path"
        );
        self.compose.down_blocking()?;
        self.up_invoked = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.up_invoked
    }
}
