//! 준비 상태 폴링 -- 제한 시간이 있는 전체 노드 프로브
//!
//! [`ReadinessProber`]는 라운드 단위로 토폴로지의 모든 노드를 순서대로 프로브합니다.
//! 한 라운드에서 모든 노드가 통과하고, 그 라운드가 제한 시간 전에 끝나야만
//! `Ready`가 됩니다. 노드별 성공은 라운드 사이에 캐시하지 않습니다.
//!
//! # 상태 전이
//! ```text
//! NotStarted ──> Polling ──┬──> Ready
//!                          └──> TimedOut
//! ```
//! 전이는 단방향이며 한 번 지난 상태로 돌아가지 않습니다.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::compose::ComposeClient;
use crate::error::ClusterError;
use crate::topology::{ClusterTopology, NodeSpec};

/// 준비 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadinessState {
    /// 폴링 시작 전
    NotStarted,
    /// 폴링 중
    Polling,
    /// 모든 노드가 같은 라운드에서 통과
    Ready,
    /// 제한 시간 초과
    TimedOut,
}

impl ReadinessState {
    /// 종료 상태인지 여부
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::TimedOut)
    }

    /// `next`로 전이할 수 있는지 여부
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Polling)
                | (Self::Polling, Self::Ready)
                | (Self::Polling, Self::TimedOut)
        )
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Polling => write!(f, "polling"),
            Self::Ready => write!(f, "ready"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// 단방향 전이만 허용하는 상태 머신
#[derive(Debug, Clone)]
pub struct ReadinessMachine {
    state: ReadinessState,
    history: Vec<ReadinessState>,
}

impl Default for ReadinessMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessMachine {
    /// `NotStarted` 상태로 생성합니다.
    pub fn new() -> Self {
        Self {
            state: ReadinessState::NotStarted,
            history: vec![ReadinessState::NotStarted],
        }
    }

    /// 현재 상태
    pub fn state(&self) -> ReadinessState {
        self.state
    }

    /// 지나온 상태 (현재 상태 포함)
    pub fn history(&self) -> &[ReadinessState] {
        &self.history
    }

    /// 다음 상태로 전이합니다.
    ///
    /// # Errors
    ///
    /// 허용되지 않는 전이면 [`ClusterError::InvalidTransition`]을 반환하고 상태를 유지합니다.
    pub fn transition(&mut self, next: ReadinessState) -> Result<(), ClusterError> {
        if !self.state.can_transition_to(next) {
            return Err(ClusterError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(from = %self.state, to = %next, "readiness state transition");
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}

/// 개별 노드 프로브
pub trait NodeProber: Send + Sync {
    /// 노드가 현재 건강한지 확인합니다. 프로브 실행 실패는 `false`로 취급합니다.
    fn probe(&self, node: &NodeSpec) -> impl Future<Output = bool> + Send;
}

/// 준비 대기 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessOutcome {
    /// 모든 노드가 같은 라운드에서 통과
    Ready {
        /// 수행한 라운드 수
        rounds: u32,
        /// 경과 시간
        elapsed: Duration,
    },
    /// 제한 시간 초과
    TimedOut {
        /// 수행한 라운드 수
        rounds: u32,
        /// 경과 시간
        elapsed: Duration,
        /// 마지막 라운드에서 실패한 노드 (마지막 라운드가 늦게 끝난 경우 비어 있을 수 있음)
        failing_nodes: Vec<String>,
    },
}

impl ReadinessOutcome {
    /// `Ready`인지 여부
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// 준비 상태 프로버
///
/// 상태 머신을 단독으로 소유하며, 한 인스턴스는 한 번의 폴링 세션만 수행합니다.
pub struct ReadinessProber<'a, P: NodeProber> {
    prober: &'a P,
    machine: ReadinessMachine,
}

impl<'a, P: NodeProber> ReadinessProber<'a, P> {
    /// 프로버를 생성합니다.
    pub fn new(prober: &'a P) -> Self {
        Self {
            prober,
            machine: ReadinessMachine::new(),
        }
    }

    /// 현재 상태
    pub fn state(&self) -> ReadinessState {
        self.machine.state()
    }

    /// 상태 이력
    pub fn history(&self) -> &[ReadinessState] {
        self.machine.history()
    }

    /// 모든 노드가 준비될 때까지 기다립니다.
    ///
    /// 라운드마다 모든 노드를 프로브하고 (앞 노드가 실패해도 나머지를 계속 프로브),
    /// 라운드 사이에는 `min(interval, 남은 시간)`만큼 대기합니다. 경과 시간이
    /// `timeout` 이상이 되면 `TimedOut`입니다. 제한 시간 이후에 끝난 라운드는
    /// 모든 노드가 통과했더라도 `Ready`로 인정하지 않습니다.
    ///
    /// # Errors
    ///
    /// 이미 사용된 프로버로 다시 호출하면 [`ClusterError::InvalidTransition`]을 반환합니다.
    pub async fn await_ready(
        &mut self,
        topology: &ClusterTopology,
        timeout: Duration,
        interval: Duration,
    ) -> Result<ReadinessOutcome, ClusterError> {
        self.machine.transition(ReadinessState::Polling)?;
        info!(
            nodes = topology.len(),
            timeout_secs = timeout.as_secs(),
            interval_secs = interval.as_secs(),
            "waiting for cluster readiness"
        );

        let started = Instant::now();
        let mut rounds = 0u32;

        loop {
            rounds = rounds.saturating_add(1);
            let failing_nodes = self.probe_round(topology).await;
            let elapsed = started.elapsed();

            if failing_nodes.is_empty() && elapsed < timeout {
                self.machine.transition(ReadinessState::Ready)?;
                info!(
                    rounds,
                    elapsed_secs = elapsed.as_secs(),
                    "cluster is ready"
                );
                return Ok(ReadinessOutcome::Ready { rounds, elapsed });
            }

            let remaining = timeout.saturating_sub(elapsed);
            if remaining.is_zero() {
                return self.time_out(rounds, elapsed, failing_nodes);
            }

            debug!(
                round = rounds,
                failing = ?failing_nodes,
                remaining_secs = remaining.as_secs(),
                "cluster not ready yet"
            );
            tokio::time::sleep(interval.min(remaining)).await;

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return self.time_out(rounds, elapsed, failing_nodes);
            }
        }
    }

    async fn probe_round(&self, topology: &ClusterTopology) -> Vec<String> {
        let mut failing = Vec::new();
        for node in topology.nodes() {
            if !self.prober.probe(node).await {
                failing.push(node.name.clone());
            }
        }
        failing
    }

    fn time_out(
        &mut self,
        rounds: u32,
        elapsed: Duration,
        failing_nodes: Vec<String>,
    ) -> Result<ReadinessOutcome, ClusterError> {
        self.machine.transition(ReadinessState::TimedOut)?;
        warn!(
            rounds,
            elapsed_secs = elapsed.as_secs(),
            failing = ?failing_nodes,
            "cluster readiness timed out"
        );
        Ok(ReadinessOutcome::TimedOut {
            rounds,
            elapsed,
            failing_nodes,
        })
    }
}

/// `compose exec`로 노드 컨테이너 안에서 프로브 명령을 실행하는 프로버
pub struct ComposeNodeProber<'a, C: ComposeClient> {
    compose: &'a C,
    probe_timeout: Duration,
}

impl<'a, C: ComposeClient> ComposeNodeProber<'a, C> {
    /// 프로버를 생성합니다.
    pub fn new(compose: &'a C, probe_timeout: Duration) -> Self {
        Self {
            compose,
            probe_timeout,
        }
    }
}

impl<C: ComposeClient> NodeProber for ComposeNodeProber<'_, C> {
    async fn probe(&self, node: &NodeSpec) -> bool {
        match self
            .compose
            .exec(&node.name, &node.probe.command, self.probe_timeout)
            .await
        {
            Ok(output) => {
                let passed = node.probe.passes(&output);
                debug!(
                    node = %node.name,
                    role = %node.role,
                    exit_code = output.exit_code,
                    timed_out = output.timed_out,
                    passed,
                    "probe finished"
                );
                passed
            }
            Err(e) => {
                debug!(node = %node.name, error = %e, "probe could not run");
                false
            }
        }
    }
}
