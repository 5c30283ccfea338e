//! 클러스터 에러 타입
//!
//! [`ClusterError`]는 클러스터 시작/정지, 준비 상태 대기, Docker 데몬 접근에서
//! 발생하는 모든 에러를 표현합니다. 준비 대기 타임아웃은 수집된 진단 정보를
//! 함께 담아 호출자가 실패 전에 출력할 수 있게 합니다.

use testrun_core::error::ProcessError;

use crate::diagnostics::ClusterDiagnostics;
use crate::readiness::ReadinessState;

/// 클러스터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// Docker API 호출 실패
    #[error("docker api error: {0}")]
    DockerApi(String),

    /// Docker 소켓 연결 실패
    #[error("docker connection error: {0}")]
    DockerConnection(String),

    /// compose 명령 실패 (`up`, `down`, `logs`, `exec`)
    #[error("compose {action} failed: {reason}")]
    Compose {
        /// compose 하위 명령
        action: String,
        /// 실패 사유
        reason: String,
    },

    /// 준비 대기 타임아웃
    #[error(
        "cluster not ready after {elapsed_secs}s (failing nodes: {})",
        failing_nodes.join(", ")
    )]
    ReadinessTimeout {
        /// 타임아웃까지 경과한 시간 (초)
        elapsed_secs: u64,
        /// 마지막 라운드에서 프로브에 실패한 노드
        failing_nodes: Vec<String>,
        /// 타임아웃 시점에 수집한 클러스터 진단 정보
        diagnostics: Box<ClusterDiagnostics>,
    },

    /// 잘못된 토폴로지 선언
    #[error("invalid topology: {field}: {reason}")]
    Topology {
        /// 문제가 된 필드
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 허용되지 않는 준비 상태 전이
    #[error("invalid readiness transition: {from} -> {to}")]
    InvalidTransition {
        /// 현재 상태
        from: ReadinessState,
        /// 요청된 상태
        to: ReadinessState,
    },

    /// 외부 프로세스 실행 실패
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl ClusterError {
    /// 준비 대기 타임아웃인지 여부
    pub fn is_readiness_timeout(&self) -> bool {
        matches!(self, Self::ReadinessTimeout { .. })
    }

    /// 진단 정보가 있으면 반환합니다.
    pub fn diagnostics(&self) -> Option<&ClusterDiagnostics> {
        match self {
            Self::ReadinessTimeout { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }
}
