//! 클러스터 진단 정보
//!
//! 준비 대기가 타임아웃되면 compose 로그와 Docker가 보고하는 컨테이너 상태를
//! 수집하여 [`ClusterDiagnostics`]로 묶습니다. 수집 자체가 실패해도
//! 에러를 전파하지 않고 실패 사유를 그대로 기록합니다.

use std::fmt;

/// Docker가 보고하는 컨테이너 상태
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerState {
    /// 짧은 컨테이너 ID (12자)
    pub id: String,
    /// 컨테이너 이름
    pub name: String,
    /// compose 서비스 이름 (`com.docker.compose.service` 레이블)
    pub service: Option<String>,
    /// 상태 (`running`, `exited`, `restarting` 등)
    pub state: String,
    /// 사람이 읽을 수 있는 상태 (`Up 2 minutes (healthy)`)
    pub status: String,
}

/// 타임아웃 시점의 클러스터 진단 정보
#[derive(Debug, Clone, Default)]
pub struct ClusterDiagnostics {
    /// `compose logs --tail N` 출력
    pub logs: String,
    /// 프로젝트 컨테이너 상태
    pub containers: Vec<ContainerState>,
    /// 수집 중 발생한 문제
    pub collection_errors: Vec<String>,
}

impl ClusterDiagnostics {
    /// 아무것도 수집되지 않았는지 여부
    pub fn is_empty(&self) -> bool {
        self.logs.trim().is_empty() && self.containers.is_empty() && self.collection_errors.is_empty()
    }
}

impl fmt::Display for ClusterDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- container states ---")?;
        if self.containers.is_empty() {
            writeln!(f, "(no containers found)")?;
        }
        for c in &self.containers {
            writeln!(
                f,
                "{:<12}  {:<24}  {:<10}  {}",
                c.id,
                c.service.as_deref().unwrap_or(&c.name),
                c.state,
                c.status
            )?;
        }
        for err in &self.collection_errors {
            writeln!(f, "(diagnostics unavailable: {err})")?;
        }
        writeln!(f, "--- cluster logs ---")?;
        if self.logs.trim().is_empty() {
            writeln!(f, "(no logs captured)")
        } else {
            write!(f, "{}", self.logs)
        }
    }
}
