//! 도메인 타입 -- 테스트 실행 전반에서 공유되는 타입
//!
//! 단계 종류([`PhaseKind`]), 단계 결과([`PhaseResult`]),
//! 클러스터 노드 역할([`NodeRole`])을 정의합니다.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 테스트 단계 종류
///
/// 실행 순서는 `Unit` → `EndToEnd` → `Benchmark`로 고정입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// 단위 테스트 (클러스터 불필요)
    Unit,
    /// 엔드투엔드 테스트 (실행 중인 클러스터 필요)
    #[serde(rename = "e2e")]
    EndToEnd,
    /// 벤치마크 (정보 제공용, 전체 결과에 영향 없음)
    Benchmark,
}

impl PhaseKind {
    /// 전체 실행 성공 여부 계산에 포함되는 단계인지 여부
    pub fn is_mandatory(self) -> bool {
        !matches!(self, Self::Benchmark)
    }

    /// 실행 중인 클러스터가 필요한 단계인지 여부
    pub fn needs_cluster(self) -> bool {
        matches!(self, Self::EndToEnd | Self::Benchmark)
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "unit"),
            Self::EndToEnd => write!(f, "e2e"),
            Self::Benchmark => write!(f, "benchmark"),
        }
    }
}

/// 단계 종료 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitClass {
    /// 종료 코드 0
    Success,
    /// 0이 아닌 종료 코드, 또는 실행되지 못함
    Failure,
    /// 제한 시간 초과로 강제 종료됨
    TimedOut,
}

impl fmt::Display for ExitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "passed"),
            Self::Failure => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// 단계 실행 결과
///
/// 단계마다 한 번 생성되며 생성 후에는 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    /// 단계 종류
    pub phase: PhaseKind,
    /// 종료 코드 (실행되지 못했거나 시그널로 종료되면 `None`)
    pub exit_code: Option<i32>,
    /// 타임아웃 여부
    pub timed_out: bool,
    /// 시작 시각
    pub started_at: DateTime<Utc>,
    /// 종료 시각
    pub ended_at: DateTime<Utc>,
    /// 실행되지 않은 이유 등 부가 정보
    pub note: Option<String>,
}

impl PhaseResult {
    /// 실행을 마친 단계의 결과를 생성합니다.
    pub fn completed(
        phase: PhaseKind,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        exit_code: Option<i32>,
        timed_out: bool,
    ) -> Self {
        Self {
            phase,
            exit_code,
            timed_out,
            started_at,
            ended_at,
            note: None,
        }
    }

    /// 실행하지 못한 단계를 실패로 기록합니다.
    ///
    /// 예: 클러스터 시작 실패로 e2e 단계를 실행하지 않은 경우
    pub fn not_run(phase: PhaseKind, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            phase,
            exit_code: None,
            timed_out: false,
            started_at: now,
            ended_at: now,
            note: Some(reason.into()),
        }
    }

    /// 시그널로 중단된 단계를 실패로 기록합니다.
    ///
    /// 중단 시점까지의 시작/종료 시각은 보존됩니다.
    pub fn interrupted(phase: PhaseKind, started_at: DateTime<Utc>, signal: &str) -> Self {
        Self {
            phase,
            exit_code: None,
            timed_out: false,
            started_at,
            ended_at: Utc::now(),
            note: Some(format!("interrupted by {signal}")),
        }
    }

    /// 부가 정보를 덧붙입니다.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// 종료 분류
    pub fn class(&self) -> ExitClass {
        if self.timed_out {
            ExitClass::TimedOut
        } else if self.exit_code == Some(0) {
            ExitClass::Success
        } else {
            ExitClass::Failure
        }
    }

    /// 성공 여부
    pub fn succeeded(&self) -> bool {
        self.class() == ExitClass::Success
    }

    /// 실행 시간 (시계가 역행한 경우 0)
    pub fn duration(&self) -> Duration {
        (self.ended_at - self.started_at).to_std().unwrap_or_default()
    }
}

/// 클러스터 노드 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// 코디네이터 노드 -- liveness 검사에 "ok"류 응답을 해야 함
    Coordinator,
    /// 워커(브로커) 노드 -- API 버전 핸드셰이크에 응답해야 함
    Worker,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinator => write!(f, "coordinator"),
            Self::Worker => write!(f, "worker"),
        }
    }
}
