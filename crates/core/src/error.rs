//! 에러 타입 -- 도메인별 에러 정의

/// testrun 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TestrunError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 외부 프로세스 실행 에러
    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 외부 프로세스 실행 에러
///
/// 타임아웃과 0이 아닌 종료 코드는 에러가 아니라
/// [`ProcessOutput`](crate::process::ProcessOutput)의 결과로 표현됩니다.
/// 이 타입은 프로세스를 아예 실행하지 못한 경우만 나타냅니다.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// 빈 명령 (argv가 비어 있음)
    #[error("empty command")]
    EmptyCommand,

    /// 프로세스 생성 실패 (바이너리 없음, 권한 없음 등)
    #[error("failed to spawn '{program}': {reason}")]
    Spawn { program: String, reason: String },

    /// 프로세스 대기 실패
    #[error("failed waiting for '{program}': {reason}")]
    Wait { program: String, reason: String },
}
