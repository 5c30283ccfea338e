//! 외부 프로세스 실행 -- 타임아웃이 있는 명령 실행
//!
//! 테스트 단계, compose 명령, 노드 프로브, 사전 조건 검사는 모두
//! [`run_with_timeout`]을 통해 실행됩니다.
//!
//! # 종료 분류
//! - 타임아웃 초과 시 프로세스를 강제 종료하고 `timed_out = true`로 표시
//! - 그 외에는 종료 코드를 그대로 기록 (시그널로 종료된 경우 `None`)

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ProcessError;

/// 타임아웃으로 종료된 단계에 기록되는 종료 코드 (coreutils `timeout` 관례)
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// 실행할 외부 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// 실행 파일
    pub program: String,
    /// 인자 목록
    pub args: Vec<String>,
    /// 추가 환경변수
    pub env: BTreeMap<String, String>,
    /// 작업 디렉토리 (없으면 현재 디렉토리)
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// 인자 없는 명령을 생성합니다.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            current_dir: None,
        }
    }

    /// argv 배열(`["docker", "compose", "version"]`)에서 명령을 생성합니다.
    pub fn from_argv(argv: &[String]) -> Result<Self, ProcessError> {
        let (program, args) = argv.split_first().ok_or(ProcessError::EmptyCommand)?;
        if program.trim().is_empty() {
            return Err(ProcessError::EmptyCommand);
        }
        Ok(Self::new(program.clone()).args(args.iter().cloned()))
    }

    /// 인자 하나를 추가합니다.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// 인자 여러 개를 추가합니다.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// 환경변수를 추가합니다.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// 사람이 읽을 수 있는 명령줄 문자열
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 동기(blocking) 실행용 `std::process::Command`로 변환합니다.
    ///
    /// 비동기 런타임 밖(예: `Drop`)에서 정리 작업을 수행할 때 사용합니다.
    pub fn to_std_command(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args).envs(&self.env);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn to_tokio_command(&self, mode: OutputMode) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        match mode {
            OutputMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            OutputMode::Capture => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
        }
        cmd
    }
}

/// 출력 처리 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// 부모 프로세스의 stdout/stderr로 그대로 전달 (테스트 단계)
    Inherit,
    /// 출력을 수집 (프로브, 로그, 버전 확인)
    Capture,
}

/// 프로세스 실행 결과
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// 종료 코드 (시그널로 종료되었거나 타임아웃이면 `None`)
    pub exit_code: Option<i32>,
    /// 타임아웃으로 강제 종료되었는지 여부
    pub timed_out: bool,
    /// 수집된 stdout (`Capture` 모드에서만)
    pub stdout: String,
    /// 수집된 stderr (`Capture` 모드에서만)
    pub stderr: String,
    /// 실행 시간
    pub duration: Duration,
}

impl ProcessOutput {
    /// 0으로 정상 종료했는지 여부
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// 명령을 실행하고 종료를 기다립니다.
///
/// `timeout`이 주어지면 초과 시 프로세스를 SIGKILL로 종료하고
/// `timed_out = true`인 결과를 반환합니다. 실행 중인 future가 drop되면
/// (예: 인터럽트) `kill_on_drop`에 의해 자식 프로세스도 종료됩니다.
///
/// # Errors
///
/// 프로세스를 생성하거나 대기하지 못한 경우 [`ProcessError`]를 반환합니다.
pub async fn run_with_timeout(
    spec: &CommandSpec,
    timeout: Option<Duration>,
    mode: OutputMode,
) -> Result<ProcessOutput, ProcessError> {
    debug!(
        command = %spec.display(),
        timeout_secs = timeout.map(|t| t.as_secs()),
        "spawning process"
    );

    let started = Instant::now();
    let mut child = spec
        .to_tokio_command(mode)
        .spawn()
        .map_err(|e| ProcessError::Spawn {
            program: spec.program.clone(),
            reason: e.to_string(),
        })?;

    let wait_error = |e: std::io::Error| ProcessError::Wait {
        program: spec.program.clone(),
        reason: e.to_string(),
    };

    let mut output = match mode {
        OutputMode::Inherit => {
            let status = bounded(child.wait(), timeout).await.map_err(wait_error)?;
            match status {
                Some(status) => ProcessOutput {
                    exit_code: status.code(),
                    ..ProcessOutput::default()
                },
                None => {
                    if let Err(e) = child.kill().await {
                        warn!(command = %spec.display(), error = %e, "failed to kill timed-out process");
                    }
                    timed_out_output()
                }
            }
        }
        // wait_with_output은 child를 소비하므로 타임아웃 시 drop되며 kill_on_drop이 적용됨
        OutputMode::Capture => {
            let collected = bounded(child.wait_with_output(), timeout)
                .await
                .map_err(wait_error)?;
            match collected {
                Some(out) => ProcessOutput {
                    exit_code: out.status.code(),
                    stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                    ..ProcessOutput::default()
                },
                None => timed_out_output(),
            }
        }
    };
    output.duration = started.elapsed();

    if output.timed_out {
        warn!(
            command = %spec.display(),
            timeout_secs = timeout.map(|t| t.as_secs()),
            "process timed out and was killed"
        );
    } else {
        debug!(
            command = %spec.display(),
            exit_code = output.exit_code,
            duration_ms = u64::try_from(output.duration.as_millis()).unwrap_or(u64::MAX),
            "process exited"
        );
    }

    Ok(output)
}

/// 비동기 런타임 밖에서 명령을 실행하고 종료를 기다립니다.
///
/// `Drop` 경로의 정리 작업 전용입니다. stdout은 버리고 stderr만 수집하며,
/// 제한 시간이 지나면 프로세스를 강제 종료하고 `timed_out = true`인 결과를 반환합니다.
///
/// # Errors
///
/// 프로세스를 생성하거나 대기하지 못한 경우 [`ProcessError`]를 반환합니다.
pub fn run_blocking_with_timeout(
    spec: &CommandSpec,
    timeout: Duration,
) -> Result<ProcessOutput, ProcessError> {
    use std::io::Read;

    let started = std::time::Instant::now();
    let mut child = spec
        .to_std_command()
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ProcessError::Spawn {
            program: spec.program.clone(),
            reason: e.to_string(),
        })?;

    let wait_error = |e: std::io::Error| ProcessError::Wait {
        program: spec.program.clone(),
        reason: e.to_string(),
    };

    loop {
        if let Some(status) = child.try_wait().map_err(wait_error)? {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                // 읽기 실패는 에러 메시지만 잃음
                let _ = pipe.read_to_string(&mut stderr);
            }
            return Ok(ProcessOutput {
                exit_code: status.code(),
                stderr,
                duration: started.elapsed(),
                ..ProcessOutput::default()
            });
        }
        if started.elapsed() >= timeout {
            if let Err(e) = child.kill() {
                warn!(command = %spec.display(), error = %e, "failed to kill timed-out process");
            }
            let _ = child.wait();
            warn!(
                command = %spec.display(),
                timeout_secs = timeout.as_secs(),
                "process timed out and was killed"
            );
            let mut output = timed_out_output();
            output.duration = started.elapsed();
            return Ok(output);
        }
        std::thread::sleep(BLOCKING_POLL_INTERVAL);
    }
}

const BLOCKING_POLL_INTERVAL: Duration = Duration::from_millis(50);

fn timed_out_output() -> ProcessOutput {
    ProcessOutput {
        exit_code: Some(TIMEOUT_EXIT_CODE),
        timed_out: true,
        ..ProcessOutput::default()
    }
}

/// 타임아웃이 없으면 그대로 기다리고, 있으면 초과 시 `Ok(None)`을 반환합니다.
async fn bounded<T>(
    fut: impl Future<Output = std::io::Result<T>>,
    timeout: Option<Duration>,
) -> std::io::Result<Option<T>> {
    match timeout {
        None => fut.await.map(Some),
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(res) => res.map(Some),
            Err(_elapsed) => Ok(None),
        },
    }
}
