//! compose CLI 추상화
//!
//! 클러스터 토폴로지 선언 파일은 불투명하게 compose CLI에 전달됩니다.
//! [`ComposeClient`] trait으로 `up`/`down`/`logs`/`exec`를 추상화하여
//! 실제 구현([`ComposeCli`])과 테스트용 가짜 구현을 교체할 수 있습니다.
//!
//! 모든 명령은 `<compose_command> -f <file> -p <project> <subcommand>` 형태로
//! 실행됩니다.

use std::future::Future;
use std::time::Duration;

use testrun_core::config::ClusterConfig;
use testrun_core::process::{
    CommandSpec, OutputMode, ProcessOutput, run_blocking_with_timeout, run_with_timeout,
};
use tracing::{debug, info};

use crate::docker::validate_project_name;
use crate::error::ClusterError;

/// compose CLI 작업 추상화
///
/// `down`은 "정지할 것이 없음"을 성공으로 처리해야 합니다 (멱등).
pub trait ComposeClient: Send + Sync + 'static {
    /// 토폴로지의 모든 서비스를 백그라운드로 시작합니다.
    fn up(&self) -> impl Future<Output = Result<(), ClusterError>> + Send;

    /// 모든 서비스와 볼륨을 제거합니다.
    fn down(&self) -> impl Future<Output = Result<(), ClusterError>> + Send;

    /// 비동기 런타임 밖에서 `down`을 실행합니다 (`Drop` 경로 전용).
    ///
    /// 멈춘 compose 명령이 종료 경로를 막지 않도록 제한 시간을 둡니다.
    fn down_blocking(&self) -> Result<(), ClusterError>;

    /// 최근 로그를 수집합니다.
    fn logs(&self, tail: usize) -> impl Future<Output = Result<String, ClusterError>> + Send;

    /// 서비스 컨테이너 안에서 명령을 실행합니다.
    ///
    /// 0이 아닌 종료 코드와 타임아웃은 에러가 아니라 [`ProcessOutput`]으로 반환됩니다.
    fn exec(
        &self,
        service: &str,
        argv: &[String],
        timeout: Duration,
    ) -> impl Future<Output = Result<ProcessOutput, ClusterError>> + Send;

    /// compose 프로젝트 이름
    fn project(&self) -> &str;
}

/// compose CLI 기반 구현
#[derive(Debug, Clone)]
pub struct ComposeCli {
    base: CommandSpec,
    project: String,
    up_timeout: Duration,
}

impl ComposeCli {
    /// 설정에서 compose 클라이언트를 생성합니다.
    ///
    /// # Errors
    ///
    /// compose 명령이 비어 있거나 프로젝트 이름이 유효하지 않으면 에러를 반환합니다.
    pub fn from_config(config: &ClusterConfig) -> Result<Self, ClusterError> {
        validate_project_name(&config.project_name)?;
        let base = CommandSpec::from_argv(&config.compose_command)?
            .arg("-f")
            .arg(config.compose_file.as_str())
            .arg("-p")
            .arg(config.project_name.as_str());
        Ok(Self {
            base,
            project: config.project_name.clone(),
            up_timeout: Duration::from_secs(config.up_timeout_secs),
        })
    }

    fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base.clone().args(args)
    }

    async fn run_checked(&self, action: &str, spec: CommandSpec) -> Result<String, ClusterError> {
        let output = run_with_timeout(&spec, Some(self.up_timeout), OutputMode::Capture).await?;
        self.check(action, output)
    }

    fn check(&self, action: &str, output: ProcessOutput) -> Result<String, ClusterError> {
        if output.success() {
            return Ok(output.stdout);
        }
        let reason = if output.timed_out {
            format!("timed out after {}s", self.up_timeout.as_secs())
        } else {
            let stderr = output.stderr.trim();
            match output.exit_code {
                Some(code) if stderr.is_empty() => format!("exit code {code}"),
                Some(code) => format!("exit code {code}: {stderr}"),
                None => "terminated by signal".to_owned(),
            }
        };
        Err(ClusterError::Compose {
            action: action.to_owned(),
            reason,
        })
    }
}

impl ComposeClient for ComposeCli {
    async fn up(&self) -> Result<(), ClusterError> {
        info!(project = %self.project, "starting cluster");
        self.run_checked("up", self.command(["up", "-d"])).await?;
        Ok(())
    }

    async fn down(&self) -> Result<(), ClusterError> {
        debug!(project = %self.project, "tearing down cluster");
        self.run_checked("down", self.command(["down", "-v", "--remove-orphans"]))
            .await?;
        Ok(())
    }

    fn down_blocking(&self) -> Result<(), ClusterError> {
        let spec = self.command(["down", "-v", "--remove-orphans"]);
        let output = run_blocking_with_timeout(&spec, self.up_timeout)?;
        self.check("down", output)?;
        Ok(())
    }

    async fn logs(&self, tail: usize) -> Result<String, ClusterError> {
        let spec = self.command(vec![
            "logs".to_owned(),
            "--no-color".to_owned(),
            "--tail".to_owned(),
            tail.to_string(),
        ]);
        let output = run_with_timeout(&spec, Some(self.up_timeout), OutputMode::Capture).await?;
        if !output.success() {
            return Err(ClusterError::Compose {
                action: "logs".to_owned(),
                reason: output.stderr.trim().to_owned(),
            });
        }
        // compose는 서비스 로그를 stdout과 stderr 양쪽에 섞어 출력함
        let mut logs = output.stdout;
        logs.push_str(&output.stderr);
        Ok(logs)
    }

    async fn exec(
        &self,
        service: &str,
        argv: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, ClusterError> {
        let spec = self
            .command(["exec", "-T", service])
            .args(argv.iter().cloned());
        Ok(run_with_timeout(&spec, Some(timeout), OutputMode::Capture).await?)
    }

    fn project(&self) -> &str {
        &self.project
    }
}
