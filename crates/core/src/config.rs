//! 설정 관리 -- testrun.toml 파싱 및 실행 설정
//!
//! [`TestrunConfig`]는 파일/환경변수로 구성되는 전체 설정이고,
//! [`RunConfig`]는 CLI 플래그와 결합해 한 번의 실행마다 한 번 만들어지는
//! 불변 설정입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`TESTRUN_CLUSTER_READINESS_TIMEOUT_SECS=60` 형식)
//! 3. 설정 파일 (`testrun.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), testrun_core::error::TestrunError> {
//! use testrun_core::config::{RunConfig, RunFlags, TestrunConfig};
//!
//! let config = TestrunConfig::load_optional("testrun.toml").await?;
//! let run = RunConfig::from_flags(RunFlags::default(), &config);
//! assert!(run.run_unit);
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, TestrunError};
use crate::types::NodeRole;

/// 기본 설정 파일 경로
pub const DEFAULT_CONFIG_PATH: &str = "testrun.toml";

/// testrun 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestrunConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 사전 조건 검사 설정
    #[serde(default)]
    pub prerequisites: PrerequisitesConfig,
    /// 환경 준비 설정
    #[serde(default)]
    pub setup: SetupConfig,
    /// 클러스터 설정
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// 단계별 실행 설정
    #[serde(default)]
    pub phases: PhasesConfig,
    /// 벤치마크 설정 파일 생성 파라미터
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
}

impl TestrunConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TestrunError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값을 사용하여 로드합니다.
    ///
    /// `--config`를 명시하지 않았을 때 사용합니다.
    pub async fn load_optional(path: impl AsRef<Path>) -> Result<Self, TestrunError> {
        let path = path.as_ref();
        match Self::load(path).await {
            Err(TestrunError::Config(ConfigError::FileNotFound { .. })) => {
                debug!(path = %path.display(), "config file not found, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TestrunError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TestrunError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TestrunError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TestrunError> {
        toml::from_str(toml_str).map_err(|e| {
            TestrunError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TESTRUN_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TESTRUN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TESTRUN_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.reports_dir, "TESTRUN_GENERAL_REPORTS_DIR");

        // Cluster
        override_string(
            &mut self.cluster.compose_file,
            "TESTRUN_CLUSTER_COMPOSE_FILE",
        );
        override_string(
            &mut self.cluster.project_name,
            "TESTRUN_CLUSTER_PROJECT_NAME",
        );
        override_u64(
            &mut self.cluster.readiness_timeout_secs,
            "TESTRUN_CLUSTER_READINESS_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.cluster.poll_interval_secs,
            "TESTRUN_CLUSTER_POLL_INTERVAL_SECS",
        );
        override_u64(
            &mut self.cluster.probe_timeout_secs,
            "TESTRUN_CLUSTER_PROBE_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.cluster.up_timeout_secs,
            "TESTRUN_CLUSTER_UP_TIMEOUT_SECS",
        );
        override_usize(
            &mut self.cluster.log_tail_lines,
            "TESTRUN_CLUSTER_LOG_TAIL_LINES",
        );

        // Phases
        override_opt_u64(
            &mut self.phases.unit.timeout_secs,
            "TESTRUN_PHASES_UNIT_TIMEOUT_SECS",
        );
        override_opt_u64(
            &mut self.phases.e2e.timeout_secs,
            "TESTRUN_PHASES_E2E_TIMEOUT_SECS",
        );
        override_opt_u64(
            &mut self.phases.benchmark.timeout_secs,
            "TESTRUN_PHASES_BENCHMARK_TIMEOUT_SECS",
        );

        // Benchmark
        override_string(
            &mut self.benchmark.config_path,
            "TESTRUN_BENCHMARK_CONFIG_PATH",
        );
        override_string(
            &mut self.benchmark.bootstrap_servers,
            "TESTRUN_BENCHMARK_BOOTSTRAP_SERVERS",
        );
        override_u64(
            &mut self.benchmark.message_count,
            "TESTRUN_BENCHMARK_MESSAGE_COUNT",
        );
        override_usize(
            &mut self.benchmark.message_size,
            "TESTRUN_BENCHMARK_MESSAGE_SIZE",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TestrunError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.general.reports_dir.trim().is_empty() {
            return Err(invalid("general.reports_dir", "must not be empty"));
        }

        if self.cluster.compose_command.is_empty() {
            return Err(invalid("cluster.compose_command", "must not be empty"));
        }

        if self.cluster.poll_interval_secs == 0 {
            return Err(invalid(
                "cluster.poll_interval_secs",
                "must be greater than 0",
            ));
        }

        if self.cluster.poll_interval_secs > self.cluster.readiness_timeout_secs {
            return Err(invalid(
                "cluster.poll_interval_secs",
                "must not exceed cluster.readiness_timeout_secs",
            ));
        }

        if self.cluster.nodes.is_empty() {
            return Err(invalid("cluster.nodes", "at least one node is required"));
        }

        let mut seen = HashSet::new();
        for node in &self.cluster.nodes {
            if node.name.trim().is_empty() {
                return Err(invalid("cluster.nodes.name", "must not be empty"));
            }
            if !seen.insert(node.name.as_str()) {
                return Err(invalid(
                    "cluster.nodes.name",
                    format!("duplicate node name '{}'", node.name),
                ));
            }
            if node.probe.is_empty() {
                return Err(invalid(
                    "cluster.nodes.probe",
                    format!("node '{}' has an empty probe command", node.name),
                ));
            }
            if node.role == NodeRole::Coordinator
                && node.expect_output.as_deref().is_none_or(|s| s.trim().is_empty())
            {
                return Err(invalid(
                    "cluster.nodes.expect_output",
                    format!("coordinator '{}' must declare its liveness reply", node.name),
                ));
            }
        }

        for (field, phase) in [
            ("phases.unit.command", &self.phases.unit),
            ("phases.e2e.command", &self.phases.e2e),
            ("phases.benchmark.command", &self.phases.benchmark),
        ] {
            if phase.command.is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
            if phase.timeout_secs == Some(0) {
                return Err(invalid(field, "timeout_secs must be greater than 0"));
            }
        }

        Ok(())
    }

    /// 리포트 디렉토리 아래의 파일 경로를 계산합니다.
    pub fn report_path(&self, file_name: &str) -> PathBuf {
        Path::new(&self.general.reports_dir).join(file_name)
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> TestrunError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 결과 파일이 저장되는 리포트 디렉토리
    pub reports_dir: String,
    /// 커버리지 리포트 파일명 (Cobertura XML)
    pub coverage_file: String,
    /// 요약 리포트 파일명
    pub summary_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            reports_dir: "reports".to_owned(),
            coverage_file: "coverage.xml".to_owned(),
            summary_file: "test-summary.txt".to_owned(),
        }
    }
}

/// 사전 조건 검사 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrerequisitesConfig {
    /// 실행 가능해야 하는 도구 명령 (각각 argv 배열)
    pub tools: Vec<Vec<String>>,
    /// 도구 명령 하나당 제한 시간 (초)
    pub timeout_secs: u64,
}

impl Default for PrerequisitesConfig {
    fn default() -> Self {
        Self {
            tools: vec![
                argv(&["docker", "--version"]),
                argv(&["docker", "compose", "version"]),
            ],
            timeout_secs: 30,
        }
    }
}

/// 환경 준비 설정
///
/// 의존성 설치 등 외부 준비 명령을 순서대로 실행합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    /// 준비 명령 목록 (각각 argv 배열)
    pub commands: Vec<Vec<String>>,
    /// 명령 하나당 제한 시간 (초)
    pub timeout_secs: u64,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            timeout_secs: 600,
        }
    }
}

/// 클러스터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// compose CLI 명령 (`["docker", "compose"]` 또는 `["docker-compose"]`)
    pub compose_command: Vec<String>,
    /// 클러스터 토폴로지 선언 파일
    pub compose_file: String,
    /// compose 프로젝트 이름
    pub project_name: String,
    /// 준비 대기 제한 시간 (초)
    pub readiness_timeout_secs: u64,
    /// 준비 폴링 간격 (초)
    pub poll_interval_secs: u64,
    /// 노드 프로브 하나당 제한 시간 (초)
    pub probe_timeout_secs: u64,
    /// `up` 명령 제한 시간 (초)
    pub up_timeout_secs: u64,
    /// 준비 실패 시 수집할 로그 줄 수
    pub log_tail_lines: usize,
    /// 노드 목록
    pub nodes: Vec<NodeConfig>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        let mut nodes = vec![NodeConfig {
            name: "zookeeper".to_owned(),
            role: NodeRole::Coordinator,
            probe: argv(&["sh", "-c", "echo ruok | nc -w 2 localhost 2181"]),
            expect_output: Some("imok".to_owned()),
        }];
        nodes.extend((1..=3).map(|i| NodeConfig {
            name: format!("kafka-{i}"),
            role: NodeRole::Worker,
            probe: argv(&[
                "kafka-broker-api-versions",
                "--bootstrap-server",
                "localhost:9092",
            ]),
            expect_output: None,
        }));

        Self {
            compose_command: argv(&["docker", "compose"]),
            compose_file: "docker-compose.test.yml".to_owned(),
            project_name: "testrun".to_owned(),
            readiness_timeout_secs: 120,
            poll_interval_secs: 5,
            probe_timeout_secs: 10,
            up_timeout_secs: 300,
            log_tail_lines: 200,
            nodes,
        }
    }
}

/// 클러스터 노드 선언
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// compose 서비스 이름
    pub name: String,
    /// 노드 역할
    pub role: NodeRole,
    /// 노드 컨테이너 안에서 실행할 프로브 명령
    pub probe: Vec<String>,
    /// 프로브 stdout에 포함되어야 하는 문자열 (없으면 종료 코드 0만 확인)
    #[serde(default)]
    pub expect_output: Option<String>,
}

/// 단계별 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhasesConfig {
    /// 단위 테스트 단계
    pub unit: PhaseConfig,
    /// e2e 테스트 단계
    pub e2e: PhaseConfig,
    /// 벤치마크 단계
    pub benchmark: PhaseConfig,
}

impl Default for PhasesConfig {
    fn default() -> Self {
        Self {
            unit: PhaseConfig {
                command: argv(&[
                    "python",
                    "-m",
                    "pytest",
                    "tests/unit",
                    "-v",
                    "--junitxml=reports/unit-results.xml",
                    "--cov=src",
                    "--cov-report=xml:reports/coverage.xml",
                    "--cov-report=html:reports/coverage-html",
                ]),
                timeout_secs: None,
                results_file: Some("unit-results.xml".to_owned()),
                env: BTreeMap::new(),
            },
            e2e: PhaseConfig {
                command: argv(&[
                    "python",
                    "-m",
                    "pytest",
                    "tests/e2e",
                    "-v",
                    "--junitxml=reports/e2e-results.xml",
                ]),
                timeout_secs: Some(300),
                results_file: Some("e2e-results.xml".to_owned()),
                env: BTreeMap::new(),
            },
            benchmark: PhaseConfig {
                command: argv(&[
                    "python",
                    "benchmarks/run_benchmarks.py",
                    "--output",
                    "reports/benchmark-results.json",
                    "--report",
                    "reports/benchmark-report.html",
                ]),
                timeout_secs: Some(600),
                results_file: Some("benchmark-results.json".to_owned()),
                env: BTreeMap::new(),
            },
        }
    }
}

/// 단일 단계 실행 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// 실행할 명령 (argv 배열)
    pub command: Vec<String>,
    /// 제한 시간 (초, 없으면 무제한)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// 리포트 디렉토리 기준 결과 파일명
    #[serde(default)]
    pub results_file: Option<String>,
    /// 추가 환경변수
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// 벤치마크 설정 파일 생성 파라미터
///
/// 벤치마크 단계 직전에 JSON으로 기록되고 정리 단계에서 삭제됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// 생성될 설정 파일 경로
    pub config_path: String,
    /// 리포트 디렉토리 기준 HTML 리포트 파일명
    pub report_file: String,
    /// 브로커 접속 주소
    pub bootstrap_servers: String,
    /// 벤치마크 토픽
    pub topic: String,
    /// 전송할 메시지 수
    pub message_count: u64,
    /// 메시지 크기 (바이트)
    pub message_size: usize,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            config_path: "benchmark-config.json".to_owned(),
            report_file: "benchmark-report.html".to_owned(),
            bootstrap_servers: "localhost:9092,localhost:9093,localhost:9094".to_owned(),
            topic: "testrun-benchmark".to_owned(),
            message_count: 10_000,
            message_size: 1024,
        }
    }
}

/// CLI에서 전달되는 단계 선택 플래그
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    /// `--unit-only`
    pub unit_only: bool,
    /// `--e2e-only`
    pub e2e_only: bool,
    /// `--with-benchmarks`
    pub with_benchmarks: bool,
    /// `--no-cleanup`
    pub no_cleanup: bool,
}

/// 한 번의 실행을 위한 불변 설정
///
/// CLI 플래그와 [`TestrunConfig`]에서 한 번 만들어지며 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// 단위 테스트 실행 여부
    pub run_unit: bool,
    /// e2e 테스트 실행 여부
    pub run_e2e: bool,
    /// 벤치마크 실행 여부 (e2e가 실행될 때만 의미 있음)
    pub run_benchmarks: bool,
    /// 종료 시 정리 여부
    pub cleanup_on_exit: bool,
    /// 단위 테스트 제한 시간 (기본 없음)
    pub unit_timeout: Option<Duration>,
    /// e2e 제한 시간
    pub e2e_timeout: Option<Duration>,
    /// 벤치마크 제한 시간
    pub benchmark_timeout: Option<Duration>,
    /// 클러스터 준비 대기 제한 시간
    pub readiness_timeout: Duration,
    /// 준비 폴링 간격
    pub poll_interval: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::from_flags(RunFlags::default(), &TestrunConfig::default())
    }
}

impl RunConfig {
    /// CLI 플래그와 설정에서 실행 설정을 만듭니다.
    pub fn from_flags(flags: RunFlags, config: &TestrunConfig) -> Self {
        let mut run_unit = true;
        let mut run_e2e = true;
        let mut run_benchmarks = flags.with_benchmarks;

        if flags.unit_only {
            run_e2e = false;
            run_benchmarks = false;
        }
        if flags.e2e_only {
            run_unit = false;
            run_benchmarks = false;
        }

        Self {
            run_unit,
            run_e2e,
            run_benchmarks: run_benchmarks && run_e2e,
            cleanup_on_exit: !flags.no_cleanup,
            unit_timeout: config.phases.unit.timeout_secs.map(Duration::from_secs),
            e2e_timeout: config.phases.e2e.timeout_secs.map(Duration::from_secs),
            benchmark_timeout: config
                .phases
                .benchmark
                .timeout_secs
                .map(Duration::from_secs),
            readiness_timeout: Duration::from_secs(config.cluster.readiness_timeout_secs),
            poll_interval: Duration::from_secs(config.cluster.poll_interval_secs),
        }
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_owned()).collect()
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

/// 빈 문자열이나 `none`은 제한 없음으로 해석합니다.
fn override_opt_u64(target: &mut Option<u64>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        let trimmed = val.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            *target = None;
            return;
        }
        match trimmed.parse::<u64>() {
            Ok(parsed) => *target = Some(parsed),
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
