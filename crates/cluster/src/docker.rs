//! Docker API abstraction for testability.
//!
//! The [`DockerClient`] trait abstracts the bollard Docker API, allowing
//! production code to use [`BollardDockerClient`] while tests use `MockDockerClient`.
//!
//! The orchestrator only needs two things from the daemon: a liveness check
//! (prerequisite gate) and the state of every container in the compose
//! project (readiness-timeout diagnostics).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌────────────────┐
//! │ PrerequisiteGate │   │ ClusterManager │
//! └────────┬─────────┘   └───────┬────────┘
//!          │                     │
//!          ▼                     ▼
//!        ┌─────────────────────────┐
//!        │   DockerClient (trait)  │
//!        └─────────────────────────┘
//!              │            │
//!              ▼            ▼
//!         ┌───────┐     ┌──────┐
//!         │Bollard│     │ Mock │
//!         └───┬───┘     └──────┘
//!             │
//!             ▼
//!       Docker Daemon
//! ```
//!
//! # Project Name Validation
//!
//! The project name ends up inside a label filter, so it is validated first:
//! - Must be 1-63 characters
//! - Must contain only lowercase ASCII letters, digits, `-` and `_`
//! - Must start with a letter or digit

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::diagnostics::ContainerState;
use crate::error::ClusterError;

/// Label docker compose attaches to every container of a project.
pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

/// Label docker compose attaches with the service name.
pub const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

/// Validates a compose project name before it is used in a filter or command line.
pub fn validate_project_name(name: &str) -> Result<(), ClusterError> {
    if name.is_empty() || name.len() > 63 {
        return Err(ClusterError::Topology {
            field: "project_name".to_owned(),
            reason: format!("length {} (must be 1-63)", name.len()),
        });
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(ClusterError::Topology {
            field: "project_name".to_owned(),
            reason: "must contain only lowercase letters, digits, '-' and '_'".to_owned(),
        });
    }
    if !name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
    {
        return Err(ClusterError::Topology {
            field: "project_name".to_owned(),
            reason: "must start with a letter or digit".to_owned(),
        });
    }
    Ok(())
}

/// Trait abstracting Docker API operations.
///
/// The trait is `Send + Sync + 'static`, allowing safe sharing across async contexts.
///
/// # Implementations
///
/// - [`BollardDockerClient`]: Production implementation using the `bollard` library
/// - `MockDockerClient`: Test implementation with configurable responses (available in tests only)
pub trait DockerClient: Send + Sync + 'static {
    /// Checks Docker daemon connectivity.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::DockerConnection` if the daemon is unreachable.
    fn ping(&self) -> impl Future<Output = Result<(), ClusterError>> + Send;

    /// Lists every container (running or not) belonging to a compose project.
    ///
    /// # Errors
    ///
    /// - `ClusterError::Topology`: Invalid project name
    /// - `ClusterError::DockerApi`: The Docker API call failed
    fn list_project_containers(
        &self,
        project: &str,
    ) -> impl Future<Output = Result<Vec<ContainerState>, ClusterError>> + Send;
}

/// Production Docker client implementation using `bollard`.
///
/// Communicates with the Docker daemon via a Unix socket or TCP connection.
/// Internally uses `Arc<bollard::Docker>` for safe sharing across async tasks.
#[derive(Clone)]
pub struct BollardDockerClient {
    docker: Arc<bollard::Docker>,
}

impl BollardDockerClient {
    /// Connects to Docker using the default local socket (or `DOCKER_HOST`).
    ///
    /// Connecting is lazy; an unreachable daemon is only reported by [`DockerClient::ping`].
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::DockerConnection` if the client cannot be configured.
    pub fn connect_local() -> Result<Self, ClusterError> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            ClusterError::DockerConnection(format!("failed to connect to docker: {e}"))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }
}

impl DockerClient for BollardDockerClient {
    async fn ping(&self) -> Result<(), ClusterError> {
        self.docker
            .ping()
            .await
            .map_err(|e| ClusterError::DockerConnection(format!("ping failed: {e}")))?;
        Ok(())
    }

    async fn list_project_containers(
        &self,
        project: &str,
    ) -> Result<Vec<ContainerState>, ClusterError> {
        validate_project_name(project)?;

        use bollard::container::ListContainersOptions;

        let mut filters = HashMap::new();
        filters.insert(
            "label".to_owned(),
            vec![format!("{COMPOSE_PROJECT_LABEL}={project}")],
        );
        let options = ListContainersOptions::<String> {
            all: true, // exited and restarting nodes are the interesting ones
            filters,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| ClusterError::DockerApi(format!("list containers failed: {e}")))?;

        let mut result = Vec::with_capacity(containers.len());
        for container in containers {
            let id: String = container.id.unwrap_or_default().chars().take(12).collect();
            let name = container
                .names
                .unwrap_or_default()
                .first()
                .map(|n| n.trim_start_matches('/').to_owned())
                .unwrap_or_default();
            let service = container
                .labels
                .and_then(|mut labels| labels.remove(COMPOSE_SERVICE_LABEL));

            result.push(ContainerState {
                id,
                name,
                service,
                state: container.state.unwrap_or_else(|| "unknown".to_owned()),
                status: container.status.unwrap_or_default(),
            });
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(result)
    }
}

/// 테스트용 Mock Docker 클라이언트
///
/// 설정 가능한 응답을 반환하여 Docker 없이도 테스트할 수 있습니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockDockerClient {
    /// list_project_containers 호출 시 반환할 컨테이너 목록
    pub containers: Vec<ContainerState>,
    /// 데몬이 응답하지 않는 상황을 시뮬레이션할지 여부
    pub unreachable: bool,
}

#[cfg(test)]
impl MockDockerClient {
    /// 빈 컨테이너 목록으로 mock 클라이언트를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 테스트용 컨테이너를 추가합니다.
    pub fn with_containers(mut self, containers: Vec<ContainerState>) -> Self {
        self.containers = containers;
        self
    }

    /// 데몬 연결이 실패하도록 설정합니다.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }
}

#[cfg(test)]
impl DockerClient for MockDockerClient {
    async fn ping(&self) -> Result<(), ClusterError> {
        if self.unreachable {
            return Err(ClusterError::DockerConnection(
                "mock daemon unreachable".to_owned(),
            ));
        }
        Ok(())
    }

    async fn list_project_containers(
        &self,
        project: &str,
    ) -> Result<Vec<ContainerState>, ClusterError> {
        validate_project_name(project)?;
        if self.unreachable {
            return Err(ClusterError::DockerApi("mock daemon unreachable".to_owned()));
        }
        Ok(self.containers.clone())
    }
}
