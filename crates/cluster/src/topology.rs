//! 클러스터 토폴로지
//!
//! 순서가 있는 노드 목록이며 실행 중에는 변경되지 않습니다.
//! 각 노드는 준비 상태 프로브 명령과 성공 판정 조건을 가집니다.
//!
//! - 코디네이터: liveness 검사에 "ok"류 응답 (예: `ruok` → `imok`)
//! - 워커: API 버전 핸드셰이크에 응답 (종료 코드 0)

use std::collections::HashSet;

use testrun_core::config::{ClusterConfig, NodeConfig};
use testrun_core::process::ProcessOutput;
use testrun_core::types::NodeRole;

use crate::error::ClusterError;

/// 노드 프로브 명세
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    /// 노드 컨테이너 안에서 실행할 명령
    pub command: Vec<String>,
    /// stdout에 포함되어야 하는 문자열
    pub expect_output: Option<String>,
}

impl ProbeSpec {
    /// 프로브 실행 결과가 성공 조건을 만족하는지 판정합니다.
    pub fn passes(&self, output: &ProcessOutput) -> bool {
        if !output.success() {
            return false;
        }
        match &self.expect_output {
            Some(expected) => output.stdout.contains(expected.as_str()),
            None => true,
        }
    }
}

/// 클러스터 노드
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    /// compose 서비스 이름
    pub name: String,
    /// 노드 역할
    pub role: NodeRole,
    /// 준비 상태 프로브
    pub probe: ProbeSpec,
}

impl NodeSpec {
    /// 노드를 생성합니다.
    pub fn new(name: impl Into<String>, role: NodeRole, probe: ProbeSpec) -> Self {
        Self {
            name: name.into(),
            role,
            probe,
        }
    }
}

impl From<&NodeConfig> for NodeSpec {
    fn from(config: &NodeConfig) -> Self {
        Self {
            name: config.name.clone(),
            role: config.role,
            probe: ProbeSpec {
                command: config.probe.clone(),
                expect_output: config.expect_output.clone(),
            },
        }
    }
}

/// 선언된 클러스터 토폴로지
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTopology {
    nodes: Vec<NodeSpec>,
}

impl ClusterTopology {
    /// 노드 목록에서 토폴로지를 생성합니다.
    ///
    /// # Errors
    ///
    /// 노드가 없거나, 이름이 중복되거나, 프로브 명령이 비어 있거나,
    /// 코디네이터에 기대 응답이 없으면 에러를 반환합니다.
    pub fn new(nodes: Vec<NodeSpec>) -> Result<Self, ClusterError> {
        if nodes.is_empty() {
            return Err(topology_error("nodes", "at least one node is required"));
        }
        let mut seen = HashSet::new();
        for node in &nodes {
            if !seen.insert(node.name.as_str()) {
                return Err(topology_error(
                    "nodes",
                    format!("duplicate node name '{}'", node.name),
                ));
            }
            if node.probe.command.is_empty() {
                return Err(topology_error(
                    "probe",
                    format!("node '{}' has an empty probe command", node.name),
                ));
            }
            if node.role == NodeRole::Coordinator
                && node
                    .probe
                    .expect_output
                    .as_deref()
                    .is_none_or(|s| s.trim().is_empty())
            {
                return Err(topology_error(
                    "expect_output",
                    format!("coordinator '{}' has no expected liveness reply", node.name),
                ));
            }
        }
        Ok(Self { nodes })
    }

    /// 클러스터 설정에서 토폴로지를 생성합니다.
    pub fn from_config(config: &ClusterConfig) -> Result<Self, ClusterError> {
        Self::new(config.nodes.iter().map(NodeSpec::from).collect())
    }

    /// 선언 순서대로의 노드 목록
    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    /// 노드 수
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 비어 있는지 여부 (생성 시 검증되므로 항상 `false`)
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 특정 역할의 노드
    pub fn with_role(&self, role: NodeRole) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(move |n| n.role == role)
    }

    /// 노드 이름 목록
    pub fn names(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.name.clone()).collect()
    }
}

fn topology_error(field: &str, reason: impl Into<String>) -> ClusterError {
    ClusterError::Topology {
        field: field.to_owned(),
        reason: reason.into(),
    }
}
