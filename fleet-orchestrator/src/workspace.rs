//! The workspace provisioning record and saga result types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fleet_agent::AgentAddr;
use serde::{Deserialize, Serialize};

/// Overall provisioning state of a workspace.
///
/// Every exit path of the saga lands on one of these; there is no
/// undocumented in-between. `Degraded` means the container runs but the
/// proxy route does not; the workspace is reachable as a raw container
/// only, and deliberately not torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningState {
    Requested,
    ContainerCreating,
    ContainerFailed,
    ContainerReady,
    RoutesConfiguring,
    Active,
    Degraded,
}

/// Routing side of the workspace record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Unconfigured,
    Active,
    Degraded,
}

/// A per-user provisioned environment: container, ports, proxy route.
///
/// Owned exclusively by the orchestrator and mutated only through its
/// workflow steps; the authoritative copy lives in the metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub user_id: String,
    pub agent: AgentAddr,
    pub container_name: Option<String>,
    pub container_id: Option<String>,
    pub container_status: Option<String>,
    /// Host port per service kind.
    pub ports: HashMap<String, u16>,
    pub route_status: RouteStatus,
    pub state: ProvisioningState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl Workspace {
    pub fn new(user_id: String, agent: AgentAddr) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            agent,
            container_name: None,
            container_id: None,
            container_status: None,
            ports: HashMap::new(),
            route_status: RouteStatus::Unconfigured,
            state: ProvisioningState::Requested,
            created_at: now,
            updated_at: now,
            error_message: None,
        }
    }

    pub(crate) fn transition(&mut self, state: ProvisioningState) {
        self.state = state;
        self.updated_at = Utc::now();
    }
}

/// Request to provision a workspace on a caller-chosen agent.
///
/// The orchestrator does no scheduling of its own; the caller names the
/// target agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub user_id: String,
    pub agent: AgentAddr,
    pub cpus: Option<f64>,
    pub memory_mb: Option<u64>,
    #[serde(default)]
    pub gpu: bool,
}

/// Result of one saga step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum StepOutcome {
    Succeeded,
    /// The step had nothing to do ("not found" tolerated as success).
    Skipped(String),
    Failed(String),
}

impl StepOutcome {
    /// Failed steps are the only non-success; skips count as success.
    pub fn ok(&self) -> bool {
        !matches!(self, StepOutcome::Failed(_))
    }
}

/// Structured result of a provision call.
///
/// Step failures are recorded here and in the persisted workspace state;
/// they are never collapsed into a single boolean.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionOutcome {
    pub workspace: Workspace,
    pub container: StepOutcome,
    pub routes: StepOutcome,
}

impl ProvisionOutcome {
    pub fn fully_active(&self) -> bool {
        self.workspace.state == ProvisioningState::Active
    }
}

/// Structured result of a deprovision call: one outcome per step, each
/// attempted regardless of the others.
#[derive(Debug, Clone, Serialize)]
pub struct DeprovisionReport {
    pub user_id: String,
    pub routes: StepOutcome,
    pub container: StepOutcome,
    pub ports: StepOutcome,
    pub metadata: StepOutcome,
}

impl DeprovisionReport {
    pub fn fully_succeeded(&self) -> bool {
        self.routes.ok() && self.container.ok() && self.ports.ok() && self.metadata.ok()
    }
}
