//! The provisioning saga.
//!
//! Provision and deprovision are single-pass workflows across the agent
//! container API, the port allocation table, and the proxy configuration.
//! There is no transaction spanning the three, so every step's outcome is
//! persisted and reported individually, and each exit path writes a
//! documented workspace state before returning. No step is retried
//! automatically; an operator (or a later call) resumes from the recorded
//! intermediate state.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use fleet_agent::{AgentAddr, AgentClient, ContainerSpec};
use fleet_core::validation::validate_username;
use fleet_core::FleetError;
use fleet_monitor::{AgentStatus, FleetMonitor};
use fleet_ports::PortAllocator;
use fleet_proxy::{NginxDaemon, RouteManager, ServiceKind};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::api::ContainerApi;
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::store::{FileMetadataStore, MetadataStore};
use crate::workspace::{
    CreateWorkspaceRequest, DeprovisionReport, ProvisionOutcome, ProvisioningState, RouteStatus,
    StepOutcome, Workspace,
};

pub struct ProvisioningOrchestrator {
    containers: Arc<dyn ContainerApi>,
    store: Arc<dyn MetadataStore>,
    routes: RouteManager,
    allocator: Mutex<PortAllocator>,
    monitor: FleetMonitor,
    kinds: Vec<ServiceKind>,
    agents: Vec<AgentAddr>,
    in_flight: StdMutex<HashSet<String>>,
}

impl ProvisioningOrchestrator {
    /// Wire the orchestrator from explicit collaborators.
    ///
    /// Rejects a kind set whose port offsets cannot fit inside the
    /// allocator's default block, since the fallback path would then hand
    /// out ports outside the allocated range.
    pub fn new(
        containers: Arc<dyn ContainerApi>,
        store: Arc<dyn MetadataStore>,
        routes: RouteManager,
        allocator: PortAllocator,
        monitor: FleetMonitor,
        kinds: Vec<ServiceKind>,
        agents: Vec<AgentAddr>,
    ) -> Result<Self> {
        let block = allocator.policy().default_range_size;
        if let Some(kind) = kinds.iter().find(|k| k.port_offset >= block) {
            return Err(OrchestratorError::InvalidInput(format!(
                "Service kind '{}' offset {} does not fit in default port block of {}",
                kind.name, kind.port_offset, block
            )));
        }

        Ok(Self {
            containers,
            store,
            routes,
            allocator: Mutex::new(allocator),
            monitor,
            kinds,
            agents,
            in_flight: StdMutex::new(HashSet::new()),
        })
    }

    /// Wire the orchestrator from configuration with production
    /// collaborators: real agent client, file metadata store, nginx daemon.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        let client = AgentClient::new(config.container_timeout());
        let store = FileMetadataStore::new(config.metadata_dir())?;
        let daemon = Arc::new(NginxDaemon::new(
            config.nginx_bin.clone(),
            config.container_timeout(),
        ));
        let routes = RouteManager::new(
            config.proxy_config_path.clone(),
            config.service_kinds.clone(),
            daemon,
        )
        .map_err(OrchestratorError::Fleet)?;
        let allocator = PortAllocator::new(
            config.allocation_table_path(),
            &config.range_policy_path(),
        )
        .map_err(OrchestratorError::Fleet)?;
        let monitor = FleetMonitor::new(config.monitor_config());

        Self::new(
            Arc::new(client),
            Arc::new(store),
            routes,
            allocator,
            monitor,
            config.service_kinds.clone(),
            config.agents.clone(),
        )
    }

    /// Provision a workspace: create the container, resolve its ports,
    /// configure the proxy route, persisting every state along the way.
    pub async fn provision(&self, req: CreateWorkspaceRequest) -> Result<ProvisionOutcome> {
        validate_username(&req.user_id).map_err(OrchestratorError::Fleet)?;
        let _flight = self.begin_flight(&req.user_id)?;

        let mut ws = Workspace::new(req.user_id.clone(), req.agent.clone());
        self.store.save(&ws).await?;
        self.store
            .record_event(&ws.user_id, "provision", "requested")
            .await?;

        ws.transition(ProvisioningState::ContainerCreating);
        self.store.save(&ws).await?;

        let spec = ContainerSpec {
            user_id: req.user_id.clone(),
            cpus: req.cpus,
            memory_mb: req.memory_mb,
            gpu: req.gpu,
        };

        let created = match self.containers.create(&req.agent, &spec).await {
            Ok(resp) => resp,
            Err(e) => {
                // Container creation failed: no routes are attempted, and
                // the failure is the recorded terminal state.
                error!(user_id = %ws.user_id, error = %e, "Container creation failed");
                ws.transition(ProvisioningState::ContainerFailed);
                ws.error_message = Some(e.to_string());
                self.store.save(&ws).await?;
                self.store
                    .record_event(&ws.user_id, "provision", &format!("container_failed: {}", e))
                    .await?;

                return Ok(ProvisionOutcome {
                    workspace: ws,
                    container: StepOutcome::Failed(e.to_string()),
                    routes: StepOutcome::Skipped("container creation failed".to_string()),
                });
            }
        };

        ws.container_name = Some(created.name.clone());
        ws.container_id = Some(created.id.clone());
        ws.container_status = Some(created.status.clone());
        ws.transition(ProvisioningState::ContainerReady);

        let ports = match self.resolve_ports(&ws.user_id, created.port_map.as_ref()).await {
            Ok(ports) => ports,
            Err(e) => {
                // The container runs but cannot be routed; degrade rather
                // than orphan it silently.
                return self.degrade(ws, e.to_string()).await;
            }
        };
        ws.ports = ports;
        self.store.save(&ws).await?;
        self.store
            .record_event(&ws.user_id, "provision", "container_ready")
            .await?;

        ws.transition(ProvisioningState::RoutesConfiguring);
        self.store.save(&ws).await?;

        let targets: HashMap<String, String> = self
            .kinds
            .iter()
            .filter_map(|kind| {
                ws.ports
                    .get(&kind.name)
                    .map(|port| (kind.name.clone(), format!("{}:{}", req.agent.host, port)))
            })
            .collect();

        match self.routes.add_user_route(&ws.user_id, &targets).await {
            Ok(()) => {}
            // An existing route for this user is idempotent success.
            Err(FleetError::Conflict(msg)) => {
                info!(user_id = %ws.user_id, %msg, "Route already configured");
            }
            Err(e) => {
                return self.degrade(ws, e.to_string()).await;
            }
        }

        ws.route_status = RouteStatus::Active;
        ws.transition(ProvisioningState::Active);
        self.store.save(&ws).await?;
        self.store
            .record_event(&ws.user_id, "provision", "active")
            .await?;
        info!(user_id = %ws.user_id, agent = %ws.agent, "Workspace active");

        Ok(ProvisionOutcome {
            workspace: ws,
            container: StepOutcome::Succeeded,
            routes: StepOutcome::Succeeded,
        })
    }

    /// Tear down a workspace. Every step is attempted regardless of the
    /// others and reported individually; "not found" counts as success.
    pub async fn deprovision(&self, user_id: &str) -> Result<DeprovisionReport> {
        validate_username(user_id).map_err(OrchestratorError::Fleet)?;
        let _flight = self.begin_flight(user_id)?;

        let ws = self
            .store
            .load(user_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(user_id.to_string()))?;

        let routes = match self.routes.remove_user_route(user_id).await {
            Ok(()) => StepOutcome::Succeeded,
            Err(e) => {
                warn!(user_id, error = %e, "Route removal failed");
                StepOutcome::Failed(e.to_string())
            }
        };
        self.store
            .record_event(user_id, "deprovision", &format!("routes: {:?}", routes))
            .await
            .ok();

        let container = match &ws.container_name {
            None => StepOutcome::Skipped("no container recorded".to_string()),
            Some(name) => match self.containers.delete(&ws.agent, name, user_id).await {
                Ok(_) => StepOutcome::Succeeded,
                Err(FleetError::NotFound(msg)) => StepOutcome::Skipped(msg),
                Err(e) => {
                    warn!(user_id, error = %e, "Container deletion failed");
                    StepOutcome::Failed(e.to_string())
                }
            },
        };
        self.store
            .record_event(user_id, "deprovision", &format!("container: {:?}", container))
            .await
            .ok();

        let ports = {
            let allocator = self.allocator.lock().await;
            match allocator.deallocate(user_id) {
                Ok(true) => StepOutcome::Succeeded,
                Ok(false) => StepOutcome::Skipped("no port allocation".to_string()),
                Err(e) => StepOutcome::Failed(e.to_string()),
            }
        };

        let metadata = match self.store.delete(user_id).await {
            Ok(true) => StepOutcome::Succeeded,
            Ok(false) => StepOutcome::Skipped("no metadata record".to_string()),
            Err(e) => {
                warn!(user_id, error = %e, "Metadata release failed");
                StepOutcome::Failed(e.to_string())
            }
        };
        self.store
            .record_event(user_id, "deprovision", &format!("metadata: {:?}", metadata))
            .await
            .ok();

        let report = DeprovisionReport {
            user_id: user_id.to_string(),
            routes,
            container,
            ports,
            metadata,
        };
        info!(user_id, fully_succeeded = report.fully_succeeded(), "Deprovision complete");
        Ok(report)
    }

    /// Current fleet snapshot for operator visibility (informational; the
    /// orchestrator does not schedule from it).
    pub async fn fleet_status(&self) -> Vec<AgentStatus> {
        self.monitor.poll(&self.agents).await
    }

    pub async fn get_workspace(&self, user_id: &str) -> Result<Workspace> {
        self.store
            .load(user_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(user_id.to_string()))
    }

    pub fn monitor(&self) -> &FleetMonitor {
        &self.monitor
    }

    /// Resolve per-kind host ports: prefer the agent's published map; fall
    /// back to allocating a block and deriving kind offsets from its base.
    async fn resolve_ports(
        &self,
        user_id: &str,
        port_map: Option<&HashMap<String, u16>>,
    ) -> Result<HashMap<String, u16>> {
        if let Some(map) = port_map {
            if self.kinds.iter().all(|k| map.contains_key(&k.name)) {
                return Ok(self
                    .kinds
                    .iter()
                    .map(|k| (k.name.clone(), map[&k.name]))
                    .collect());
            }
            warn!(
                user_id,
                "Agent port map missing configured kinds, falling back to allocator"
            );
        }

        let allocator = self.allocator.lock().await;
        let range = allocator
            .allocate(user_id, None)
            .map_err(OrchestratorError::Fleet)?;

        Ok(self
            .kinds
            .iter()
            .map(|k| (k.name.clone(), range.start + k.port_offset))
            .collect())
    }

    /// Persist the deliberate partial-success state: container kept
    /// running, routing recorded as failed.
    async fn degrade(&self, mut ws: Workspace, reason: String) -> Result<ProvisionOutcome> {
        error!(user_id = %ws.user_id, %reason, "Routing failed, workspace degraded");
        ws.route_status = RouteStatus::Degraded;
        ws.transition(ProvisioningState::Degraded);
        ws.error_message = Some(reason.clone());
        self.store.save(&ws).await?;
        self.store
            .record_event(&ws.user_id, "provision", &format!("degraded: {}", reason))
            .await?;

        Ok(ProvisionOutcome {
            workspace: ws,
            container: StepOutcome::Succeeded,
            routes: StepOutcome::Failed(reason),
        })
    }

    /// Claim the per-user in-flight slot; provision and deprovision calls
    /// for the same user never overlap.
    fn begin_flight(&self, user_id: &str) -> Result<FlightGuard<'_>> {
        let mut set = self.in_flight.lock().expect("in-flight mutex poisoned");
        if !set.insert(user_id.to_string()) {
            return Err(OrchestratorError::InFlight(user_id.to_string()));
        }
        Ok(FlightGuard {
            set: &self.in_flight,
            user_id: user_id.to_string(),
        })
    }
}

struct FlightGuard<'a> {
    set: &'a StdMutex<HashSet<String>>,
    user_id: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.user_id);
        }
    }
}
