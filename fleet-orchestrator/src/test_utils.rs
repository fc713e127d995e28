//! Scriptable collaborators for orchestrator tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use fleet_agent::{
    AgentAddr, ContainerSpec, ContainerStatusResponse, CreateContainerResponse,
    DeleteContainerResponse,
};
use fleet_core::{FleetError, Result as FleetResult};

use crate::api::ContainerApi;
use crate::store::MetadataStore;
use crate::workspace::Workspace;

/// Container API double whose failure modes are flag-controlled.
#[derive(Default)]
pub struct MockContainerApi {
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
    pub delete_not_found: AtomicBool,
    /// Port map returned from create; `None` forces the allocator fallback.
    pub port_map: Mutex<Option<HashMap<String, u16>>>,
    pub created: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
}

impl MockContainerApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port_map(map: HashMap<String, u16>) -> Self {
        let api = Self::default();
        *api.port_map.lock().unwrap() = Some(map);
        api
    }
}

#[async_trait]
impl ContainerApi for MockContainerApi {
    async fn create(
        &self,
        agent: &AgentAddr,
        spec: &ContainerSpec,
    ) -> FleetResult<CreateContainerResponse> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(FleetError::Network(format!(
                "container create on {} refused",
                agent
            )));
        }

        self.created.lock().unwrap().push(spec.user_id.clone());
        Ok(CreateContainerResponse {
            name: format!("ws-{}", spec.user_id),
            id: format!("cid-{}", spec.user_id),
            status: "running".to_string(),
            port_map: self.port_map.lock().unwrap().clone(),
        })
    }

    async fn delete(
        &self,
        agent: &AgentAddr,
        name: &str,
        _user_id: &str,
    ) -> FleetResult<DeleteContainerResponse> {
        if self.delete_not_found.load(Ordering::SeqCst) {
            return Err(FleetError::NotFound(format!("no such container {}", name)));
        }
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(FleetError::Network(format!(
                "container delete on {} refused",
                agent
            )));
        }

        self.deleted.lock().unwrap().push(name.to_string());
        Ok(DeleteContainerResponse {
            success: true,
            container_removed: true,
            ports_deallocated: Some(true),
        })
    }

    async fn status(
        &self,
        _agent: &AgentAddr,
        name: &str,
    ) -> FleetResult<ContainerStatusResponse> {
        Ok(ContainerStatusResponse {
            status: "running".to_string(),
            id: format!("cid-for-{}", name),
        })
    }
}

/// In-memory metadata store with a recorded event trail.
#[derive(Default)]
pub struct MemoryMetadataStore {
    pub records: Mutex<HashMap<String, Workspace>>,
    pub events: Mutex<Vec<(String, String, String)>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn save(&self, workspace: &Workspace) -> anyhow::Result<()> {
        self.records
            .lock()
            .unwrap()
            .insert(workspace.user_id.clone(), workspace.clone());
        Ok(())
    }

    async fn load(&self, user_id: &str) -> anyhow::Result<Option<Workspace>> {
        Ok(self.records.lock().unwrap().get(user_id).cloned())
    }

    async fn delete(&self, user_id: &str) -> anyhow::Result<bool> {
        Ok(self.records.lock().unwrap().remove(user_id).is_some())
    }

    async fn record_event(&self, user_id: &str, event: &str, detail: &str) -> anyhow::Result<()> {
        self.events.lock().unwrap().push((
            user_id.to_string(),
            event.to_string(),
            detail.to_string(),
        ));
        Ok(())
    }
}
