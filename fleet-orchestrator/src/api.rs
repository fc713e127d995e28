//! Seam to the agent container API.
//!
//! The orchestrator only ever talks to the container runtime through this
//! trait; collaborators are constructor parameters, never ambient state.

use async_trait::async_trait;
use fleet_agent::{
    AgentAddr, AgentClient, ContainerSpec, ContainerStatusResponse, CreateContainerResponse,
    DeleteContainerResponse,
};
use fleet_core::Result;

#[async_trait]
pub trait ContainerApi: Send + Sync {
    async fn create(
        &self,
        agent: &AgentAddr,
        spec: &ContainerSpec,
    ) -> Result<CreateContainerResponse>;

    async fn delete(
        &self,
        agent: &AgentAddr,
        name: &str,
        user_id: &str,
    ) -> Result<DeleteContainerResponse>;

    async fn status(&self, agent: &AgentAddr, name: &str) -> Result<ContainerStatusResponse>;
}

#[async_trait]
impl ContainerApi for AgentClient {
    async fn create(
        &self,
        agent: &AgentAddr,
        spec: &ContainerSpec,
    ) -> Result<CreateContainerResponse> {
        self.create_container(agent, spec).await
    }

    async fn delete(
        &self,
        agent: &AgentAddr,
        name: &str,
        user_id: &str,
    ) -> Result<DeleteContainerResponse> {
        self.delete_container(agent, name, user_id).await
    }

    async fn status(&self, agent: &AgentAddr, name: &str) -> Result<ContainerStatusResponse> {
        self.container_status(agent, name).await
    }
}
