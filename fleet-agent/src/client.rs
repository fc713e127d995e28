//! HTTP client for a single compute agent.

use std::time::Duration;

use fleet_core::{FleetError, Result};
use reqwest::Client;
use tracing::debug;

use crate::addr::AgentAddr;
use crate::types::{
    ContainerSpec, ContainerStatusResponse, ContainerSummary, CreateContainerResponse,
    DeleteContainerResponse, ResourceSnapshot,
};

/// Lifecycle actions exposed by the container API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerAction {
    Start,
    Stop,
    Restart,
}

impl ContainerAction {
    fn as_str(&self) -> &'static str {
        match self {
            ContainerAction::Start => "start",
            ContainerAction::Stop => "stop",
            ContainerAction::Restart => "restart",
        }
    }
}

/// Client for the agent resource and container APIs.
///
/// Every request carries `timeout` as an upper bound; transport failures
/// and non-2xx statuses both surface as `FleetError::Network` so callers
/// can treat "unreachable" and "refused" uniformly.
#[derive(Debug, Clone)]
pub struct AgentClient {
    client: Client,
    timeout: Duration,
}

impl AgentClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch the agent's host utilization snapshot.
    pub async fn get_resources(&self, agent: &AgentAddr) -> Result<ResourceSnapshot> {
        let url = format!("{}/get_resources", agent.base_url());
        debug!(agent = %agent, "Fetching agent resources");
        self.get_json(&url).await
    }

    /// Fetch the agent's per-container inventory.
    pub async fn get_containers(&self, agent: &AgentAddr) -> Result<Vec<ContainerSummary>> {
        let url = format!("{}/get_containers", agent.base_url());
        debug!(agent = %agent, "Fetching agent container inventory");
        self.get_json(&url).await
    }

    /// Create a container sized by `spec` on the agent.
    pub async fn create_container(
        &self,
        agent: &AgentAddr,
        spec: &ContainerSpec,
    ) -> Result<CreateContainerResponse> {
        let url = format!("{}/containers/create", agent.base_url());
        debug!(agent = %agent, user_id = %spec.user_id, "Creating container");

        let response = self
            .client
            .post(&url)
            .json(spec)
            .send()
            .await
            .map_err(|e| FleetError::Network(format!("Container create on {} failed: {}", agent, e)))?;

        Self::json_or_network_error(response, agent, "container create").await
    }

    /// Start, stop, or restart a container by name.
    pub async fn container_action(
        &self,
        agent: &AgentAddr,
        name: &str,
        action: ContainerAction,
    ) -> Result<()> {
        let url = format!("{}/containers/{}/{}", agent.base_url(), name, action.as_str());
        debug!(agent = %agent, container = name, action = action.as_str(), "Container action");

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| FleetError::Network(format!("Container {} on {} failed: {}", action.as_str(), agent, e)))?;

        if !response.status().is_success() {
            return Err(FleetError::Network(format!(
                "Container {} on {} returned {}",
                action.as_str(),
                agent,
                response.status()
            )));
        }
        Ok(())
    }

    /// Stop and delete a container, releasing agent-side port bookkeeping.
    pub async fn delete_container(
        &self,
        agent: &AgentAddr,
        name: &str,
        user_id: &str,
    ) -> Result<DeleteContainerResponse> {
        let url = format!("{}/containers/{}/delete", agent.base_url(), name);
        debug!(agent = %agent, container = name, "Deleting container");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "user_id": user_id }))
            .send()
            .await
            .map_err(|e| FleetError::Network(format!("Container delete on {} failed: {}", agent, e)))?;

        Self::json_or_network_error(response, agent, "container delete").await
    }

    /// Query a container's runtime status.
    pub async fn container_status(
        &self,
        agent: &AgentAddr,
        name: &str,
    ) -> Result<ContainerStatusResponse> {
        let url = format!("{}/containers/{}/status", agent.base_url(), name);
        self.get_json(&url).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FleetError::Network(format!("Request to {} failed: {}", url, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FleetError::NotFound(format!("{} returned 404", url)));
        }
        if !response.status().is_success() {
            return Err(FleetError::Network(format!(
                "Request to {} returned {}",
                url,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| FleetError::Network(format!("Invalid response from {}: {}", url, e)))
    }

    async fn json_or_network_error<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        agent: &AgentAddr,
        what: &str,
    ) -> Result<T> {
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FleetError::NotFound(format!("{} on {}: no such container", what, agent)));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FleetError::Network(format!(
                "{} on {} returned {}: {}",
                what, agent, status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| FleetError::Network(format!("Invalid {} response from {}: {}", what, agent, e)))
    }
}
