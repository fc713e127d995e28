//! Wire types for the agent resource and container APIs.
//!
//! Field names match the agent's JSON contract exactly; everything here is
//! ephemeral and refreshed on each call.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Host utilization report from `GET /get_resources`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub cpu_count: u32,
    pub host_cpu_used: f64,
    pub total_memory: u64,
    pub host_memory_used: u64,
    pub total_disk: u64,
    pub used_disk: u64,
    pub uptime: String,
    pub running_containers: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_info: Option<String>,
}

/// One container as reported by `GET /get_containers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub name: String,
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub ports: HashMap<String, u16>,
}

/// Resource sizing for a container create request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub user_id: String,
    pub cpus: Option<f64>,
    pub memory_mb: Option<u64>,
    #[serde(default)]
    pub gpu: bool,
}

/// Response from `POST /containers/create`.
///
/// `port_map` is the agent's published kind-to-host-port mapping; when the
/// agent does not supply one the orchestrator falls back to its own port
/// allocator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContainerResponse {
    pub name: String,
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub port_map: Option<HashMap<String, u16>>,
}

/// Response from `POST /containers/{name}/delete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteContainerResponse {
    pub success: bool,
    pub container_removed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports_deallocated: Option<bool>,
}

/// Response from `GET /containers/{name}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerStatusResponse {
    pub status: String,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_snapshot_roundtrip() {
        let raw = r#"{
            "cpu_count": 16,
            "host_cpu_used": 42.5,
            "total_memory": 65536,
            "host_memory_used": 12000,
            "total_disk": 1000,
            "used_disk": 250,
            "uptime": "up 3 days",
            "running_containers": 4,
            "gpu_info": "1x A4000"
        }"#;

        let snap: ResourceSnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snap.cpu_count, 16);
        assert_eq!(snap.running_containers, 4);
        assert_eq!(snap.gpu_info.as_deref(), Some("1x A4000"));
    }

    #[test]
    fn test_create_response_without_port_map() {
        let raw = r#"{"name": "ws-alice", "id": "abc123", "status": "running"}"#;
        let resp: CreateContainerResponse = serde_json::from_str(raw).unwrap();
        assert!(resp.port_map.is_none());
    }
}
