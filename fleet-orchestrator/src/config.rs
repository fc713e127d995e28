use std::path::PathBuf;
use std::time::Duration;

use fleet_agent::AgentAddr;
use fleet_monitor::MonitorConfig;
use fleet_proxy::{default_kinds, ServiceKind};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Fleet membership; agents are never removed from this list by polls.
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentAddr>,

    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default = "default_proxy_config_path")]
    pub proxy_config_path: PathBuf,

    #[serde(default = "default_nginx_bin")]
    pub nginx_bin: PathBuf,

    #[serde(default = "default_per_agent_timeout")]
    pub per_agent_timeout_secs: u64,

    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    #[serde(default = "default_snapshot_ttl")]
    pub snapshot_ttl_secs: u64,

    #[serde(default = "default_containers_ttl")]
    pub containers_ttl_secs: u64,

    /// Upper bound on container create/delete calls.
    #[serde(default = "default_container_timeout")]
    pub container_timeout_secs: u64,

    #[serde(default = "default_kinds")]
    pub service_kinds: Vec<ServiceKind>,
}

fn default_agents() -> Vec<AgentAddr> {
    std::env::var("FLEET_AGENTS")
        .map(|raw| {
            raw.split(',')
                .filter_map(|s| AgentAddr::parse(s.trim()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn default_state_dir() -> PathBuf {
    if let Ok(path) = std::env::var("FLEET_STATE_DIR") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".fleet")
}

fn default_proxy_config_path() -> PathBuf {
    std::env::var("FLEET_PROXY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/nginx/conf.d/fleet-routes.conf"))
}

fn default_nginx_bin() -> PathBuf {
    std::env::var("FLEET_NGINX_BIN")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("nginx"))
}

fn default_per_agent_timeout() -> u64 {
    env_u64("FLEET_AGENT_TIMEOUT_SECS", 5)
}

fn default_max_parallel() -> usize {
    std::env::var("FLEET_MAX_PARALLEL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10)
}

fn default_snapshot_ttl() -> u64 {
    env_u64("FLEET_SNAPSHOT_TTL_SECS", 10)
}

fn default_containers_ttl() -> u64 {
    env_u64("FLEET_CONTAINERS_TTL_SECS", 5)
}

fn default_container_timeout() -> u64 {
    env_u64("FLEET_CONTAINER_TIMEOUT_SECS", 30)
}

fn env_u64(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback)
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            agents: default_agents(),
            state_dir: default_state_dir(),
            proxy_config_path: default_proxy_config_path(),
            nginx_bin: default_nginx_bin(),
            per_agent_timeout_secs: default_per_agent_timeout(),
            max_parallel: default_max_parallel(),
            snapshot_ttl_secs: default_snapshot_ttl(),
            containers_ttl_secs: default_containers_ttl(),
            container_timeout_secs: default_container_timeout(),
            service_kinds: default_kinds(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            per_agent_timeout: Duration::from_secs(self.per_agent_timeout_secs),
            max_parallel: self.max_parallel,
            snapshot_ttl: Duration::from_secs(self.snapshot_ttl_secs),
            containers_ttl: Duration::from_secs(self.containers_ttl_secs),
        }
    }

    pub fn container_timeout(&self) -> Duration {
        Duration::from_secs(self.container_timeout_secs)
    }

    pub fn allocation_table_path(&self) -> PathBuf {
        self.state_dir.join("port-allocations.json")
    }

    pub fn range_policy_path(&self) -> PathBuf {
        self.state_dir.join("port-policy.json")
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.state_dir.join("workspaces")
    }
}
