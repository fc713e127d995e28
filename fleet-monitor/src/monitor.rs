//! Concurrent fleet polling with bounded parallelism.

use std::sync::Arc;
use std::time::Duration;

use fleet_agent::{AgentAddr, AgentClient, ContainerSummary, ResourceSnapshot};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use crate::cache::SnapshotCache;

/// Tuning knobs for the monitor; all have serviceable defaults.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Timeout for each individual agent request.
    pub per_agent_timeout: Duration,
    /// Worker pool bound; the effective bound never exceeds the agent count.
    pub max_parallel: usize,
    /// Freshness window for fleet-wide resource snapshots.
    pub snapshot_ttl: Duration,
    /// Freshness window for per-agent container inventories.
    pub containers_ttl: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            per_agent_timeout: Duration::from_secs(5),
            max_parallel: 10,
            snapshot_ttl: Duration::from_secs(10),
            containers_ttl: Duration::from_secs(5),
        }
    }
}

/// One live agent's poll result.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub addr: AgentAddr,
    pub resources: ResourceSnapshot,
}

/// Polls the agent fleet and caches the results.
///
/// Poll results are informational: the orchestrator uses them for operator
/// visibility, not for authoritative scheduling decisions.
pub struct FleetMonitor {
    client: AgentClient,
    config: MonitorConfig,
    snapshot_cache: SnapshotCache<Vec<AgentAddr>, Vec<AgentStatus>>,
    containers_cache: SnapshotCache<AgentAddr, Vec<ContainerSummary>>,
}

impl FleetMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        let client = AgentClient::new(config.per_agent_timeout);
        let snapshot_cache = SnapshotCache::new(config.snapshot_ttl);
        let containers_cache = SnapshotCache::new(config.containers_ttl);
        Self {
            client,
            config,
            snapshot_cache,
            containers_cache,
        }
    }

    /// Poll every agent in `agents`, returning a snapshot per live agent.
    ///
    /// Requests run through a worker pool of at most `max_parallel` permits
    /// and each carries its own timeout. The aggregate call is bounded by
    /// twice the per-agent timeout; whatever has been collected when that
    /// ceiling hits is returned (and not cached, since agents aborted by
    /// the ceiling are merely slow, not known offline). Offline agents are
    /// absent from the result, never an error. A fresh cached result for
    /// the identical agent set is returned without touching the network.
    pub async fn poll(&self, agents: &[AgentAddr]) -> Vec<AgentStatus> {
        if agents.is_empty() {
            return Vec::new();
        }

        let mut key: Vec<AgentAddr> = agents.to_vec();
        key.sort();
        key.dedup();

        if let Some(cached) = self.snapshot_cache.get(&key) {
            debug!(agents = key.len(), "Returning cached fleet snapshot");
            return cached;
        }

        let parallel = self.config.max_parallel.clamp(1, key.len());
        let semaphore = Arc::new(Semaphore::new(parallel));
        let deadline = Instant::now() + 2 * self.config.per_agent_timeout;

        let mut tasks: JoinSet<Option<AgentStatus>> = JoinSet::new();
        for addr in key.clone() {
            let client = self.client.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire().await.ok()?;
                match client.get_resources(&addr).await {
                    Ok(resources) => Some(AgentStatus { addr, resources }),
                    Err(e) => {
                        debug!(agent = %addr, error = %e, "Agent offline or unresponsive");
                        None
                    }
                }
            });
        }

        let mut statuses = Vec::new();
        let mut ceiling_hit = false;
        while !tasks.is_empty() {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(Some(status)))) => statuses.push(status),
                Ok(Some(_)) => {} // offline agent or cancelled task
                Ok(None) => break,
                Err(_) => {
                    debug!("Fleet poll ceiling reached, returning partial results");
                    ceiling_hit = true;
                    tasks.abort_all();
                    break;
                }
            }
        }

        statuses.sort_by(|a, b| a.addr.cmp(&b.addr));
        // A ceiling-limited result is incomplete: caching it would report
        // every aborted agent as offline for the whole TTL.
        if !ceiling_hit {
            self.snapshot_cache.put(key, statuses.clone());
        }
        statuses
    }

    /// Fetch one agent's container inventory, with its own shorter cache.
    ///
    /// Unlike `poll`, an unreachable agent here is an error: the caller
    /// asked about a specific server and deserves to know it is offline.
    pub async fn poll_containers(
        &self,
        agent: &AgentAddr,
    ) -> fleet_core::Result<Vec<ContainerSummary>> {
        if let Some(cached) = self.containers_cache.get(agent) {
            debug!(agent = %agent, "Returning cached container inventory");
            return Ok(cached);
        }

        let containers = self.client.get_containers(agent).await?;
        self.containers_cache.put(agent.clone(), containers.clone());
        Ok(containers)
    }

    /// Drop both caches so the next query polls the fleet again.
    pub fn invalidate_caches(&self) {
        self.snapshot_cache.invalidate();
        self.containers_cache.invalidate();
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const RESOURCES_BODY: &str = r#"{
        "cpu_count": 8,
        "host_cpu_used": 12.5,
        "total_memory": 32768,
        "host_memory_used": 8192,
        "total_disk": 500,
        "used_disk": 100,
        "uptime": "up 1 day",
        "running_containers": 2
    }"#;

    /// Minimal agent stub answering `GET /get_resources` with a fixed body.
    async fn spawn_agent_stub() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{}",
                        RESOURCES_BODY.len(),
                        RESOURCES_BODY
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });

        addr
    }

    /// A listener that accepts connections and never responds.
    async fn spawn_silent_stub() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                held.push(socket);
            }
        });
        addr
    }

    fn test_config() -> MonitorConfig {
        MonitorConfig {
            per_agent_timeout: Duration::from_millis(500),
            max_parallel: 4,
            snapshot_ttl: Duration::from_secs(10),
            containers_ttl: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_poll_collects_live_agents() {
        let a = spawn_agent_stub().await;
        let b = spawn_agent_stub().await;
        let monitor = FleetMonitor::new(test_config());

        let agents = vec![
            AgentAddr::new("127.0.0.1", a.port()),
            AgentAddr::new("127.0.0.1", b.port()),
        ];

        let statuses = monitor.poll(&agents).await;
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].resources.cpu_count, 8);
    }

    #[tokio::test]
    async fn test_poll_drops_silent_agent_within_ceiling() {
        let live_a = spawn_agent_stub().await;
        let live_b = spawn_agent_stub().await;
        let silent = spawn_silent_stub().await;
        let monitor = FleetMonitor::new(test_config());

        let agents = vec![
            AgentAddr::new("127.0.0.1", live_a.port()),
            AgentAddr::new("127.0.0.1", live_b.port()),
            AgentAddr::new("127.0.0.1", silent.port()),
        ];

        let started = std::time::Instant::now();
        let statuses = monitor.poll(&agents).await;
        let elapsed = started.elapsed();

        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|s| s.addr.port != silent.port()));
        // Ceiling is 2x the per-agent timeout plus scheduling slack.
        assert!(elapsed < Duration::from_secs(3), "poll took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_poll_serves_from_cache_for_same_set() {
        let a = spawn_agent_stub().await;
        let monitor = FleetMonitor::new(test_config());
        let agents = vec![AgentAddr::new("127.0.0.1", a.port())];

        let first = monitor.poll(&agents).await;
        assert_eq!(first.len(), 1);

        // Reversed-order, duplicated input still hits the same cache key.
        let doubled = vec![agents[0].clone(), agents[0].clone()];
        let second = monitor.poll(&doubled).await;
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_poll_empty_fleet() {
        let monitor = FleetMonitor::new(test_config());
        assert!(monitor.poll(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_ceiling_limited_poll_is_not_cached() {
        let s1 = spawn_silent_stub().await;
        let s2 = spawn_silent_stub().await;
        let s3 = spawn_silent_stub().await;
        let mut config = test_config();
        config.max_parallel = 1;
        let monitor = FleetMonitor::new(config);

        let agents = vec![
            AgentAddr::new("127.0.0.1", s1.port()),
            AgentAddr::new("127.0.0.1", s2.port()),
            AgentAddr::new("127.0.0.1", s3.port()),
        ];

        // Three sequential timeouts cannot all finish inside the 2x
        // ceiling, so this poll is aborted with a partial result.
        monitor.poll(&agents).await;

        // The partial result must not be served from cache: a repeat poll
        // goes back to the network and pays the ceiling again.
        let started = std::time::Instant::now();
        monitor.poll(&agents).await;
        assert!(
            started.elapsed() >= Duration::from_millis(400),
            "repeat poll returned a ceiling-limited result from cache"
        );
    }
}
