use std::fmt;

use fleet_core::validation::validate_server_address;
use fleet_core::{FleetError, Result};
use serde::{Deserialize, Serialize};

/// Default port the agent APIs listen on.
pub const DEFAULT_AGENT_PORT: u16 = 8585;

/// Network address of a compute agent.
///
/// Fleet membership is a config-driven list of these; an agent missing from
/// a poll result is offline but never removed from the list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentAddr {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_AGENT_PORT
}

impl AgentAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host` or `host:port`, validating the host half.
    ///
    /// Bare IPv6 literals (more than one colon, no brackets) are treated as
    /// a host with the default port.
    pub fn parse(addr: &str) -> Result<Self> {
        let (host, port) = match addr.rsplit_once(':') {
            Some((host, port_str)) if !host.contains(':') || host.ends_with(']') => {
                let port = port_str.parse::<u16>().map_err(|_| {
                    FleetError::Validation(format!("Invalid agent port in '{}'", addr))
                })?;
                (host.to_string(), port)
            }
            _ => (addr.to_string(), DEFAULT_AGENT_PORT),
        };

        validate_server_address(&host)?;
        Ok(Self { host, port })
    }

    /// Base URL of the agent's HTTP APIs.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for AgentAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_port() {
        let addr = AgentAddr::parse("10.1.2.3:9000").unwrap();
        assert_eq!(addr.host, "10.1.2.3");
        assert_eq!(addr.port, 9000);
        assert_eq!(addr.to_string(), "10.1.2.3:9000");
    }

    #[test]
    fn test_parse_without_port() {
        let addr = AgentAddr::parse("agent-1.internal").unwrap();
        assert_eq!(addr.host, "agent-1.internal");
        assert_eq!(addr.port, DEFAULT_AGENT_PORT);
    }

    #[test]
    fn test_parse_rejects_bad_host() {
        assert!(AgentAddr::parse("bad host:9000").is_err());
        assert!(AgentAddr::parse("agent:notaport").is_err());
    }

    #[test]
    fn test_base_url() {
        let addr = AgentAddr::new("10.0.0.5", 8585);
        assert_eq!(addr.base_url(), "http://10.0.0.5:8585");
    }
}
