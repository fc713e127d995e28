//! Service kinds: the backend services each workspace exposes.
//!
//! The kind set is configuration, not a hard-coded pair. Each kind owns a
//! distinct named anchor comment in the shared dispatch block, so inserting
//! a dispatch line never depends on the order in which sections appear.

use serde::{Deserialize, Serialize};

/// One backend service kind exposed through the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceKind {
    /// Kind name; doubles as the key into a workspace's port map.
    pub name: String,
    /// Offset from a workspace's allocated base port when the agent does
    /// not publish a port map.
    pub port_offset: u16,
}

impl ServiceKind {
    pub fn new(name: impl Into<String>, port_offset: u16) -> Self {
        Self {
            name: name.into(),
            port_offset,
        }
    }

    /// The sentinel comment marking where this kind's dispatch lines go.
    pub fn anchor(&self) -> String {
        format!("# fleet:{}-routes", self.name)
    }

    /// Upstream block name for a user's backend of this kind.
    pub fn upstream_name(&self, username: &str) -> String {
        format!("{}_{}", self.name, username)
    }
}

/// The standard two-kind set: an IDE backend and a notebook backend.
pub fn default_kinds() -> Vec<ServiceKind> {
    vec![
        ServiceKind::new("code", 0),
        ServiceKind::new("notebook", 8),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_is_distinct_per_kind() {
        let kinds = default_kinds();
        assert_eq!(kinds[0].anchor(), "# fleet:code-routes");
        assert_eq!(kinds[1].anchor(), "# fleet:notebook-routes");
        assert_ne!(kinds[0].anchor(), kinds[1].anchor());
    }

    #[test]
    fn test_upstream_name() {
        let kind = ServiceKind::new("code", 0);
        assert_eq!(kind.upstream_name("alice"), "code_alice");
    }
}
