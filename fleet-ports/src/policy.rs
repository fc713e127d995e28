//! Range policy: the bounds and default block size for allocations.
//!
//! The policy lives in its own JSON document next to the allocation table
//! so operators can widen the port window without touching allocations.

use std::fs;
use std::path::Path;

use fleet_core::{FleetError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RangePolicy {
    #[serde(default = "default_min_port")]
    pub min_port: u16,
    #[serde(default = "default_max_port")]
    pub max_port: u16,
    #[serde(default = "default_range_size")]
    pub default_range_size: u16,
}

fn default_min_port() -> u16 {
    20000
}

fn default_max_port() -> u16 {
    29999
}

fn default_range_size() -> u16 {
    10
}

impl Default for RangePolicy {
    fn default() -> Self {
        Self {
            min_port: default_min_port(),
            max_port: default_max_port(),
            default_range_size: default_range_size(),
        }
    }
}

impl RangePolicy {
    /// Load the policy document, seeding it with defaults if missing.
    pub fn load_or_seed(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let policy: RangePolicy = serde_json::from_str(&content)?;
            policy.validate()?;
            Ok(policy)
        } else {
            let policy = RangePolicy::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, serde_json::to_string_pretty(&policy)?)?;
            Ok(policy)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_port > self.max_port {
            return Err(FleetError::Validation(format!(
                "Range policy min_port ({}) exceeds max_port ({})",
                self.min_port, self.max_port
            )));
        }
        if self.default_range_size == 0 {
            return Err(FleetError::Validation(
                "Range policy default_range_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("port-policy.json");

        let policy = RangePolicy::load_or_seed(&path).unwrap();
        assert_eq!(policy.min_port, 20000);
        assert_eq!(policy.max_port, 29999);
        assert_eq!(policy.default_range_size, 10);
        assert!(path.exists());

        // Second load reads the seeded file back.
        let reloaded = RangePolicy::load_or_seed(&path).unwrap();
        assert_eq!(reloaded.min_port, policy.min_port);
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("port-policy.json");
        std::fs::write(&path, r#"{"min_port": 9000, "max_port": 8000}"#).unwrap();

        assert!(RangePolicy::load_or_seed(&path).is_err());
    }
}
