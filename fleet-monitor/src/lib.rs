//! Fleet liveness and capacity monitoring.
//!
//! The monitor polls a config-driven set of agents concurrently and reports
//! one snapshot per agent that answered in time. Absence from the result is
//! the offline signal; an unreachable agent is never an error for the
//! caller and never removed from the membership list.

pub mod cache;
pub mod monitor;

pub use cache::SnapshotCache;
pub use monitor::{AgentStatus, FleetMonitor, MonitorConfig};
