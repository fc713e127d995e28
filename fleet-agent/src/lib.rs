//! Typed client for the compute agent's HTTP APIs.
//!
//! Every remote agent exposes two small JSON APIs: a resource API reporting
//! host utilization, and a container API for creating and destroying user
//! containers. This crate owns the wire types for both and a `reqwest`
//! based client with a hard upper-bound timeout on every call.

pub mod addr;
pub mod client;
pub mod types;

pub use addr::AgentAddr;
pub use client::{AgentClient, ContainerAction};
pub use types::{
    ContainerSpec, ContainerStatusResponse, ContainerSummary, CreateContainerResponse,
    DeleteContainerResponse, ResourceSnapshot,
};
