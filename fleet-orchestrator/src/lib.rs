//! Workspace provisioning orchestration.
//!
//! This crate is the saga coordinator: it drives workspace creation and
//! teardown as ordered steps across three external systems (the agent
//! container API, the port allocation table, and the proxy configuration)
//! with no transaction spanning them. Failures are made visible through
//! per-step outcomes and explicit intermediate workspace states rather
//! than retried or rolled back.

pub mod api;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod store;
pub mod workspace;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use api::ContainerApi;
pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result};
pub use orchestrator::ProvisioningOrchestrator;
pub use store::{FileMetadataStore, MetadataStore};
pub use workspace::{
    CreateWorkspaceRequest, DeprovisionReport, ProvisionOutcome, ProvisioningState, RouteStatus,
    StepOutcome, Workspace,
};
