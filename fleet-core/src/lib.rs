//! Foundation types for the workspace fleet orchestrator.
//!
//! This crate holds the error taxonomy and the input validation helpers
//! shared by every other crate in the workspace. It has no opinion about
//! agents, ports, or proxies; it only knows what a well-formed input and a
//! classified failure look like.

pub mod error;
pub mod validation;

pub use error::{FleetError, Result};
