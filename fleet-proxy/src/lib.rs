//! Reverse-proxy route management.
//!
//! The proxy's text configuration file is the sole persistent store for
//! per-user routing: one upstream block per service kind plus one dispatch
//! line per kind inside that kind's map section. Mutations go through a
//! validate-then-swap pipeline so a broken configuration never reaches the
//! live daemon, and a pre-mutation backup is always kept.

pub mod daemon;
pub mod kinds;
pub mod manager;
pub mod render;

#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;

pub use daemon::{NginxDaemon, ProxyDaemon};
pub use kinds::{default_kinds, ServiceKind};
pub use manager::RouteManager;
