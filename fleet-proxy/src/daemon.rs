//! Interface to the live proxy daemon.
//!
//! The daemon is an external process; we only ever invoke its own syntax
//! checker against a candidate file and signal it to reload. The check
//! fails closed: a non-zero exit blocks the config swap.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use fleet_core::{FleetError, Result};
use tokio::process::Command;
use tracing::{debug, warn};

/// Syntax check and reload operations on the proxy daemon.
#[async_trait]
pub trait ProxyDaemon: Send + Sync {
    /// Run the daemon's own syntax check against `path`.
    async fn check_config(&self, path: &Path) -> Result<()>;

    /// Signal the daemon to reload its active configuration.
    async fn reload(&self) -> Result<()>;
}

/// The real nginx daemon, driven through its CLI.
///
/// Commands are configurable so deployments using a wrapper script or a
/// containerized nginx can substitute their own invocations.
pub struct NginxDaemon {
    nginx_bin: PathBuf,
    timeout: Duration,
}

impl NginxDaemon {
    pub fn new(nginx_bin: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            nginx_bin: nginx_bin.into(),
            timeout,
        }
    }

    async fn run(&self, args: &[&str], failure: fn(String) -> FleetError) -> Result<()> {
        debug!(bin = %self.nginx_bin.display(), ?args, "Invoking nginx");

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.nginx_bin).args(args).output(),
        )
        .await
        .map_err(|_| {
            FleetError::Network(format!(
                "nginx {} timed out after {:?}",
                args.join(" "),
                self.timeout
            ))
        })?
        .map_err(|e| FleetError::Command(format!("failed to spawn nginx: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(?args, %stderr, "nginx invocation failed");
            return Err(failure(format!(
                "nginx {} exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl Default for NginxDaemon {
    fn default() -> Self {
        Self::new("nginx", Duration::from_secs(10))
    }
}

#[async_trait]
impl ProxyDaemon for NginxDaemon {
    async fn check_config(&self, path: &Path) -> Result<()> {
        let path_str = path.to_string_lossy();
        self.run(&["-t", "-c", &path_str], FleetError::ConfigIntegrity)
            .await
    }

    async fn reload(&self) -> Result<()> {
        self.run(&["-s", "reload"], FleetError::Command).await
    }
}
