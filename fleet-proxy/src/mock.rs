//! Scriptable daemon stand-in for tests.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use fleet_core::{FleetError, Result};

use crate::daemon::ProxyDaemon;

/// A daemon whose check and reload outcomes are controlled by flags.
#[derive(Default)]
pub struct MockDaemon {
    pub fail_check: AtomicBool,
    pub fail_reload: AtomicBool,
    pub checks: AtomicUsize,
    pub reloads: AtomicUsize,
}

impl MockDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_check() -> Self {
        let daemon = Self::default();
        daemon.fail_check.store(true, Ordering::SeqCst);
        daemon
    }

    pub fn failing_reload() -> Self {
        let daemon = Self::default();
        daemon.fail_reload.store(true, Ordering::SeqCst);
        daemon
    }
}

#[async_trait]
impl ProxyDaemon for MockDaemon {
    async fn check_config(&self, _path: &Path) -> Result<()> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if self.fail_check.load(Ordering::SeqCst) {
            Err(FleetError::ConfigIntegrity(
                "forced syntax check failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    async fn reload(&self) -> Result<()> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reload.load(Ordering::SeqCst) {
            Err(FleetError::Command("forced reload failure".to_string()))
        } else {
            Ok(())
        }
    }
}
