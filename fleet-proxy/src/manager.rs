//! Validated mutation of the proxy's routing configuration.
//!
//! Mutation pipeline: render the candidate text, write it to a temp file,
//! run the daemon's own syntax check against the temp file, copy the live
//! file to a backup, atomically rename the temp over the live file, then
//! signal a reload. A failed check never touches the live file; a failed
//! reload is reported even though the swap already happened.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fleet_core::validation::{validate_host_port, validate_username};
use fleet_core::{FleetError, Result};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::daemon::ProxyDaemon;
use crate::kinds::ServiceKind;
use crate::render::{
    dispatch_line, scaffold_config, upstream_block, user_label, UpstreamParams,
};

/// Manages per-user routes in a single configuration file.
///
/// The manager serializes its own mutations per config path through an
/// internal mutex; callers must additionally avoid overlapping add/remove
/// calls for the same username (the orchestrator serializes per-user).
pub struct RouteManager {
    config_path: PathBuf,
    backup_path: PathBuf,
    kinds: Vec<ServiceKind>,
    params: UpstreamParams,
    daemon: Arc<dyn ProxyDaemon>,
    write_lock: Mutex<()>,
}

impl RouteManager {
    /// Open a manager over `config_path`, seeding a scaffold configuration
    /// (dispatch maps with per-kind anchors) when the file does not exist.
    pub fn new(
        config_path: impl Into<PathBuf>,
        kinds: Vec<ServiceKind>,
        daemon: Arc<dyn ProxyDaemon>,
    ) -> Result<Self> {
        Self::with_params(config_path, kinds, daemon, UpstreamParams::default())
    }

    pub fn with_params(
        config_path: impl Into<PathBuf>,
        kinds: Vec<ServiceKind>,
        daemon: Arc<dyn ProxyDaemon>,
        params: UpstreamParams,
    ) -> Result<Self> {
        let config_path = config_path.into();
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !config_path.exists() {
            fs::write(&config_path, scaffold_config(&kinds))?;
        }

        let backup_path = config_path.with_extension("conf.backup");
        Ok(Self {
            config_path,
            backup_path,
            kinds,
            params,
            daemon,
            write_lock: Mutex::new(()),
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Add one upstream block and one dispatch line per service kind for
    /// `username`, routing each kind to its `host:port` target.
    ///
    /// Rejects before any mutation on a malformed username, a missing or
    /// malformed target, or an already-routed user (`Conflict`).
    pub async fn add_user_route(
        &self,
        username: &str,
        targets: &HashMap<String, String>,
    ) -> Result<()> {
        validate_username(username)?;

        let mut resolved: Vec<(&ServiceKind, String)> = Vec::with_capacity(self.kinds.len());
        for kind in &self.kinds {
            let target = targets.get(&kind.name).ok_or_else(|| {
                FleetError::Validation(format!(
                    "No target supplied for service kind '{}'",
                    kind.name
                ))
            })?;
            let (host, port) = validate_host_port(target)?;
            resolved.push((kind, format!("{}:{}", host, port)));
        }

        let _guard = self.write_lock.lock().await;

        let current = fs::read_to_string(&self.config_path)?;
        if self.user_exists_in(&current, username) {
            return Err(FleetError::Conflict(format!(
                "User '{}' already has routes configured",
                username
            )));
        }

        let mut candidate = current.clone();
        if !candidate.ends_with('\n') {
            candidate.push('\n');
        }
        candidate.push('\n');
        candidate.push_str(&user_label(username));
        candidate.push('\n');
        for (kind, target) in &resolved {
            candidate.push_str(&upstream_block(kind, username, target, self.params));
        }

        for kind in &self.kinds {
            candidate = insert_after_anchor(
                &candidate,
                &kind.anchor(),
                &dispatch_line(kind, username),
            )?;
        }

        self.check_swap_reload(&candidate).await?;
        info!(username, "Added proxy routes");
        Ok(())
    }

    /// Remove `username`'s upstream blocks and dispatch lines.
    ///
    /// A user with no routes is an idempotent no-op success.
    pub async fn remove_user_route(&self, username: &str) -> Result<()> {
        validate_username(username)?;

        let _guard = self.write_lock.lock().await;

        let current = fs::read_to_string(&self.config_path)?;
        if !self.user_exists_in(&current, username) {
            info!(username, "No routes to remove");
            return Ok(());
        }

        let candidate = strip_user(&current, &self.kinds, username);
        self.check_swap_reload(&candidate).await?;
        info!(username, "Removed proxy routes");
        Ok(())
    }

    /// True when any service kind has an upstream block for `username`.
    pub fn user_exists(&self, username: &str) -> Result<bool> {
        let text = fs::read_to_string(&self.config_path)?;
        Ok(self.user_exists_in(&text, username))
    }

    fn user_exists_in(&self, text: &str, username: &str) -> bool {
        self.kinds.iter().any(|kind| {
            text.contains(&format!("upstream {} {{", kind.upstream_name(username)))
        })
    }

    /// Validate the candidate against the daemon, back up the live file,
    /// swap atomically, then reload.
    async fn check_swap_reload(&self, candidate: &str) -> Result<()> {
        let temp_path = self
            .config_path
            .with_extension(format!("conf.tmp.{}", std::process::id()));
        fs::write(&temp_path, candidate)?;

        if let Err(e) = self.daemon.check_config(&temp_path).await {
            let _ = fs::remove_file(&temp_path);
            warn!(error = %e, "Candidate configuration failed syntax check, live file untouched");
            return Err(e);
        }

        fs::copy(&self.config_path, &self.backup_path)?;
        fs::rename(&temp_path, &self.config_path)?;

        if let Err(e) = self.daemon.reload().await {
            // The swap already happened; the backup is kept and the failure
            // is surfaced rather than silently ignored.
            warn!(error = %e, backup = %self.backup_path.display(), "Proxy reload failed after config swap");
            return Err(e);
        }

        Ok(())
    }
}

/// Insert `line` directly after the line matching `anchor`.
///
/// The anchor is a per-kind sentinel; a configuration missing it is
/// structurally broken and refused before any file is written.
fn insert_after_anchor(text: &str, anchor: &str, line: &str) -> Result<String> {
    let ends_with_newline = text.ends_with('\n');
    let mut out: Vec<&str> = Vec::new();
    let mut inserted = false;

    for current in text.lines() {
        out.push(current);
        if !inserted && current.trim() == anchor {
            out.push(line);
            inserted = true;
        }
    }

    if !inserted {
        return Err(FleetError::ConfigIntegrity(format!(
            "Dispatch anchor '{}' not found in configuration",
            anchor
        )));
    }

    let mut result = out.join("\n");
    if ends_with_newline {
        result.push('\n');
    }
    Ok(result)
}

/// Delete a user's upstream blocks (with their label comment) and dispatch
/// lines, leaving everything else byte-identical.
fn strip_user(text: &str, kinds: &[ServiceKind], username: &str) -> String {
    let label = user_label(username);
    let headers: Vec<String> = kinds
        .iter()
        .map(|k| format!("upstream {} {{", k.upstream_name(username)))
        .collect();
    let dispatch: Vec<String> = kinds
        .iter()
        .map(|k| dispatch_line(k, username).trim().to_string())
        .collect();

    let ends_with_newline = text.ends_with('\n');
    let mut out: Vec<&str> = Vec::new();
    let mut depth: usize = 0;
    let mut skipping = false;

    for line in text.lines() {
        if skipping {
            depth += line.matches('{').count();
            depth = depth.saturating_sub(line.matches('}').count());
            if depth == 0 {
                skipping = false;
            }
            continue;
        }

        let trimmed = line.trim();

        if headers.iter().any(|h| trimmed == h) {
            // Strip the label comment (and its separating blank line) that
            // precedes the first of this user's blocks.
            if out.last().is_some_and(|l| l.trim() == label) {
                out.pop();
                if out.last().is_some_and(|l| l.trim().is_empty()) {
                    out.pop();
                }
            }
            depth = 1;
            skipping = true;
            continue;
        }

        if dispatch.iter().any(|d| trimmed == d) {
            continue;
        }

        out.push(line);
    }

    let mut result = out.join("\n");
    if ends_with_newline && !result.is_empty() {
        result.push('\n');
    }
    result
}
