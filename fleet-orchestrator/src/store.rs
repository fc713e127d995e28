//! The metadata persistence collaborator.
//!
//! The authoritative workspace record lives behind this trait; the
//! orchestrator is its only writer. The file-backed implementation keeps
//! one JSON document per user plus an append-only JSON-lines event log of
//! every provisioning and deprovisioning step.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::workspace::Workspace;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn save(&self, workspace: &Workspace) -> Result<()>;

    async fn load(&self, user_id: &str) -> Result<Option<Workspace>>;

    /// Remove the record; false when no record existed.
    async fn delete(&self, user_id: &str) -> Result<bool>;

    /// Append one audit event for a provisioning/deprovisioning step.
    async fn record_event(&self, user_id: &str, event: &str, detail: &str) -> Result<()>;
}

/// One JSON file per workspace under a state directory.
pub struct FileMetadataStore {
    dir: PathBuf,
    events_path: PathBuf,
}

impl FileMetadataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create metadata directory {:?}", dir))?;
        let events_path = dir.join("events.jsonl");
        Ok(Self { dir, events_path })
    }

    fn workspace_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("workspace-{}.json", user_id))
    }
}

#[async_trait]
impl MetadataStore for FileMetadataStore {
    async fn save(&self, workspace: &Workspace) -> Result<()> {
        let path = self.workspace_path(&workspace.user_id);
        let json = serde_json::to_string_pretty(workspace)?;

        // Temp-and-rename keeps readers from ever seeing a half-written record.
        let temp = path.with_extension(format!("json.tmp.{}", std::process::id()));
        fs::write(&temp, json)?;
        fs::rename(&temp, &path)
            .with_context(|| format!("Failed to persist workspace record {:?}", path))?;
        Ok(())
    }

    async fn load(&self, user_id: &str) -> Result<Option<Workspace>> {
        let path = self.workspace_path(user_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let workspace = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt workspace record {:?}", path))?;
        Ok(Some(workspace))
    }

    async fn delete(&self, user_id: &str) -> Result<bool> {
        let path = self.workspace_path(user_id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }

    async fn record_event(&self, user_id: &str, event: &str, detail: &str) -> Result<()> {
        let line = json!({
            "at": Utc::now(),
            "user_id": user_id,
            "event": event,
            "detail": detail,
        });

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_agent::AgentAddr;

    #[tokio::test]
    async fn test_save_load_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMetadataStore::new(dir.path()).unwrap();

        let ws = Workspace::new("alice".into(), AgentAddr::new("10.0.0.1", 8585));
        store.save(&ws).await.unwrap();

        let loaded = store.load("alice").await.unwrap().unwrap();
        assert_eq!(loaded.user_id, "alice");

        assert!(store.delete("alice").await.unwrap());
        assert!(store.load("alice").await.unwrap().is_none());
        assert!(!store.delete("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_events_append() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMetadataStore::new(dir.path()).unwrap();

        store.record_event("alice", "provision", "requested").await.unwrap();
        store.record_event("alice", "provision", "container_ready").await.unwrap();

        let log = fs::read_to_string(dir.path().join("events.jsonl")).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert!(log.contains("container_ready"));
    }
}
