//! Persisted allocation table with first-fit gap search.
//!
//! The table is one JSON document, read and rewritten whole on every
//! mutation. Cross-process safety comes from an advisory `fs2` lock plus
//! temp-file-and-rename replacement; in-process callers must still
//! serialize mutations themselves (single-writer discipline).

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use fleet_core::{FleetError, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::policy::RangePolicy;
use crate::range::PortRange;

/// One workspace's port block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub key: String,
    pub start_port: u16,
    pub end_port: u16,
    pub range_size: u16,
    pub allocated_at: DateTime<Utc>,
}

impl Allocation {
    pub fn range(&self) -> PortRange {
        PortRange {
            start: self.start_port,
            end: self.end_port,
        }
    }
}

/// The whole-document state on disk, ordered by `start_port`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AllocationTable {
    allocations: Vec<Allocation>,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

/// Port range allocator over a persisted allocation table.
///
/// Invariant: the `[start_port, end_port]` intervals of any two entries are
/// disjoint. The first-fit search below is the only code path that adds
/// entries, and it only ever picks a gap.
#[derive(Debug)]
pub struct PortAllocator {
    table_path: PathBuf,
    policy: RangePolicy,
}

impl PortAllocator {
    /// Open the allocator, seeding policy and table documents if missing.
    pub fn new(table_path: impl Into<PathBuf>, policy_path: &Path) -> Result<Self> {
        let table_path = table_path.into();
        let policy = RangePolicy::load_or_seed(policy_path)?;

        if let Some(parent) = table_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !table_path.exists() {
            let table = AllocationTable::default();
            fs::write(&table_path, serde_json::to_string_pretty(&table)?)?;
        }

        Ok(Self { table_path, policy })
    }

    /// Open with an explicit policy, bypassing the policy document.
    pub fn with_policy(table_path: impl Into<PathBuf>, policy: RangePolicy) -> Result<Self> {
        policy.validate()?;
        let table_path = table_path.into();
        if let Some(parent) = table_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !table_path.exists() {
            let table = AllocationTable::default();
            fs::write(&table_path, serde_json::to_string_pretty(&table)?)?;
        }
        Ok(Self { table_path, policy })
    }

    pub fn policy(&self) -> &RangePolicy {
        &self.policy
    }

    /// Allocate a contiguous range of `size` ports (policy default when
    /// `None`) for `key`.
    ///
    /// An existing allocation for `key` is returned unchanged: a repeat
    /// call is an idempotent read-back, never a re-allocation. Otherwise
    /// the lowest gap of the requested size within the policy window is
    /// claimed, or `NoRangeAvailable` if none exists.
    pub fn allocate(&self, key: &str, size: Option<u16>) -> Result<PortRange> {
        let size = size.unwrap_or(self.policy.default_range_size);
        if size == 0 {
            return Err(FleetError::Validation(
                "Requested range size must be at least 1".to_string(),
            ));
        }

        let policy = self.policy;
        let key = key.to_string();
        self.atomic_update(move |table| {
            if let Some(existing) = table.allocations.iter().find(|a| a.key == key) {
                info!(
                    key = %key,
                    range = %existing.range(),
                    "Allocation already exists, returning existing range"
                );
                return Ok((existing.range(), false));
            }

            let range = find_lowest_gap(&table.allocations, &policy, size)?;
            debug!(key = %key, range = %range, "Claiming port range");

            table.allocations.push(Allocation {
                key,
                start_port: range.start,
                end_port: range.end,
                range_size: size,
                allocated_at: Utc::now(),
            });
            table.allocations.sort_by_key(|a| a.start_port);

            Ok((range, true))
        })
    }

    /// Remove `key`'s allocation. Returns false if it was never allocated.
    pub fn deallocate(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.atomic_update(move |table| {
            let before = table.allocations.len();
            table.allocations.retain(|a| a.key != key);
            let removed = table.allocations.len() < before;
            if removed {
                info!(key = %key, "Released port range");
            }
            Ok((removed, removed))
        })
    }

    /// Look up `key`'s allocation without mutating anything.
    pub fn get(&self, key: &str) -> Result<Option<PortRange>> {
        let table = self.read_table()?;
        Ok(table
            .allocations
            .iter()
            .find(|a| a.key == key)
            .map(Allocation::range))
    }

    /// All live allocations, ordered by start port.
    pub fn list(&self) -> Result<Vec<Allocation>> {
        let table = self.read_table()?;
        Ok(table.allocations)
    }

    fn read_table(&self) -> Result<AllocationTable> {
        let content = fs::read_to_string(&self.table_path)?;
        if content.trim().is_empty() {
            return Ok(AllocationTable::default());
        }
        let mut table: AllocationTable = serde_json::from_str(&content)?;
        table.allocations.sort_by_key(|a| a.start_port);
        Ok(table)
    }

    /// Whole-document read-modify-write under an exclusive advisory lock.
    ///
    /// The update closure returns `(value, mutated)`; the document is only
    /// rewritten (with a fresh `last_updated`) when `mutated` is true.
    fn atomic_update<T, F>(&self, update_fn: F) -> Result<T>
    where
        F: FnOnce(&mut AllocationTable) -> Result<(T, bool)>,
    {
        const RETRY_DELAY: Duration = Duration::from_millis(10);
        const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.table_path)?;

        let lock_start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) => {
                    if lock_start.elapsed() > LOCK_TIMEOUT {
                        return Err(FleetError::Internal(format!(
                            "Timeout waiting for exclusive lock on allocation table: {}",
                            e
                        )));
                    }
                    std::thread::sleep(RETRY_DELAY);
                }
            }
        }

        let _guard = scopeguard::guard((), |_| {
            let _ = fs2::FileExt::unlock(&file);
        });

        let mut table = self.read_table()?;
        let (value, mutated) = update_fn(&mut table)?;

        if mutated {
            table.last_updated = Some(Utc::now());
            let json = serde_json::to_string_pretty(&table)?;
            replace_document(&self.table_path, &json)?;
        }

        Ok(value)
    }
}

/// Replace `path` with `json` via a temp file and rename; the temp file
/// never outlives a failed swap.
fn replace_document(path: &Path, json: &str) -> Result<()> {
    let temp_path = path.with_extension(format!("json.tmp.{}", std::process::id()));
    fs::write(&temp_path, json)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

/// First-fit, lowest-address gap search.
///
/// Walks the start-sorted allocation list advancing a candidate cursor;
/// the first gap that fits wins. O(n log n) including the caller's sort.
fn find_lowest_gap(
    allocations: &[Allocation],
    policy: &RangePolicy,
    size: u16,
) -> Result<PortRange> {
    let needed = size as u32;
    let mut candidate = policy.min_port as u32;

    for alloc in allocations {
        if candidate + needed - 1 < alloc.start_port as u32 {
            break;
        }
        candidate = candidate.max(alloc.end_port as u32 + 1);
    }

    let end = candidate + needed - 1;
    if end > policy.max_port as u32 {
        return Err(FleetError::NoRangeAvailable(format!(
            "no gap of {} ports available below {}",
            size, policy.max_port
        )));
    }

    PortRange::new(candidate as u16, end as u16)
}
