//! Size ledger: quota and tracked-size accounting per watch root.
//!
//! `tracked_bytes` is always an estimate. Filesystem events can be missed,
//! coalesced, or arrive for paths outside any inventory (directory renames),
//! so the ledger never does incremental arithmetic: every update is an
//! authoritative recursive walk through the [`SizeWalk`] collaborator, and
//! stale walk results are discarded via per-entry generation counters.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::event::{FileRecord, bytes_to_gb};
use crate::walk::SizeWalk;

/// Read-only view of one ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderStatus {
    /// Zero-based registration order; stable for the folder's lifetime and
    /// never reassigned when other folders are removed.
    pub index: usize,

    /// Canonical path of the watch root.
    pub path: PathBuf,

    /// Configured maximum size in bytes.
    pub quota_bytes: u64,

    /// Current size estimate in bytes.
    pub tracked_bytes: u64,
}

impl FolderStatus {
    /// Whether the tracked size exceeds the quota.
    pub fn is_over_quota(&self) -> bool {
        self.tracked_bytes > self.quota_bytes
    }

    /// Bytes that must be freed to get back under quota.
    pub fn overage(&self) -> u64 {
        self.tracked_bytes.saturating_sub(self.quota_bytes)
    }

    /// Tracked size in display gigabytes (two decimals).
    pub fn size_gb(&self) -> f64 {
        bytes_to_gb(self.tracked_bytes)
    }

    /// Quota in display gigabytes (two decimals).
    pub fn max_size_gb(&self) -> f64 {
        bytes_to_gb(self.quota_bytes)
    }
}

/// Outcome of an authoritative recompute.
#[derive(Debug, Clone, PartialEq)]
pub enum RecomputeOutcome {
    /// The walk result was applied and this is the fresh status.
    Applied(FolderStatus),

    /// A newer walk finished first; this result was discarded.
    Stale,

    /// The folder was unregistered while the walk ran; no-op.
    Unregistered,
}

#[derive(Debug)]
struct FolderEntry {
    index: usize,
    quota_bytes: u64,
    tracked_bytes: u64,
    /// Generation handed to the most recently started walk.
    started_gen: u64,
    /// Generation of the most recently applied walk result.
    applied_gen: u64,
}

impl FolderEntry {
    fn status(&self, root: &Path) -> FolderStatus {
        FolderStatus {
            index: self.index,
            path: root.to_path_buf(),
            quota_bytes: self.quota_bytes,
            tracked_bytes: self.tracked_bytes,
        }
    }
}

#[derive(Default)]
struct LedgerState {
    entries: HashMap<PathBuf, FolderEntry>,
    next_index: usize,
}

/// Owns the per-root (quota, tracked size) accounting.
pub struct SizeLedger {
    state: RwLock<LedgerState>,
    walk: Arc<dyn SizeWalk>,
}

impl SizeLedger {
    /// Create a ledger backed by the given size-walk collaborator.
    pub fn new(walk: Arc<dyn SizeWalk>) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            walk,
        }
    }

    /// Register a root or update its quota in place.
    ///
    /// Re-registration keeps `tracked_bytes` and the registration index
    /// untouched. Returns the resulting status and whether the root was new.
    pub async fn register(&self, root: &Path, quota_bytes: u64) -> (FolderStatus, bool) {
        let mut state = self.state.write().await;

        if let Some(entry) = state.entries.get_mut(root) {
            entry.quota_bytes = quota_bytes;
            return (entry.status(root), false);
        }

        let index = state.next_index;
        state.next_index += 1;

        let entry = FolderEntry {
            index,
            quota_bytes,
            tracked_bytes: 0,
            started_gen: 0,
            applied_gen: 0,
        };
        let status = entry.status(root);
        state.entries.insert(root.to_path_buf(), entry);

        (status, true)
    }

    /// Drop a root from the ledger. Returns whether it was registered.
    ///
    /// Any walk still in flight for the root becomes a no-op when it tries
    /// to apply its result.
    pub async fn unregister(&self, root: &Path) -> bool {
        self.state.write().await.entries.remove(root).is_some()
    }

    /// Run the size-walk collaborator over `root` and overwrite
    /// `tracked_bytes` with the result.
    ///
    /// The walk runs without holding the ledger lock, so several recomputes
    /// for the same root may overlap; only the newest generation to complete
    /// is applied, and an older walk finishing late is reported as
    /// [`RecomputeOutcome::Stale`]. Walk failures propagate and leave the
    /// previous tracked value in place.
    pub async fn recompute_authoritative(&self, root: &Path) -> Result<RecomputeOutcome> {
        let generation = {
            let mut state = self.state.write().await;
            match state.entries.get_mut(root) {
                Some(entry) => {
                    entry.started_gen += 1;
                    entry.started_gen
                }
                None => return Ok(RecomputeOutcome::Unregistered),
            }
        };

        let bytes = self.walk.usage(root).await?;

        let mut state = self.state.write().await;
        let Some(entry) = state.entries.get_mut(root) else {
            debug!(
                "recompute for {} completed after unregistration; discarding",
                root.display()
            );
            return Ok(RecomputeOutcome::Unregistered);
        };

        if generation <= entry.applied_gen {
            debug!(
                "discarding stale recompute for {} (generation {generation}, newest applied {})",
                root.display(),
                entry.applied_gen
            );
            return Ok(RecomputeOutcome::Stale);
        }

        entry.applied_gen = generation;
        entry.tracked_bytes = bytes;
        Ok(RecomputeOutcome::Applied(entry.status(root)))
    }

    /// Live file inventory for `root`, via the walk collaborator.
    pub async fn inventory(&self, root: &Path) -> Result<Vec<FileRecord>> {
        self.walk.inventory(root).await
    }

    /// Read-only status of one root.
    pub async fn snapshot(&self, root: &Path) -> Option<FolderStatus> {
        let state = self.state.read().await;
        state.entries.get(root).map(|entry| entry.status(root))
    }

    /// Statuses of all registered roots, in registration order.
    pub async fn statuses(&self) -> Vec<FolderStatus> {
        let state = self.state.read().await;
        let mut statuses: Vec<FolderStatus> = state
            .entries
            .iter()
            .map(|(root, entry)| entry.status(root))
            .collect();
        statuses.sort_by_key(|status| status.index);
        statuses
    }

    /// All registered roots.
    pub async fn roots(&self) -> Vec<PathBuf> {
        self.state.read().await.entries.keys().cloned().collect()
    }
}
