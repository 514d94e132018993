//! Recursive size-walk collaborator.
//!
//! The ledger and coordinator never traverse the filesystem themselves; they
//! go through the [`SizeWalk`] trait so tests can substitute a mock and so
//! the traversal runs off the event-processing path.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{QuotaError, Result};
use crate::event::FileRecord;

/// Recursive size and inventory walks over a watch root.
#[async_trait]
pub trait SizeWalk: Send + Sync {
    /// Total bytes of all files under `root`.
    async fn usage(&self, root: &Path) -> Result<u64>;

    /// Live file inventory under `root`, with creation times and sizes.
    async fn inventory(&self, root: &Path) -> Result<Vec<FileRecord>>;
}

/// Production [`SizeWalk`] backed by `walkdir` on the blocking thread pool.
pub struct DiskWalk;

#[async_trait]
impl SizeWalk for DiskWalk {
    async fn usage(&self, root: &Path) -> Result<u64> {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || usage_blocking(&root)).await?
    }

    async fn inventory(&self, root: &Path) -> Result<Vec<FileRecord>> {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || inventory_blocking(&root)).await?
    }
}

fn usage_blocking(root: &Path) -> Result<u64> {
    let mut total: u64 = 0;
    for entry in walk_files(root)? {
        match entry.metadata() {
            Ok(metadata) => total += metadata.len(),
            Err(e) => warn!("skipping unreadable file {}: {e}", entry.path().display()),
        }
    }
    Ok(total)
}

fn inventory_blocking(root: &Path) -> Result<Vec<FileRecord>> {
    let mut records = Vec::new();
    for entry in walk_files(root)? {
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("skipping unreadable file {}: {e}", entry.path().display());
                continue;
            }
        };

        // Fall back to mtime where the filesystem does not record btime.
        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        records.push(FileRecord {
            path: entry.path().to_path_buf(),
            created_at: created,
            size_bytes: metadata.len(),
        });
    }
    Ok(records)
}

/// Walk `root` yielding file entries, skipping unreadable subtrees.
fn walk_files(root: &Path) -> Result<impl Iterator<Item = walkdir::DirEntry>> {
    if !root.is_dir() {
        return Err(QuotaError::FolderNotFound(root.display().to_string()));
    }

    let root_owned: PathBuf = root.to_path_buf();
    Ok(WalkDir::new(root)
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping unreadable entry under {}: {e}", root_owned.display());
                None
            }
        })
        .filter(|entry| entry.file_type().is_file()))
}
