//! Inbound filesystem events and outbound quota events.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bytes in one gigabyte (1024³), the unit quotas are configured in.
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Convert a byte count to gigabytes rounded to two decimal places.
///
/// This is the display convention consumers expect; every size in an
/// outbound [`FolderEvent`] goes through it.
pub fn bytes_to_gb(bytes: u64) -> f64 {
    (bytes as f64 / GIB as f64 * 100.0).round() / 100.0
}

/// A filesystem change routed to the watch coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsEvent {
    /// The kind of change.
    pub kind: FsEventKind,

    /// Path to the affected file or directory.
    pub path: PathBuf,

    /// When the event was observed.
    pub timestamp: DateTime<Utc>,
}

impl FsEvent {
    /// Create a new filesystem event.
    pub fn new(kind: FsEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Kind of filesystem change, reduced to what quota accounting cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsEventKind {
    /// Bytes may have appeared under a watch root.
    Added,

    /// Bytes may have disappeared from a watch root.
    Removed,
}

impl FsEventKind {
    /// Map a notify event kind onto added/removed pressure, or `None` for
    /// events that cannot change a folder's size.
    ///
    /// Data modifications count as `Added` because an overwrite-in-place can
    /// grow a file; renames count as removal at the old path and addition at
    /// the new one. Modify kinds some backends leave unclassified (macOS
    /// FSEvents reports renames as `RenameMode::Any`, several backends
    /// report data changes as `ModifyKind::Any`) also count as `Added`: a
    /// spurious recompute is cheap, a missed one defeats the enforcer. Only
    /// access and pure-metadata events are dropped.
    pub fn from_notify(kind: notify::EventKind) -> Option<Self> {
        use notify::event::{ModifyKind, RenameMode};

        match kind {
            notify::EventKind::Create(_) => Some(Self::Added),
            notify::EventKind::Remove(_) => Some(Self::Removed),
            notify::EventKind::Modify(ModifyKind::Metadata(_)) => None,
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(Self::Removed),
            notify::EventKind::Modify(ModifyKind::Name(_)) => Some(Self::Added),
            notify::EventKind::Modify(_) => Some(Self::Added),
            _ => None,
        }
    }
}

/// A file considered for eviction.
///
/// Reconstructed from the live filesystem at decision time, never cached:
/// cached metadata can go stale the instant a file changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Full path to the file.
    pub path: PathBuf,

    /// Creation time, the sole eviction ordering key.
    pub created_at: DateTime<Utc>,

    /// File size in bytes.
    pub size_bytes: u64,
}

/// Outbound quota event, consumed by a UI, log, or automated deleter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FolderEvent {
    /// A folder was registered, or its quota was updated in place.
    Registered {
        folder_index: usize,
        path: PathBuf,
        size_gb: f64,
        max_size_gb: f64,
    },

    /// An authoritative recompute produced a fresh tracked size.
    SizeChanged {
        folder_index: usize,
        path: PathBuf,
        size_gb: f64,
        max_size_gb: f64,
    },

    /// A folder is over quota; deleting `files` oldest-first would free at
    /// least `bytes_to_free` (or the folder's entire contents if accounting
    /// has drifted beyond what the inventory can cover).
    EvictionPlanned {
        folder_index: usize,
        path: PathBuf,
        bytes_to_free: u64,
        files: Vec<PathBuf>,
    },
}

impl FolderEvent {
    /// The registration-order index of the folder this event concerns.
    pub fn folder_index(&self) -> usize {
        match self {
            Self::Registered { folder_index, .. }
            | Self::SizeChanged { folder_index, .. }
            | Self::EvictionPlanned { folder_index, .. } => *folder_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_gb_rounding() {
        assert_eq!(bytes_to_gb(0), 0.0);
        assert_eq!(bytes_to_gb(GIB), 1.0);
        assert_eq!(bytes_to_gb(GIB + GIB / 2), 1.5);
        // 400 MB is 0.390625 GB, displayed as 0.39.
        assert_eq!(bytes_to_gb(400 * 1024 * 1024), 0.39);
        // Just under 10 MB rounds to 0.01, not 0.
        assert_eq!(bytes_to_gb(10 * 1024 * 1024), 0.01);
    }

    #[test]
    fn test_notify_kind_mapping() {
        use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind, RenameMode};

        assert_eq!(
            FsEventKind::from_notify(notify::EventKind::Create(CreateKind::File)),
            Some(FsEventKind::Added)
        );
        assert_eq!(
            FsEventKind::from_notify(notify::EventKind::Remove(RemoveKind::File)),
            Some(FsEventKind::Removed)
        );
        assert_eq!(
            FsEventKind::from_notify(notify::EventKind::Modify(ModifyKind::Data(
                DataChange::Content
            ))),
            Some(FsEventKind::Added)
        );
        assert_eq!(
            FsEventKind::from_notify(notify::EventKind::Modify(ModifyKind::Name(
                RenameMode::From
            ))),
            Some(FsEventKind::Removed)
        );
        assert_eq!(
            FsEventKind::from_notify(notify::EventKind::Access(
                notify::event::AccessKind::Read
            )),
            None
        );
    }

    #[test]
    fn test_unclassified_modify_kinds_count_as_added() {
        use notify::event::{MetadataKind, ModifyKind, RenameMode};

        // macOS FSEvents reports renames this way; dropping them would miss
        // files renamed into a watched root.
        for rename in [RenameMode::Any, RenameMode::Both, RenameMode::Other] {
            assert_eq!(
                FsEventKind::from_notify(notify::EventKind::Modify(ModifyKind::Name(rename))),
                Some(FsEventKind::Added),
                "rename mode {rename:?} must trigger a recompute"
            );
        }

        assert_eq!(
            FsEventKind::from_notify(notify::EventKind::Modify(ModifyKind::Any)),
            Some(FsEventKind::Added)
        );
        assert_eq!(
            FsEventKind::from_notify(notify::EventKind::Modify(ModifyKind::Other)),
            Some(FsEventKind::Added)
        );

        // Pure metadata changes cannot change a folder's size.
        assert_eq!(
            FsEventKind::from_notify(notify::EventKind::Modify(ModifyKind::Metadata(
                MetadataKind::Any
            ))),
            None
        );
    }

    #[test]
    fn test_folder_event_serialization() {
        let event = FolderEvent::SizeChanged {
            folder_index: 2,
            path: PathBuf::from("/data"),
            size_gb: 1.25,
            max_size_gb: 1.0,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "size_changed");
        assert_eq!(value["folder_index"], 2);
        assert_eq!(value["size_gb"], 1.25);
    }
}
