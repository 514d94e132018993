//! # FolderTrim Core
//!
//! Background folder-quota enforcement. Watched directory trees are tracked
//! against administrator-assigned size quotas; when a tree goes over quota,
//! the library computes a minimal oldest-first set of files whose deletion
//! would bring it back under, and emits the plan to a consumer. Deleting the
//! files is deliberately left to the consumer so a UI can confirm first.
//!
//! ## Architecture
//!
//! ```text
//! RegistrationService ──► SizeLedger (baseline recompute)
//!         │                    ▲
//!         ▼                    │
//! WatchCoordinator ──► PathClassifier ──► SizeLedger (update)
//!         │                                   │ over quota?
//!         ▼                                   ▼
//!    FolderEvent ◄──────────────────── EvictionPlanner
//! ```
//!
//! Size accounting is estimate-based: filesystem events only *trigger*
//! updates, and every update is an authoritative recursive walk rather than
//! incremental arithmetic, so missed or coalesced events cannot accumulate
//! drift. Stale walk results are discarded via per-folder generation
//! counters.

pub mod classifier;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod ledger;
pub mod planner;
pub mod registry;
pub mod walk;

pub use classifier::owning_root;
pub use coordinator::WatchCoordinator;
pub use error::{QuotaError, Result};
pub use event::{FileRecord, FolderEvent, FsEvent, FsEventKind, GIB, bytes_to_gb};
pub use ledger::{FolderStatus, RecomputeOutcome, SizeLedger};
pub use planner::plan;
pub use registry::RegistrationService;
pub use walk::{DiskWalk, SizeWalk};
