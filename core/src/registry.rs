//! Registration entry point for quota-watched folders.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};

use crate::coordinator::WatchCoordinator;
use crate::error::{QuotaError, Result};
use crate::event::{FolderEvent, GIB};
use crate::ledger::{FolderStatus, SizeLedger};
use crate::walk::{DiskWalk, SizeWalk};

/// Front door of the quota enforcer.
///
/// Validates registrations, converts quotas from gigabytes to bytes, and
/// delegates to the [`WatchCoordinator`]. Folder identity is the
/// canonicalized path, so `/data/../data` re-registers `/data` instead of
/// being tracked twice.
pub struct RegistrationService {
    coordinator: Arc<RwLock<WatchCoordinator>>,
}

impl RegistrationService {
    /// Create a service backed by the given size-walk collaborator.
    ///
    /// Returns the service and the receiver for outbound [`FolderEvent`]s.
    pub fn new(walk: Arc<dyn SizeWalk>) -> (Self, mpsc::Receiver<FolderEvent>) {
        let ledger = Arc::new(SizeLedger::new(walk));
        let (coordinator, events_rx) = WatchCoordinator::new(ledger);

        let service = Self {
            coordinator: Arc::new(RwLock::new(coordinator)),
        };
        (service, events_rx)
    }

    /// Create a service that walks the real filesystem.
    pub fn with_disk_walk() -> (Self, mpsc::Receiver<FolderEvent>) {
        Self::new(Arc::new(DiskWalk))
    }

    /// Start filesystem watching and event processing.
    pub async fn start(&self) -> Result<()> {
        self.coordinator.write().await.start().await
    }

    /// Stop filesystem watching. Registrations stay in place.
    pub async fn stop(&self) {
        self.coordinator.write().await.stop().await;
    }

    /// Register a folder with a quota in gigabytes.
    ///
    /// Rejects non-positive or non-finite quotas and paths that do not
    /// resolve to an existing directory. Returns the synchronously-known
    /// status; the initial authoritative recompute follows asynchronously
    /// and surfaces as a `size_changed` event. Re-registering an
    /// already-watched folder updates its quota in place without restarting
    /// the watch or resetting the tracked size.
    pub async fn register_folder(
        &self,
        path: impl AsRef<Path>,
        quota_gb: f64,
    ) -> Result<FolderStatus> {
        let path = path.as_ref();

        if !quota_gb.is_finite() || quota_gb <= 0.0 {
            return Err(QuotaError::InvalidQuota(quota_gb));
        }
        let quota_bytes = (quota_gb * GIB as f64) as u64;

        let root = tokio::fs::canonicalize(path)
            .await
            .map_err(|_| QuotaError::FolderNotFound(path.display().to_string()))?;
        let metadata = tokio::fs::metadata(&root).await?;
        if !metadata.is_dir() {
            return Err(QuotaError::NotADirectory(root.display().to_string()));
        }

        self.coordinator
            .write()
            .await
            .register(root, quota_bytes)
            .await
    }

    /// Unregister a folder, discarding its accounting state.
    pub async fn unregister_folder(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let root = tokio::fs::canonicalize(path)
            .await
            .map_err(|_| QuotaError::NotRegistered(path.display().to_string()))?;
        self.coordinator.write().await.unregister(&root).await
    }

    /// Status of one registered folder, if any.
    pub async fn status(&self, path: impl AsRef<Path>) -> Option<FolderStatus> {
        let root = tokio::fs::canonicalize(path.as_ref()).await.ok()?;
        self.coordinator.read().await.ledger().snapshot(&root).await
    }

    /// Statuses of all registered folders, in registration order.
    pub async fn statuses(&self) -> Vec<FolderStatus> {
        self.coordinator.read().await.ledger().statuses().await
    }
}
