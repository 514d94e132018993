//! Watch coordination: filesystem events in, quota events out.
//!
//! The coordinator owns the notify watcher, routes each filesystem event to
//! the root that owns it, schedules authoritative recomputes, and emits
//! [`FolderEvent`]s when sizes change or a folder goes over quota.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, trace, warn};

use crate::classifier::owning_root;
use crate::error::{QuotaError, Result};
use crate::event::{FolderEvent, FsEvent, FsEventKind};
use crate::ledger::{FolderStatus, RecomputeOutcome, SizeLedger};
use crate::planner;

const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// In-flight/pending recompute bookkeeping for one root.
///
/// At most one walk runs per root; a burst of requests while one is in
/// flight collapses into a single pending follow-up. The pending slot
/// remembers whether any coalesced request asked for a quota check.
#[derive(Debug, Default)]
struct RecomputeGate {
    in_flight: bool,
    pending: Option<bool>,
}

type GateMap = Arc<Mutex<HashMap<PathBuf, RecomputeGate>>>;

/// Coordinates filesystem watching and quota enforcement for all
/// registered roots.
pub struct WatchCoordinator {
    /// Quota and tracked-size accounting.
    ledger: Arc<SizeLedger>,

    /// Internal notify watcher; `Some` while watching.
    watcher: Option<RecommendedWatcher>,

    /// Inbound filesystem event sender (cloned into the notify callback).
    fs_tx: mpsc::Sender<FsEvent>,

    /// Inbound receiver, taken by the event loop on first start.
    fs_rx: Option<mpsc::Receiver<FsEvent>>,

    /// Outbound quota event sender.
    events_tx: mpsc::Sender<FolderEvent>,

    /// Per-root recompute gates.
    gates: GateMap,
}

impl WatchCoordinator {
    /// Create a coordinator and the receiver for its outbound events.
    pub fn new(ledger: Arc<SizeLedger>) -> (Self, mpsc::Receiver<FolderEvent>) {
        let (fs_tx, fs_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let coordinator = Self {
            ledger,
            watcher: None,
            fs_tx,
            fs_rx: Some(fs_rx),
            events_tx,
            gates: Arc::new(Mutex::new(HashMap::new())),
        };

        (coordinator, events_rx)
    }

    /// Whether the filesystem watcher is active.
    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// The ledger shared with this coordinator.
    pub fn ledger(&self) -> &Arc<SizeLedger> {
        &self.ledger
    }

    /// Start watching all registered roots and processing events.
    pub async fn start(&mut self) -> Result<()> {
        if self.watcher.is_some() {
            return Ok(()); // Already running
        }

        let fs_tx = self.fs_tx.clone();
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    let Some(kind) = FsEventKind::from_notify(event.kind) else {
                        return;
                    };
                    for path in event.paths {
                        if let Err(e) = fs_tx.blocking_send(FsEvent::new(kind, path)) {
                            error!("failed to queue filesystem event: {e}");
                        }
                    }
                }
                Err(e) => {
                    // The watch stays in place; re-registration is the
                    // recovery path for a broken subscription.
                    error!("filesystem watch error: {e}");
                }
            },
        )?;

        for root in self.ledger.roots().await {
            match watcher.watch(&root, RecursiveMode::Recursive) {
                Ok(()) => debug!("watching {}", root.display()),
                Err(e) => warn!("failed to watch {}: {e}", root.display()),
            }
        }
        self.watcher = Some(watcher);

        if let Some(mut fs_rx) = self.fs_rx.take() {
            let ledger = self.ledger.clone();
            let gates = self.gates.clone();
            let events_tx = self.events_tx.clone();
            tokio::spawn(async move {
                while let Some(event) = fs_rx.recv().await {
                    dispatch(&event, &ledger, &gates, &events_tx).await;
                }
                debug!("filesystem event loop terminated");
            });
        }

        info!("watch coordinator started");
        Ok(())
    }

    /// Stop watching. Registered folders and their accounting stay in place.
    pub async fn stop(&mut self) {
        if let Some(ref mut watcher) = self.watcher {
            for root in self.ledger.roots().await {
                let _ = watcher.unwatch(&root);
            }
        }
        self.watcher = None;
        info!("watch coordinator stopped");
    }

    /// Register `root` with a quota, or update the quota of an existing
    /// registration in place.
    ///
    /// A new root starts watching immediately (if the coordinator is
    /// running) and gets an initial authoritative recompute, which may emit
    /// an eviction plan right away if the folder is already over quota.
    /// Re-registration keeps the accumulated tracked size and the watch.
    pub async fn register(&mut self, root: PathBuf, quota_bytes: u64) -> Result<FolderStatus> {
        let (status, newly_registered) = self.ledger.register(&root, quota_bytes).await;

        if newly_registered {
            if let Some(ref mut watcher) = self.watcher {
                if let Err(e) = watcher.watch(&root, RecursiveMode::Recursive) {
                    // Roll back so the caller's view matches the rejection
                    // and a retry takes the fresh-registration path again.
                    self.ledger.unregister(&root).await;
                    return Err(e.into());
                }
            }
            info!(
                "registered {} with quota {quota_bytes} bytes",
                root.display()
            );
        } else {
            info!(
                "updated quota for {} to {quota_bytes} bytes",
                root.display()
            );
        }

        emit(
            &self.events_tx,
            FolderEvent::Registered {
                folder_index: status.index,
                path: status.path.clone(),
                size_gb: status.size_gb(),
                max_size_gb: status.max_size_gb(),
            },
        )
        .await;

        if newly_registered {
            // Baseline the tracked size; the folder may already be over
            // quota at registration time.
            schedule_recompute(root, true, &self.ledger, &self.gates, &self.events_tx).await;
        }

        Ok(status)
    }

    /// Unregister `root`, discarding its accounting state.
    ///
    /// Walk results still in flight for the root are suppressed by the
    /// ledger once the entry is gone.
    pub async fn unregister(&mut self, root: &Path) -> Result<()> {
        if !self.ledger.unregister(root).await {
            return Err(QuotaError::NotRegistered(root.display().to_string()));
        }
        if let Some(ref mut watcher) = self.watcher {
            let _ = watcher.unwatch(root);
        }
        info!("unregistered {}", root.display());
        Ok(())
    }
}

async fn emit(events_tx: &mpsc::Sender<FolderEvent>, event: FolderEvent) {
    if events_tx.send(event).await.is_err() {
        warn!("event consumer dropped; discarding folder event");
    }
}

/// Route one filesystem event to the root that owns it, if any.
async fn dispatch(
    event: &FsEvent,
    ledger: &Arc<SizeLedger>,
    gates: &GateMap,
    events_tx: &mpsc::Sender<FolderEvent>,
) {
    let roots = ledger.roots().await;
    let Some(root) = owning_root(&event.path, roots.iter().map(PathBuf::as_path)) else {
        trace!("dropping event for unwatched path {}", event.path.display());
        return;
    };

    // Removal only decreases pressure, so it never triggers eviction
    // planning; additions (and overwrites) do.
    let check_quota = event.kind == FsEventKind::Added;
    schedule_recompute(root.to_path_buf(), check_quota, ledger, gates, events_tx).await;
}

/// Request an authoritative recompute for `root`, coalescing bursts down to
/// one in-flight walk plus at most one pending.
async fn schedule_recompute(
    root: PathBuf,
    check_quota: bool,
    ledger: &Arc<SizeLedger>,
    gates: &GateMap,
    events_tx: &mpsc::Sender<FolderEvent>,
) {
    {
        let mut gates_guard = gates.lock().await;
        let gate = gates_guard.entry(root.clone()).or_default();
        if gate.in_flight {
            let pending = gate.pending.get_or_insert(false);
            *pending = *pending || check_quota;
            return;
        }
        gate.in_flight = true;
    }

    let ledger = ledger.clone();
    let gates = gates.clone();
    let events_tx = events_tx.clone();
    tokio::spawn(async move {
        let mut check_quota = check_quota;
        loop {
            run_recompute(&root, check_quota, &ledger, &events_tx).await;

            let mut gates_guard = gates.lock().await;
            let Some(gate) = gates_guard.get_mut(&root) else {
                break;
            };
            match gate.pending.take() {
                Some(pending_check) => check_quota = pending_check,
                None => {
                    gates_guard.remove(&root);
                    break;
                }
            }
        }
    });
}

/// One recompute cycle: walk, apply, notify, and plan eviction if needed.
async fn run_recompute(
    root: &Path,
    check_quota: bool,
    ledger: &Arc<SizeLedger>,
    events_tx: &mpsc::Sender<FolderEvent>,
) {
    let status = match ledger.recompute_authoritative(root).await {
        Ok(RecomputeOutcome::Applied(status)) => status,
        Ok(RecomputeOutcome::Stale) => {
            debug!("stale recompute result for {} discarded", root.display());
            return;
        }
        Ok(RecomputeOutcome::Unregistered) => {
            debug!(
                "recompute for {} completed after unregistration",
                root.display()
            );
            return;
        }
        Err(e) => {
            // Not fatal: keep the previous tracked value this cycle.
            warn!(
                "size walk for {} failed, no size update this cycle: {e}",
                root.display()
            );
            return;
        }
    };

    emit(
        events_tx,
        FolderEvent::SizeChanged {
            folder_index: status.index,
            path: status.path.clone(),
            size_gb: status.size_gb(),
            max_size_gb: status.max_size_gb(),
        },
    )
    .await;

    if check_quota && status.is_over_quota() {
        plan_eviction(&status, ledger, events_tx).await;
    }
}

/// Rebuild the live inventory for an over-quota root and emit the plan.
async fn plan_eviction(
    status: &FolderStatus,
    ledger: &Arc<SizeLedger>,
    events_tx: &mpsc::Sender<FolderEvent>,
) {
    let bytes_to_free = status.overage();

    let inventory = match ledger.inventory(&status.path).await {
        Ok(inventory) => inventory,
        Err(e) => {
            warn!(
                "could not list files under {} for eviction planning: {e}",
                status.path.display()
            );
            return;
        }
    };

    let selected = planner::plan(inventory, bytes_to_free);
    let freed: u64 = selected.iter().map(|record| record.size_bytes).sum();
    if freed < bytes_to_free {
        warn!(
            "entire inventory of {} frees only {freed} of {bytes_to_free} bytes; tracked size may have drifted",
            status.path.display()
        );
    }

    info!(
        "planned eviction of {} files to free {bytes_to_free} bytes under {}",
        selected.len(),
        status.path.display()
    );

    emit(
        events_tx,
        FolderEvent::EvictionPlanned {
            folder_index: status.index,
            path: status.path.clone(),
            bytes_to_free,
            files: selected.into_iter().map(|record| record.path).collect(),
        },
    )
    .await;
}
