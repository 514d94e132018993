//! Oldest-first eviction planning.

use crate::event::FileRecord;

/// Select the files to delete to free at least `bytes_to_free`.
///
/// The inventory is sorted ascending by creation time (ties broken by path
/// so the plan is deterministic), then consumed oldest-first until the
/// accumulated size meets or exceeds `bytes_to_free`; the file that crosses
/// the threshold is included.
///
/// If the whole inventory cannot free enough, the whole inventory is
/// returned. That is a signal that tracked size has drifted from disk and
/// the caller should recompute before deleting anything.
pub fn plan(mut inventory: Vec<FileRecord>, bytes_to_free: u64) -> Vec<FileRecord> {
    if bytes_to_free == 0 {
        return Vec::new();
    }

    inventory.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.path.cmp(&b.path))
    });

    let mut freed: u64 = 0;
    let mut selected = Vec::new();
    for record in inventory {
        freed = freed.saturating_add(record.size_bytes);
        selected.push(record);
        if freed >= bytes_to_free {
            return selected;
        }
    }

    selected
}
