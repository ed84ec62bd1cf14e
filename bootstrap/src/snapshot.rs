//! Snapshot metadata filename parsing and full-vs-incremental preference
//! (§6.6).

use validator_primitives::Slot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullSnapshotInfo {
    pub slot: Slot,
    pub hash_base58: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementalSnapshotInfo {
    pub base_slot: Slot,
    pub slot: Slot,
    pub hash_base58: String,
    pub file_name: String,
}

/// Parses `snapshot-{slot}-{hash_base58}.tar.zst`.
pub fn parse_full_snapshot_filename(name: &str) -> Option<FullSnapshotInfo> {
    let stripped = name.strip_prefix("snapshot-")?.strip_suffix(".tar.zst")?;
    let (slot_str, hash) = stripped.split_once('-')?;
    let slot: Slot = slot_str.parse().ok()?;
    Some(FullSnapshotInfo {
        slot,
        hash_base58: hash.to_string(),
        file_name: name.to_string(),
    })
}

/// Parses `incremental-snapshot-{base_slot}-{slot}-{hash_base58}.tar.zst`.
pub fn parse_incremental_snapshot_filename(name: &str) -> Option<IncrementalSnapshotInfo> {
    let stripped = name
        .strip_prefix("incremental-snapshot-")?
        .strip_suffix(".tar.zst")?;
    let mut parts = stripped.splitn(3, '-');
    let base_slot: Slot = parts.next()?.parse().ok()?;
    let slot: Slot = parts.next()?.parse().ok()?;
    let hash = parts.next()?;
    Some(IncrementalSnapshotInfo {
        base_slot,
        slot,
        hash_base58: hash.to_string(),
        file_name: name.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectedSnapshot {
    Full(FullSnapshotInfo),
    Incremental(IncrementalSnapshotInfo),
    None,
}

/// Scans a directory listing (filenames only) and picks the best
/// available snapshot: full is preferred over incremental when both are
/// present (§6.6); among multiples of the same kind, the highest slot
/// wins.
pub fn select_best_snapshot(file_names: &[String]) -> SelectedSnapshot {
    let mut best_full: Option<FullSnapshotInfo> = None;
    let mut best_incremental: Option<IncrementalSnapshotInfo> = None;

    for name in file_names {
        if let Some(full) = parse_full_snapshot_filename(name) {
            let is_better = match &best_full {
                Some(b) => full.slot > b.slot,
                None => true,
            };
            if is_better {
                best_full = Some(full);
            }
        } else if let Some(incremental) = parse_incremental_snapshot_filename(name) {
            let is_better = match &best_incremental {
                Some(b) => incremental.slot > b.slot,
                None => true,
            };
            if is_better {
                best_incremental = Some(incremental);
            }
        }
    }

    match (best_full, best_incremental) {
        (Some(full), _) => SelectedSnapshot::Full(full),
        (None, Some(incremental)) => SelectedSnapshot::Incremental(incremental),
        (None, None) => SelectedSnapshot::None,
    }
}
