//! Bootstrap Sequencer (C10): ordered startup from snapshot discovery
//! through replay wiring.

pub mod phase;
pub mod sequencer;
pub mod snapshot;

pub use {
    phase::{Phase, ProgressCallback},
    sequencer::{run, BootstrapConfig, BootstrapOutcome},
    snapshot::{
        parse_full_snapshot_filename, parse_incremental_snapshot_filename, select_best_snapshot,
        FullSnapshotInfo, IncrementalSnapshotInfo, SelectedSnapshot,
    },
};
