//! Fork management and Tower BFT voting (C6, C7).

pub mod fork_manager;
pub mod tower;

pub use {
    fork_manager::{ForkEntry, ForkManager, ForkStatus, ForkSwitch},
    tower::{
        Lockout, Tower, TowerDeserializeError, TowerLoadError, TowerPersistError, Vote,
        MAX_LOCKOUT_HISTORY,
    },
};
