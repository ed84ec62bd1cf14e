//! Runtime construction and tile wiring (§9): each collaborator is built
//! first, then wired to the others through explicit setters, so no two
//! components hold a mutual borrow of each other. The cyclic dependency
//! named in §9 — replay needs the TPU client, the TPU client needs the
//! leader schedule, the leader schedule is populated by replay — is
//! resolved the same way: construct all three during bootstrap, then
//! wire the vote submitter's leader-schedule reference in afterward.

use {
    log::{info, warn},
    std::{
        sync::{atomic::Ordering, Arc},
        thread,
    },
    validator_bootstrap::BootstrapOutcome,
    validator_consensus::{ForkManager, Tower, TowerPersistError},
    validator_gossip_iface::ContactTable,
    validator_leader_schedule::LeaderScheduleCache,
    validator_primitives::{Hash, Keypair, Pubkey},
    validator_vote_submitter::{
        BlockhashSource, SubmitterHandles, TickOutcome, VoteSubmitter, DEFAULT_TICK_INTERVAL,
    },
};

/// Reads the replay path's root bank blockhash; the primary source in
/// the vote submitter's waterfall (§4.9 step 4).
struct RootBankBlockhash {
    hash: Arc<std::sync::Mutex<Option<Hash>>>,
}

impl BlockhashSource for RootBankBlockhash {
    fn root_bank_blockhash(&self) -> Option<Hash> {
        *self.hash.lock().unwrap()
    }

    fn rpc_latest_blockhash(&self) -> Option<Hash> {
        None
    }
}

pub struct Runtime {
    pub handles: SubmitterHandles,
    fork_manager: ForkManager,
    tower: Tower,
    leader_schedule: LeaderScheduleCache,
    contacts: ContactTable,
    vote_submitter: Option<VoteSubmitter>,
    root_bank_blockhash: Arc<std::sync::Mutex<Option<Hash>>>,
    tower_dir: std::path::PathBuf,
}

impl Runtime {
    pub fn new(outcome: BootstrapOutcome, tower_dir: std::path::PathBuf) -> Self {
        let root_bank_blockhash = Arc::new(std::sync::Mutex::new(outcome.bank.bank_hash()));
        let handles = SubmitterHandles::new();
        handles.current_slot.store(outcome.start_slot, Ordering::Release);
        Self {
            handles,
            fork_manager: outcome.fork_manager,
            tower: outcome.tower,
            leader_schedule: outcome.leader_schedule,
            contacts: ContactTable::new(),
            vote_submitter: None,
            root_bank_blockhash,
            tower_dir,
        }
    }

    /// Wiring step: attaches the vote submitter once voting is enabled
    /// (identity + configured vote account), per §4.9's "started only if
    /// voting is enabled and a vote account is configured."
    pub fn set_vote_submitter(&mut self, identity: Keypair, vote_account: Pubkey, vote_program_id: Pubkey) {
        self.vote_submitter = Some(VoteSubmitter::new(identity, vote_account, vote_program_id));
    }

    /// Runs the vote-submitter tile: a dedicated OS thread ticking at
    /// fixed cadence (§4.9, §5), polling the shutdown flag between
    /// sleeps. Network dispatch inside each tick uses a short-lived
    /// single-threaded tokio runtime, the only async usage on this path
    /// (§5, SPEC_FULL §2). Tower persistence failures (§7) are fatal but
    /// typed: the tile returns the error to its caller rather than
    /// panicking, matching how the rest of this workspace propagates
    /// fatal conditions.
    pub fn spawn_vote_submitter_tile(mut self) -> thread::JoinHandle<Result<Self, TowerPersistError>> {
        thread::spawn(move || {
            info!("vote submitter tile starting");
            while !self.handles.shutdown.load(Ordering::Acquire) {
                self.tick_vote_submitter()?;
                thread::sleep(DEFAULT_TICK_INTERVAL);
            }
            info!("vote submitter tile stopped");
            Ok(self)
        })
    }

    fn tick_vote_submitter(&mut self) -> Result<(), TowerPersistError> {
        let Some(submitter) = &self.vote_submitter else {
            return Ok(());
        };
        let candidate_slot = self.handles.current_slot.load(Ordering::Acquire);
        let Some(candidate_entry) = self.fork_manager.get(candidate_slot) else {
            return Ok(());
        };
        let Some(candidate_hash) = candidate_entry.bank.bank_hash() else {
            return Ok(());
        };

        let blockhash_source = RootBankBlockhash {
            hash: self.root_bank_blockhash.clone(),
        };
        let timestamp = 0; // stamped by the runtime's clock collaborator, out of this core's scope
        let (outcome, tx) = submitter.tick(
            candidate_slot,
            candidate_hash,
            &mut self.tower,
            &self.fork_manager,
            &blockhash_source,
            &self.leader_schedule,
            timestamp,
        );

        match outcome {
            TickOutcome::Submitted { targets } => {
                // §7: disk I/O errors on tower persistence are fatal —
                // voting must not proceed with an unsaved tower.
                self.tower.save_to_dir(&self.tower_dir)?;
                if let Some(tx) = tx {
                    self.dispatch(tx, targets);
                }
            }
            TickOutcome::LockoutViolation => {
                warn!("tower rejected candidate slot {candidate_slot}, idling");
            }
            TickOutcome::Idle => {}
        }
        Ok(())
    }

    fn dispatch(&self, tx: validator_entry::Transaction, targets: Vec<Pubkey>) {
        let Some(submitter) = &self.vote_submitter else {
            return;
        };
        let contacts = self.contacts.clone();
        match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt.block_on(submitter.dispatch(&tx, &targets, &contacts)),
            Err(err) => warn!("failed to start dispatch runtime: {err}"),
        }
    }
}
