//! Vote Submitter (C9): fixed-cadence tick loop, blockhash resolution
//! waterfall, and redundant fire-and-forget dispatch.

use {
    crate::vote_transaction::build_vote_transaction,
    log::{info, warn},
    std::{
        sync::{
            atomic::{AtomicBool, AtomicU64, Ordering},
            Arc,
        },
        time::Duration,
    },
    validator_consensus::{ForkManager, Tower},
    validator_entry::Transaction,
    validator_gossip_iface::ContactTable,
    validator_leader_schedule::LeaderScheduleCache,
    validator_primitives::{Hash, Keypair, Pubkey},
};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(400);
pub const DEFAULT_REDUNDANT_LEADERS: usize = 4;

/// Resolves the blockhash a vote transaction should reference, following
/// the primary/fallback/last-resort waterfall (§4.9 step 4).
pub trait BlockhashSource: Send + Sync {
    /// Primary: the root bank's own blockhash, always fresh, no network
    /// call.
    fn root_bank_blockhash(&self) -> Option<Hash>;
    /// Fallback: only consulted while the bank is not yet seeded during
    /// bootstrap.
    fn rpc_latest_blockhash(&self) -> Option<Hash>;
}

/// Deterministic last-resort blockhash: a fixed sentinel mixed with the
/// timestamp, so voting degrades rather than stalls entirely (§4.9).
pub fn synthesize_fallback_blockhash(timestamp_seconds: i64) -> Hash {
    Hash::hash_parts(&[b"vote-submitter-fallback-blockhash", &timestamp_seconds.to_le_bytes()])
}

pub fn resolve_blockhash(source: &dyn BlockhashSource, timestamp_seconds: i64) -> Hash {
    if let Some(hash) = source.root_bank_blockhash() {
        return hash;
    }
    if let Some(hash) = source.rpc_latest_blockhash() {
        warn!("vote submitter fell back to RPC blockhash; root bank not yet seeded");
        return hash;
    }
    warn!("vote submitter synthesizing a fallback blockhash; voting degraded");
    synthesize_fallback_blockhash(timestamp_seconds)
}

/// Shared, lock-free view of the latest completed slot (§9's "shared
/// current-slot pointer"), and the shutdown flag the submitter tile polls
/// between sleeps.
pub struct SubmitterHandles {
    pub current_slot: Arc<AtomicU64>,
    pub shutdown: Arc<AtomicBool>,
}

impl SubmitterHandles {
    pub fn new() -> Self {
        Self {
            current_slot: Arc::new(AtomicU64::new(0)),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

impl Default for SubmitterHandles {
    fn default() -> Self {
        Self::new()
    }
}

pub struct VoteSubmitter {
    identity: Keypair,
    vote_account: Pubkey,
    vote_program_id: Pubkey,
    redundant_leaders: usize,
}

/// One tick's outcome, used by the runtime loop and exercised directly by
/// tests without needing a real timer or network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    LockoutViolation,
    Submitted { targets: Vec<Pubkey> },
}

impl VoteSubmitter {
    pub fn new(identity: Keypair, vote_account: Pubkey, vote_program_id: Pubkey) -> Self {
        Self {
            identity,
            vote_account,
            vote_program_id,
            redundant_leaders: DEFAULT_REDUNDANT_LEADERS,
        }
    }

    /// Runs one tick of the submitter's logic (§4.9 steps 1-6), returning
    /// the built transaction (if any) alongside the tick's outcome so the
    /// caller can dispatch it. Tower and fork-manager accesses happen here
    /// synchronously, matching spec §5's single-writer discipline.
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &self,
        candidate_slot: u64,
        candidate_bank_hash: Hash,
        tower: &mut Tower,
        forks: &ForkManager,
        blockhash_source: &dyn BlockhashSource,
        leader_schedule: &LeaderScheduleCache,
        timestamp_seconds: i64,
    ) -> (TickOutcome, Option<Transaction>) {
        if let Some(last) = tower.last_vote_slot {
            if candidate_slot <= last {
                return (TickOutcome::Idle, None);
            }
        }
        if !tower.can_vote(candidate_slot, forks) {
            return (TickOutcome::LockoutViolation, None);
        }

        let recent_blockhash = resolve_blockhash(blockhash_source, timestamp_seconds);
        tower.apply_vote(candidate_slot, candidate_bank_hash, timestamp_seconds);

        let tx = build_vote_transaction(
            &self.identity,
            self.vote_account,
            self.vote_program_id,
            tower,
            candidate_bank_hash,
            recent_blockhash,
            timestamp_seconds,
        );

        let targets = next_leaders(leader_schedule, candidate_slot, self.redundant_leaders);
        (TickOutcome::Submitted { targets: targets.clone() }, Some(tx))
    }

    /// Dispatches `tx` to each resolved TPU address, fire-and-forget
    /// (§4.9 step 6). Resolution failures for individual leaders do not
    /// block sending to the others.
    pub async fn dispatch(&self, tx: &Transaction, targets: &[Pubkey], contacts: &ContactTable) {
        let bytes = tx.serialize();
        let mut handles = Vec::with_capacity(targets.len());
        for target in targets {
            let Some(address) = contacts.tpu_address(target) else {
                warn!("no TPU address known for leader {target}");
                continue;
            };
            let payload = bytes.clone();
            handles.push(tokio::spawn(async move {
                match tokio::net::UdpSocket::bind("0.0.0.0:0").await {
                    Ok(socket) => {
                        if let Err(err) = socket.send_to(&payload, address).await {
                            warn!("vote dispatch to {address} failed: {err}");
                        }
                    }
                    Err(err) => warn!("failed to bind UDP socket for vote dispatch: {err}"),
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
        info!("dispatched vote to {} target(s)", targets.len());
    }
}

/// Looks up the next `n` upcoming leaders starting at `from_slot + 1`, in
/// slot order, deduplicated.
fn next_leaders(schedule: &LeaderScheduleCache, from_slot: u64, n: usize) -> Vec<Pubkey> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(n);
    let mut slot = from_slot + 1;
    let mut probes = 0;
    while out.len() < n && probes < n * 16 + 16 {
        if let Some(leader) = schedule.leader_for(slot) {
            if seen.insert(leader) {
                out.push(leader);
            }
        }
        slot += 1;
        probes += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        validator_bank::{Bank, InMemoryAccountsStore},
    };

    struct FixedBlockhash(Option<Hash>);
    impl BlockhashSource for FixedBlockhash {
        fn root_bank_blockhash(&self) -> Option<Hash> {
            self.0
        }
        fn rpc_latest_blockhash(&self) -> Option<Hash> {
            None
        }
    }

    fn forks() -> ForkManager {
        let bank = Bank::new_root(50, Hash::default(), InMemoryAccountsStore::new());
        ForkManager::new(50, bank)
    }

    #[test]
    fn resolves_root_bank_blockhash_when_present() {
        let hash = Hash::new_from_array([1; 32]);
        let resolved = resolve_blockhash(&FixedBlockhash(Some(hash)), 0);
        assert_eq!(resolved, hash);
    }

    #[test]
    fn falls_back_to_synthesized_hash_when_no_source_available() {
        let resolved = resolve_blockhash(&FixedBlockhash(None), 42);
        assert_eq!(resolved, synthesize_fallback_blockhash(42));
    }

    #[test]
    fn tick_idles_when_candidate_not_ahead_of_last_vote() {
        let identity = Keypair::new();
        let submitter = VoteSubmitter::new(identity, Pubkey::new_from_array([1; 32]), Pubkey::new_from_array([2; 32]));
        let mut tower = Tower::new(submitter_identity_pubkey(&submitter));
        tower.apply_vote(50, Hash::default(), 0);
        let forks = forks();
        let schedule = LeaderScheduleCache::empty(Pubkey::default());
        let (outcome, tx) = submitter.tick(
            50,
            Hash::default(),
            &mut tower,
            &forks,
            &FixedBlockhash(Some(Hash::default())),
            &schedule,
            0,
        );
        assert_eq!(outcome, TickOutcome::Idle);
        assert!(tx.is_none());
    }

    #[test]
    fn tick_submits_and_advances_tower_when_allowed() {
        let identity = Keypair::new();
        let submitter = VoteSubmitter::new(identity, Pubkey::new_from_array([1; 32]), Pubkey::new_from_array([2; 32]));
        let mut tower = Tower::new(submitter_identity_pubkey(&submitter));
        let forks = forks();
        let schedule = LeaderScheduleCache::empty(Pubkey::default());
        let (outcome, tx) = submitter.tick(
            51,
            Hash::new_from_array([4; 32]),
            &mut tower,
            &forks,
            &FixedBlockhash(Some(Hash::new_from_array([5; 32]))),
            &schedule,
            123,
        );
        assert!(matches!(outcome, TickOutcome::Submitted { .. }));
        assert!(tx.is_some());
        assert_eq!(tower.last_vote_slot, Some(51));
    }

    fn submitter_identity_pubkey(submitter: &VoteSubmitter) -> Pubkey {
        submitter.identity.pubkey()
    }
}
