//! Leader Schedule Cache (C8): map slot → expected leader pubkey.

use {
    log::warn,
    rand::{Rng, SeedableRng},
    rand_chacha::ChaChaRng,
    serde::Deserialize,
    std::collections::HashMap,
    validator_primitives::Pubkey,
};

#[derive(Debug, Clone)]
pub struct LeaderScheduleCache {
    /// slot → leader, populated for the current (and, if fetched, next)
    /// epoch.
    schedule: HashMap<u64, Pubkey>,
    self_pubkey: Pubkey,
}

impl LeaderScheduleCache {
    pub fn empty(self_pubkey: Pubkey) -> Self {
        Self {
            schedule: HashMap::new(),
            self_pubkey,
        }
    }

    pub fn leader_for(&self, slot: u64) -> Option<Pubkey> {
        self.schedule.get(&slot).copied()
    }

    pub fn is_self_leader(&self, slot: u64) -> bool {
        self.leader_for(slot) == Some(self.self_pubkey)
    }

    pub fn len(&self) -> usize {
        self.schedule.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedule.is_empty()
    }

    /// Strategy 2 (§4.8, required for self-sufficiency): a deterministic
    /// weighted shuffle over the stake distribution, seeded by the epoch
    /// number the way `WeightedShuffle` is seeded from an epoch-derived
    /// ChaCha seed upstream. `stakes` need not be sorted; ties in the
    /// shuffle order are broken by pubkey to keep the result fully
    /// deterministic across runs.
    pub fn derive_from_stakes(
        epoch: u64,
        slots_in_epoch: u64,
        first_slot: u64,
        stakes: &[(Pubkey, u64)],
    ) -> Self {
        let self_pubkey = stakes.first().map(|(pk, _)| *pk).unwrap_or_default();
        let mut cache = Self::empty(self_pubkey);
        if stakes.is_empty() || slots_in_epoch == 0 {
            return cache;
        }

        let order = weighted_shuffle(epoch, stakes);
        for offset in 0..slots_in_epoch {
            let leader = order[(offset as usize) % order.len()];
            cache.schedule.insert(first_slot + offset, leader);
        }
        cache
    }

    /// Strategy 1 (§4.8, §6.5): parses a `getLeaderSchedule` RPC response
    /// shaped `{"result": {"<pubkey-base58>": [slot_offset, ...]}}` into
    /// the cache, anchored at `first_slot` of the epoch. Shape mismatch
    /// does not propagate — it is a convenience path (§7: "warn and
    /// proceed without a prepopulated cache").
    pub fn from_rpc_response(body: &str, first_slot: u64, self_pubkey: Pubkey) -> Self {
        let mut cache = Self::empty(self_pubkey);
        match serde_json::from_str::<RpcLeaderScheduleResponse>(body) {
            Ok(parsed) => {
                for (pubkey_b58, offsets) in parsed.result {
                    let Ok(decoded) = bs58::decode(&pubkey_b58).into_vec() else {
                        warn!("leader schedule RPC returned an unparseable pubkey: {pubkey_b58}");
                        continue;
                    };
                    let Ok(bytes): Result<[u8; 32], _> = decoded.try_into() else {
                        warn!("leader schedule RPC pubkey was not 32 bytes: {pubkey_b58}");
                        continue;
                    };
                    let leader = Pubkey::new_from_array(bytes);
                    for offset in offsets {
                        cache.schedule.insert(first_slot + offset, leader);
                    }
                }
            }
            Err(err) => {
                warn!("leader schedule RPC response shape mismatch: {err}");
            }
        }
        cache
    }
}

#[derive(Debug, Deserialize)]
struct RpcLeaderScheduleResponse {
    result: HashMap<String, Vec<u64>>,
}

/// Fisher-Yates shuffle over `stakes`, weighted by stake, seeded
/// deterministically from `epoch`. Returns the shuffled pubkey order.
fn weighted_shuffle(epoch: u64, stakes: &[(Pubkey, u64)]) -> Vec<Pubkey> {
    let mut seed = [0u8; 32];
    seed[0..8].copy_from_slice(&epoch.to_le_bytes());
    let mut rng = ChaChaRng::from_seed(seed);

    let mut remaining: Vec<(Pubkey, u64)> = stakes.to_vec();
    remaining.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut order = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let total: u64 = remaining.iter().map(|(_, stake)| (*stake).max(1)).sum();
        let pick = rng.gen_range(0..total.max(1));
        let mut cumulative = 0u64;
        let mut chosen_index = remaining.len() - 1;
        for (i, (_, stake)) in remaining.iter().enumerate() {
            cumulative += (*stake).max(1);
            if pick < cumulative {
                chosen_index = i;
                break;
            }
        }
        let (pubkey, _) = remaining.remove(chosen_index);
        order.push(pubkey);
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk(byte: u8) -> Pubkey {
        Pubkey::new_from_array([byte; 32])
    }

    #[test]
    fn derivation_is_deterministic_across_calls() {
        let stakes = vec![(pk(1), 100), (pk(2), 50), (pk(3), 25)];
        let a = LeaderScheduleCache::derive_from_stakes(5, 10, 1000, &stakes);
        let b = LeaderScheduleCache::derive_from_stakes(5, 10, 1000, &stakes);
        for slot in 1000..1010 {
            assert_eq!(a.leader_for(slot), b.leader_for(slot));
        }
    }

    #[test]
    fn different_epochs_generally_produce_different_schedules() {
        let stakes = vec![(pk(1), 100), (pk(2), 50), (pk(3), 25), (pk(4), 10)];
        let a = LeaderScheduleCache::derive_from_stakes(1, 20, 0, &stakes);
        let b = LeaderScheduleCache::derive_from_stakes(2, 20, 0, &stakes);
        let differs = (0..20).any(|slot| a.leader_for(slot) != b.leader_for(slot));
        assert!(differs, "expected at least one slot to differ across epochs");
    }

    #[test]
    fn is_self_leader_matches_schedule() {
        let stakes = vec![(pk(7), 100)];
        let cache = LeaderScheduleCache::derive_from_stakes(0, 5, 0, &stakes);
        for slot in 0..5 {
            assert!(cache.is_self_leader(slot));
        }
    }

    #[test]
    fn malformed_rpc_response_yields_empty_cache() {
        let cache = LeaderScheduleCache::from_rpc_response("not json", 0, pk(0));
        assert!(cache.is_empty());
    }

    #[test]
    fn rpc_response_populates_schedule_at_offsets() {
        let leader = pk(1).to_string();
        let body = format!(r#"{{"result":{{"{leader}":[0,2,4]}}}}"#);
        let cache = LeaderScheduleCache::from_rpc_response(&body, 100, pk(0));
        assert_eq!(cache.leader_for(100), Some(pk(1)));
        assert_eq!(cache.leader_for(102), Some(pk(1)));
        assert_eq!(cache.leader_for(101), None);
    }
}
