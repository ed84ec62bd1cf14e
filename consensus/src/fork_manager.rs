//! Fork Manager (C6): the fork tree, memoized stake-weighted fork choice,
//! and root advancement.

use {
    log::info,
    std::collections::{HashMap, HashSet},
    validator_bank::Bank,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkStatus {
    Processing,
    Complete,
    Voted,
    Confirmed,
    Finalized,
    Orphaned,
}

pub struct ForkEntry {
    pub slot: u64,
    pub parent_slot: Option<u64>,
    pub bank: Bank,
    pub stake_weight: u64,
    pub vote_count: u64,
    pub status: ForkStatus,
    pub children: Vec<u64>,
}

/// A fork-switch event: the best slot changed from `from` to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkSwitch {
    pub from: Option<u64>,
    pub to: u64,
}

pub struct ForkManager {
    forks: HashMap<u64, ForkEntry>,
    best_slot: Option<u64>,
    root_slot: u64,
    voted_slots: HashSet<u64>,
    weight_cache: HashMap<u64, u64>,
    /// Window below the root retained for observability (§4.6).
    retention_window: u64,
}

impl ForkManager {
    pub fn new(root_slot: u64, root_bank: Bank) -> Self {
        let mut forks = HashMap::new();
        forks.insert(
            root_slot,
            ForkEntry {
                slot: root_slot,
                parent_slot: None,
                bank: root_bank,
                stake_weight: 0,
                vote_count: 0,
                status: ForkStatus::Processing,
                children: Vec::new(),
            },
        );
        Self {
            forks,
            best_slot: Some(root_slot),
            root_slot,
            voted_slots: HashSet::new(),
            weight_cache: HashMap::new(),
            retention_window: 1000,
        }
    }

    pub fn root_slot(&self) -> u64 {
        self.root_slot
    }

    pub fn best_slot(&self) -> Option<u64> {
        self.best_slot
    }

    pub fn get(&self, slot: u64) -> Option<&ForkEntry> {
        self.forks.get(&slot)
    }

    /// `add_fork(slot, parent, bank)`.
    pub fn add_fork(&mut self, slot: u64, parent: u64, bank: Bank) {
        self.forks.insert(
            slot,
            ForkEntry {
                slot,
                parent_slot: Some(parent),
                bank,
                stake_weight: 0,
                vote_count: 0,
                status: ForkStatus::Processing,
                children: Vec::new(),
            },
        );
        if let Some(parent_entry) = self.forks.get_mut(&parent) {
            parent_entry.children.push(slot);
        }
        self.weight_cache.clear();
        self.recompute_best();
    }

    pub fn mark_complete(&mut self, slot: u64) {
        if let Some(entry) = self.forks.get_mut(&slot) {
            entry.status = ForkStatus::Complete;
        }
        self.recompute_best();
    }

    /// `record_vote(slot, stake)`.
    pub fn record_vote(&mut self, slot: u64, stake: u64) -> Option<ForkSwitch> {
        if let Some(entry) = self.forks.get_mut(&slot) {
            entry.vote_count += 1;
            entry.stake_weight += stake;
        }
        self.voted_slots.insert(slot);
        self.weight_cache.clear();
        self.recompute_best()
    }

    /// `weight(slot) = entry.stake_weight + Σ weight(child)` over
    /// non-orphaned children.
    pub fn weight(&mut self, slot: u64) -> u64 {
        if let Some(cached) = self.weight_cache.get(&slot) {
            return *cached;
        }
        let Some(entry) = self.forks.get(&slot) else {
            return 0;
        };
        if entry.status == ForkStatus::Orphaned {
            return 0;
        }
        let own = entry.stake_weight;
        let children = entry.children.clone();
        let total = own + children.iter().map(|child| self.weight(*child)).sum::<u64>();
        self.weight_cache.insert(slot, total);
        total
    }

    /// `argmax weight` across non-orphaned entries; ties broken by higher
    /// slot. Returns the resulting fork-switch event, if the best slot
    /// actually changed.
    fn recompute_best(&mut self) -> Option<ForkSwitch> {
        let candidates: Vec<u64> = self
            .forks
            .values()
            .filter(|e| e.status != ForkStatus::Orphaned)
            .map(|e| e.slot)
            .collect();

        let mut best: Option<(u64, u64)> = None; // (weight, slot)
        for slot in candidates {
            let weight = self.weight(slot);
            best = match best {
                None => Some((weight, slot)),
                Some((best_weight, best_slot)) => {
                    if weight > best_weight || (weight == best_weight && slot > best_slot) {
                        Some((weight, slot))
                    } else {
                        Some((best_weight, best_slot))
                    }
                }
            };
        }

        let new_best = best.map(|(_, slot)| slot);
        if new_best != self.best_slot {
            let event = ForkSwitch {
                from: self.best_slot,
                to: new_best.unwrap_or(self.root_slot),
            };
            info!("fork switch: {:?} -> {}", event.from, event.to);
            self.best_slot = new_best;
            Some(event)
        } else {
            None
        }
    }

    /// `is_ancestor(a, b)`: walks from `b` up parent links; O(depth).
    pub fn is_ancestor(&self, a: u64, b: u64) -> bool {
        let mut cursor = b;
        loop {
            if cursor == a {
                return true;
            }
            match self.forks.get(&cursor).and_then(|e| e.parent_slot) {
                Some(parent) => cursor = parent,
                None => return false,
            }
        }
    }

    /// `set_root(new_root)`: entries below `new_root` not ancestral to it
    /// are orphaned; entries older than `new_root - retention_window` are
    /// pruned. `new_root` must monotonically increase.
    pub fn set_root(&mut self, new_root: u64) {
        assert!(new_root >= self.root_slot, "root must not regress");

        let to_orphan: Vec<u64> = self
            .forks
            .keys()
            .copied()
            .filter(|&slot| slot < new_root && !self.is_ancestor(slot, new_root))
            .collect();
        for slot in to_orphan {
            if let Some(entry) = self.forks.get_mut(&slot) {
                entry.status = ForkStatus::Orphaned;
            }
        }

        let prune_below = new_root.saturating_sub(self.retention_window);
        self.forks.retain(|&slot, _| slot >= prune_below || slot == new_root);

        self.root_slot = new_root;
        self.weight_cache.clear();
        self.recompute_best();
    }
}

#[cfg(test)]
mod tests {
    use {super::*, validator_bank::InMemoryAccountsStore, validator_primitives::Hash};

    fn bank_at(slot: u64) -> Bank {
        Bank::new_root(slot, Hash::default(), InMemoryAccountsStore::new())
    }

    #[test]
    fn fork_switch_follows_accumulated_stake_s3() {
        let mut manager = ForkManager::new(0, bank_at(0));
        manager.add_fork(1, 0, bank_at(1));
        manager.add_fork(2, 1, bank_at(2));
        manager.add_fork(3, 2, bank_at(3));
        manager.add_fork(4, 2, bank_at(4));

        manager.record_vote(4, 100);
        assert_eq!(manager.best_slot(), Some(4));

        let switch = manager.record_vote(3, 200).unwrap();
        assert_eq!(switch.to, 3);
        assert_eq!(manager.best_slot(), Some(3));

        manager.set_root(3);
        assert_eq!(manager.get(4).unwrap().status, ForkStatus::Orphaned);
        assert_eq!(manager.best_slot(), Some(3));
    }

    #[test]
    fn weight_accumulates_over_non_orphaned_descendants_property() {
        let mut manager = ForkManager::new(0, bank_at(0));
        manager.add_fork(1, 0, bank_at(1));
        manager.add_fork(2, 1, bank_at(2));
        manager.record_vote(2, 50);
        assert_eq!(manager.weight(1), 50);
        assert_eq!(manager.weight(0), 50);
    }

    #[test]
    fn is_ancestor_walks_parent_chain() {
        let mut manager = ForkManager::new(0, bank_at(0));
        manager.add_fork(1, 0, bank_at(1));
        manager.add_fork(2, 1, bank_at(2));
        assert!(manager.is_ancestor(0, 2));
        assert!(!manager.is_ancestor(2, 0));
    }
}
