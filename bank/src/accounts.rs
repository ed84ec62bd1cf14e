//! The accounts-store boundary (§4.5): spec.md treats this as an external
//! collaborator, SPEC_FULL pins it down as an in-crate trait with a simple
//! in-memory copy-on-write implementation sufficient to drive execution,
//! fee/rent, and the accounts-delta hash end-to-end.

use {
    std::collections::BTreeMap,
    validator_primitives::{Hash, Pubkey},
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Account {
    pub lamports: u64,
    pub owner: Pubkey,
    pub data: Vec<u8>,
    pub executable: bool,
    pub rent_epoch: u64,
}

impl Account {
    pub fn new(lamports: u64, owner: Pubkey) -> Self {
        Self {
            lamports,
            owner,
            data: Vec::new(),
            executable: false,
            rent_epoch: 0,
        }
    }
}

/// A versioned, shared-readable view of account state. `fork()` gives a
/// child bank a copy-on-write snapshot: reads fall through to the parent
/// until a write shadows the key in the child's own map.
pub trait AccountsStore: Send + Sync {
    fn get_account(&self, pubkey: &Pubkey) -> Option<Account>;
    fn set_account(&mut self, pubkey: Pubkey, account: Account);
    /// Pubkeys written in this store's own layer (not inherited), in
    /// ascending order — the input to the accounts-delta hash.
    fn modified_keys_sorted(&self) -> Vec<Pubkey>;
}

/// A single copy-on-write layer: a base (the parent's store, shared via
/// `Arc` in multi-bank use, owned directly here since this crate's bank
/// tree is shallow in practice) plus this layer's own overlay.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountsStore {
    base: BTreeMap<Pubkey, Account>,
    overlay: BTreeMap<Pubkey, Account>,
}

impl InMemoryAccountsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child layer: the parent's merged view becomes the new
    /// layer's base, and the new layer starts with an empty overlay.
    pub fn fork(&self) -> Self {
        Self {
            base: self.merged_view(),
            overlay: BTreeMap::new(),
        }
    }

    fn merged_view(&self) -> BTreeMap<Pubkey, Account> {
        let mut merged = self.base.clone();
        for (pubkey, account) in &self.overlay {
            merged.insert(*pubkey, account.clone());
        }
        merged
    }

    pub fn total_lamports(&self) -> u64 {
        self.merged_view().values().map(|a| a.lamports).sum()
    }

    pub fn len(&self) -> usize {
        self.merged_view().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AccountsStore for InMemoryAccountsStore {
    fn get_account(&self, pubkey: &Pubkey) -> Option<Account> {
        self.overlay
            .get(pubkey)
            .or_else(|| self.base.get(pubkey))
            .cloned()
    }

    fn set_account(&mut self, pubkey: Pubkey, account: Account) {
        self.overlay.insert(pubkey, account);
    }

    fn modified_keys_sorted(&self) -> Vec<Pubkey> {
        self.overlay.keys().copied().collect()
    }
}

/// Merkle hash over the slot's modified accounts, sorted by pubkey (§4.5).
/// Leaves are `hash(pubkey ‖ lamports_le ‖ data)`; the tree is folded
/// pairwise left-to-right, promoting an odd trailing node unchanged.
pub fn accounts_delta_hash(store: &dyn AccountsStore, modified: &[Pubkey]) -> Hash {
    let mut sorted = modified.to_vec();
    sorted.sort();
    sorted.dedup();

    if sorted.is_empty() {
        return Hash::hash(b"empty-accounts-delta");
    }

    let mut level: Vec<Hash> = sorted
        .iter()
        .map(|pubkey| {
            let account = store.get_account(pubkey).unwrap_or_default();
            Hash::hash_parts(&[
                pubkey.as_ref(),
                &account.lamports.to_le_bytes(),
                &account.data,
            ])
        })
        .collect();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            if let [left, right] = pair {
                next.push(Hash::hash_parts(&[left.as_bytes(), right.as_bytes()]));
            } else {
                next.push(pair[0]);
            }
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk(byte: u8) -> Pubkey {
        Pubkey::new_from_array([byte; 32])
    }

    #[test]
    fn fork_reads_through_to_parent_until_shadowed() {
        let mut parent = InMemoryAccountsStore::new();
        parent.set_account(pk(1), Account::new(100, pk(9)));
        let mut child = parent.fork();
        assert_eq!(child.get_account(&pk(1)).unwrap().lamports, 100);

        child.set_account(pk(1), Account::new(50, pk(9)));
        assert_eq!(child.get_account(&pk(1)).unwrap().lamports, 50);
        assert_eq!(parent.get_account(&pk(1)).unwrap().lamports, 100);
    }

    #[test]
    fn delta_hash_is_order_independent_and_deterministic() {
        let mut store = InMemoryAccountsStore::new();
        store.set_account(pk(2), Account::new(5, pk(9)));
        store.set_account(pk(1), Account::new(7, pk(9)));

        let hash_a = accounts_delta_hash(&store, &[pk(1), pk(2)]);
        let hash_b = accounts_delta_hash(&store, &[pk(2), pk(1)]);
        assert_eq!(hash_a, hash_b);

        let mut other = store.clone();
        other.set_account(pk(1), Account::new(999, pk(9)));
        let hash_c = accounts_delta_hash(&other, &[pk(1), pk(2)]);
        assert_ne!(hash_a, hash_c);
    }
}
