//! Gossip discovery is treated as an opaque contact-info table (spec §1,
//! §6.8): this crate specifies only the boundary the vote submitter needs
//! to resolve a leader pubkey to a TPU ingress address.

use {
    std::{collections::HashMap, net::SocketAddr},
    validator_primitives::Pubkey,
};

#[derive(Debug, Clone, Default)]
pub struct ContactTable {
    tpu_addresses: HashMap<Pubkey, SocketAddr>,
}

impl ContactTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tpu_address(&mut self, pubkey: Pubkey, address: SocketAddr) {
        self.tpu_addresses.insert(pubkey, address);
    }

    /// Looked up lazily by the vote submitter's redundancy dispatch; a
    /// missing entry does not block resolution of the others (§4.9).
    pub fn tpu_address(&self, pubkey: &Pubkey) -> Option<SocketAddr> {
        self.tpu_addresses.get(pubkey).copied()
    }

    pub fn len(&self) -> usize {
        self.tpu_addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tpu_addresses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entries_resolve_to_none_without_error() {
        let table = ContactTable::new();
        let pubkey = Pubkey::new_from_array([1; 32]);
        assert_eq!(table.tpu_address(&pubkey), None);
    }

    #[test]
    fn insert_then_lookup_round_trips() {
        let mut table = ContactTable::new();
        let pubkey = Pubkey::new_from_array([2; 32]);
        let addr: SocketAddr = "127.0.0.1:8001".parse().unwrap();
        table.insert_tpu_address(pubkey, addr);
        assert_eq!(table.tpu_address(&pubkey), Some(addr));
        assert_eq!(table.len(), 1);
    }
}
